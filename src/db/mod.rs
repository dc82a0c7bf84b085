//! Persistent storage

pub mod sqlite;
