//! HTTP request and response types

use crate::session::Message;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const API_VERSION: &str = "0.1.0";

/// Envelope of every `/api/v1/*` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope {
    pub api_version: String,
    pub endpoint: String,
    pub success: bool,
    pub message: String,
    pub data: BTreeMap<String, serde_json::Value>,
}

impl ApiEnvelope {
    pub fn new(endpoint: &str) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            endpoint: endpoint.to_string(),
            success: false,
            message: String::new(),
            data: BTreeMap::new(),
        }
    }

    pub fn succeed(&mut self, message: &str) {
        self.success = true;
        self.message = message.to_string();
    }

    pub fn fail(&mut self, message: &str) {
        self.success = false;
        self.message = message.to_string();
    }

    /// Set `<symbol>:<field>`
    pub fn put(&mut self, symbol: &str, field: &str, value: impl Into<serde_json::Value>) {
        self.data.insert(format!("{}:{}", symbol, field), value.into());
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiQuery {
    #[serde(default)]
    pub symbols: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    /// Price history window in days
    pub ts: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn ok(message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
        }
    }
}

/// Result of a manual refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub action: String,
    pub success: bool,
    pub messages: Vec<Message>,
}
