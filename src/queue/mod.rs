//! Background work queue
//!
//! Page handlers enqueue refresh tasks and return immediately; the refresh
//! worker drains them.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Info,
    News,
    Financials,
}

impl TaskAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskAction::Info => "info",
            TaskAction::News => "news",
            TaskAction::Financials => "financials",
        }
    }

    /// Ledger activity recording this task's outcome
    pub fn activity(&self) -> &'static str {
        match self {
            TaskAction::Info => "ticker_info",
            TaskAction::News => "ticker_news",
            TaskAction::Financials => "ticker_financials",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTickerBody {
    pub ticker_symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub action: TaskAction,
    pub body: TaskTickerBody,
}

/// Fire-and-forget task sink
pub trait WorkQueue: Send + Sync {
    fn enqueue(&self, action: TaskAction, body: TaskTickerBody) -> Result<()>;
}

/// Bounded in-process queue
pub struct ChannelQueue {
    sender: mpsc::Sender<Task>,
}

impl ChannelQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Task>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl WorkQueue for ChannelQueue {
    fn enqueue(&self, action: TaskAction, body: TaskTickerBody) -> Result<()> {
        let symbol = body.ticker_symbol.clone();
        self.sender
            .try_send(Task { action, body })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    AppError::Queue(format!("Queue full, dropped {} for {}", action.as_str(), symbol))
                }
                mpsc::error::TrySendError::Closed(_) => {
                    AppError::Queue("Queue closed".to_string())
                }
            })?;
        tracing::debug!("Enqueued {} for {}", action.as_str(), symbol);
        Ok(())
    }
}
