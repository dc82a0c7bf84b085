//! Background refresh worker
//!
//! Drains the work queue one task at a time and records each outcome in
//! the last-run ledger, so the next page view can tell whether the data
//! is fresh.

use crate::db::sqlite::models::{STATUS_FAILED, STATUS_SUCCESS};
use crate::error::Result;
use crate::queue::{Task, TaskAction};
use crate::services::{NewsService, TickerService};
use crate::state::AppState;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct RefreshWorker {
    state: Arc<AppState>,
    receiver: mpsc::Receiver<Task>,
}

impl RefreshWorker {
    pub fn new(state: Arc<AppState>, receiver: mpsc::Receiver<Task>) -> Self {
        Self { state, receiver }
    }

    /// Spawn the worker; it stops once every queue sender is dropped
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!("Refresh worker started");
        while let Some(task) = self.receiver.recv().await {
            // Failures are already logged and written to the ledger
            let _ = Self::process(&self.state, &task).await;
        }
        info!("Refresh worker stopped");
    }

    /// Run one task and record its outcome
    pub async fn process(state: &AppState, task: &Task) -> Result<()> {
        let symbol = &task.body.ticker_symbol;
        let activity = task.action.activity();

        let result = Self::execute(state, task).await;
        let status = match &result {
            Ok(()) => {
                info!("Completed {} for {}", activity, symbol);
                STATUS_SUCCESS
            }
            Err(e) => {
                warn!("Failed {} for {}: {}", activity, symbol, e);
                STATUS_FAILED
            }
        };

        if let Err(e) = state
            .sqlite
            .record_lastdone(activity, symbol, status, state.clock.now())
        {
            warn!("Failed to record {} for {}: {}", activity, symbol, e);
        }
        result
    }

    async fn execute(state: &AppState, task: &Task) -> Result<()> {
        let symbol = &task.body.ticker_symbol;
        match task.action {
            TaskAction::Info => {
                TickerService::refresh(state, symbol).await?;
            }
            TaskAction::Financials => {
                let ticker = TickerService::refresh(state, symbol).await?;
                TickerService::ensure_eods(state, &ticker).await?;
            }
            TaskAction::News => {
                let ticker = TickerService::get_fresh_ticker(state, symbol, false).await?;
                NewsService::load_ticker_news(state, &ticker).await?;
            }
        }
        Ok(())
    }
}
