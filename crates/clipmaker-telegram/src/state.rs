//! Shared bot state.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::pipeline::ClipPipeline;

/// State shared by all handlers.
pub struct BotState {
    pipeline: ClipPipeline,
    /// Chats with a run in progress.
    active_runs: RwLock<HashSet<i64>>,
}

impl BotState {
    pub fn new(pipeline: ClipPipeline) -> Self {
        Self {
            pipeline,
            active_runs: RwLock::new(HashSet::new()),
        }
    }

    pub fn pipeline(&self) -> &ClipPipeline {
        &self.pipeline
    }

    /// Mark a run as started.
    ///
    /// Fails with [`PipelineError::Busy`] if the chat already has one.
    pub async fn begin_run(&self, chat_id: i64) -> Result<()> {
        let inserted = self.active_runs.write().await.insert(chat_id);
        debug!(chat_id, inserted, "Begin run");
        if inserted {
            Ok(())
        } else {
            Err(PipelineError::Busy)
        }
    }

    /// Mark the chat's run as finished.
    pub async fn finish_run(&self, chat_id: i64) {
        self.active_runs.write().await.remove(&chat_id);
        debug!(chat_id, "Finish run");
    }

    /// Whether the chat has a run in progress.
    pub async fn is_running(&self, chat_id: i64) -> bool {
        self.active_runs.read().await.contains(&chat_id)
    }

    /// Number of runs in progress across all chats.
    pub async fn active_count(&self) -> usize {
        self.active_runs.read().await.len()
    }
}

/// Create shared state.
pub fn create_shared_state(pipeline: ClipPipeline) -> Arc<BotState> {
    Arc::new(BotState::new(pipeline))
}
