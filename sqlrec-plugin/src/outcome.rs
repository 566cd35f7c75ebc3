//! Publishes run outcomes on a watch channel.

use sqlrec_core::error::RecError;
use sqlrec_core::plugin::{Plugin, PluginPhase};
use sqlrec_core::types::*;
use async_trait::async_trait;
use tokio::sync::watch;

/// Outcome of the most recent run, tagged with its run id
#[derive(Debug, Clone)]
pub struct PublishedOutcome {
    pub run_id: String,
    pub request: RecommendationRequest,
    pub outcome: RecommendationOutcome,
}

/// Plugin that publishes every finished run on a `tokio::sync::watch` channel.
///
/// Subscribers only ever see the latest outcome.
#[derive(Debug)]
pub struct OutcomeChannelPlugin {
    tx: watch::Sender<Option<PublishedOutcome>>,
}

impl OutcomeChannelPlugin {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Subscribe to outcomes
    pub fn subscribe(&self) -> watch::Receiver<Option<PublishedOutcome>> {
        self.tx.subscribe()
    }

    /// Latest published outcome, if any
    pub fn latest(&self) -> Option<PublishedOutcome> {
        self.tx.borrow().clone()
    }
}

impl Default for OutcomeChannelPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for OutcomeChannelPlugin {
    fn name(&self) -> &str {
        "outcome_channel"
    }

    fn enforce(&self) -> PluginPhase {
        PluginPhase::Post
    }

    async fn on_run_end(
        &self,
        ctx: &RunContext,
        outcome: &RecommendationOutcome,
    ) -> Result<(), RecError> {
        // send_replace keeps the value even with no live receivers
        self.tx.send_replace(Some(PublishedOutcome {
            run_id: ctx.run_id.clone(),
            request: ctx.request,
            outcome: outcome.clone(),
        }));
        Ok(())
    }
}
