//! Engine callbacks (spec §6 "Engine callbacks") modeled as a typed sink
//! trait (Design Note, §9) rather than nullable mutable fields.

use async_trait::async_trait;

use crate::model::Winner;

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn on_round_end(&self, auction_id: &str, round_index: usize, winners: &[Winner]);
    async fn on_auction_end(&self, auction_id: &str);
}

/// Default sink: logs both callbacks via `tracing`, standing in for the
/// out-of-scope HTTP/SSE push layer (SPEC_FULL.md SUPPLEMENT-1).
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl EventSink for LoggingSink {
    async fn on_round_end(&self, auction_id: &str, round_index: usize, winners: &[Winner]) {
        tracing::info!(
            auction_id,
            round_index,
            winner_count = winners.len(),
            "round ended"
        );
    }

    async fn on_auction_end(&self, auction_id: &str) {
        tracing::info!(auction_id, "auction ended");
    }
}
