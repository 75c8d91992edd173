use forum_client::{ForumApi, PostOrder};
use ledger::ProcessedLedger;
use starwatch_core::CoreError;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    pub fetched: usize,
    pub added: usize,
}

/// Record every post of the thread as processed without reacting or
/// replying, so monitoring only acts on posts written from now on.
pub async fn backfill_thread(
    forum: &dyn ForumApi,
    ledger: &mut ProcessedLedger,
    thread_id: &str,
    start_page: u32,
    page_delay: Duration,
) -> Result<BackfillReport, CoreError> {
    info!("Collecting every post of thread {} from page {}", thread_id, start_page);

    let posts = forum
        .fetch_thread_posts(thread_id, start_page, PostOrder::Chronological, None, page_delay)
        .await;
    let ids: Vec<_> = posts.iter().filter_map(|post| post.post_id).collect();

    let report = BackfillReport {
        fetched: posts.len(),
        added: ledger.bulk_add(ids)?,
    };

    info!(
        outcome = "success",
        "Backfill finished: {} posts seen, {} newly recorded",
        report.fetched,
        report.added
    );
    Ok(report)
}
