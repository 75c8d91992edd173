use crate::processor::{PostOutcome, PostProcessor};
use forum_client::{ForumApi, PostOrder};
use starwatch_core::{BotConfig, CoreError, ErrorReporter, Post};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Flag that turns true once `signal` resolves. If the signal cannot be
/// listened for, the flag simply never changes and monitoring runs on.
pub fn shutdown_on<F>(signal: F) -> watch::Receiver<bool>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                info!("Interrupt received, stopping after the current cycle");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!("Cannot listen for the interrupt signal: {}", e);
                // Dropping the sender would end `run` after one cycle.
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });
    shutdown_rx
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub thread_id: String,
    pub start_page: u32,
    pub pages_per_cycle: u32,
    pub check_interval: Duration,
    pub page_fetch_delay: Duration,
}

impl MonitorSettings {
    pub fn from_config(config: &BotConfig, start_page: u32) -> Self {
        Self {
            thread_id: config.forum_thread_id.clone(),
            start_page: start_page.max(1),
            pages_per_cycle: config.pages_per_cycle.max(1),
            check_interval: config.check_interval(),
            page_fetch_delay: config.page_fetch_delay(),
        }
    }
}

/// Tally of one polling cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub ignored: usize,
    pub skipped: usize,
    pub completed: usize,
    pub reactions_sent: usize,
    pub replies: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: &PostOutcome) {
        match outcome {
            PostOutcome::Ignored => self.ignored += 1,
            PostOutcome::SkippedHasComments
            | PostOutcome::SkippedNoContent
            | PostOutcome::SkippedNoLinks => self.skipped += 1,
            PostOutcome::Completed {
                reactions_sent,
                replied,
                ..
            } => {
                self.completed += 1;
                self.reactions_sent += reactions_sent;
                if *replied {
                    self.replies += 1;
                }
            }
        }
    }

    /// Posts that were new to the ledger this cycle.
    pub fn handled(&self) -> usize {
        self.skipped + self.completed
    }
}

/// The normal monitoring loop over one forum thread.
pub struct ThreadMonitor {
    forum: Arc<dyn ForumApi>,
    processor: PostProcessor,
    settings: MonitorSettings,
    reporter: ErrorReporter,
}

impl ThreadMonitor {
    pub fn new(forum: Arc<dyn ForumApi>, processor: PostProcessor, settings: MonitorSettings) -> Self {
        Self {
            forum,
            processor,
            settings,
            reporter: ErrorReporter::new("Monitoring cycle"),
        }
    }

    pub fn processor(&self) -> &PostProcessor {
        &self.processor
    }

    /// Poll until `shutdown` flips to true. The flag is checked at the top of
    /// each cycle; the interval sleep also ends early when it changes.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        self.log_banner();

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_cycle().await {
                Ok(report) => info!(
                    "Cycle done: {} fetched, {} new, {} reactions, {} replies",
                    report.fetched,
                    report.handled(),
                    report.reactions_sent,
                    report.replies
                ),
                Err(e) => self.reporter.report_error(&e),
            }

            debug!("Sleeping {:?} before the next check", self.settings.check_interval);
            tokio::select! {
                _ = sleep(self.settings.check_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Monitoring stopped");
    }

    /// Fetch the newest page(s) and process their posts oldest first.
    /// A failure on the first page is returned; later pages end quietly.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CoreError> {
        let settings = &self.settings;
        info!(
            "Checking thread {} from page {}",
            settings.thread_id, settings.start_page
        );

        let mut posts = self
            .forum
            .fetch_posts_page(&settings.thread_id, settings.start_page, PostOrder::NewestFirst)
            .await?;

        if !posts.is_empty() && settings.pages_per_cycle > 1 {
            sleep(settings.page_fetch_delay).await;
            let more = self
                .forum
                .fetch_thread_posts(
                    &settings.thread_id,
                    settings.start_page + 1,
                    PostOrder::NewestFirst,
                    Some(settings.pages_per_cycle - 1),
                    settings.page_fetch_delay,
                )
                .await;
            posts.extend(more);
        }

        Ok(self.process_posts(posts).await)
    }

    async fn process_posts(&mut self, posts: Vec<Post>) -> CycleReport {
        let mut report = CycleReport {
            fetched: posts.len(),
            ..Default::default()
        };

        if posts.is_empty() {
            info!("No posts to process");
            return report;
        }

        for post in posts.iter().rev() {
            let outcome = self.processor.process(post).await;
            report.record(&outcome);
        }
        report
    }

    fn log_banner(&self) {
        let processor = self.processor.settings();
        info!("========================================");
        info!(
            "Forum replies: {}",
            if processor.enable_reply { "enabled" } else { "disabled" }
        );
        info!(
            "Skip posts with comments: {}",
            if processor.skip_posts_with_comments { "enabled" } else { "disabled" }
        );
        info!("Starting from page: {}", self.settings.start_page);
        info!("Monitoring thread {}. Press Ctrl+C to stop.", self.settings.thread_id);
        info!("========================================");
    }
}
