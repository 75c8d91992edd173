use crate::client::MessagingClient;
use starwatch_core::{BotConfig, LinkTarget, MessagingError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Retry behaviour for sending one paid reaction.
#[derive(Debug, Clone)]
pub struct ReactionConfig {
    /// Stars attached to each reaction
    pub star_count: u32,
    /// Attempts allowed for generic failures
    pub max_retries: u32,
    /// Linear backoff unit: attempt `n` waits `n * base_delay`
    pub base_delay: Duration,
    /// Added to every flood wait the platform signals
    pub flood_wait_margin: Duration,
    /// Flood waits tolerated per link; they do not use up attempts
    pub max_flood_waits: u32,
    /// Resolve a link without a message index to the latest message
    pub resolve_latest_message: bool,
}

impl Default for ReactionConfig {
    fn default() -> Self {
        Self {
            star_count: 3,
            max_retries: 3,
            base_delay: Duration::from_secs(3),
            flood_wait_margin: Duration::from_secs(2),
            max_flood_waits: 10,
            resolve_latest_message: true,
        }
    }
}

impl ReactionConfig {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            star_count: config.stars_count,
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay(),
            flood_wait_margin: config.flood_wait_margin(),
            max_flood_waits: config.max_flood_waits,
            resolve_latest_message: config.resolve_latest_message,
        }
    }

    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Sends paid reactions with bounded retries. Never returns an error: the
/// outcome is a plain success flag.
pub struct ReactionSender {
    client: Arc<dyn MessagingClient>,
    config: ReactionConfig,
}

impl ReactionSender {
    pub fn new(client: Arc<dyn MessagingClient>, config: ReactionConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ReactionConfig {
        &self.config
    }

    pub async fn send(&self, target: &LinkTarget) -> bool {
        if !self.client.supports_paid_reactions() {
            error!("Paid reactions are unavailable; cannot send stars to {}", target);
            return false;
        }

        let peer = target.peer();
        let mut message_id = target.message_id;
        let mut attempt = 0u32;
        let mut flood_waits = 0u32;

        while attempt < self.config.max_retries {
            let result = self.try_send(&peer, &mut message_id).await;

            match result {
                Ok(id) => {
                    info!(
                        outcome = "success",
                        "Sent {} stars to {}/{}",
                        self.config.star_count,
                        peer,
                        id
                    );
                    return true;
                }
                Err(MessagingError::FloodWait { seconds }) => {
                    flood_waits += 1;
                    if flood_waits > self.config.max_flood_waits {
                        error!(
                            "Giving up on {} after {} flood waits",
                            target, self.config.max_flood_waits
                        );
                        return false;
                    }
                    let wait = Duration::from_secs(seconds) + self.config.flood_wait_margin;
                    warn!("Flood wait for {}: sleeping {:?}", target, wait);
                    sleep(wait).await;
                }
                Err(e @ MessagingError::NoMessages { .. })
                | Err(e @ MessagingError::PaidReactionsUnsupported) => {
                    error!("Cannot react to {}: {}", target, e);
                    return false;
                }
                Err(e) => {
                    attempt += 1;
                    error!(
                        "Attempt {}/{} to send stars to {} failed: {}",
                        attempt, self.config.max_retries, target, e
                    );
                    if attempt < self.config.max_retries {
                        let delay = self.config.backoff_delay(attempt);
                        debug!("Retrying {} in {:?}", target, delay);
                        sleep(delay).await;
                    }
                }
            }
        }

        false
    }

    /// One attempt: resolve the message id if needed, then react. A resolved
    /// id is written back so later attempts skip the lookup.
    async fn try_send(&self, peer: &str, message_id: &mut Option<i64>) -> Result<i64, MessagingError> {
        let id = match *message_id {
            Some(id) => id,
            None => {
                if !self.config.resolve_latest_message {
                    return Err(MessagingError::NoMessages {
                        channel: peer.trim_start_matches('@').to_string(),
                    });
                }
                let latest = self.client.latest_message_id(peer).await?;
                let id = latest.ok_or_else(|| MessagingError::NoMessages {
                    channel: peer.trim_start_matches('@').to_string(),
                })?;
                debug!("Resolved latest message of {} to {}", peer, id);
                *message_id = Some(id);
                id
            }
        };

        self.client
            .send_paid_reaction(peer, id, self.config.star_count)
            .await?;
        Ok(id)
    }
}
