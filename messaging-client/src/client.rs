use async_trait::async_trait;
use starwatch_core::MessagingError;

/// Session-based messaging client able to send paid reactions.
///
/// `peer` is a public handle such as `@channel`.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Whether the account and client support paid reactions at all.
    fn supports_paid_reactions(&self) -> bool;

    /// Id of the most recent message in `peer`, or `None` when it has none.
    async fn latest_message_id(&self, peer: &str) -> Result<Option<i64>, MessagingError>;

    async fn send_paid_reaction(
        &self,
        peer: &str,
        message_id: i64,
        star_count: u32,
    ) -> Result<(), MessagingError>;
}
