pub mod client;
pub mod gateway;
pub mod reaction;
pub mod session;

pub use client::MessagingClient;
pub use gateway::GatewayClient;
pub use reaction::{ReactionConfig, ReactionSender};
pub use session::{SessionStore, StoredSession};
