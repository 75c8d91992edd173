//! HTTP bridge to a session-based messaging gateway.
//!
//! Every call returns the envelope `{ok, result, error_code, description,
//! parameters}`; a `parameters.retry_after` (or a `FLOOD_WAIT_<n>`
//! description) is the gateway's flood-wait signal.

use crate::client::MessagingClient;
use crate::session::{SessionStore, StoredSession};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use starwatch_core::{BotConfig, ConfigError, CoreError, MessagingError};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ErrorParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SendCodeRequest<'a> {
    api_id: &'a str,
    api_hash: &'a str,
    phone_number: &'a str,
}

#[derive(Debug, Deserialize)]
struct SentCode {
    phone_code_hash: String,
}

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    api_id: &'a str,
    api_hash: &'a str,
    phone_number: &'a str,
    phone_code_hash: &'a str,
    phone_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct Authorization {
    session: String,
}

#[derive(Debug, Default, Deserialize)]
struct Capabilities {
    #[serde(default)]
    paid_reactions: bool,
}

#[derive(Debug, Serialize)]
struct HistoryRequest<'a> {
    peer: &'a str,
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct History {
    #[serde(default)]
    messages: Vec<HistoryMessage>,
}

#[derive(Debug, Deserialize)]
struct HistoryMessage {
    id: i64,
}

#[derive(Debug, Serialize)]
struct PaidReactionRequest<'a> {
    peer: &'a str,
    msg_id: i64,
    count: u32,
}

/// Turn an error envelope into a typed error.
fn envelope_error(
    error_code: Option<i64>,
    description: Option<String>,
    parameters: Option<ErrorParameters>,
) -> MessagingError {
    let code = error_code.unwrap_or_default();
    let description = description.unwrap_or_default();

    let retry_after = parameters.and_then(|p| p.retry_after).or_else(|| {
        description
            .strip_prefix("FLOOD_WAIT_")
            .and_then(|secs| secs.parse().ok())
    });
    if let Some(seconds) = retry_after {
        return MessagingError::FloodWait { seconds };
    }

    match code {
        401 => MessagingError::AuthenticationFailed {
            reason: description,
        },
        501 => MessagingError::PaidReactionsUnsupported,
        _ => MessagingError::Rpc { code, description },
    }
}

/// Unwrap the `result` of a gateway response body.
fn decode_envelope<Res: DeserializeOwned>(method: &str, raw: &str) -> Result<Res, MessagingError> {
    let envelope: Envelope<Res> =
        serde_json::from_str(raw).map_err(|e| MessagingError::Transport {
            reason: format!("unreadable response to {method}: {e}"),
        })?;

    if !envelope.ok {
        return Err(envelope_error(
            envelope.error_code,
            envelope.description,
            envelope.parameters,
        ));
    }

    envelope.result.ok_or_else(|| MessagingError::Rpc {
        code: 0,
        description: format!("empty result from {method}"),
    })
}

#[derive(Debug)]
pub struct GatewayClient {
    http_client: Client,
    base_url: Url,
    session: Option<String>,
    paid_reactions: bool,
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CoreError> {
        let mut base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            field: "messaging_gateway_url".to_string(),
            value: format!("{base_url} ({e})"),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url,
            session: None,
            paid_reactions: false,
        })
    }

    pub fn from_config(config: &BotConfig) -> Result<Self, CoreError> {
        Self::new(&config.messaging_gateway_url, config.request_timeout())
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Resume the stored session and learn what the account can do.
    pub async fn connect(&mut self, store: &SessionStore) -> Result<(), CoreError> {
        let stored = store.load()?;
        self.session = Some(stored.session);

        let capabilities: Capabilities = match self.call("me/capabilities", &()).await {
            Ok(capabilities) => capabilities,
            Err(e) => {
                self.session = None;
                return Err(e.into());
            }
        };
        self.paid_reactions = capabilities.paid_reactions;

        info!(
            outcome = "success",
            "Messaging client connected (paid reactions {})",
            if self.paid_reactions { "available" } else { "unavailable" }
        );
        Ok(())
    }

    /// Log in with the configured phone number and store the new session.
    /// `read_code` is asked for the login code the platform sends.
    pub async fn authorize<F, Fut>(
        &mut self,
        config: &BotConfig,
        store: &SessionStore,
        read_code: F,
    ) -> Result<(), CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, CoreError>>,
    {
        info!("Requesting login code for {}", config.phone_number);
        let sent: SentCode = self
            .call(
                "auth/send_code",
                &SendCodeRequest {
                    api_id: &config.api_id,
                    api_hash: &config.api_hash,
                    phone_number: &config.phone_number,
                },
            )
            .await?;

        let phone_code = read_code().await?;
        let authorization: Authorization = self
            .call(
                "auth/sign_in",
                &SignInRequest {
                    api_id: &config.api_id,
                    api_hash: &config.api_hash,
                    phone_number: &config.phone_number,
                    phone_code_hash: &sent.phone_code_hash,
                    phone_code: phone_code.trim(),
                },
            )
            .await?;

        store.save(&StoredSession {
            session: authorization.session.clone(),
            phone_number: config.phone_number.clone(),
        })?;
        self.session = Some(authorization.session);

        info!(outcome = "success", "Messaging account authorised");
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.session.take().is_some() {
            debug!("Messaging client disconnected");
        }
    }

    async fn call<Req, Res>(&self, method: &str, body: &Req) -> Result<Res, MessagingError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(method)
            .map_err(|e| MessagingError::Transport {
                reason: format!("invalid gateway method {method}: {e}"),
            })?;

        let mut request = self.http_client.post(url).json(body);
        if let Some(session) = &self.session {
            request = request.header("X-Session", session);
        }

        debug!("Calling messaging gateway: {}", method);
        let response = request.send().await.map_err(|e| MessagingError::Transport {
            reason: e.to_string(),
        })?;

        let raw = response.text().await.map_err(|e| MessagingError::Transport {
            reason: format!("unreadable response to {method}: {e}"),
        })?;

        decode_envelope(method, &raw).map_err(|error| {
            warn!("Gateway call {} failed: {}", method, error);
            error
        })
    }
}

#[async_trait]
impl MessagingClient for GatewayClient {
    fn supports_paid_reactions(&self) -> bool {
        self.paid_reactions
    }

    async fn latest_message_id(&self, peer: &str) -> Result<Option<i64>, MessagingError> {
        let history: History = self
            .call("messages/get_history", &HistoryRequest { peer, limit: 1 })
            .await?;
        Ok(history.messages.first().map(|message| message.id))
    }

    async fn send_paid_reaction(
        &self,
        peer: &str,
        message_id: i64,
        star_count: u32,
    ) -> Result<(), MessagingError> {
        let _: serde_json::Value = self
            .call(
                "messages/send_paid_reaction",
                &PaidReactionRequest {
                    peer,
                    msg_id: message_id,
                    count: star_count,
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_error(raw: &str) -> MessagingError {
        let envelope: Envelope<serde_json::Value> = serde_json::from_str(raw).unwrap();
        assert!(!envelope.ok);
        envelope_error(
            envelope.error_code,
            envelope.description,
            envelope.parameters,
        )
    }

    #[test]
    fn test_flood_wait_from_parameters() {
        let error = parse_error(
            r#"{"ok":false,"error_code":420,"description":"Too many requests","parameters":{"retry_after":35}}"#,
        );
        assert!(matches!(error, MessagingError::FloodWait { seconds: 35 }));
    }

    #[test]
    fn test_flood_wait_from_description() {
        let error = parse_error(r#"{"ok":false,"error_code":420,"description":"FLOOD_WAIT_12"}"#);
        assert!(matches!(error, MessagingError::FloodWait { seconds: 12 }));
    }

    #[test]
    fn test_other_error_codes() {
        assert!(matches!(
            parse_error(r#"{"ok":false,"error_code":501,"description":"PAID_REACTIONS_UNAVAILABLE"}"#),
            MessagingError::PaidReactionsUnsupported
        ));
        assert!(matches!(
            parse_error(r#"{"ok":false,"error_code":401,"description":"AUTH_KEY_UNREGISTERED"}"#),
            MessagingError::AuthenticationFailed { .. }
        ));
        assert!(matches!(
            parse_error(r#"{"ok":false,"error_code":400,"description":"MSG_ID_INVALID"}"#),
            MessagingError::Rpc { code: 400, .. }
        ));
    }

    #[test]
    fn test_success_envelope() {
        let history: History = decode_envelope(
            "messages/get_history",
            r#"{"ok":true,"result":{"messages":[{"id":77},{"id":76}]}}"#,
        )
        .unwrap();
        assert_eq!(history.messages[0].id, 77);

        let capabilities: Capabilities =
            decode_envelope("me/capabilities", r#"{"ok":true,"result":{"paid_reactions":true}}"#)
                .unwrap();
        assert!(capabilities.paid_reactions);
    }

    /// Result types without `Default` must decode too.
    #[test]
    fn test_decode_through_generic_path() {
        fn decode<Res: DeserializeOwned>(raw: &str) -> Result<Res, MessagingError> {
            decode_envelope("auth/sign_in", raw)
        }

        let authorization: Authorization =
            decode(r#"{"ok":true,"result":{"session":"opaque"}}"#).unwrap();
        assert_eq!(authorization.session, "opaque");

        let flood = decode::<Authorization>(
            r#"{"ok":false,"error_code":420,"description":"FLOOD_WAIT_30"}"#,
        );
        assert!(matches!(flood, Err(MessagingError::FloodWait { seconds: 30 })));

        let empty = decode::<Authorization>(r#"{"ok":true}"#);
        assert!(matches!(empty, Err(MessagingError::Rpc { code: 0, .. })));

        let garbage = decode::<Authorization>("<html>bad gateway</html>");
        assert!(matches!(garbage, Err(MessagingError::Transport { .. })));
    }

    #[test]
    fn test_request_payloads() {
        let body = serde_json::to_value(PaidReactionRequest {
            peer: "@news",
            msg_id: 42,
            count: 3,
        })
        .unwrap();
        assert_eq!(body["peer"], "@news");
        assert_eq!(body["msg_id"], 42);
        assert_eq!(body["count"], 3);
    }

    #[test]
    fn test_new_client_is_disconnected() {
        let client = GatewayClient::new("http://127.0.0.1:8081", Duration::from_secs(5)).unwrap();
        assert!(!client.is_connected());
        assert!(!client.supports_paid_reactions());
        assert_eq!(client.base_url.as_str(), "http://127.0.0.1:8081/");

        assert!(GatewayClient::new("::bad::", Duration::from_secs(5)).is_err());
    }
}
