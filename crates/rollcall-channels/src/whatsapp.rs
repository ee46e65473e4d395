//! WhatsApp Business Cloud API gateway.
//!
//! Uses the official WhatsApp Business Platform (Cloud API) for messaging.
//! Requires: Access Token + Phone Number ID from Meta Business Suite.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use rollcall_core::config::WhatsAppChannelConfig;
use rollcall_core::error::{Result, RollcallError};
use rollcall_core::traits::DispatchGateway;

/// Fallback wait when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// WhatsApp Business dispatch gateway.
pub struct WhatsAppGateway {
    config: WhatsAppChannelConfig,
    client: reqwest::Client,
    connected: AtomicBool,
    /// Consecutive failed reconnects since the last successful connect.
    reconnect_attempts: AtomicU32,
}

impl WhatsAppGateway {
    pub fn new(config: WhatsAppChannelConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            connected: AtomicBool::new(false),
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.config.api_base.trim_end_matches('/'),
            self.config.phone_number_id
        )
    }

    /// Verify the token against the phone number and mark the gateway ready.
    pub async fn connect(&self) -> Result<()> {
        if self.config.access_token.is_empty() {
            return Err(RollcallError::Config(
                "WhatsApp access_token not configured".into(),
            ));
        }
        if self.config.phone_number_id.is_empty() {
            return Err(RollcallError::Config(
                "WhatsApp phone_number_id not configured".into(),
            ));
        }

        let url = format!(
            "{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.phone_number_id
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| RollcallError::Dispatch(format!("WhatsApp verification failed: {e}")))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RollcallError::Dispatch(format!(
                "WhatsApp token verification failed: {text}"
            )));
        }

        self.connected.store(true, Ordering::SeqCst);
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        tracing::info!(
            "📱 WhatsApp Business: connected (phone_id={})",
            self.config.phone_number_id
        );
        Ok(())
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        tracing::info!("📱 WhatsApp Business: disconnected");
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Watch the connection and retry `connect` while it is down.
    ///
    /// Every `reconnect_delay_secs` a disconnected gateway gets one attempt.
    /// After `reconnect_attempts` consecutive failures, or on a configuration
    /// error, the task gives up and the gateway stays down.
    pub fn spawn_reconnect(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let max_attempts = self.config.reconnect_attempts;
        let delay = Duration::from_secs(self.config.reconnect_delay_secs.max(1));
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(delay).await;
                if self.is_ready() {
                    continue;
                }
                let attempt = self.reconnect_attempts.load(Ordering::SeqCst);
                if attempt >= max_attempts {
                    tracing::error!(
                        "❌ WhatsApp: max reconnect attempts ({}) reached, giving up",
                        max_attempts
                    );
                    return;
                }
                let attempt = attempt + 1;
                self.reconnect_attempts.store(attempt, Ordering::SeqCst);
                tracing::info!("🔄 WhatsApp: reconnect attempt {}/{}", attempt, max_attempts);
                match self.connect().await {
                    Ok(()) => {}
                    Err(RollcallError::Config(e)) => {
                        tracing::error!("❌ WhatsApp: {e}, not reconnecting");
                        return;
                    }
                    Err(e) => tracing::warn!("⚠️ WhatsApp reconnect {}/{} failed: {e}", attempt, max_attempts),
                }
            }
        })
    }
}

/// Request body for a plain text message.
pub fn text_message_body(to: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": "text",
        "text": {
            "preview_url": false,
            "body": text
        }
    })
}

/// Seconds to wait according to a `Retry-After` header (delta-seconds form).
pub fn retry_after_secs(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

#[async_trait]
impl DispatchGateway for WhatsAppGateway {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, address: &str, body: &str) -> Result<()> {
        if !self.is_ready() {
            return Err(RollcallError::NotReady);
        }

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(&text_message_body(address, body))
            .send()
            .await
            .map_err(|e| RollcallError::Dispatch(format!("WhatsApp API request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = retry_after_secs(response.headers());
            tracing::warn!("⚠️ WhatsApp throttled sending to {}, retry after {}s", address, retry_after_secs);
            return Err(RollcallError::Throttled { retry_after_secs });
        }
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("⚠️ WhatsApp rejected the access token, marking disconnected");
            self.disconnect();
            return Err(RollcallError::Dispatch("WhatsApp access token rejected (401)".into()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RollcallError::Dispatch(format!(
                "WhatsApp API error {status}: {error_text}"
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RollcallError::Dispatch(format!("Invalid WhatsApp response: {e}")))?;
        let msg_id = result["messages"][0]["id"].as_str().unwrap_or("unknown");
        tracing::debug!("WhatsApp message sent: {} → {}", msg_id, address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const OK_RESPONSE: &str =
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}";
    const UNAUTHORIZED_RESPONSE: &str =
        "HTTP/1.1 401 Unauthorized\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";

    /// Local HTTP stub answering every request with `response`.
    async fn stub_api(response: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 8192];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    fn gateway_for(api_base: String, attempts: u32) -> Arc<WhatsAppGateway> {
        Arc::new(WhatsAppGateway::new(WhatsAppChannelConfig {
            enabled: true,
            access_token: "token".into(),
            phone_number_id: "123".into(),
            api_base,
            reconnect_attempts: attempts,
            reconnect_delay_secs: 1,
        }))
    }

    #[test]
    fn test_text_body_shape() {
        let body = text_message_body("6281200000001", "hello");
        assert_eq!(body["to"], "6281200000001");
        assert_eq!(body["type"], "text");
        assert_eq!(body["text"]["body"], "hello");
    }

    #[test]
    fn test_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_secs(&headers), 60);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(retry_after_secs(&headers), 12);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"));
        assert_eq!(retry_after_secs(&headers), 60);
    }

    #[tokio::test]
    async fn test_not_ready_until_connected() {
        let gw = WhatsAppGateway::new(WhatsAppChannelConfig::default());
        assert!(!gw.is_ready());
        assert!(matches!(gw.send("1", "x").await, Err(RollcallError::NotReady)));
        assert!(matches!(gw.connect().await, Err(RollcallError::Config(_))));
    }

    #[test]
    fn test_messages_url_trims_slash() {
        let gw = WhatsAppGateway::new(WhatsAppChannelConfig {
            enabled: true,
            access_token: "t".into(),
            phone_number_id: "123".into(),
            api_base: "https://graph.facebook.com/v21.0/".into(),
            ..Default::default()
        });
        assert_eq!(gw.messages_url(), "https://graph.facebook.com/v21.0/123/messages");
    }

    #[tokio::test]
    async fn test_reconnect_restores_readiness() {
        let gw = gateway_for(stub_api(OK_RESPONSE).await, 5);
        assert!(!gw.is_ready());
        let handle = gw.clone().spawn_reconnect();
        for _ in 0..50 {
            if gw.is_ready() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(gw.is_ready());
        assert_eq!(gw.reconnect_attempts(), 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_reconnect_gives_up_after_max_attempts() {
        // Nothing listens on the discard port.
        let gw = gateway_for("http://127.0.0.1:9".into(), 2);
        let handle = gw.clone().spawn_reconnect();
        tokio::time::timeout(Duration::from_secs(30), handle)
            .await
            .expect("reconnect task should stop")
            .unwrap();
        assert_eq!(gw.reconnect_attempts(), 2);
        assert!(!gw.is_ready());
    }

    #[tokio::test]
    async fn test_reconnect_stops_on_missing_credentials() {
        let gw = Arc::new(WhatsAppGateway::new(WhatsAppChannelConfig {
            reconnect_delay_secs: 1,
            ..Default::default()
        }));
        let handle = gw.clone().spawn_reconnect();
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("reconnect task should stop")
            .unwrap();
        assert_eq!(gw.reconnect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_send_marks_disconnected() {
        let gw = gateway_for(stub_api(UNAUTHORIZED_RESPONSE).await, 5);
        gw.connected.store(true, Ordering::SeqCst);
        let err = gw.send("6281200000001", "hello").await.unwrap_err();
        assert!(matches!(err, RollcallError::Dispatch(_)));
        assert!(!gw.is_ready());
    }
}
