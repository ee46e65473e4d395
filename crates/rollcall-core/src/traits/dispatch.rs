//! Dispatch gateway trait: the outbound message channel.

use async_trait::async_trait;

use crate::error::Result;

/// Sends text to an address. Failures come back as `Err`, never as panics, so
/// the scan loop can log and move on.
#[async_trait]
pub trait DispatchGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the channel is connected and can accept sends.
    fn is_ready(&self) -> bool;

    async fn send(&self, address: &str, body: &str) -> Result<()>;
}
