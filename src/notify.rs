//! Share-link notification dispatch.
//!
//! Delivery itself (SMTP or a mail API) lives outside this crate; the service
//! only hands a prepared message to a [`Notifier`] and never waits on it.

use async_trait::async_trait;
use tracing::info;

use crate::Result;

/// A share-link message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareNotice {
    /// Recipient address.
    pub recipient: String,
    /// Display name of the shared file.
    pub file_name: String,
    /// Download link.
    pub link: String,
    /// Human-readable time left, e.g. "23h 59m".
    pub expires_in: String,
}

/// Outbound notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a share-link notice.
    async fn send_share_link(&self, notice: &ShareNotice) -> Result<()>;
}

/// Notifier that only logs the dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_share_link(&self, notice: &ShareNotice) -> Result<()> {
        info!(
            recipient = %notice.recipient,
            file = %notice.file_name,
            link = %notice.link,
            expires_in = %notice.expires_in,
            "Share link dispatched"
        );
        Ok(())
    }
}
