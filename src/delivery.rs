use anyhow::{Context, Result};
use tracing::info;

use crate::records::DeliveryMode;

/// Delivery seam: hand final text to its destination.
///
/// Returns the mode actually used, which is what gets stamped on the
/// record. Simulated paste into the previously focused application is an
/// external collaborator; the in-tree implementation covers the clipboard
/// path.
#[async_trait::async_trait]
pub trait Router: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<DeliveryMode>;
}

/// Clipboard delivery via the system clipboard.
pub struct ClipboardRouter;

#[async_trait::async_trait]
impl Router for ClipboardRouter {
    async fn deliver(&self, text: &str) -> Result<DeliveryMode> {
        let text = text.to_string();
        let chars = text.chars().count();

        // arboard clipboards are not Sync; do the write on a blocking thread.
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut clipboard =
                arboard::Clipboard::new().context("Failed to open system clipboard")?;
            clipboard
                .set_text(text)
                .context("Failed to write clipboard")?;
            Ok(())
        })
        .await
        .context("Clipboard task panicked")??;

        info!("Delivered {} chars to clipboard", chars);
        Ok(DeliveryMode::Clipboard)
    }
}
