use async_trait::async_trait;
use tracing::info;

use crate::modules::conversion::JobMessage;

/// Where finished conversions are announced to their owner.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn on_completion(&self, message: &JobMessage) -> anyhow::Result<()>;
}

/// Announces completions in the service log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn on_completion(&self, message: &JobMessage) -> anyhow::Result<()> {
        let result_ref = message
            .result_ref
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("completion for {} has no result", message.video_ref))?;

        info!(
            owner = %message.owner,
            %result_ref,
            video_ref = %message.video_ref,
            "Audio ready for download"
        );
        Ok(())
    }
}
