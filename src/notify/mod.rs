// src/notify/mod.rs
//! Delivery seam. One attempt sequence per alert; failures are terminal for
//! that alert only and never escape as panics.

pub mod slack;

use async_trait::async_trait;

use crate::alert::Alert;

#[derive(Debug, thiserror::Error)]
#[error("alert delivery failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError>;

    /// Name for startup/diagnostic logs.
    fn name(&self) -> &'static str;
}
