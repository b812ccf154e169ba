//! Email Queue
//! Mission: Decouple "queue an email" from "send an email"

use crate::email::{EmailJob, EmailMessage};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Outbound transport seam. Delivery is an external collaborator: the worker
/// calls this best-effort and logs failures without propagating them.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Default transport: logs the message instead of delivering it. Real SMTP
/// delivery plugs in behind the same trait.
pub struct LogSender;

#[async_trait]
impl EmailSender for LogSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "📧 Email (log transport):\n{}",
            message.body
        );
        Ok(())
    }
}

/// Handle for enqueueing email jobs. Cloneable; enqueueing never fails the
/// calling flow.
#[derive(Clone)]
pub struct EmailQueue {
    tx: mpsc::UnboundedSender<EmailJob>,
}

impl EmailQueue {
    /// Spawn the background worker and return the queue handle.
    pub fn spawn(sender: Arc<dyn EmailSender>, from: String, base_url: String) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<EmailJob>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let to = job.to().to_string();
                let message = job.render(&from, &base_url);
                match sender.send(&message).await {
                    Ok(()) => info!("📧 Email sent to: {}", to),
                    Err(e) => warn!("⚠️  Failed to send email to {}: {}", to, e),
                }
            }
        });

        Self { tx }
    }

    pub fn enqueue(&self, job: EmailJob) {
        if self.tx.send(job).is_err() {
            warn!("⚠️  Email queue worker is gone - dropping email job");
        }
    }
}
