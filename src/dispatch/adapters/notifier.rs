//! Notifier that emits notifications as log events.

use crate::dispatch::domain::{Notification, NotificationKind};
use crate::dispatch::ports::{CollaboratorResult, Notifier};
use async_trait::async_trait;
use tracing::{info, warn};

/// Writes every notification to the `tracing` subscriber.
///
/// Failures are logged at warn level, everything else at info.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) -> CollaboratorResult<()> {
        let recipient = notification
            .recipient
            .as_ref()
            .map_or("operators", |id| id.as_str());
        if notification.kind == NotificationKind::Failure {
            warn!(
                kind = ?notification.kind,
                recipient,
                subject = %notification.subject,
                body = %notification.body,
                "notification"
            );
        } else {
            info!(
                kind = ?notification.kind,
                recipient,
                subject = %notification.subject,
                body = %notification.body,
                warnings = notification.warnings.len(),
                "notification"
            );
        }
        Ok(())
    }
}
