//! Notification dispatcher seam.
//!
//! Delivery is fire-and-forget from the authority's point of view: a failed
//! send is logged by the caller and never rolls back a state transition that
//! already persisted.

use std::sync::Mutex;

use serde_json::Value as JsonValue;
use thiserror::Error;

/// Outbound message templates. The rendering/delivery side owns the content;
/// this core only names them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NotificationTemplate {
    EmailVerification,
    PasswordReset,
    ApplicationApproved,
    ApplicationRejected,
    GuruSuspended,
    GuruActivated,
}

impl NotificationTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationTemplate::EmailVerification => "email_verification",
            NotificationTemplate::PasswordReset => "password_reset",
            NotificationTemplate::ApplicationApproved => "application_approved",
            NotificationTemplate::ApplicationRejected => "application_rejected",
            NotificationTemplate::GuruSuspended => "guru_suspended",
            NotificationTemplate::GuruActivated => "guru_activated",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Outbound email/notification delivery.
pub trait NotificationDispatcher: Send + Sync {
    fn send(
        &self,
        recipient_email: &str,
        template: NotificationTemplate,
        context: &JsonValue,
    ) -> Result<(), NotifyError>;
}

impl<N> NotificationDispatcher for std::sync::Arc<N>
where
    N: NotificationDispatcher + ?Sized,
{
    fn send(
        &self,
        recipient_email: &str,
        template: NotificationTemplate,
        context: &JsonValue,
    ) -> Result<(), NotifyError> {
        (**self).send(recipient_email, template, context)
    }
}

/// Production stand-in until a real mail backend is wired: logs the intent.
/// Context may carry raw one-time tokens, so it is not logged.
#[derive(Debug, Default)]
pub struct LoggingNotificationDispatcher;

impl NotificationDispatcher for LoggingNotificationDispatcher {
    fn send(
        &self,
        recipient_email: &str,
        template: NotificationTemplate,
        _context: &JsonValue,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = recipient_email,
            template = template.as_str(),
            "dispatching notification"
        );
        Ok(())
    }
}

/// A notification captured by the recording dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub recipient_email: String,
    pub template: NotificationTemplate,
    pub context: JsonValue,
}

/// Test dispatcher that records every send for inspection.
#[derive(Debug, Default)]
pub struct RecordingNotificationDispatcher {
    sent: Mutex<Vec<SentNotification>>,
    fail_next: Mutex<bool>,
}

impl RecordingNotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Make the next `send` fail, to exercise callers' swallow-and-log path.
    pub fn fail_next(&self) {
        if let Ok(mut flag) = self.fail_next.lock() {
            *flag = true;
        }
    }
}

impl NotificationDispatcher for RecordingNotificationDispatcher {
    fn send(
        &self,
        recipient_email: &str,
        template: NotificationTemplate,
        context: &JsonValue,
    ) -> Result<(), NotifyError> {
        if let Ok(mut flag) = self.fail_next.lock() {
            if *flag {
                *flag = false;
                return Err(NotifyError::Delivery("simulated outage".to_string()));
            }
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentNotification {
                recipient_email: recipient_email.to_string(),
                template,
                context: context.clone(),
            });
        }
        Ok(())
    }
}
