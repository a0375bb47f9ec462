use std::sync::Arc;

use crate::services::email::EmailService;

/// Messages the session flows send on a best-effort basis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Welcome { to: String, username: String },
    LoginAlert { to: String, ip: String },
    PasswordReset { to: String, username: String, reset_url: String },
}

impl Notification {
    fn kind(&self) -> &'static str {
        match self {
            Notification::Welcome { .. } => "welcome",
            Notification::LoginAlert { .. } => "login_alert",
            Notification::PasswordReset { .. } => "password_reset",
        }
    }
}

/// Fire-and-forget dispatch.
/// Spawns a background task, never blocks the caller, never retries;
/// failures are logged and dropped.
pub fn dispatch(email: Option<Arc<EmailService>>, notification: Notification) {
    let Some(svc) = email else {
        tracing::debug!(kind = notification.kind(), "email disabled, notification dropped");
        return;
    };

    tokio::spawn(async move {
        let kind = notification.kind();
        let res = match &notification {
            Notification::Welcome { to, username } => svc.send_welcome(to, username).await,
            Notification::LoginAlert { to, ip } => svc.send_login_alert(to, ip).await,
            Notification::PasswordReset {
                to,
                username,
                reset_url,
            } => svc.send_password_reset(to, username, reset_url).await,
        };

        if let Err(e) = res {
            tracing::warn!(kind, "notification dispatch failed: {e:#}");
        }
    });
}
