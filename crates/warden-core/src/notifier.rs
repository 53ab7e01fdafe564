//! Outbound delivery of verification and reset links.
//!
//! The identity core only renders links; delivering them (email, queue,
//! console) belongs to the [`OutboundNotifier`] implementation.

use crate::error::WardenResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    EmailVerification { email: String, link: String },
    PasswordReset { email: String, link: String },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Self::EmailVerification { email, .. } | Self::PasswordReset { email, .. } => email,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmailVerification { .. } => "email_verification",
            Self::PasswordReset { .. } => "password_reset",
        }
    }
}

pub trait OutboundNotifier: Send + Sync {
    fn notify(&self, notification: Notification) -> impl Future<Output = WardenResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_expose_recipient_and_kind() {
        let n = Notification::PasswordReset {
            email: "ana@example.com".into(),
            link: "https://app.test/reset?token=x".into(),
        };
        assert_eq!(n.recipient(), "ana@example.com");
        assert_eq!(n.kind(), "password_reset");
    }
}
