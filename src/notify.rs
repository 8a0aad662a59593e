//! Outbound user notifications.
//!
//! Mail transport is not wired in; the default [`LogNotifier`] writes the
//! message to the trace log so the flows stay usable in development.

pub trait Notifier: Send + Sync {
    fn login_code(&self, email: &str, code: &str);
    fn password_reset(&self, email: &str, reset_url: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn login_code(&self, email: &str, code: &str) {
        tracing::info!(%email, "login code issued");
        tracing::debug!(%email, %code, "login code");
    }

    fn password_reset(&self, email: &str, reset_url: &str) {
        tracing::info!(%email, "password reset link issued");
        tracing::debug!(%email, %reset_url, "password reset link");
    }
}
