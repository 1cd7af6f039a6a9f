//! Development email service that writes messages to the tracing output.

use async_trait::async_trait;
use tracing::info;
use warden_application::EmailService;
use warden_core::AppResult;

/// Email service that logs every message instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct ConsoleEmailService;

impl ConsoleEmailService {
    /// Creates a new console email service.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailService for ConsoleEmailService {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: Option<&str>,
    ) -> AppResult<()> {
        info!(
            to,
            subject,
            has_html = html_body.is_some(),
            "email (console)\n{text_body}"
        );

        Ok(())
    }
}
