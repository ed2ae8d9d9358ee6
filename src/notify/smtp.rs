use crate::common::config::EmailConfig;
use crate::common::{MoodFitError, Result};
use crate::notify::PlanNotifier;
use lettre::{
    message::{header::ContentType, Message},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};

/// Sends plans through an authenticated STARTTLS relay.
pub struct SmtpNotifier {
    host: String,
    port: u16,
    sender: Option<String>,
    password: Option<String>,
}

impl SmtpNotifier {
    pub fn new(config: &EmailConfig) -> Self {
        let config = config.clone().with_env_credentials();
        Self {
            host: config.smtp_host,
            port: config.smtp_port,
            sender: config.sender,
            password: config.password,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.sender.is_some() && self.password.is_some()
    }

    fn transport(&self, sender: &str, password: &str) -> Result<SmtpTransport> {
        let transport = SmtpTransport::starttls_relay(&self.host)
            .map_err(|e| MoodFitError::EmailSendFailure(format!("SMTP setup failed: {}", e)))?
            .port(self.port)
            .credentials(Credentials::new(sender.to_string(), password.to_string()))
            .build();
        Ok(transport)
    }
}

impl PlanNotifier for SmtpNotifier {
    fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        let (Some(sender), Some(password)) = (&self.sender, &self.password) else {
            return Err(MoodFitError::EmailSendFailure(
                "SMTP credentials not configured (set SMTP_EMAIL and SMTP_PASSWORD)".to_string(),
            ));
        };

        let email = Message::builder()
            .from(sender.parse().map_err(|e| {
                MoodFitError::EmailSendFailure(format!("Invalid from address: {}", e))
            })?)
            .to(to.parse().map_err(|e| {
                MoodFitError::EmailSendFailure(format!("Invalid to address: {}", e))
            })?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| MoodFitError::EmailSendFailure(format!("Failed to build email: {}", e)))?;

        self.transport(sender, password)?
            .send(&email)
            .map_err(|e| MoodFitError::EmailSendFailure(e.to_string()))?;

        tracing::info!("Sent email to {}: {}", to, subject);
        Ok(())
    }
}
