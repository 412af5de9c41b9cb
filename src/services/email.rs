use crate::config::email::{frontend_url, EmailConfig};
use crate::workflow::ApplicationStatus;
use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

#[derive(Clone)]
pub struct EmailService {
    transport: Option<(AsyncSmtpTransport<Tokio1Executor>, String)>,
    frontend_url: String,
}

impl EmailService {
    /// Without SMTP settings every send is a logged no-op.
    pub fn from_env() -> Self {
        let Some(cfg) = EmailConfig::from_env() else {
            return Self::disabled();
        };

        let creds = Credentials::new(cfg.smtp_username.clone(), cfg.smtp_password.clone());
        match AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host) {
            Ok(builder) => Self {
                transport: Some((
                    builder.port(cfg.smtp_port).credentials(creds).build(),
                    cfg.from_address,
                )),
                frontend_url: cfg.frontend_url,
            },
            Err(e) => {
                tracing::warn!("Failed to build SMTP transport: {e}");
                Self {
                    transport: None,
                    frontend_url: cfg.frontend_url,
                }
            }
        }
    }

    pub fn disabled() -> Self {
        Self {
            transport: None,
            frontend_url: frontend_url(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    fn link(&self, path: &str, token: &str) -> String {
        format!(
            "{}/{}?token={}",
            self.frontend_url.trim_end_matches('/'),
            path,
            token
        )
    }

    pub async fn send_verification_email(&self, to: &str, token: &str) -> Result<()> {
        let body = format!(
            "Welcome to Shiji.\n\nConfirm your email address to start publishing poems:\n\n{}\n\nThe link expires in 24 hours.",
            self.link("verify-email", token)
        );
        self.send_email(to, "Confirm your email", &body).await
    }

    pub async fn send_password_reset_email(&self, to: &str, token: &str) -> Result<()> {
        let body = format!(
            "Someone asked to reset the password of your Shiji account.\n\n{}\n\nThe link expires in 1 hour. Ignore this message if it was not you.",
            self.link("reset-password", token)
        );
        self.send_email(to, "Reset your password", &body).await
    }

    /// Tell an applicant that a reviewer decided on their author application.
    pub async fn send_application_decision_email(
        &self,
        to: &str,
        status: ApplicationStatus,
        feedback: Option<&str>,
    ) -> Result<()> {
        let Some(headline) = decision_headline(status) else {
            return Ok(());
        };
        let mut body = format!("{headline}\n");
        if let Some(feedback) = feedback {
            body.push_str("\nReviewer feedback:\n");
            body.push_str(feedback);
            body.push('\n');
        }
        body.push_str(&format!(
            "\nSee the details at {}/applications/mine\n",
            self.frontend_url.trim_end_matches('/')
        ));
        self.send_email(to, "Your author application", &body).await
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let Some((transport, from_address)) = &self.transport else {
            tracing::debug!("SMTP not configured, skipping email to {to}");
            return Ok(());
        };

        let email = Message::builder()
            .from(parse_mailbox(from_address)?)
            .to(parse_mailbox(to)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        transport.send(email).await?;
        tracing::info!(%to, %subject, "Mail delivered");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse::<Mailbox>()
        .map_err(|e| anyhow::anyhow!("Invalid mail address '{address}': {e}"))
}

fn decision_headline(status: ApplicationStatus) -> Option<&'static str> {
    match status {
        ApplicationStatus::Approved => Some("Your author application was approved."),
        ApplicationStatus::Rejected => {
            Some("Your author application was not accepted. You may revise and resubmit it.")
        }
        ApplicationStatus::Submitted => {
            Some("A reviewer asked for changes to your author application.")
        }
        ApplicationStatus::Draft | ApplicationStatus::UnderReview => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_do_not_double_slash() {
        let service = EmailService {
            transport: None,
            frontend_url: "https://shiji.example/".to_string(),
        };
        assert_eq!(
            service.link("verify-email", "abc"),
            "https://shiji.example/verify-email?token=abc"
        );
    }

    #[test]
    fn only_decisions_are_announced() {
        assert!(decision_headline(ApplicationStatus::Approved).is_some());
        assert!(decision_headline(ApplicationStatus::Rejected).is_some());
        assert!(decision_headline(ApplicationStatus::UnderReview).is_none());
    }

    #[tokio::test]
    async fn disabled_service_skips_sending() {
        let service = EmailService::disabled();
        assert!(!service.is_configured());
        assert!(service
            .send_verification_email("reader@example.com", "tok")
            .await
            .is_ok());
    }
}
