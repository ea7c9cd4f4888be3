use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

use crate::models::{format_cents, SubscriptionPlan};

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_email: "noreply@gym-manager.local".to_string(),
            from_name: "Gym Manager".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Invalid email address: {0}")]
    InvalidEmailAddress(String),
    #[error("Failed to build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, EmailError> {
        // Unauthenticated relays (local catchers) get a plain connection
        let transport = if config.username.is_empty() {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
                .port(config.port)
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .build()
        };

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|_| EmailError::InvalidEmailAddress(config.from_email.clone()))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|_| EmailError::InvalidEmailAddress(message.to.clone()))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                message.text_body,
                message.html_body,
            ))?;

        self.transport.send(email).await?;
        tracing::info!(subject = %message.subject, "Sent email to {}", message.to);
        Ok(())
    }
}

/// Renders the transactional emails.
#[derive(Debug, Clone)]
pub struct EmailTemplates {
    app_name: String,
}

impl EmailTemplates {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    pub fn otp(&self, to: &str, otp: i32, ttl_minutes: i64) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: format!("Your {} verification code", self.app_name),
            text_body: format!(
                "Your verification code is {otp}.\n\nIt expires in {ttl_minutes} minutes. \
                 If you did not request it, ignore this email.\n\n{}",
                self.app_name
            ),
            html_body: format!(
                "<html><body><p>Your verification code is</p><h2>{otp}</h2>\
                 <p>It expires in {ttl_minutes} minutes. If you did not request it, ignore this email.</p>\
                 <p>{}</p></body></html>",
                escape_html(&self.app_name)
            ),
        }
    }

    /// Welcome email with the plan table. Never includes the password.
    pub fn welcome(&self, to: &str, name: &str, plans: &[SubscriptionPlan]) -> EmailMessage {
        let mut text_rows = String::new();
        let mut html_rows = String::new();
        for plan in plans {
            let training = if plan.personal_training { "yes" } else { "no" };
            text_rows.push_str(&format!(
                "- {}: {} month(s), {}, personal training: {}\n",
                plan.name,
                plan.duration_months,
                format_cents(plan.price_cents),
                training
            ));
            html_rows.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&plan.name),
                plan.duration_months,
                format_cents(plan.price_cents),
                training
            ));
        }

        EmailMessage {
            to: to.to_string(),
            subject: format!("Welcome to {}", self.app_name),
            text_body: format!(
                "Hi {name},\n\nYour {} account is ready. Sign in with {to}.\n\nOur plans:\n{text_rows}\nSee you at the gym!",
                self.app_name
            ),
            html_body: format!(
                "<html><body><h2>Hi {},</h2><p>Your {} account is ready. Sign in with {}.</p>\
                 <table><tr><th>Plan</th><th>Months</th><th>Price</th><th>Personal training</th></tr>{html_rows}</table>\
                 <p>See you at the gym!</p></body></html>",
                escape_html(name),
                escape_html(&self.app_name),
                escape_html(to)
            ),
        }
    }

    pub fn password_reset(&self, to: &str, link: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: format!("Reset your {} password", self.app_name),
            text_body: format!(
                "We received a request to reset your password.\n\nOpen this link to choose a new one:\n{link}\n\n\
                 If you did not ask for this, you can ignore this email."
            ),
            html_body: format!(
                "<html><body><p>We received a request to reset your password.</p>\
                 <p><a href=\"{0}\">Choose a new password</a></p>\
                 <p>If you did not ask for this, you can ignore this email.</p></body></html>",
                escape_html(link)
            ),
        }
    }

    pub fn payment_receipt(
        &self,
        to: &str,
        name: &str,
        plan_name: &str,
        amount_cents: i64,
        reference: &str,
        valid_until: chrono::NaiveDate,
    ) -> EmailMessage {
        let amount = format_cents(amount_cents);
        EmailMessage {
            to: to.to_string(),
            subject: format!("{} payment receipt {reference}", self.app_name),
            text_body: format!(
                "Hi {name},\n\nWe received your payment of {amount} for {plan_name}.\n\
                 Reference: {reference}\nMembership valid until: {valid_until}\n\nThank you!"
            ),
            html_body: format!(
                "<html><body><h2>Hi {},</h2><p>We received your payment of <strong>{amount}</strong> for {}.</p>\
                 <p>Reference: {reference}<br>Membership valid until: {valid_until}</p><p>Thank you!</p></body></html>",
                escape_html(name),
                escape_html(plan_name)
            ),
        }
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn plan(name: &str, months: i32, price_cents: i64) -> SubscriptionPlan {
        SubscriptionPlan {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            duration_months: months,
            personal_training: months >= 12,
            price_cents,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn otp_email_contains_code_and_ttl() {
        let message = EmailTemplates::new("Gym Manager").otp("a@example.com", 123456, 5);
        assert!(message.text_body.contains("123456"));
        assert!(message.text_body.contains("5 minutes"));
        assert!(message.html_body.contains("<h2>123456</h2>"));
    }

    #[test]
    fn welcome_email_lists_plans() {
        let plans = vec![plan("Basic", 1, 2_500), plan("Annual", 12, 24_000)];
        let message = EmailTemplates::new("Gym Manager").welcome("new@example.com", "Sam <3", &plans);

        assert!(message.text_body.contains("- Basic: 1 month(s), 25.00"));
        assert!(message.text_body.contains("personal training: yes"));
        assert!(message.html_body.contains("Sam &lt;3"));
        assert!(!message.text_body.to_lowercase().contains("password"));
    }

    #[test]
    fn receipt_email_formats_amount() {
        let message = EmailTemplates::new("Gym Manager").payment_receipt(
            "a@example.com",
            "Alex",
            "Quarterly",
            7_550,
            "PAY-ABC",
            chrono::NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
        );
        assert!(message.subject.contains("PAY-ABC"));
        assert!(message.text_body.contains("75.50"));
        assert!(message.text_body.contains("2025-09-01"));
    }
}
