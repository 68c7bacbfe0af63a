//! Email service for invite and welcome notifications.
//!
//! Uses SMTP via lettre for delivery with Askama HTML templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use skinproof_core::{InviteToken, Role};

use crate::config::EmailConfig;

/// HTML template for invite email.
#[derive(Template)]
#[template(path = "email/invite.html")]
struct InviteEmailHtml<'a> {
    inviter: &'a str,
    role: &'a str,
    department: &'a str,
    signup_url: &'a str,
    expires_on: &'a str,
}

/// Plain text template for invite email.
#[derive(Template)]
#[template(path = "email/invite.txt")]
struct InviteEmailText<'a> {
    inviter: &'a str,
    role: &'a str,
    department: &'a str,
    signup_url: &'a str,
    expires_on: &'a str,
}

/// HTML template for welcome email.
#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeEmailHtml<'a> {
    name: &'a str,
    role: &'a str,
    admin_url: &'a str,
}

/// Plain text template for welcome email.
#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeEmailText<'a> {
    name: &'a str,
    role: &'a str,
    admin_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailDeliveryError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Human-readable role label for emails.
const fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Support => "Support",
        Role::Admin => "Admin",
        Role::SuperAdmin => "Super Admin",
    }
}

/// Rendered subject, text and HTML bodies of an invite email.
struct RenderedEmail {
    subject: String,
    text: String,
    html: String,
}

fn render_invite(invite: &InviteToken, signup_url: &str) -> Result<RenderedEmail, askama::Error> {
    let inviter = invite
        .invited_by_email
        .as_ref()
        .map_or("The SkinProof team", |e| e.as_str());
    let role = role_label(invite.role);
    let expires_on = invite.expires_at.format("%B %-d, %Y").to_string();

    let html = InviteEmailHtml {
        inviter,
        role,
        department: &invite.department,
        signup_url,
        expires_on: &expires_on,
    }
    .render()?;
    let text = InviteEmailText {
        inviter,
        role,
        department: &invite.department,
        signup_url,
        expires_on: &expires_on,
    }
    .render()?;

    Ok(RenderedEmail {
        subject: format!("You're invited to SkinProof Admin as {role}"),
        text,
        html,
    })
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    admin_url: String,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("from_address", &self.from_address)
            .finish_non_exhaustive()
    }
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// `admin_url` is the panel's public base URL, linked from welcome emails.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig, admin_url: &str) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            admin_url: admin_url.to_owned(),
        })
    }

    /// Send the signup link for `invite`.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_invite_email(
        &self,
        invite: &InviteToken,
        signup_url: &str,
    ) -> Result<(), EmailDeliveryError> {
        let email = render_invite(invite, signup_url)?;
        self.send_multipart_email(invite.email.as_str(), &email.subject, &email.text, &email.html)
            .await
    }

    /// Send a welcome email after successful signup.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_welcome_email(
        &self,
        to: &str,
        name: &str,
        role: Role,
    ) -> Result<(), EmailDeliveryError> {
        let role = role_label(role);
        let admin_url = self.admin_url.as_str();
        let html = WelcomeEmailHtml {
            name,
            role,
            admin_url,
        }
        .render()?;
        let text = WelcomeEmailText {
            name,
            role,
            admin_url,
        }
        .render()?;

        self.send_multipart_email(to, "Welcome to SkinProof Admin", &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailDeliveryError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailDeliveryError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailDeliveryError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use skinproof_core::{Email, NewInvite};

    use super::*;

    fn invite() -> InviteToken {
        InviteToken::new(
            NewInvite {
                email: Email::parse("alice@example.com").expect("valid email"),
                role: Role::SuperAdmin,
                department: "Trust & Safety".to_owned(),
                invited_by: None,
                invited_by_email: Some(Email::parse("boss@skinproof.app").expect("valid email")),
                expires_in_days: 7,
                max_uses: 1,
            },
            Utc::now(),
        )
        .expect("valid expiry")
    }

    #[test]
    fn test_invite_email_includes_link_and_role() {
        let invite = invite();
        let url = format!("https://admin.skinproof.app/signup?invite={}", invite.token);
        let email = render_invite(&invite, &url).expect("render");

        assert_eq!(email.subject, "You're invited to SkinProof Admin as Super Admin");
        assert!(email.text.contains(&url));
        assert!(email.text.contains("boss@skinproof.app"));
        assert!(email.html.contains(&invite.token));
        // HTML output is escaped.
        assert!(email.html.contains("Trust &amp; Safety") || email.html.contains("Trust &#38; Safety"));
    }

    #[test]
    fn test_role_labels() {
        assert_eq!(role_label(Role::Support), "Support");
        assert_eq!(role_label(Role::SuperAdmin), "Super Admin");
    }
}
