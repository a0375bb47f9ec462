use anyhow::Context;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use uuid::Uuid;

use crate::config::Config;

pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    /// Returns None if SMTP is not fully configured.
    pub fn new(config: &Config) -> Option<Self> {
        let host = config.smtp_host.as_deref()?;
        let username = config.smtp_username.clone()?;
        let password = config.smtp_password.clone()?;
        let from_addr = config.smtp_from.as_deref()?;

        let port = config.smtp_port.unwrap_or(587);
        let creds = Credentials::new(username, password);

        let transport = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .ok()?
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .ok()?
                .port(port)
                .credentials(creds)
                .build()
        };

        let from: Mailbox = from_addr.parse().ok()?;

        Some(Self { transport, from })
    }

    fn new_message_id(&self) -> String {
        format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain())
    }

    fn wrap_html(content: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:32px 16px;background-color:#0f0f14;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Helvetica,Arial,sans-serif">
  <div style="max-width:520px;margin:0 auto;background:#ffffff;border-radius:12px;padding:40px">
    {content}
  </div>
</body>
</html>"#
        )
    }

    /// Send one message to every recipient in `to`.
    pub async fn send_email(
        &self,
        to: &[String],
        subject: &str,
        text: &str,
        html: &str,
    ) -> anyhow::Result<()> {
        let mut builder = Message::builder()
            .message_id(Some(self.new_message_id()))
            .from(self.from.clone())
            .subject(subject);
        for recipient in to {
            let mailbox: Mailbox = recipient
                .parse()
                .with_context(|| format!("Invalid recipient address: {recipient}"))?;
            builder = builder.to(mailbox);
        }

        let email = builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(Self::wrap_html(html)),
                    ),
            )
            .context("Failed to build email message")?;

        self.transport
            .send(email)
            .await
            .context("Failed to send email")?;

        Ok(())
    }

    pub async fn send_welcome(&self, to: &str, username: &str) -> anyhow::Result<()> {
        let text = format!(
            "Hello {username},\n\nThank you for registering! You can now log in and start watching on your default profile."
        );
        let html = format!(
            "<h1>Hello {username},</h1><p>Thank you for registering! You can now log in and start watching on your default profile.</p><p>If you have any questions, feel free to contact us.</p>"
        );
        self.send_email(&[to.to_string()], "Welcome to ReelGate!", &text, &html)
            .await
    }

    pub async fn send_login_alert(&self, to: &str, ip: &str) -> anyhow::Result<()> {
        let text = format!(
            "A login was just detected for your account from a new IP address: {ip}.\nIf this was not you, change your password immediately."
        );
        let html = format!(
            "<p>A login was just detected for your account from a new IP address: <strong>{ip}</strong>.</p><p>If this was you, you can safely ignore this email. If this was not you, please change your password immediately.</p>"
        );
        self.send_email(
            &[to.to_string()],
            "Security Alert: New Login Location Detected",
            &text,
            &html,
        )
        .await
    }

    pub async fn send_password_reset(
        &self,
        to: &str,
        username: &str,
        reset_url: &str,
    ) -> anyhow::Result<()> {
        let text = format!(
            "Hello {username},\n\nUse this link to choose a new password. It expires in one hour:\n{reset_url}\n\nIf you did not ask for a reset, ignore this email."
        );
        let html = format!(
            r#"<p>Hello {username},</p><p>Use the button below to choose a new password. The link expires in one hour.</p><p><a href="{reset_url}" style="display:inline-block;padding:12px 20px;background:#e50914;color:#ffffff;border-radius:6px;text-decoration:none">Reset my password</a></p><p>If you did not ask for a reset, ignore this email.</p>"#
        );
        self.send_email(&[to.to_string()], "Reset your password", &text, &html)
            .await
    }
}
