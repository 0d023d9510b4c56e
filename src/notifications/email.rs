//! System email service.
//!
//! Sends transactional mail (welcome, order confirmation, winner
//! notification) using the SMTP settings from the main config file. When
//! SMTP is not configured every send becomes a logged no-op, so the rest of
//! the system never has to care.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;
use crate::db::{Order, Winner};

pub struct SystemEmailService {
    config: EmailConfig,
}

impl SystemEmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Check if email sending is configured and enabled
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Send a welcome email after registration
    pub async fn send_welcome_email(&self, to_email: &str, full_name: &str) -> Result<()> {
        if !self.is_enabled() {
            tracing::debug!("Email not configured, skipping welcome email to {}", to_email);
            return Ok(());
        }

        let subject = "Welcome to Rafflr!";
        let html_body = render_welcome_html(full_name);
        let text_body = format!(
            "Hi {full_name},\n\n\
             Thank you for joining Rafflr. Start entering competitions today \
             for your chance to win.\n\nGood luck!\nThe Rafflr Team\n"
        );

        self.send_email(to_email, subject, &html_body, &text_body)
            .await
    }

    /// Send an order confirmation with the allocated ticket numbers
    pub async fn send_order_confirmation(
        &self,
        to_email: &str,
        full_name: &str,
        order: &Order,
    ) -> Result<()> {
        if !self.is_enabled() {
            tracing::debug!(
                "Email not configured, skipping order confirmation to {}",
                to_email
            );
            return Ok(());
        }

        let tickets = order
            .ticket_numbers()
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        let subject = format!("Order Confirmed - Rafflr #{}", &order.id[..order.id.len().min(12)]);
        let html_body = render_order_html(full_name, order, &tickets);
        let text_body = format!(
            "Hi {full_name},\n\n\
             Your ticket purchase has been confirmed.\n\n\
             Order: {}\nCompetition: {}\nTickets: {}\nTicket numbers: {}\nTotal: £{:.2}\n\n\
             Good luck!\nThe Rafflr Team\n",
            order.id, order.competition_title, order.quantity, tickets, order.total_price
        );

        self.send_email(to_email, &subject, &html_body, &text_body)
            .await
    }

    /// Send a winner notification
    pub async fn send_winner_email(&self, to_email: &str, winner: &Winner) -> Result<()> {
        if !self.is_enabled() {
            tracing::debug!("Email not configured, skipping winner email to {}", to_email);
            return Ok(());
        }

        let subject = format!("Congratulations! You won {}", winner.competition_title);
        let html_body = render_winner_html(winner);
        let text_body = format!(
            "Hi {},\n\n\
             You are the winner of {}!\n\n\
             Prize value: £{:.2}\nWinning ticket: #{}\n\n\
             Our team will be in touch shortly to arrange delivery of your prize.\n\n\
             The Rafflr Team\n",
            winner.user_name, winner.competition_title, winner.prize_value, winner.winning_ticket
        );

        self.send_email(to_email, &subject, &html_body, &text_body)
            .await
    }

    /// Send an email with HTML and plain text versions
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from_mailbox = format!("{} <{}>", self.config.from_name, from_address);
        let from: Mailbox = from_mailbox.parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
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

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!(
            to = %to_email,
            subject = %subject,
            "Email sent successfully"
        );

        Ok(())
    }
}

fn render_welcome_html(full_name: &str) -> String {
    format!(
        r#"<h1>Welcome to Rafflr!</h1>
<p>Hi {full_name},</p>
<p>Thank you for joining Rafflr. Start entering competitions today for your chance to win.</p>
<p>Good luck!</p>
<p>The Rafflr Team</p>"#
    )
}

fn render_order_html(full_name: &str, order: &Order, tickets: &str) -> String {
    format!(
        r#"<h1>Order Confirmed!</h1>
<p>Hi {full_name},</p>
<p>Your ticket purchase has been confirmed:</p>
<ul>
    <li><strong>Order:</strong> {}</li>
    <li><strong>Competition:</strong> {}</li>
    <li><strong>Tickets:</strong> {}</li>
    <li><strong>Ticket numbers:</strong> {}</li>
    <li><strong>Total:</strong> &pound;{:.2}</li>
</ul>
<p>Good luck!</p>
<p>The Rafflr Team</p>"#,
        order.id, order.competition_title, order.quantity, tickets, order.total_price
    )
}

fn render_winner_html(winner: &Winner) -> String {
    format!(
        r#"<h1>Congratulations!</h1>
<p>Hi {},</p>
<p>You are the winner of:</p>
<h2>{}</h2>
<p><strong>Prize value:</strong> &pound;{:.2}</p>
<p><strong>Winning ticket:</strong> #{}</p>
<p>Our team will be in touch shortly to arrange delivery of your prize.</p>
<p>The Rafflr Team</p>"#,
        winner.user_name, winner.competition_title, winner.prize_value, winner.winning_ticket
    )
}
