use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use safetrack_config::EmailSettings;
use tracing::debug;

use super::{NotificationError, NotificationKind, NotificationPayload, NotificationSink};

const SUBJECT_PREFIX: &str = "SafeTrack";

/// Emails the assignee when an action is assigned to them. Other events have
/// no email counterpart.
pub struct EmailNotifier<T> {
    transport: T,
    from: Mailbox,
}

impl<T> EmailNotifier<T> {
    pub fn new(transport: T, from: Mailbox) -> Self {
        Self { transport, from }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl EmailNotifier<AsyncSmtpTransport<Tokio1Executor>> {
    pub fn smtp(settings: &EmailSettings) -> Result<Self, NotificationError> {
        let builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
                .map_err(|e| NotificationError::Delivery(format!("SMTP setup: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.smtp_host)
        };
        let builder = builder.port(settings.smtp_port);
        let builder = match (&settings.smtp_username, &settings.smtp_password) {
            (Some(user), Some(password)) => {
                builder.credentials(Credentials::new(user.clone(), password.clone()))
            }
            _ => builder,
        };

        let from = settings
            .from
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::Delivery(format!("Invalid sender address: {e}")))?;

        Ok(Self::new(builder.build(), from))
    }
}

#[async_trait]
impl<T> NotificationSink for EmailNotifier<T>
where
    T: AsyncTransport + Send + Sync,
    T::Ok: Send,
    T::Error: std::fmt::Display + Send,
{
    async fn send(
        &self,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError> {
        if !matches!(kind, NotificationKind::Assigned | NotificationKind::Reassigned) {
            return Ok(());
        }
        if !payload
            .recipient
            .notification_preferences
            .wants_assignment_email()
        {
            debug!(kind = kind.as_str(), "Recipient opted out of assignment emails");
            return Ok(());
        }

        let message = assignment_email(&self.from, payload)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Delivery(format!("SMTP send: {e}")))?;
        debug!(action_id = %payload.action.id, "Assignment email sent");
        Ok(())
    }
}

pub fn assignment_email(
    from: &Mailbox,
    payload: &NotificationPayload,
) -> Result<Message, NotificationError> {
    let recipient = &payload.recipient;
    let address = recipient
        .email
        .parse::<Address>()
        .map_err(|e| NotificationError::Delivery(format!("Invalid recipient address: {e}")))?;
    let to = Mailbox::new(Some(recipient.display_name.clone()), address);

    let action = &payload.action;
    let mut body = format!(
        "New Action Assigned\n\nHello {},\n\nYou have been assigned to: {}\n",
        recipient.display_name, action.title
    );
    if let Some(due) = action.due_date {
        body.push_str(&format!("Due: {due}\n"));
    }
    body.push_str(&format!(
        "Assigned by: {}\n\n---\nThis is an automated message from SafeTrack.\n",
        payload.actor.display_name
    ));

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(format!("{SUBJECT_PREFIX} - New Action Assigned"))
        .header(ContentType::TEXT_PLAIN)
        .body(body)
        .map_err(|e| NotificationError::Delivery(format!("Email build: {e}")))
}
