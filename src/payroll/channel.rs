//! Delivery channel: one authenticated SMTP session per batch.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::PoolConfig;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{debug, info};
use std::str::FromStr;
use std::time::Duration;

use super::compose::Notification;
use super::PayrollError;

/// Opens delivery sessions. Failing to open is batch-fatal.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn DeliveryChannel>, PayrollError>;
}

/// An open session. A failed `send` affects only that message.
#[async_trait]
pub trait DeliveryChannel: Send {
    async fn send(&mut self, notification: &Notification) -> Result<(), PayrollError>;

    /// Best effort; callers log the error and move on.
    async fn close(&mut self) -> Result<(), PayrollError>;
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// TLS from the first byte (SMTPS, usually port 465).
    #[default]
    Tls,
    StartTls,
    None,
}

impl FromStr for TlsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tls" | "ssl" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            "none" => Ok(Self::None),
            other => Err(format!("unsupported TLS mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub tls: TlsMode,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

pub struct SmtpConnector {
    settings: SmtpSettings,
}

impl SmtpConnector {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, PayrollError> {
        let settings = &self.settings;
        let builder = match settings.tls {
            TlsMode::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
            }
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)
                .map_err(|e| PayrollError::Connect(e.to_string()))?,
            TlsMode::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)
                    .map_err(|e| PayrollError::Connect(e.to_string()))?
            }
        };

        Ok(builder
            .port(settings.port)
            .timeout(Some(settings.timeout))
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .pool_config(PoolConfig::new().max_size(1))
            .build())
    }
}

#[async_trait]
impl ChannelConnector for SmtpConnector {
    async fn open(&self) -> Result<Box<dyn DeliveryChannel>, PayrollError> {
        let transport = self.build_transport()?;
        match transport.test_connection().await {
            Ok(true) => {
                info!(
                    "SMTP session established with {}:{}",
                    self.settings.server, self.settings.port
                );
                Ok(Box::new(SmtpChannel {
                    transport: Some(transport),
                }))
            }
            Ok(false) => Err(PayrollError::Connect(format!(
                "{}:{} did not accept the session",
                self.settings.server, self.settings.port
            ))),
            Err(e) => Err(PayrollError::Connect(e.to_string())),
        }
    }
}

/// Session over a single pooled connection, reused by every send.
pub struct SmtpChannel {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

#[async_trait]
impl DeliveryChannel for SmtpChannel {
    async fn send(&mut self, notification: &Notification) -> Result<(), PayrollError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| PayrollError::Send("session already closed".to_string()))?;
        let message = build_message(notification)?;
        transport
            .send(message)
            .await
            .map_err(|e| PayrollError::Send(e.to_string()))?;
        debug!("Delivered message to {}", notification.to);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PayrollError> {
        if self.transport.take().is_some() {
            debug!("SMTP session closed");
        }
        Ok(())
    }
}

/// Build a `multipart/mixed` message: HTML body plus the PDF attachment.
pub fn build_message(notification: &Notification) -> Result<Message, PayrollError> {
    let from: Mailbox = notification
        .from
        .parse()
        .map_err(|_| PayrollError::Send(format!("invalid sender address: {}", notification.from)))?;
    let to: Mailbox = notification
        .to
        .parse()
        .map_err(|_| PayrollError::Send(format!("invalid recipient address: {}", notification.to)))?;
    let content_type = ContentType::parse(&notification.attachment.content_type)
        .map_err(|e| PayrollError::Compose(e.to_string()))?;

    let attachment = Attachment::new(notification.attachment.filename.clone())
        .body(notification.attachment.bytes.clone(), content_type);

    Message::builder()
        .from(from)
        .to(to)
        .subject(notification.subject.as_str())
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::html(notification.html.clone()))
                .singlepart(attachment),
        )
        .map_err(|e| PayrollError::Compose(e.to_string()))
}
