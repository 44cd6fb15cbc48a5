//! Best-effort low-stock email alerts.
//!
//! Alerting is advisory: `notify` never returns an error. Callers get a
//! `NotifyOutcome` describing what happened and are free to ignore it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use thiserror::Error;

use antibiostock_core::Antibiotic;

use crate::config::MailConfig;

const SMTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoRows,
    MissingConfig,
}

/// What happened to an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotifyOutcome {
    Sent { message_id: String },
    Skipped { reason: SkipReason },
    Failed { error: String },
}

impl NotifyOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Sent { .. } => "sent",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid mailbox: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp transport failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Sink for "these antibiotics are under their minimum" alerts.
#[async_trait]
pub trait LowStockNotifier: Send + Sync {
    async fn notify(&self, rows: &[Antibiotic]) -> NotifyOutcome;
}

/// Pick the notifier matching the mail configuration.
pub fn from_config(mail: Option<MailConfig>) -> Arc<dyn LowStockNotifier> {
    match mail {
        Some(config) => Arc::new(SmtpNotifier::new(config)),
        None => Arc::new(DisabledNotifier),
    }
}

/// Used when SMTP settings are incomplete.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl LowStockNotifier for DisabledNotifier {
    async fn notify(&self, rows: &[Antibiotic]) -> NotifyOutcome {
        if rows.is_empty() {
            return NotifyOutcome::Skipped {
                reason: SkipReason::NoRows,
            };
        }
        tracing::info!(rows = rows.len(), "mail disabled: SMTP_* or ALERT_TO_EMAIL missing");
        NotifyOutcome::Skipped {
            reason: SkipReason::MissingConfig,
        }
    }
}

/// Sends an HTML table of low-stock rows over SMTP.
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    config: MailConfig,
}

impl SmtpNotifier {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, rows: &[Antibiotic]) -> Result<Message, NotifyError> {
        let from: Mailbox = self.config.from.parse()?;
        let to: Mailbox = self.config.to.parse()?;
        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject(rows.len()))
            .header(ContentType::TEXT_HTML)
            .body(render_html(rows))?;
        Ok(message)
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let builder = if self.config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)?
        };
        Ok(builder
            .port(self.config.port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build())
    }

    async fn send(&self, rows: &[Antibiotic]) -> Result<String, NotifyError> {
        let message = self.build_message(rows)?;
        let response = self.transport()?.send(message).await?;
        Ok(response.message().collect::<Vec<_>>().join(" "))
    }
}

#[async_trait]
impl LowStockNotifier for SmtpNotifier {
    async fn notify(&self, rows: &[Antibiotic]) -> NotifyOutcome {
        if rows.is_empty() {
            return NotifyOutcome::Skipped {
                reason: SkipReason::NoRows,
            };
        }
        match self.send(rows).await {
            Ok(message_id) => {
                tracing::info!(rows = rows.len(), %message_id, "low-stock alert sent");
                NotifyOutcome::Sent { message_id }
            }
            Err(err) => {
                tracing::warn!(rows = rows.len(), error = %err, "low-stock alert failed");
                NotifyOutcome::Failed {
                    error: err.to_string(),
                }
            }
        }
    }
}

fn subject(count: usize) -> String {
    format!("Low stock alert ({count})")
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn render_html(rows: &[Antibiotic]) -> String {
    let body: String = rows
        .iter()
        .map(|r| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(r.code.as_str()),
                escape_html(&r.name),
                r.quantity,
                r.minimum_threshold
            )
        })
        .collect();

    format!(
        "<h2>Antibiotics below minimum stock</h2>\
         <table border=\"1\" cellpadding=\"6\" cellspacing=\"0\">\
         <thead><tr><th>Code</th><th>Name</th><th>Stock</th><th>Minimum</th></tr></thead>\
         <tbody>{body}</tbody>\
         </table>"
    )
}
