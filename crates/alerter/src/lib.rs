use crate::error::AlerterError;
use configuration::TelegramConfig;
use core_types::OrderSide;
use events::{EngineEvent, LogLevel};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::broadcast;
pub mod error;

/// The JSON payload for the Telegram `sendMessage` endpoint.
#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str, // To allow for formatting like bold, italics etc.
}

/// A client for sending messages to the Telegram Bot API.
pub struct TelegramAlerter {
    client: Client,
    token: String,
    chat_id: String,
    notify_performance: bool,
}

impl TelegramAlerter {
    /// Creates a new `TelegramAlerter`.
    ///
    /// Returns `None` if the token or chat_id is missing from the configuration,
    /// allowing the system to gracefully disable alerting.
    pub fn new(config: &TelegramConfig) -> Option<Self> {
        if config.token.is_empty() || config.chat_id.is_empty() {
            tracing::warn!("Telegram alerter is not configured (missing token or chat_id).");
            return None;
        }
        Some(Self {
            client: Client::new(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
            notify_performance: config.notify_performance,
        })
    }

    /// Sends a text message to the configured Telegram chat.
    pub async fn send_message(&self, message: &str) -> Result<(), AlerterError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);

        let payload = SendMessagePayload {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "MarkdownV2", // Use Markdown for rich formatting
        };

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to decode error response".to_string());
            return Err(AlerterError::ApiError(error_text));
        }

        Ok(())
    }
}

/// Formats the events worth an alert. Everything else maps to `None`.
pub fn render(event: &EngineEvent, notify_performance: bool) -> Option<String> {
    match event {
        EngineEvent::Log(log) => {
            let title = match log.level {
                LogLevel::Error => "🚨 ERROR",
                LogLevel::Warn => "⚠️ WARNING",
                LogLevel::Info => return None,
            };
            Some(format!("*{}*: {}", title, escape_markdown(&log.message)))
        }
        EngineEvent::TradeExecuted(trade) => {
            let icon = match trade.side {
                OrderSide::Buy => "📈",
                OrderSide::Sell => "📉",
            };
            let reason = trade
                .exit_reason
                .map(|reason| format!(" \\({}\\)", escape_markdown(&reason.to_string())))
                .unwrap_or_default();
            Some(format!(
                "{} *{} {}*{} `@{}`\n`{}` units",
                icon,
                trade.side,
                escape_markdown(&trade.symbol),
                reason,
                trade.price,
                trade.quantity
            ))
        }
        EngineEvent::Performance(summary) if notify_performance => {
            Some(format!("💰 {}", escape_markdown(&summary.headline())))
        }
        _ => None,
    }
}

/// A long-running service that listens to the engine's event feed
/// and sends Telegram alerts for trades, warnings and errors.
pub async fn run_alerter_service(
    alerter: TelegramAlerter,
    mut event_rx: broadcast::Receiver<EngineEvent>,
) {
    tracing::info!("Alerter service started. Listening for critical events.");

    // Send a startup message
    if let Err(e) = alerter.send_message("✅ *Crossguard Engine Started*").await {
        tracing::warn!(error = %e, "Failed to send Telegram startup message.");
    }

    loop {
        match event_rx.recv().await {
            Ok(event) => {
                if let Some(message) = render(&event, alerter.notify_performance) {
                    if let Err(e) = alerter.send_message(&message).await {
                        tracing::error!(error = ?e, "Failed to send Telegram alert.");
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Alerter service lagged, skipped {} messages.", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("Event feed closed. Alerter service shutting down.");
                break;
            }
        }
    }
}

/// Escapes the characters that have special meaning in Telegram's MarkdownV2.
fn escape_markdown(text: &str) -> String {
    const SPECIAL: &str = r"\_*[]()~`>#+-=|{}.!";
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL.contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
