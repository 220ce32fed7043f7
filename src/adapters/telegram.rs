//! Telegram Bot API notification sink.

use crate::ports::notify_port::{NotifyError, NotifyPort};
use reqwest::blocking::Client;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, PartialEq)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
    pub timeout: Duration,
    /// Bind outgoing connections to an IPv4 address, for hosts whose IPv6
    /// route to the API is broken.
    pub force_ipv4: bool,
    pub api_base: String,
}

impl TelegramConfig {
    pub fn new(token: &str, chat_id: &str) -> Self {
        Self {
            token: token.to_string(),
            chat_id: chat_id.to_string(),
            timeout: Duration::from_secs(20),
            force_ipv4: false,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self, NotifyError> {
        let mut builder = Client::builder().timeout(config.timeout);
        if config.force_ipv4 {
            builder = builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        }
        let client = builder.build().map_err(|e| NotifyError::Transport {
            reason: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(Self { client, config })
    }

    pub fn send_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.token
        )
    }

    fn payload<'a>(&'a self, text: &'a str) -> SendMessageRequest<'a> {
        SendMessageRequest {
            chat_id: &self.config.chat_id,
            text,
            parse_mode: "HTML",
        }
    }
}

impl NotifyPort for TelegramNotifier {
    fn send(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.send_url())
            .json(&self.payload(text))
            .send()
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("request timed out after {}s", self.config.timeout.as_secs())
                } else {
                    e.without_url().to_string()
                };
                NotifyError::Transport { reason }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "telegram message accepted");
            Ok(())
        } else {
            let body = response.text().unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "telegram API error");
            Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
