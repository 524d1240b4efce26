use serde::Serialize;

use super::NotificationError;
use crate::config::MailConfig;

/// HTTP mail relay client for the direct channel.
pub struct MailRelay {
    url: String,
    username: String,
    password: String,
    from_address: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

/// Request body for the relay's send endpoint
#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl MailRelay {
    pub fn new(config: &MailConfig) -> Result<Self, NotificationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotificationError::HttpClient(e.to_string()))?;

        let from_address = if config.from_address.trim().is_empty() {
            config.username.clone()
        } else {
            config.from_address.clone()
        };

        Ok(Self {
            url: config
                .relay_url
                .as_deref()
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            from_address,
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), NotificationError> {
        let body = RelayMessage {
            from: &self.from_address,
            to,
            subject,
            text,
        };

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    NotificationError::RelayConnection(self.url.clone())
                } else if e.is_timeout() {
                    NotificationError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    NotificationError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(NotificationError::RelayRejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> MailConfig {
        MailConfig {
            relay_url: Some(url.into()),
            username: "triage@clinic.example".into(),
            password: "secret".into(),
            from_address: String::new(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn from_address_defaults_to_username() {
        let relay = MailRelay::new(&config("http://127.0.0.1:9/send/")).unwrap();
        assert_eq!(relay.from_address, "triage@clinic.example");
        assert_eq!(relay.url, "http://127.0.0.1:9/send");
    }

    #[test]
    fn unreachable_relay_is_an_error() {
        // Port 9 (discard) is not listening on test machines
        let relay = MailRelay::new(&config("http://127.0.0.1:9/send")).unwrap();
        let result = relay.send("jane@example.org", "subject", "body");
        assert!(result.is_err());
    }
}
