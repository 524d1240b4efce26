//! Notification gateway.
//!
//! Two channels: `direct` (message to the patient) and `alert` (internal
//! team queue). Direct delivery without a usable transport is recorded in
//! the outbox and reported as simulated. Alerts always land in the queue
//! file; a queue write failure is a real error.

pub mod mail;
pub mod queue;

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::TriageConfig;
use crate::models::enums::{Channel, Classification, Priority};

pub use mail::MailRelay;
pub use queue::{AlertRecord, OutboxMessage};

/// Recipient label used for the internal alert channel.
pub const TEAM_RECIPIENT: &str = "medical team";

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Queue file is corrupted: {0}")]
    CorruptedQueue(String),

    #[error("Mail relay unreachable: {0}")]
    RelayConnection(String),

    #[error("Mail relay returned {status}: {body}")]
    RelayRejected { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Queue lock poisoned")]
    LockPoisoned,
}

/// Who a message is addressed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: Option<String>,
}

impl Recipient {
    pub fn team() -> Self {
        Self {
            name: TEAM_RECIPIENT.to_string(),
            email: None,
        }
    }
}

/// Content of a triage notification, shared by both channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub patient_id: String,
    pub patient_name: String,
    pub diagnosis_id: String,
    pub classification: Classification,
    pub priority: Priority,
    /// Probability of PNEUMONIA in [0, 1].
    pub confidence: f64,
    pub recommendation: String,
}

impl NotificationPayload {
    pub fn subject(&self) -> String {
        format!(
            "[{}] Chest X-ray result for {} ({})",
            self.priority, self.patient_name, self.diagnosis_id
        )
    }

    pub fn body(&self) -> String {
        format!(
            "Patient: {} ({})\n\
             Diagnosis: {}\n\
             Classification: {}\n\
             Pneumonia probability: {:.1}%\n\
             Priority: {}\n\
             Recommendation: {}\n\n\
             This result was produced by an automated triage system and must be \
             reviewed by a qualified physician.",
            self.patient_name,
            self.patient_id,
            self.diagnosis_id,
            self.classification,
            self.confidence * 100.0,
            self.priority,
            self.recommendation,
        )
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub channel: Channel,
    pub recipient: String,
    pub delivered: bool,
    /// True when the message was only recorded locally.
    pub simulated: bool,
    pub detail: Option<String>,
    pub sent_at: NaiveDateTime,
}

impl DeliveryReceipt {
    pub fn sent(channel: Channel, recipient: impl Into<String>) -> Self {
        Self {
            channel,
            recipient: recipient.into(),
            delivered: true,
            simulated: false,
            detail: None,
            sent_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn simulated(
        channel: Channel,
        recipient: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            simulated: true,
            detail: Some(detail.into()),
            ..Self::sent(channel, recipient)
        }
    }
}

/// Channels the policy dispatches for a tier: HIGH and CRITICAL alert the team too.
pub fn channels_for(priority: Priority) -> Vec<Channel> {
    if priority.requires_team_alert() {
        vec![Channel::Direct, Channel::Alert]
    } else {
        vec![Channel::Direct]
    }
}

pub trait Notifier {
    fn notify(
        &self,
        channel: Channel,
        recipient: &Recipient,
        payload: &NotificationPayload,
    ) -> Result<DeliveryReceipt, NotificationError>;
}

/// Production notifier: mail relay for `direct`, JSON queue for `alert`.
pub struct NotificationGateway {
    relay: Option<MailRelay>,
    alerts_path: PathBuf,
    outbox_path: PathBuf,
    /// Serializes read-modify-write on the queue files within this process.
    files: Mutex<()>,
}

impl NotificationGateway {
    pub fn new(config: &TriageConfig) -> Result<Self, NotificationError> {
        let relay = if config.mail.has_credentials() {
            Some(MailRelay::new(&config.mail)?)
        } else {
            tracing::info!("Mail relay not configured; direct messages go to the outbox");
            None
        };

        Ok(Self {
            relay,
            alerts_path: config.alerts_path.clone(),
            outbox_path: config.outbox_path.clone(),
            files: Mutex::new(()),
        })
    }

    /// Unread alerts, oldest first.
    pub fn pending_alerts(&self) -> Result<Vec<AlertRecord>, NotificationError> {
        let _guard = self.files.lock().map_err(|_| NotificationError::LockPoisoned)?;
        let alerts: Vec<AlertRecord> = queue::read_records(&self.alerts_path)?;
        Ok(alerts.into_iter().filter(|a| !a.read).collect())
    }

    /// Mark alerts as read. `None` acknowledges every pending alert.
    /// Returns how many alerts changed state.
    pub fn acknowledge_alerts(&self, ids: Option<&[Uuid]>) -> Result<usize, NotificationError> {
        let _guard = self.files.lock().map_err(|_| NotificationError::LockPoisoned)?;
        let mut alerts: Vec<AlertRecord> = queue::read_records(&self.alerts_path)?;

        let mut changed = 0;
        for alert in alerts.iter_mut().filter(|a| !a.read) {
            if ids.map_or(true, |ids| ids.contains(&alert.id)) {
                alert.read = true;
                changed += 1;
            }
        }

        if changed > 0 {
            queue::write_records(&self.alerts_path, &alerts)?;
        }
        Ok(changed)
    }

    /// Messages recorded instead of sent.
    pub fn outbox(&self) -> Result<Vec<OutboxMessage>, NotificationError> {
        let _guard = self.files.lock().map_err(|_| NotificationError::LockPoisoned)?;
        queue::read_records(&self.outbox_path)
    }

    fn record_in_outbox(
        &self,
        recipient: &Recipient,
        payload: &NotificationPayload,
        reason: &str,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let message = OutboxMessage::new(recipient, payload, reason);
        {
            let _guard = self.files.lock().map_err(|_| NotificationError::LockPoisoned)?;
            queue::append_record(&self.outbox_path, &message)?;
        }
        tracing::info!(
            channel = "direct",
            patient_id = %payload.patient_id,
            diagnosis_id = %payload.diagnosis_id,
            reason,
            "Direct message simulated"
        );
        Ok(DeliveryReceipt::simulated(
            Channel::Direct,
            recipient.name.clone(),
            reason,
        ))
    }

    fn send_direct(
        &self,
        recipient: &Recipient,
        payload: &NotificationPayload,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let Some(relay) = &self.relay else {
            return self.record_in_outbox(recipient, payload, "mail credentials not configured");
        };
        let Some(email) = recipient.email.as_deref().filter(|e| !e.trim().is_empty()) else {
            return self.record_in_outbox(recipient, payload, "recipient has no e-mail address");
        };

        match relay.send(email, &payload.subject(), &payload.body()) {
            Ok(()) => {
                tracing::info!(
                    channel = "direct",
                    patient_id = %payload.patient_id,
                    diagnosis_id = %payload.diagnosis_id,
                    "Direct message sent"
                );
                Ok(DeliveryReceipt::sent(Channel::Direct, email))
            }
            Err(e) => {
                tracing::warn!(error = %e, patient_id = %payload.patient_id, "Mail relay failed");
                self.record_in_outbox(recipient, payload, "mail relay failed")
            }
        }
    }

    fn send_alert(&self, payload: &NotificationPayload) -> Result<DeliveryReceipt, NotificationError> {
        let record = AlertRecord::new(payload);
        {
            let _guard = self.files.lock().map_err(|_| NotificationError::LockPoisoned)?;
            queue::append_record(&self.alerts_path, &record)?;
        }
        tracing::info!(
            channel = "alert",
            alert_id = %record.id,
            patient_id = %payload.patient_id,
            priority = %payload.priority,
            "Team alert queued"
        );
        Ok(DeliveryReceipt::sent(Channel::Alert, TEAM_RECIPIENT))
    }
}

impl Notifier for NotificationGateway {
    fn notify(
        &self,
        channel: Channel,
        recipient: &Recipient,
        payload: &NotificationPayload,
    ) -> Result<DeliveryReceipt, NotificationError> {
        match channel {
            Channel::Direct => self.send_direct(recipient, payload),
            Channel::Alert => self.send_alert(payload),
        }
    }
}
