//! Request coordinator.
//!
//! Each intent runs as one independent unit of work: a fresh `Workflow`
//! (request id + state trace) and synchronous calls into the gateways.
//! Workers never call each other; everything goes through `handle`.

pub mod error;
pub mod intent;
pub mod state;

use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::config::TriageConfig;
use crate::db::store::{validate_diagnosis_input, DEFAULT_CREATED_BY};
use crate::db::SqliteStore;
use crate::models::enums::Channel;
use crate::models::*;
use crate::notify::{
    channels_for, DeliveryReceipt, NotificationGateway, NotificationPayload, Notifier, Recipient,
};
use crate::report::{summarize, DiagnosisSummary, PdfReportGateway, ReportRenderer};
use crate::triage::priority::recommended_action;
use crate::triage::{assess, build_classifier, ImageClassifier};

pub use error::{ErrorKind, OrchestratorError};
pub use intent::{Intent, NotifyPreference, PatientIdentity};
pub use state::{Workflow, WorkflowState};

/// Result of a full analyze-image run.
#[derive(Debug, Clone, Serialize)]
pub struct TriageOutcome {
    pub patient: Patient,
    /// True when the patient was registered by this request.
    pub patient_registered: bool,
    pub diagnosis: Diagnosis,
    pub recommended_action: String,
    pub deliveries: Vec<DeliveryReceipt>,
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub patient_id: String,
    pub diagnosis_id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsOutcome {
    pub patient_id: Option<String>,
    pub summary: DiagnosisSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ResponsePayload {
    Triage(Box<TriageOutcome>),
    Patient(Patient),
    Patients(Vec<Patient>),
    History(Vec<MedicalHistory>),
    HistoryEntry(MedicalHistory),
    Diagnosis(Diagnosis),
    Lookup(DiagnosisLookup),
    Diagnoses(Vec<Diagnosis>),
    Deliveries(Vec<DeliveryReceipt>),
    Report(ReportOutcome),
    Stats(StatsOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Completed,
    Failed,
}

/// Envelope returned for every intent, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct IntentResponse {
    pub request_id: Uuid,
    pub intent: &'static str,
    pub status: ResponseStatus,
    pub trace: Vec<WorkflowState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ResponsePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OrchestratorError>,
}

impl IntentResponse {
    /// Response for input that never became an intent.
    pub fn rejected(error: OrchestratorError) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            intent: "unknown",
            status: ResponseStatus::Failed,
            trace: vec![WorkflowState::Received, WorkflowState::Failed],
            payload: None,
            error: Some(error),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ResponseStatus::Completed
    }

    pub fn into_result(self) -> Result<ResponsePayload, OrchestratorError> {
        match (self.payload, self.error) {
            (Some(payload), None) => Ok(payload),
            (_, Some(error)) => Err(error),
            (None, None) => Err(OrchestratorError::new(
                ErrorKind::Internal,
                "The request produced no result",
            )),
        }
    }
}

/// Identity outcome of the gating step.
enum ResolvedIdentity {
    Existing(Patient),
    /// Registered at the persistence step, unless a concurrent request has
    /// registered the same national ID by then.
    Pending(NewPatient),
}

pub struct Orchestrator {
    store: SqliteStore,
    classifier: Box<dyn ImageClassifier + Send + Sync>,
    notifier: Box<dyn Notifier + Send + Sync>,
    reporter: Box<dyn ReportRenderer + Send + Sync>,
}

impl Orchestrator {
    pub fn new(
        store: SqliteStore,
        classifier: Box<dyn ImageClassifier + Send + Sync>,
        notifier: Box<dyn Notifier + Send + Sync>,
        reporter: Box<dyn ReportRenderer + Send + Sync>,
    ) -> Self {
        Self {
            store,
            classifier,
            notifier,
            reporter,
        }
    }

    /// Wire the production gateways from configuration.
    pub fn from_config(config: &TriageConfig) -> Result<Self, OrchestratorError> {
        config.ensure_directories().map_err(|e| {
            tracing::error!(error = %e, "Cannot create data directories");
            OrchestratorError::new(ErrorKind::Internal, "Data directories could not be created")
        })?;

        let store = SqliteStore::open(&config.database_path)?;
        let notifier = NotificationGateway::new(config).map_err(|e| {
            tracing::error!(error = %e, "Cannot build notification gateway");
            OrchestratorError::new(ErrorKind::Internal, "Notification gateway could not start")
        })?;
        Ok(Self::new(
            store,
            Box::new(build_classifier(config)),
            Box::new(notifier),
            Box::new(PdfReportGateway::new(&config.reports_dir)),
        ))
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Run one intent to a terminal state.
    pub fn handle(&self, intent: Intent) -> IntentResponse {
        let kind = intent.kind();
        let mut flow = Workflow::new();
        let span = tracing::info_span!("intent", request_id = %flow.request_id, intent = kind);
        let _enter = span.enter();

        let outcome = self
            .dispatch(intent, &mut flow)
            .and_then(|payload| flow.advance(WorkflowState::Completed).map(|_| payload));

        let (status, payload, error) = match outcome {
            Ok(payload) => {
                tracing::info!("Intent completed");
                (ResponseStatus::Completed, Some(payload), None)
            }
            Err(e) => {
                flow.fail();
                if e.kind.is_validation() {
                    tracing::info!(kind = %e.kind, message = %e.message, "Intent rejected");
                } else {
                    tracing::warn!(kind = %e.kind, message = %e.message, "Intent failed");
                }
                (ResponseStatus::Failed, None, Some(e))
            }
        };

        IntentResponse {
            request_id: flow.request_id,
            intent: kind,
            status,
            trace: flow.into_trace(),
            payload,
            error,
        }
    }

    fn dispatch(
        &self,
        intent: Intent,
        flow: &mut Workflow,
    ) -> Result<ResponsePayload, OrchestratorError> {
        use WorkflowState::*;

        match intent {
            Intent::AnalyzeImage {
                identity,
                image_path,
                notify,
                report,
                notes,
                created_by,
            } => {
                let request = AnalyzeRequest {
                    identity: &identity,
                    image_path: &image_path,
                    notify: &notify,
                    report,
                    notes,
                    created_by,
                };
                self.analyze(request, flow)
                    .map(|outcome| ResponsePayload::Triage(Box::new(outcome)))
            }

            Intent::GetPatient { patient_id } => {
                let patient = self.store.get_patient(patient_id.trim())?;
                flow.advance(IdentityResolved)?;
                Ok(ResponsePayload::Patient(patient))
            }

            Intent::ListPatients => Ok(ResponsePayload::Patients(self.store.list_patients()?)),

            Intent::RegisterPatient { patient } => {
                let patient = self.store.register_patient(&patient)?;
                flow.advance(Persisted)?;
                Ok(ResponsePayload::Patient(patient))
            }

            Intent::UpdatePatient {
                patient_id,
                changes,
            } => {
                let patient_id = self.resolve_patient_id(&patient_id)?;
                flow.advance(IdentityResolved)?;
                let patient = self.store.update_patient(&patient_id, &changes)?;
                flow.advance(Persisted)?;
                Ok(ResponsePayload::Patient(patient))
            }

            Intent::GetHistory { patient_id } => {
                let history = self.store.get_history(patient_id.trim())?;
                flow.advance(IdentityResolved)?;
                Ok(ResponsePayload::History(history))
            }

            Intent::AddHistory { patient_id, entry } => {
                let patient_id = self.resolve_patient_id(&patient_id)?;
                flow.advance(IdentityResolved)?;
                let record = self.store.add_history(&patient_id, &entry)?;
                flow.advance(Persisted)?;
                Ok(ResponsePayload::HistoryEntry(record))
            }

            Intent::GetDiagnosis { id } => {
                Ok(ResponsePayload::Lookup(self.store.get_diagnosis(id.trim())?))
            }

            Intent::ListDiagnoses { patient_id } => {
                let list = match patient_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
                    Some(pid) => {
                        let list = self.store.diagnoses_for_patient(pid)?;
                        flow.advance(IdentityResolved)?;
                        list
                    }
                    None => self.store.list_diagnoses()?,
                };
                Ok(ResponsePayload::Diagnoses(list))
            }

            Intent::RegisterDiagnosis { diagnosis } => {
                // Validation happens before the identity step so bad input
                // never touches the store.
                let validated = validate_diagnosis_input(&diagnosis)?;
                let patient_id = self.resolve_patient_id(&validated.patient_id)?;
                flow.advance(IdentityResolved)?;
                let stored = self.store.record_diagnosis(&NewDiagnosis {
                    patient_id,
                    ..validated
                })?;
                flow.advance(Persisted)?;
                Ok(ResponsePayload::Diagnosis(stored))
            }

            Intent::Notify {
                patient_id,
                diagnosis_id,
                channels,
            } => {
                let patient = self.store.get_patient(patient_id.trim())?;
                flow.advance(IdentityResolved)?;
                let diagnosis = self.pick_diagnosis(&patient.id, diagnosis_id.as_deref())?;
                let channels = match channels {
                    Some(list) => dedup_channels(list),
                    None => channels_for(diagnosis.priority),
                };
                if channels.is_empty() {
                    return Err(OrchestratorError::invalid_input(
                        "At least one notification channel is required",
                    ));
                }
                let receipts = self.deliver(&patient, &diagnosis, &channels)?;
                flow.advance(Notified)?;
                Ok(ResponsePayload::Deliveries(receipts))
            }

            Intent::GenerateReport {
                patient_id,
                diagnosis_id,
            } => {
                let patient_id = self.resolve_patient_id(&patient_id)?;
                flow.advance(IdentityResolved)?;
                let diagnosis = self.pick_diagnosis(&patient_id, diagnosis_id.as_deref())?;
                let path = self.reporter.render(&patient_id, &diagnosis)?;
                flow.advance(Reported)?;
                Ok(ResponsePayload::Report(ReportOutcome {
                    patient_id,
                    diagnosis_id: diagnosis.id,
                    path,
                }))
            }

            Intent::GenerateStats { patient_id } => {
                let patient_id = patient_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string);
                let diagnoses = match &patient_id {
                    Some(pid) => self.store.diagnoses_for_patient(pid)?,
                    None => self.store.list_diagnoses()?,
                };
                let summary = summarize(&diagnoses);
                flow.advance(Reported)?;
                Ok(ResponsePayload::Stats(StatsOutcome {
                    patient_id,
                    summary,
                }))
            }
        }
    }

    // ── Analyze image ───────────────────────────────────────

    fn analyze(
        &self,
        request: AnalyzeRequest<'_>,
        flow: &mut Workflow,
    ) -> Result<TriageOutcome, OrchestratorError> {
        use WorkflowState::*;

        // Gate: nothing below runs without an identity.
        let resolved = self.resolve_identity(request.identity)?;
        flow.advance(IdentityResolved)?;

        let result = self.classifier.classify(request.image_path)?;
        flow.advance(Classified)?;

        let assessment = assess(result.confidence);
        let (patient, patient_registered) = match resolved {
            ResolvedIdentity::Existing(patient) => (patient, false),
            ResolvedIdentity::Pending(fields) => self.store.find_or_register_patient(&fields)?,
        };

        let diagnosis = self.store.record_diagnosis(&NewDiagnosis {
            patient_id: patient.id.clone(),
            image_reference: Some(request.image_path.display().to_string()),
            classification: assessment.classification,
            confidence: result.confidence,
            priority: assessment.priority,
            notes: request.notes.filter(|n| !n.trim().is_empty()),
            created_by: request
                .created_by
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CREATED_BY.to_string()),
        })?;
        flow.advance(Persisted)?;

        let channels = match request.notify {
            NotifyPreference::Policy => channels_for(diagnosis.priority),
            NotifyPreference::Skip => Vec::new(),
            NotifyPreference::Channels(list) => dedup_channels(list.clone()),
        };
        let mut deliveries = Vec::new();
        if !channels.is_empty() {
            deliveries = self
                .deliver(&patient, &diagnosis, &channels)
                .map_err(|e| e.with_context(format!("Diagnosis {} was recorded", diagnosis.id)))?;
            flow.advance(Notified)?;
        }

        let mut report = None;
        if request.report {
            let path = self
                .reporter
                .render(&patient.id, &diagnosis)
                .map_err(|e| {
                    OrchestratorError::from(e)
                        .with_context(format!("Diagnosis {} was recorded", diagnosis.id))
                })?;
            report = Some(path);
            flow.advance(Reported)?;
        }

        tracing::info!(
            patient_id = %patient.id,
            diagnosis_id = %diagnosis.id,
            classification = %diagnosis.classification,
            priority = %diagnosis.priority,
            deliveries = deliveries.len(),
            "Triage completed"
        );

        Ok(TriageOutcome {
            patient,
            patient_registered,
            recommended_action: assessment.recommended_action.to_string(),
            diagnosis,
            deliveries,
            report,
        })
    }

    /// Identity gate for analyze-image. Read-only: never registers.
    fn resolve_identity(
        &self,
        identity: &PatientIdentity,
    ) -> Result<ResolvedIdentity, OrchestratorError> {
        if identity.is_empty() {
            return Err(OrchestratorError::missing_identity());
        }

        if let Some(id) = identity.patient_id() {
            if let Some(patient) = self.store.find_patient(id)? {
                return Ok(ResolvedIdentity::Existing(patient));
            }
            if identity.name().is_none() {
                return Err(OrchestratorError::new(
                    ErrorKind::UnknownPatient,
                    format!("Patient {id} not found"),
                ));
            }
        }

        if let Some(nid) = identity.national_id() {
            if let Some(patient) = self.store.find_patient_by_national_id(nid)? {
                return Ok(ResolvedIdentity::Existing(patient));
            }
        }

        identity
            .registration()
            .map(ResolvedIdentity::Pending)
            .ok_or_else(OrchestratorError::missing_identity)
    }

    /// Trimmed ID of an existing patient.
    fn resolve_patient_id(&self, patient_id: &str) -> Result<String, OrchestratorError> {
        let id = patient_id.trim();
        if id.is_empty() {
            return Err(OrchestratorError::new(
                ErrorKind::MissingIdentity,
                "A patient identifier is required",
            ));
        }
        Ok(self.store.get_patient(id)?.id)
    }

    /// The named diagnosis (which must belong to the patient) or the latest one.
    fn pick_diagnosis(
        &self,
        patient_id: &str,
        diagnosis_id: Option<&str>,
    ) -> Result<Diagnosis, OrchestratorError> {
        match diagnosis_id.map(str::trim).filter(|d| !d.is_empty()) {
            Some(did) => match self.store.get_diagnosis(did)? {
                DiagnosisLookup::Diagnosis(d) if d.patient_id == patient_id => Ok(d),
                DiagnosisLookup::Diagnosis(d) => Err(OrchestratorError::invalid_input(format!(
                    "Diagnosis {} does not belong to patient {patient_id}",
                    d.id
                ))),
                DiagnosisLookup::Patient(_) => Err(OrchestratorError::new(
                    ErrorKind::NotFound,
                    format!("No diagnosis found for {did}"),
                )),
            },
            None => self
                .store
                .diagnoses_for_patient(patient_id)?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    OrchestratorError::new(
                        ErrorKind::NotFound,
                        format!("Patient {patient_id} has no diagnoses"),
                    )
                }),
        }
    }

    /// Dispatch on each channel. Direct-channel errors degrade to a
    /// simulated receipt; alert-channel errors are surfaced.
    fn deliver(
        &self,
        patient: &Patient,
        diagnosis: &Diagnosis,
        channels: &[Channel],
    ) -> Result<Vec<DeliveryReceipt>, OrchestratorError> {
        let payload = NotificationPayload {
            patient_id: patient.id.clone(),
            patient_name: patient.name.clone(),
            diagnosis_id: diagnosis.id.clone(),
            classification: diagnosis.classification,
            priority: diagnosis.priority,
            confidence: diagnosis.confidence,
            recommendation: recommended_action(diagnosis.priority).to_string(),
        };

        let mut receipts = Vec::with_capacity(channels.len());
        for &channel in channels {
            let recipient = match channel {
                Channel::Direct => Recipient {
                    name: patient.name.clone(),
                    email: patient.email.clone(),
                },
                Channel::Alert => Recipient::team(),
            };

            match self.notifier.notify(channel, &recipient, &payload) {
                Ok(receipt) => receipts.push(receipt),
                Err(e) if channel == Channel::Direct => {
                    tracing::warn!(
                        error = %e,
                        channel = %channel,
                        diagnosis_id = %diagnosis.id,
                        "Direct delivery failed; recorded as simulated"
                    );
                    receipts.push(DeliveryReceipt::simulated(
                        channel,
                        recipient.name,
                        "direct transport unavailable",
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(receipts)
    }
}

struct AnalyzeRequest<'a> {
    identity: &'a PatientIdentity,
    image_path: &'a Path,
    notify: &'a NotifyPreference,
    report: bool,
    notes: Option<String>,
    created_by: Option<String>,
}

/// Keep first occurrence order.
fn dedup_channels(list: Vec<Channel>) -> Vec<Channel> {
    let mut out = Vec::with_capacity(list.len());
    for c in list {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}
