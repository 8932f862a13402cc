//! Finding submission workflow.
//!
//! Turns a [`FindingDraft`] into a persisted finding record: validate the
//! draft, upload the signature image (if one was drawn), upload the
//! attachment (if one was selected), then insert the record. The steps run
//! strictly in that order and short-circuit on the first failure, because
//! the inserted record references the URLs produced by the uploads.
//!
//! The workflow never mutates the draft, so a failed submission can be
//! retried as-is. At most one submission runs per workflow instance; a
//! submit while one is outstanding is a silent no-op (double-tap guard).

use std::fmt;
use std::sync::Mutex;

use chrono::Utc;
use tracing::{error, info};

use crate::entity::finding;
use crate::error::AppResult;
use crate::models::{FindingDraft, NewFinding};

/// Content type for rendered signature images.
pub const SIGNATURE_CONTENT_TYPE: &str = "image/png";

/// Generic user-facing message for upload/persist failures. The underlying
/// technical error is only logged.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to save the finding. Please try again.";

/// Object storage collaborator, by contract.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload an object under `key`, returning the stored path.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: Option<&str>)
        -> AppResult<String>;

    /// Public URL for a stored path.
    fn public_url(&self, path: &str) -> String;
}

/// Record store collaborator, by contract.
#[async_trait::async_trait]
pub trait FindingStore: Send + Sync {
    /// Insert a finding record, returning the persisted row.
    async fn insert(&self, record: NewFinding) -> AppResult<finding::Model>;
}

/// Which artifact an upload failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Signature,
    Attachment,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signature => write!(f, "signature"),
            Self::Attachment => write!(f, "attachment"),
        }
    }
}

/// Submission failure taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// A required field is missing or malformed. The message names the
    /// condition and is shown to the user verbatim.
    #[error("{0}")]
    ValidationFailed(String),

    /// An artifact transfer was rejected or network-failed.
    #[error("{artifact} upload failed: {message}")]
    UploadFailed { artifact: Artifact, message: String },

    /// The record store rejected the insert.
    #[error("failed to persist finding: {0}")]
    PersistFailed(String),
}

/// Submission state as observed by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    Idle,
    Submitting,
    Succeeded,
    /// A previous submission failed; the draft is intact and a retry is
    /// allowed (the guard only blocks while Submitting).
    Failed,
}

/// Outcome of a submit call that did not error.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The finding was persisted.
    Saved(finding::Model),
    /// Another submission was outstanding; nothing was done.
    AlreadySubmitting,
}

struct WorkflowState {
    status: SubmissionStatus,
    last_error: Option<String>,
}

/// The validate-upload-insert workflow for one form session.
pub struct SubmissionWorkflow<B, F> {
    blobs: B,
    findings: F,
    state: Mutex<WorkflowState>,
}

impl<B: BlobStore, F: FindingStore> SubmissionWorkflow<B, F> {
    pub fn new(blobs: B, findings: F) -> Self {
        SubmissionWorkflow {
            blobs,
            findings,
            state: Mutex::new(WorkflowState {
                status: SubmissionStatus::Idle,
                last_error: None,
            }),
        }
    }

    /// Current submission status.
    pub fn status(&self) -> SubmissionStatus {
        self.lock_state().status
    }

    /// Message from the most recent failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.lock_state().last_error.clone()
    }

    /// Submit a draft: validate, upload artifacts, insert the record.
    ///
    /// Returns [`SubmitOutcome::AlreadySubmitting`] without side effects if
    /// a submission is already outstanding. On any failure the draft is
    /// left untouched so the user can resubmit without retyping.
    pub async fn submit(&self, draft: &FindingDraft) -> Result<SubmitOutcome, SubmitError> {
        if self.status() == SubmissionStatus::Submitting {
            return Ok(SubmitOutcome::AlreadySubmitting);
        }

        // Validate before entering Submitting; a validation failure leaves
        // the workflow idle and names the missing-fields condition.
        let fields = match draft.validate() {
            Ok(fields) => fields,
            Err(message) => {
                let mut state = self.lock_state();
                state.status = SubmissionStatus::Idle;
                state.last_error = Some(message.clone());
                return Err(SubmitError::ValidationFailed(message));
            }
        };

        // Enter Submitting atomically; a concurrent submit that got past
        // the early check lands here and backs off.
        {
            let mut state = self.lock_state();
            if state.status == SubmissionStatus::Submitting {
                return Ok(SubmitOutcome::AlreadySubmitting);
            }
            state.status = SubmissionStatus::Submitting;
        }

        let result = self.run_pipeline(draft, fields).await;

        let mut state = self.lock_state();
        match result {
            Ok(saved) => {
                state.status = SubmissionStatus::Succeeded;
                state.last_error = None;
                Ok(SubmitOutcome::Saved(saved))
            }
            Err(e) => {
                error!("Finding submission failed: {}", e);
                state.status = SubmissionStatus::Failed;
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Upload artifacts and insert the record, in order, short-circuiting
    /// on the first failure. Uploads are never issued concurrently.
    async fn run_pipeline(
        &self,
        draft: &FindingDraft,
        fields: crate::models::ValidatedFields,
    ) -> Result<finding::Model, SubmitError> {
        let mut signature_url = None;
        if let Some(bytes) = draft.signature_bytes() {
            let key = signature_key(Utc::now().timestamp_millis());
            let path = self
                .blobs
                .upload(&key, bytes.to_vec(), Some(SIGNATURE_CONTENT_TYPE))
                .await
                .map_err(|e| SubmitError::UploadFailed {
                    artifact: Artifact::Signature,
                    message: e.to_string(),
                })?;
            signature_url = Some(self.blobs.public_url(&path));
        }

        let mut file_url = None;
        if let Some(attachment) = &draft.attachment {
            let key = attachment_key(Utc::now().timestamp_millis(), &attachment.filename);
            let path = self
                .blobs
                .upload(&key, attachment.data.clone(), attachment.content_type.as_deref())
                .await
                .map_err(|e| SubmitError::UploadFailed {
                    artifact: Artifact::Attachment,
                    message: e.to_string(),
                })?;
            file_url = Some(self.blobs.public_url(&path));
        }

        let record = NewFinding::from_draft(draft, fields, signature_url, file_url);
        let saved = self
            .findings
            .insert(record)
            .await
            .map_err(|e| SubmitError::PersistFailed(e.to_string()))?;

        info!(
            "Finding {} saved: equipment={}, horometer={}",
            saved.id, saved.equipment, saved.horometer
        );

        Ok(saved)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, WorkflowState> {
        self.state.lock().expect("Workflow state mutex poisoned")
    }
}

/// Storage key for a signature image. Time-keyed; collisions from
/// same-millisecond submissions are accepted, not mitigated.
pub fn signature_key(epoch_millis: i64) -> String {
    format!("signatures/{}.png", epoch_millis)
}

/// Storage key for an attachment, keeping the original filename.
pub fn attachment_key(epoch_millis: i64, filename: &str) -> String {
    format!("files/{}-{}", epoch_millis, filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DraftAttachment, MaintenanceType};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;
    use uuid::Uuid;

    use crate::error::AppError;

    /// Shared event log asserting cross-collaborator call ordering.
    type EventLog = Arc<StdMutex<Vec<String>>>;

    struct FakeBlobStore {
        events: EventLog,
        /// Fail uploads whose key starts with this prefix.
        fail_prefix: Option<&'static str>,
        /// Block each upload until a permit is available.
        gate: Option<Arc<tokio::sync::Semaphore>>,
    }

    #[async_trait::async_trait]
    impl BlobStore for FakeBlobStore {
        async fn upload(
            &self,
            key: &str,
            _data: Vec<u8>,
            content_type: Option<&str>,
        ) -> AppResult<String> {
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.expect("gate closed");
            }
            if let Some(prefix) = self.fail_prefix {
                if key.starts_with(prefix) {
                    return Err(AppError::Storage("connection reset".to_string()));
                }
            }
            self.events
                .lock()
                .unwrap()
                .push(format!("upload:{}:{}", key, content_type.unwrap_or("-")));
            Ok(key.to_string())
        }

        fn public_url(&self, path: &str) -> String {
            format!("https://cdn.test/{}", path)
        }
    }

    struct FakeFindingStore {
        events: EventLog,
        inserted: Arc<StdMutex<Vec<NewFinding>>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl FindingStore for FakeFindingStore {
        async fn insert(&self, record: NewFinding) -> AppResult<finding::Model> {
            if self.fail {
                return Err(AppError::Database("insert rejected".to_string()));
            }
            self.events.lock().unwrap().push("insert".to_string());
            self.inserted.lock().unwrap().push(record.clone());
            Ok(finding::Model {
                id: Uuid::new_v4(),
                created_at: Utc::now(),
                checklist_name: record.checklist_name,
                equipment: record.equipment,
                horometer: record.horometer,
                maintenance_type: record.maintenance_type,
                start_date: record.start_date,
                end_date: record.end_date,
                supervisor: record.supervisor,
                technician: record.technician,
                description: record.description,
                inspection_type: record.inspection_type,
                signature_url: record.signature_url,
                file_url: record.file_url,
            })
        }
    }

    struct Harness {
        events: EventLog,
        inserted: Arc<StdMutex<Vec<NewFinding>>>,
        workflow: SubmissionWorkflow<FakeBlobStore, FakeFindingStore>,
    }

    fn harness(fail_prefix: Option<&'static str>, insert_fails: bool) -> Harness {
        let events: EventLog = Arc::new(StdMutex::new(Vec::new()));
        let inserted = Arc::new(StdMutex::new(Vec::new()));
        let workflow = SubmissionWorkflow::new(
            FakeBlobStore {
                events: events.clone(),
                fail_prefix,
                gate: None,
            },
            FakeFindingStore {
                events: events.clone(),
                inserted: inserted.clone(),
                fail: insert_fails,
            },
        );
        Harness {
            events,
            inserted,
            workflow,
        }
    }

    fn valid_draft() -> FindingDraft {
        FindingDraft {
            checklist_name: "PM Checklist A".to_string(),
            equipment: "Excavator 12".to_string(),
            horometer: "4500".to_string(),
            maintenance_type: Some(MaintenanceType::Pm1),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 10),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 12),
            supervisor: "Juan Pérez".to_string(),
            technician: "Pedro López".to_string(),
            description: "Hose wear detected".to_string(),
            ..Default::default()
        }
    }

    fn signature_bytes() -> Vec<u8> {
        vec![0x89, 0x50, 0x4e, 0x47]
    }

    #[tokio::test]
    async fn test_invalid_draft_touches_no_collaborator() {
        let h = harness(None, false);
        let mut draft = valid_draft();
        draft.equipment.clear();
        draft.signature = Some(signature_bytes());

        let err = h.workflow.submit(&draft).await.unwrap_err();
        assert!(matches!(err, SubmitError::ValidationFailed(_)));
        assert!(h.events.lock().unwrap().is_empty());
        assert_eq!(h.workflow.status(), SubmissionStatus::Idle);
        assert!(h.workflow.last_error().unwrap().contains("equipment"));
    }

    #[tokio::test]
    async fn test_plain_draft_inserts_once_with_no_uploads() {
        let h = harness(None, false);

        let outcome = h.workflow.submit(&valid_draft()).await.unwrap();
        let saved = match outcome {
            SubmitOutcome::Saved(model) => model,
            other => panic!("expected Saved, got {:?}", other),
        };

        let events = h.events.lock().unwrap();
        assert_eq!(*events, ["insert"]);
        drop(events);

        // End-to-end scenario: horometer persisted as integer, URLs absent.
        assert_eq!(saved.horometer, 4500);
        assert_eq!(saved.maintenance_type, "PM1");
        assert!(saved.signature_url.is_none());
        assert!(saved.file_url.is_none());
        assert_eq!(saved.inspection_type, "No especificado");
        assert_eq!(h.workflow.status(), SubmissionStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_signature_uploaded_before_insert_and_url_recorded() {
        let h = harness(None, false);
        let mut draft = valid_draft();
        draft.signature = Some(signature_bytes());

        h.workflow.submit(&draft).await.unwrap();

        let events = h.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].starts_with("upload:signatures/"));
        assert!(events[0].contains(".png:image/png"));
        assert_eq!(events[1], "insert");
        drop(events);

        let inserted = h.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        let url = inserted[0].signature_url.as_deref().unwrap();
        assert!(url.starts_with("https://cdn.test/signatures/"));
        assert!(url.ends_with(".png"));
        assert!(inserted[0].file_url.is_none());
    }

    #[tokio::test]
    async fn test_signature_precedes_attachment_precedes_insert() {
        let h = harness(None, false);
        let mut draft = valid_draft();
        draft.signature = Some(signature_bytes());
        draft.attachment = Some(DraftAttachment {
            filename: "hose.jpg".to_string(),
            content_type: Some("image/jpeg".to_string()),
            data: vec![1, 2, 3],
        });

        h.workflow.submit(&draft).await.unwrap();

        let events = h.events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(events[0].starts_with("upload:signatures/"));
        assert!(events[1].starts_with("upload:files/"));
        assert!(events[1].contains("-hose.jpg:image/jpeg"));
        assert_eq!(events[2], "insert");
        drop(events);

        let inserted = h.inserted.lock().unwrap();
        assert!(inserted[0].signature_url.is_some());
        assert!(inserted[0].file_url.is_some());
    }

    #[tokio::test]
    async fn test_signature_upload_failure_aborts_before_insert() {
        let h = harness(Some("signatures/"), false);
        let mut draft = valid_draft();
        draft.signature = Some(signature_bytes());
        draft.attachment = Some(DraftAttachment {
            filename: "hose.jpg".to_string(),
            content_type: None,
            data: vec![1],
        });

        let err = h.workflow.submit(&draft).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::UploadFailed {
                artifact: Artifact::Signature,
                ..
            }
        ));

        // Nothing was uploaded or inserted, and the draft is untouched for a
        // retry without retyping.
        assert!(h.events.lock().unwrap().is_empty());
        assert!(h.inserted.lock().unwrap().is_empty());
        assert_eq!(h.workflow.status(), SubmissionStatus::Failed);
        assert_eq!(draft.equipment, "Excavator 12");
        assert!(draft.signature.is_some());

        // A retry on a fresh failure is allowed by the guard.
        let err = h.workflow.submit(&draft).await.unwrap_err();
        assert!(matches!(err, SubmitError::UploadFailed { .. }));
    }

    #[tokio::test]
    async fn test_attachment_upload_failure_aborts_before_insert() {
        let h = harness(Some("files/"), false);
        let mut draft = valid_draft();
        draft.signature = Some(signature_bytes());
        draft.attachment = Some(DraftAttachment {
            filename: "hose.jpg".to_string(),
            content_type: None,
            data: vec![1],
        });

        let err = h.workflow.submit(&draft).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::UploadFailed {
                artifact: Artifact::Attachment,
                ..
            }
        ));

        // The signature blob is orphaned in storage; no record was written.
        let events = h.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].starts_with("upload:signatures/"));
        assert!(h.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_reports_and_allows_retry() {
        let h = harness(None, true);

        let err = h.workflow.submit(&valid_draft()).await.unwrap_err();
        assert!(matches!(err, SubmitError::PersistFailed(_)));
        assert_eq!(h.workflow.status(), SubmissionStatus::Failed);
        assert!(h.workflow.last_error().is_some());
    }

    #[tokio::test]
    async fn test_submit_while_submitting_is_a_noop() {
        let events: EventLog = Arc::new(StdMutex::new(Vec::new()));
        let inserted = Arc::new(StdMutex::new(Vec::new()));
        let gate = Arc::new(tokio::sync::Semaphore::new(0));

        let workflow = Arc::new(SubmissionWorkflow::new(
            FakeBlobStore {
                events: events.clone(),
                fail_prefix: None,
                gate: Some(gate.clone()),
            },
            FakeFindingStore {
                events: events.clone(),
                inserted: inserted.clone(),
                fail: false,
            },
        ));

        let mut draft = valid_draft();
        draft.signature = Some(signature_bytes());

        let first = {
            let workflow = workflow.clone();
            let draft = draft.clone();
            tokio::spawn(async move { workflow.submit(&draft).await })
        };

        // Wait until the first submission is parked inside the upload.
        while workflow.status() != SubmissionStatus::Submitting {
            tokio::task::yield_now().await;
        }

        let second = workflow.submit(&draft).await.unwrap();
        assert!(matches!(second, SubmitOutcome::AlreadySubmitting));

        // Release the first submission and let it finish.
        gate.add_permits(1);
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, SubmitOutcome::Saved(_)));

        // Exactly one set of uploads and one insert happened.
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].starts_with("upload:signatures/"));
        assert_eq!(events[1], "insert");
        assert_eq!(inserted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dates_persist_as_plain_ymd_text() {
        let h = harness(None, false);
        let mut draft = valid_draft();
        draft.start_date = NaiveDate::from_ymd_opt(2024, 3, 1);
        draft.end_date = NaiveDate::from_ymd_opt(2024, 3, 15);

        h.workflow.submit(&draft).await.unwrap();

        let inserted = h.inserted.lock().unwrap();
        let json = serde_json::to_value(&inserted[0]).unwrap();
        assert_eq!(json["start_date"], "2024-03-01");
        assert_eq!(json["end_date"], "2024-03-15");
    }

    #[test]
    fn test_signature_key_format() {
        assert_eq!(signature_key(1700000000123), "signatures/1700000000123.png");
    }

    #[test]
    fn test_attachment_key_keeps_original_filename() {
        assert_eq!(
            attachment_key(1700000000123, "hose wear.jpg"),
            "files/1700000000123-hose wear.jpg"
        );
    }
}
