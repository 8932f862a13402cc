//! Business logic services.

pub mod storage;
pub mod submission;

pub use storage::Storage;
pub use submission::{
    Artifact, BlobStore, FindingStore, SubmissionStatus, SubmissionWorkflow, SubmitError,
    SubmitOutcome,
};
