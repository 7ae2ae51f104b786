pub mod job;

pub use job::{JobManifestError, JobOutcome, JobRef, JobStatusSummary};
