//! Pipeline status domain type

use serde::{Deserialize, Serialize};

/// Lifecycle status of one code-processing pipeline.
///
/// Written to the cache on every stage transition so that concurrent
/// clients can poll progress. The happy path is
/// `Validating → Preparing → Compiling → Executing → Finished`; every
/// other value is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Placeholder for a status that could not be read back.
    Unspecified,
    Validating,
    Preparing,
    Compiling,
    Executing,
    Finished,
    ValidationError,
    PreparationError,
    CompileError,
    RunError,
    RunTimeout,
    Canceled,
    /// Setup failure before any stage began.
    Error,
}

impl Status {
    /// Returns true if no further status transitions occur from this value.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Finished
                | Status::ValidationError
                | Status::PreparationError
                | Status::CompileError
                | Status::RunError
                | Status::RunTimeout
                | Status::Canceled
                | Status::Error
        )
    }
}
