//! # Error Handling
//!
//! Failure taxonomy for the wizard graph system:
//!
//! - **Structural-invariant violations** (mismatched port types, would-be
//!   cycles, duplicate override keys) are rejected locally by `bool`/
//!   `Option` returns on the mutation APIs — they never raise an error.
//! - **I/O and document failures** (missing or unreadable files, malformed
//!   XML) surface as [`WizardError`]; a failed load returns no object.
//! - **Execution failures** wrap the failing item's name and the task
//!   runner's message.
//!
//! There is no retry policy anywhere in this crate; every failure is
//! terminal for the operation that produced it and is handled by the
//! caller.

use thiserror::Error;

/// Errors raised by document I/O and graph execution.
#[derive(Debug, Error)]
pub enum WizardError {
  /// Reading or writing a document file failed.
  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),

  /// The XML layer rejected the document.
  #[error("xml error: {0}")]
  Xml(#[from] quick_xml::Error),

  /// The document parsed as XML but does not have the expected shape.
  #[error("malformed document: {0}")]
  Malformed(String),

  /// A task runner reported failure while executing an item.
  #[error("execution failed on item '{item}': {message}")]
  Execution {
    /// Name of the item whose execution failed.
    item: String,
    /// The task runner's failure message.
    message: String,
  },
}

impl WizardError {
  /// Convenience constructor for malformed-document errors.
  pub fn malformed(message: impl Into<String>) -> Self {
    WizardError::Malformed(message.into())
  }
}
