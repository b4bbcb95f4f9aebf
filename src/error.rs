//! Error types
//!
//! Failures travelling through a chain are the publisher's own `Err` type and
//! arrive as [`Completion::Failed`](crate::subscriber::Completion::Failed).
//! The types here cover what sits around a chain: building one dynamically
//! and consuming one from async code.

use thiserror::Error;

/// Why a dynamically assembled pipeline was rejected.
///
/// Produced only by [`Assembly::build`](crate::pipeline::Assembly::build),
/// before any subscription exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperatorFailure {
  /// A stage expects a different item type than the stage before produces.
  #[error("stage `{stage}` expects items of type `{expected}` but receives `{found}`")]
  TypeMismatch { stage: String, expected: &'static str, found: &'static str },

  /// A stage needs a chain that cannot fail, and nothing upstream handled the
  /// failures.
  #[error("stage `{stage}` needs a never-failing input; add `catch` or `replace_error` before it")]
  FailureNotHandled { stage: String },

  /// A stage was built from an `OperatorConfig` lacking a required option.
  #[error("stage `{stage}` is missing the `{option}` option")]
  MissingOption { stage: String, option: &'static str },

  /// The finished pipeline does not produce the requested output types.
  #[error("pipeline produces `{found}` but `{expected}` was requested")]
  OutputMismatch { expected: String, found: String },
}

/// Why an async consumer did not get a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError<E> {
  #[error("the publisher failed: {0:?}")]
  Failed(E),

  #[error("the publisher completed without a value")]
  Empty,
}
