//! Error types for the stex-core library.

use serde::Serialize;
use thiserror::Error;

/// Errors raised while extracting transactions from a document.
///
/// Variants are machine-distinguishable so callers can tell "the text did
/// not have the expected shape" ([`ExtractError::MissingSection`]) apart
/// from "the shape matched but a value is unexpectedly absent"
/// ([`ExtractError::MissingField`]). A failure is always scoped to one
/// block run; sibling blocks and other documents keep going.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractError {
    /// A required section found no match in the remaining block lines.
    #[error("required section did not match (first pattern: {pattern})")]
    MissingSection {
        /// First line pattern of the failed section.
        pattern: String,
    },

    /// A declared attribute was not bound by any pattern, or a mandatory
    /// transaction field was still empty at finalization.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A captured value could not be parsed into its target type.
    #[error("failed to parse {field}: {value:?}")]
    Parse { field: String, value: String },

    /// Arithmetic across two different currencies without a conversion.
    #[error("currency mismatch: {expected} vs {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    /// A foreign amount, rate and settlement amount that do not agree
    /// within one minor unit.
    #[error("inconsistent exchange: {foreign} x {rate} != {amount}")]
    InconsistentExchange {
        foreign: String,
        rate: String,
        amount: String,
    },

    /// A negative amount where only non-negative values are allowed.
    #[error("negative amount not allowed: {0}")]
    NegativeAmount(i64),
}

/// Result type for the stex-core library.
pub type Result<T> = std::result::Result<T, ExtractError>;
