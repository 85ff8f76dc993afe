//! Core library for extracting financial transactions from statement text.
//!
//! This crate provides:
//! - Declarative rule sets: identifying pattern, blocks, section pipelines
//! - Line-anchored pattern matching with named captures
//! - A document router aggregating transactions, notices and rejections
//! - Fixed-point monetary arithmetic with explicit rounding and units
//!
//! Documents arrive as plain text lines; converting the original
//! statement format (PDF etc.) into lines happens upstream.

pub mod context;
pub mod error;
pub mod money;
pub mod parse;
pub mod pipeline;
pub mod router;
pub mod ruleset;
pub mod section;
pub mod security;
pub mod transaction;

pub use context::{DocumentContext, StepContext};
pub use error::{ExtractError, Result};
pub use money::{Money, Rounding, Unit, UnitKind, Units, inverse_rate};
pub use pipeline::Pipeline;
pub use router::{ExtractionOutcome, Rejection, Router};
pub use ruleset::{Block, RuleSet};
pub use section::{LinePattern, Section};
pub use security::{InMemorySecurities, SecurityHint, SecurityRef, SecurityResolver};
pub use transaction::{
    AccountEntry, AccountEntryKind, Finalized, TradeKind, TransactionItem, TransferEntry,
};
