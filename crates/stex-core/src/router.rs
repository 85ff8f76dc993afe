//! The document type router: activates rule sets against a document and
//! aggregates everything they produce.

use serde::Serialize;
use tracing::{debug, info};

use crate::context::DocumentContext;
use crate::error::ExtractError;
use crate::ruleset::RuleSet;
use crate::security::SecurityResolver;
use crate::transaction::{Finalized, TransactionItem};

/// A block run that failed, with enough context to diagnose which rule
/// did not fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub rule_set: String,
    pub block_anchor: String,
    /// Line index of the block anchor that started the failed run.
    pub line: usize,
    pub error: ExtractError,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (rule set {:?}, block {:?}, line {})",
            self.error, self.rule_set, self.block_anchor, self.line
        )
    }
}

/// One element of a document's extraction result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionOutcome {
    /// A completed transaction.
    Transaction {
        rule_set: String,
        item: TransactionItem,
    },
    /// The document matched but legitimately carries nothing to import.
    NonImportable { rule_set: String, reason: String },
    /// A block run that did not conform to its rule set.
    Rejected(Rejection),
}

impl ExtractionOutcome {
    pub fn is_transaction(&self) -> bool {
        matches!(self, ExtractionOutcome::Transaction { .. })
    }
}

/// Registry of rule sets plus the per-document extraction entry point.
///
/// The router itself is immutable during extraction; every run gets its
/// own document context, so one router can serve any number of worker
/// threads concurrently.
#[derive(Default)]
pub struct Router {
    rule_sets: Vec<RuleSet>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, rule_set: RuleSet) {
        self.rule_sets.push(rule_set);
    }

    pub fn len(&self) -> usize {
        self.rule_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_sets.is_empty()
    }

    /// Extract from one document given as lines.
    ///
    /// Every rule set whose identifying pattern matches is activated;
    /// a document matching none yields an empty result, which is not an
    /// error. A failed block run is reported as a rejection and never
    /// stops sibling blocks or rule sets.
    pub fn extract(
        &self,
        lines: &[&str],
        securities: &mut dyn SecurityResolver,
    ) -> Vec<ExtractionOutcome> {
        let mut outcomes = Vec::new();

        for rule_set in &self.rule_sets {
            if !rule_set.matches(lines) {
                continue;
            }
            info!(rule_set = rule_set.name(), "rule set activated");

            let mut document = DocumentContext::new();
            rule_set.run_prescan(lines, &mut document);

            for block in rule_set.blocks() {
                for (start, end) in block.regions(lines) {
                    debug!(
                        rule_set = rule_set.name(),
                        anchor = block.anchor_str(),
                        start,
                        end,
                        "running block"
                    );
                    match block
                        .pipeline()
                        .run(lines, start, end, &mut document, &mut *securities)
                    {
                        Ok(Finalized::Transaction(item)) => {
                            outcomes.push(ExtractionOutcome::Transaction {
                                rule_set: rule_set.name().to_string(),
                                item,
                            });
                        }
                        Ok(Finalized::NonImportable { reason }) => {
                            outcomes.push(ExtractionOutcome::NonImportable {
                                rule_set: rule_set.name().to_string(),
                                reason,
                            });
                        }
                        Err(error) => {
                            outcomes.push(ExtractionOutcome::Rejected(Rejection {
                                rule_set: rule_set.name().to_string(),
                                block_anchor: block.anchor_str().to_string(),
                                line: start,
                                error,
                            }));
                        }
                    }
                }
            }
        }

        outcomes
    }

    /// Convenience wrapper splitting a full text into lines.
    pub fn extract_text(
        &self,
        text: &str,
        securities: &mut dyn SecurityResolver,
    ) -> Vec<ExtractionOutcome> {
        let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
        self.extract(&lines, securities)
    }

    /// Extract a batch of documents, one result list per document.
    /// Failures stay scoped to their document.
    pub fn extract_batch(
        &self,
        documents: &[&str],
        securities: &mut dyn SecurityResolver,
    ) -> Vec<Vec<ExtractionOutcome>> {
        documents
            .iter()
            .map(|text| self.extract_text(text, securities))
            .collect()
    }
}
