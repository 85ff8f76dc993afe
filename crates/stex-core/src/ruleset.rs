//! Rule sets and blocks - declarative extraction configuration.
//!
//! A [`RuleSet`] is one self-contained configuration for one document
//! family: an identifying pattern, an optional pre-scan, and the ordered
//! blocks with their pipelines. Rule sets are data registered with the
//! router at startup; adding an institution never touches the engine.

use regex::Regex;

use crate::context::DocumentContext;
use crate::pipeline::{Pipeline, RunPipeline};
use crate::section::LinePattern;

pub(crate) type PrescanFn = Box<dyn Fn(&[&str], &mut DocumentContext) + Send + Sync>;

/// A repeatable text region governed by one section pipeline.
pub struct Block {
    anchor: LinePattern,
    max_lines: Option<usize>,
    pipeline: Box<dyn RunPipeline>,
}

impl Block {
    /// A block starting at every line matching `anchor`, running
    /// `pipeline` once per match.
    pub fn new<T: 'static>(anchor: &str, pipeline: Pipeline<T>) -> Self {
        Self {
            anchor: LinePattern::compile(anchor),
            max_lines: None,
            pipeline: Box::new(pipeline),
        }
    }

    /// Cap the region length, for statements where unrelated content
    /// follows close below the anchor.
    pub fn max_lines(mut self, max: usize) -> Self {
        self.max_lines = Some(max);
        self
    }

    pub fn anchor_str(&self) -> &str {
        self.anchor.as_str()
    }

    /// All regions of this block: each anchor match opens a region that
    /// ends at the next anchor match, the line cap, or the document end.
    pub(crate) fn regions(&self, lines: &[&str]) -> Vec<(usize, usize)> {
        let starts: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| self.anchor.is_match(line))
            .map(|(i, _)| i)
            .collect();

        starts
            .iter()
            .enumerate()
            .map(|(n, &start)| {
                let mut end = starts.get(n + 1).copied().unwrap_or(lines.len());
                if let Some(max) = self.max_lines {
                    end = end.min(start + max);
                }
                (start, end)
            })
            .collect()
    }

    pub(crate) fn pipeline(&self) -> &dyn RunPipeline {
        self.pipeline.as_ref()
    }
}

/// A named, self-contained extraction configuration for one document
/// family. Immutable after construction and shareable across threads.
pub struct RuleSet {
    name: String,
    ident: Regex,
    prescan: Option<PrescanFn>,
    blocks: Vec<Block>,
}

impl RuleSet {
    /// Create a rule set activated when `ident_pattern` matches anywhere
    /// in a document. Panics on a malformed pattern.
    pub fn new(name: impl Into<String>, ident_pattern: &str) -> Self {
        let ident = Regex::new(ident_pattern)
            .unwrap_or_else(|e| panic!("invalid identifying pattern {ident_pattern:?}: {e}"));
        Self {
            name: name.into(),
            ident,
            prescan: None,
            blocks: Vec::new(),
        }
    }

    /// Inspect all lines before extraction to seed the document context,
    /// e.g. detecting a joint-account marker that later tax sections
    /// check.
    pub fn prescan(
        mut self,
        f: impl Fn(&[&str], &mut DocumentContext) + Send + Sync + 'static,
    ) -> Self {
        self.prescan = Some(Box::new(f));
        self
    }

    /// Register the next block.
    pub fn block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this rule set applies to the document.
    pub fn matches(&self, lines: &[&str]) -> bool {
        lines.iter().any(|line| self.ident.is_match(line))
    }

    pub(crate) fn run_prescan(&self, lines: &[&str], document: &mut DocumentContext) {
        if let Some(prescan) = &self.prescan {
            prescan(lines, document);
        }
    }

    pub(crate) fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{AccountEntry, AccountEntryKind, Finalized};
    use pretty_assertions::assert_eq;

    fn noop_block(anchor: &str) -> Block {
        Block::new(
            anchor,
            Pipeline::new(|| AccountEntry::new(AccountEntryKind::Dividend))
                .wrap(|t| Ok(Finalized::account(t))),
        )
    }

    #[test]
    fn regions_split_at_repeated_anchors() {
        let block = noop_block("Dividendengutschrift.*");
        let lines = [
            "Dividendengutschrift",
            "line a",
            "line b",
            "Dividendengutschrift",
            "line c",
        ];
        assert_eq!(block.regions(&lines), vec![(0, 3), (3, 5)]);
    }

    #[test]
    fn regions_respect_the_line_cap() {
        let block = noop_block("Vorabpauschale").max_lines(2);
        let lines = ["Vorabpauschale", "a", "b", "c"];
        assert_eq!(block.regions(&lines), vec![(0, 2)]);
    }

    #[test]
    fn no_anchor_means_no_regions() {
        let block = noop_block("KAUF AM .*");
        assert_eq!(block.regions(&["nothing here"]), Vec::<(usize, usize)>::new());
    }

    #[test]
    fn identifying_pattern_matches_anywhere_in_a_line() {
        let rules = RuleSet::new("test", "Wertpapierabrechnung (Kauf|Bezug)");
        assert!(rules.matches(&["x", "Wertpapierabrechnung Kauf vom 17.01.2024"]));
        assert!(!rules.matches(&["Kontoauszug"]));
    }
}
