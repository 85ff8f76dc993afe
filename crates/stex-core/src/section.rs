//! Line patterns and match steps.
//!
//! A [`Section`] is one match-and-assign unit of a pipeline: an ordered
//! list of line patterns, a declared attribute set, and an assignment
//! callback fired with the merged captures once every pattern matched.

use regex::Regex;

use crate::context::{FieldMap, StepContext};
use crate::error::{ExtractError, Result};

/// A text pattern anchored against a single line.
///
/// Named capture groups yield raw text; parsing is the callback's job.
/// A malformed pattern panics at construction - rule sets are built once
/// at startup, so this never turns into a runtime failure.
#[derive(Debug, Clone)]
pub struct LinePattern {
    regex: Regex,
    raw: String,
}

impl LinePattern {
    /// Compile a pattern, anchored to the whole line.
    pub fn new(pattern: &str) -> std::result::Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self {
            regex,
            raw: pattern.to_string(),
        })
    }

    pub(crate) fn compile(pattern: &str) -> Self {
        Self::new(pattern).unwrap_or_else(|e| panic!("invalid line pattern {pattern:?}: {e}"))
    }

    /// The pattern as written, without the added anchors.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Match one line, returning the named captures on success.
    pub fn apply(&self, line: &str) -> Option<FieldMap> {
        let caps = self.regex.captures(line)?;
        let mut fields = FieldMap::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                fields.insert(name.to_string(), m.as_str().to_string());
            }
        }
        Some(fields)
    }
}

pub(crate) type AssignFn<T> =
    Box<dyn Fn(&mut T, &mut StepContext<'_>) -> Result<()> + Send + Sync>;

/// One match step of a section pipeline.
///
/// Built fluently, mirroring how rule sets read:
/// `Section::new(&["amount", "currency"]).match_line(r"...").assign(...)`.
pub struct Section<T> {
    attributes: Vec<String>,
    patterns: Vec<LinePattern>,
    pub(crate) optional: bool,
    pub(crate) repeatable: bool,
    assign: Option<AssignFn<T>>,
}

impl<T> Section<T> {
    /// A required single section declaring the capture names its
    /// callback depends on.
    pub fn new(attributes: &[&str]) -> Self {
        Self {
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
            patterns: Vec::new(),
            optional: false,
            repeatable: false,
            assign: None,
        }
    }

    /// Add a context line that must match but captures nothing, e.g. a
    /// table header above the line carrying the values.
    pub fn find(self, pattern: &str) -> Self {
        self.match_line(pattern)
    }

    /// Add the next line pattern of this section. Patterns must match in
    /// order, each on a later line than the previous one, but need not be
    /// adjacent.
    pub fn match_line(mut self, pattern: &str) -> Self {
        self.patterns.push(LinePattern::compile(pattern));
        self
    }

    /// Failure to match skips this section instead of failing the run.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Match zero or more times; every repetition fires the callback
    /// with fresh captures. Implies optional.
    pub fn repeatable(mut self) -> Self {
        self.optional = true;
        self.repeatable = true;
        self
    }

    /// Set the assignment callback.
    pub fn assign(
        mut self,
        f: impl Fn(&mut T, &mut StepContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.assign = Some(Box::new(f));
        self
    }

    pub(crate) fn first_pattern(&self) -> &str {
        self.patterns.first().map(LinePattern::as_str).unwrap_or("")
    }

    pub(crate) fn first_match_at(&self, lines: &[&str], start: usize, end: usize) -> Option<usize> {
        let first = self.patterns.first()?;
        (start..end.min(lines.len())).find(|&i| first.is_match(lines[i]))
    }

    /// Try to satisfy every pattern in order within `[start, end)`.
    /// Returns the merged captures and the index just past the last
    /// matched line.
    pub(crate) fn attempt(
        &self,
        lines: &[&str],
        start: usize,
        end: usize,
    ) -> Option<(FieldMap, usize)> {
        if self.patterns.is_empty() {
            return None;
        }
        let mut values = FieldMap::new();
        let mut pattern_idx = 0;
        let mut line_idx = start;
        let end = end.min(lines.len());
        while line_idx < end && pattern_idx < self.patterns.len() {
            if let Some(captured) = self.patterns[pattern_idx].apply(lines[line_idx]) {
                values.extend(captured);
                pattern_idx += 1;
            }
            line_idx += 1;
        }
        (pattern_idx == self.patterns.len()).then_some((values, line_idx))
    }

    /// Every declared attribute must be bound before the callback runs.
    pub(crate) fn check_attributes(&self, values: &FieldMap) -> Result<()> {
        for attribute in &self.attributes {
            if !values.contains_key(attribute) {
                return Err(ExtractError::MissingField(attribute.clone()));
            }
        }
        Ok(())
    }

    pub(crate) fn run_assign(&self, subject: &mut T, ctx: &mut StepContext<'_>) -> Result<()> {
        match &self.assign {
            Some(assign) => assign(subject, ctx),
            None => Ok(()),
        }
    }

    pub(crate) fn missing(&self) -> ExtractError {
        ExtractError::MissingSection {
            pattern: self.first_pattern().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn patterns_are_line_anchored() {
        let pattern = LinePattern::new(r"ST (?<shares>[\d.]+(,\d+)?)").unwrap();
        assert!(pattern.is_match("ST 10"));
        assert!(!pattern.is_match("xx ST 10 yy"));
    }

    #[test]
    fn named_captures_yield_raw_text() {
        let pattern = LinePattern::new(r"Wert \d+\.\d+\.\d{4} (?<currency>\w{3}) (?<amount>[\d.]+,\d+)").unwrap();
        let fields = pattern.apply("Wert 17.01.2024 EUR 1.234,56").unwrap();
        assert_eq!(fields.get("currency").map(String::as_str), Some("EUR"));
        assert_eq!(fields.get("amount").map(String::as_str), Some("1.234,56"));
    }

    #[test]
    #[should_panic(expected = "invalid line pattern")]
    fn malformed_pattern_fails_at_construction() {
        let _: Section<()> = Section::new(&[]).match_line("(?<broken");
    }

    #[test]
    fn patterns_match_in_order_on_later_lines() {
        let section: Section<()> = Section::new(&["isin", "name"])
            .match_line(r"ISIN \(WKN\) (?<isin>\S+) \(\S+\)")
            .match_line(r"Wertpapierbezeichnung (?<name>.*)");

        let lines = [
            "Dividendengutschrift",
            "ISIN (WKN) DE0007236101 (723610)",
            "Wertpapierbezeichnung Siemens AG",
        ];
        let (values, next) = section.attempt(&lines, 0, lines.len()).unwrap();
        assert_eq!(values.get("isin").map(String::as_str), Some("DE0007236101"));
        assert_eq!(next, 3);

        // Reversed order must not match.
        let reversed = [
            "Wertpapierbezeichnung Siemens AG",
            "ISIN (WKN) DE0007236101 (723610)",
        ];
        assert!(section.attempt(&reversed, 0, reversed.len()).is_none());
    }

    #[test]
    fn non_adjacent_patterns_match() {
        let section: Section<()> = Section::new(&["shares"])
            .find("Einheit Umsatz")
            .match_line(r"ST (?<shares>[\d.]+(,\d+)?)");
        let lines = ["Einheit Umsatz", "irrelevant filler", "ST 10"];
        let (values, next) = section.attempt(&lines, 0, lines.len()).unwrap();
        assert_eq!(values.get("shares").map(String::as_str), Some("10"));
        assert_eq!(next, 3);
    }

    #[test]
    fn declared_attributes_must_be_bound() {
        let section: Section<()> = Section::new(&["amount"]).match_line(r"Total (?<total>\d+)");
        let lines = ["Total 42"];
        let (values, _) = section.attempt(&lines, 0, 1).unwrap();
        assert_eq!(
            section.check_attributes(&values),
            Err(ExtractError::MissingField("amount".to_string()))
        );
    }
}
