//! The section pipeline: subject / assign / wrap over an ordered list of
//! match steps.
//!
//! Matching is single-pass and deterministic: steps are attempted in
//! declaration order against an advancing line index, first match wins
//! inside alternative groups, and there is no backtracking across steps.
//! That keeps a block run linear in its line count even when a document
//! satisfies several loosely-specified patterns.

use tracing::{debug, trace};

use crate::context::{DocumentContext, StepContext};
use crate::error::Result;
use crate::section::Section;
use crate::security::SecurityResolver;
use crate::transaction::Finalized;

type SubjectFn<T> = Box<dyn Fn() -> T + Send + Sync>;
type WrapFn<T> = Box<dyn Fn(T) -> Result<Finalized> + Send + Sync>;

enum Step<T> {
    Single(Section<T>),
    /// "One of N": members tried in listed order, the first whose full
    /// pattern sequence matches is executed, the rest are not attempted.
    OneOf {
        members: Vec<Section<T>>,
        optional: bool,
    },
}

/// An ordered composition of match steps producing one transaction per
/// block run.
pub struct Pipeline<T> {
    subject: SubjectFn<T>,
    steps: Vec<Step<T>>,
    wrap: Option<WrapFn<T>>,
}

impl<T> Pipeline<T> {
    /// Start a pipeline; `subject` creates the fresh in-progress
    /// transaction for every run.
    pub fn new(subject: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            subject: Box::new(subject),
            steps: Vec::new(),
            wrap: None,
        }
    }

    /// Append a match step.
    pub fn section(mut self, section: Section<T>) -> Self {
        self.steps.push(Step::Single(section));
        self
    }

    /// Append a required alternative group.
    pub fn one_of(mut self, members: Vec<Section<T>>) -> Self {
        self.steps.push(Step::OneOf {
            members,
            optional: false,
        });
        self
    }

    /// Append an alternative group that is silently skipped when no
    /// member matches.
    pub fn one_of_optional(mut self, members: Vec<Section<T>>) -> Self {
        self.steps.push(Step::OneOf {
            members,
            optional: true,
        });
        self
    }

    /// Set the finalization step. Wrap is pure validation of the
    /// accumulated subject; it must not match any further text.
    pub fn wrap(mut self, f: impl Fn(T) -> Result<Finalized> + Send + Sync + 'static) -> Self {
        self.wrap = Some(Box::new(f));
        self
    }

    /// Earliest line where a later required step could start, bounding
    /// how far a repeatable section may scan.
    fn next_required_bound(&self, from: usize, lines: &[&str], start: usize, end: usize) -> usize {
        for step in &self.steps[from..] {
            let candidates: Vec<&Section<T>> = match step {
                Step::Single(section) if !section.optional => vec![section],
                Step::OneOf {
                    members,
                    optional: false,
                } => members.iter().collect(),
                _ => continue,
            };
            let earliest = candidates
                .iter()
                .filter_map(|s| s.first_match_at(lines, start, end))
                .min();
            return earliest.unwrap_or(end);
        }
        end
    }
}

/// Type-erased pipeline execution, so blocks of different subject types
/// coexist within one rule set.
pub(crate) trait RunPipeline: Send + Sync {
    fn run(
        &self,
        lines: &[&str],
        start: usize,
        end: usize,
        document: &mut DocumentContext,
        securities: &mut dyn SecurityResolver,
    ) -> Result<Finalized>;
}

impl<T: 'static> RunPipeline for Pipeline<T> {
    fn run(
        &self,
        lines: &[&str],
        start: usize,
        end: usize,
        document: &mut DocumentContext,
        securities: &mut dyn SecurityResolver,
    ) -> Result<Finalized> {
        let Some(wrap) = self.wrap.as_ref() else {
            panic!("pipeline has no wrap step");
        };

        let mut subject = (self.subject)();
        let mut pos = start;

        for (idx, step) in self.steps.iter().enumerate() {
            match step {
                Step::Single(section) if section.repeatable => {
                    let bound = self.next_required_bound(idx + 1, lines, pos, end);
                    while let Some((mut values, next)) = section.attempt(lines, pos, bound) {
                        if section.check_attributes(&values).is_err() {
                            break;
                        }
                        trace!(line = next, "repeatable section matched");
                        let mut ctx = StepContext::new(&mut values, document, &mut *securities);
                        section.run_assign(&mut subject, &mut ctx)?;
                        pos = next;
                    }
                }
                Step::Single(section) => match section.attempt(lines, pos, end) {
                    Some((mut values, next)) => {
                        if let Err(missing) = section.check_attributes(&values) {
                            if section.optional {
                                continue;
                            }
                            return Err(missing);
                        }
                        let mut ctx = StepContext::new(&mut values, document, &mut *securities);
                        section.run_assign(&mut subject, &mut ctx)?;
                        pos = next;
                    }
                    None => {
                        if !section.optional {
                            debug!(
                                pattern = section.first_pattern(),
                                "required section did not match"
                            );
                            return Err(section.missing());
                        }
                    }
                },
                Step::OneOf { members, optional } => {
                    let mut matched = false;
                    for member in members {
                        if let Some((mut values, next)) = member.attempt(lines, pos, end) {
                            // A member whose line matched but left an
                            // attribute unbound does not claim the
                            // group; the next member gets its turn.
                            if member.check_attributes(&values).is_err() {
                                continue;
                            }
                            let mut ctx = StepContext::new(&mut values, document, &mut *securities);
                            member.run_assign(&mut subject, &mut ctx)?;
                            pos = next;
                            matched = true;
                            break;
                        }
                    }
                    if !matched && !optional {
                        let first = members.first().map(|m| m.missing());
                        return Err(first.unwrap_or_else(|| {
                            crate::error::ExtractError::MissingSection {
                                pattern: String::new(),
                            }
                        }));
                    }
                }
            }
        }

        wrap(subject)
    }
}
