//! Security resolution - the one collaborator interface the engine consumes.
//!
//! The engine only needs "given the captured name/identifier/currency
//! fields, hand me a reference to an existing or newly registered
//! instrument". Everything behind that is the host application's concern.

use serde::{Deserialize, Serialize};

/// Captured fields identifying a financial instrument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityHint {
    pub name: Option<String>,
    pub isin: Option<String>,
    pub wkn: Option<String>,
    pub ticker: Option<String>,
    pub currency: Option<String>,
}

impl SecurityHint {
    /// True if no identifying field is set at all.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.isin.is_none() && self.wkn.is_none() && self.ticker.is_none()
    }
}

/// Lightweight reference to a resolved instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRef {
    pub id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wkn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Lookup-or-create capability supplied by the caller.
pub trait SecurityResolver {
    fn lookup_or_create(&mut self, hint: &SecurityHint) -> SecurityRef;
}

/// Simple resolver backed by a vector, for tests and the CLI.
///
/// Matches by ISIN first, then WKN, then exact name; otherwise registers
/// a new instrument.
#[derive(Debug, Default)]
pub struct InMemorySecurities {
    securities: Vec<SecurityRef>,
}

impl InMemorySecurities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[SecurityRef] {
        &self.securities
    }
}

impl SecurityResolver for InMemorySecurities {
    fn lookup_or_create(&mut self, hint: &SecurityHint) -> SecurityRef {
        let found = self.securities.iter().find(|s| {
            (hint.isin.is_some() && s.isin == hint.isin)
                || (hint.wkn.is_some() && s.wkn == hint.wkn)
                || (hint.name.is_some() && hint.name.as_deref() == Some(s.name.as_str()))
        });
        if let Some(found) = found {
            return found.clone();
        }

        let created = SecurityRef {
            id: self.securities.len() as u64 + 1,
            name: hint
                .name
                .clone()
                .or_else(|| hint.isin.clone())
                .or_else(|| hint.wkn.clone())
                .unwrap_or_default(),
            isin: hint.isin.clone(),
            wkn: hint.wkn.clone(),
            currency: hint.currency.clone(),
        };
        self.securities.push(created.clone());
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hint(isin: &str, name: &str) -> SecurityHint {
        SecurityHint {
            name: Some(name.to_string()),
            isin: Some(isin.to_string()),
            ..SecurityHint::default()
        }
    }

    #[test]
    fn creates_then_finds_by_isin() {
        let mut resolver = InMemorySecurities::new();
        let first = resolver.lookup_or_create(&hint("DE0007236101", "Siemens AG"));
        let second = resolver.lookup_or_create(&hint("DE0007236101", "SIEMENS"));
        assert_eq!(first.id, second.id);
        assert_eq!(resolver.all().len(), 1);
    }

    #[test]
    fn different_isins_create_distinct_securities() {
        let mut resolver = InMemorySecurities::new();
        let a = resolver.lookup_or_create(&hint("DE0007236101", "Siemens AG"));
        let b = resolver.lookup_or_create(&hint("US0378331005", "Apple Inc."));
        assert_ne!(a.id, b.id);
    }
}
