//! Extraction contexts: per-document state and the per-step view handed
//! to assignment callbacks.
//!
//! Shared state is always passed explicitly through these types so that
//! independent documents can be processed on independent threads without
//! any ambient state.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::error::{ExtractError, Result};
use crate::money::Money;
use crate::parse;
use crate::security::{SecurityHint, SecurityRef, SecurityResolver};

/// Field name -> captured text, for one block run or one repetition of a
/// repeatable section.
pub(crate) type FieldMap = BTreeMap<String, String>;

/// Per-document key/value state, created fresh for each document and
/// shared across all block runs of one rule set.
///
/// Typical entries: a detected exchange rate, an execution time parsed in
/// an earlier block, a joint-account marker set by the pre-scan.
#[derive(Debug, Default)]
pub struct DocumentContext {
    entries: BTreeMap<String, String>,
}

impl DocumentContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Boolean flag, absent keys read as false.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    pub fn set_flag(&mut self, key: impl Into<String>, value: bool) {
        self.put(key, if value { "true" } else { "false" });
    }

    /// Parse a stored exchange rate.
    pub fn rate(&self, key: &str) -> Result<Decimal> {
        let value = self
            .get(key)
            .ok_or_else(|| ExtractError::MissingField(key.to_string()))?;
        parse::parse_rate(key, value)
    }
}

/// The view one assignment callback gets: captured fields of its section,
/// the document context, and the security resolver.
pub struct StepContext<'a> {
    values: &'a mut FieldMap,
    document: &'a mut DocumentContext,
    securities: &'a mut dyn SecurityResolver,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        values: &'a mut FieldMap,
        document: &'a mut DocumentContext,
        securities: &'a mut dyn SecurityResolver,
    ) -> Self {
        Self {
            values,
            document,
            securities,
        }
    }

    /// Captured text for a field, falling back to the document context.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .or_else(|| self.document.get(name))
    }

    /// Like [`StepContext::get`], but a missing field is an error.
    pub fn require(&self, name: &str) -> Result<String> {
        self.get(name)
            .map(str::to_string)
            .ok_or_else(|| ExtractError::MissingField(name.to_string()))
    }

    /// Overwrite a captured value, e.g. to fold a continuation line into
    /// a security name before resolving it.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Captured amount in minor units.
    pub fn amount(&self, name: &str) -> Result<i64> {
        parse::parse_amount(name, &self.require(name)?)
    }

    /// Captured amount plus currency code as one [`Money`] value.
    pub fn money(&self, amount_name: &str, currency_name: &str) -> Result<Money> {
        let currency = self.currency(currency_name)?;
        let amount = self.amount(amount_name)?;
        Ok(Money::of(currency, amount))
    }

    /// Captured share quantity.
    pub fn shares(&self, name: &str) -> Result<Decimal> {
        parse::parse_shares(name, &self.require(name)?)
    }

    /// Captured exchange rate.
    pub fn rate(&self, name: &str) -> Result<Decimal> {
        parse::parse_rate(name, &self.require(name)?)
    }

    /// Captured date, at midnight unless a `time` field (or document
    /// context entry) is present as well.
    pub fn date(&self, name: &str) -> Result<NaiveDateTime> {
        parse::parse_date_time(name, &self.require(name)?, self.get("time"))
    }

    /// Captured currency code.
    pub fn currency(&self, name: &str) -> Result<String> {
        parse::parse_currency(name, &self.require(name)?)
    }

    /// The per-document context.
    pub fn document(&mut self) -> &mut DocumentContext {
        self.document
    }

    /// Read-only access to the per-document context.
    pub fn document_ref(&self) -> &DocumentContext {
        self.document
    }

    /// Resolve the security identified by the conventional capture names
    /// `name`, `isin`, `wkn`, `ticker` and `currency`.
    pub fn resolve_security(&mut self) -> Result<SecurityRef> {
        let hint = SecurityHint {
            name: self.get("name").map(str::to_string),
            isin: self.get("isin").map(str::to_string),
            wkn: self.get("wkn").map(str::to_string),
            ticker: self.get("ticker").map(str::to_string),
            currency: self.get("currency").map(str::to_string),
        };
        if hint.is_empty() {
            return Err(ExtractError::MissingField("security".to_string()));
        }
        Ok(self.securities.lookup_or_create(&hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::InMemorySecurities;
    use pretty_assertions::assert_eq;

    #[test]
    fn block_captures_shadow_document_context() {
        let mut values = FieldMap::new();
        values.insert("rate".to_string(), "1,1000".to_string());
        let mut document = DocumentContext::new();
        document.put("rate", "2,0000");
        document.put("time", "12:30:00");
        let mut securities = InMemorySecurities::new();

        let ctx = StepContext::new(&mut values, &mut document, &mut securities);
        assert_eq!(ctx.get("rate"), Some("1,1000"));
        assert_eq!(ctx.get("time"), Some("12:30:00"));
        assert_eq!(ctx.get("missing"), None);
    }

    #[test]
    fn typed_getters_parse_captures() {
        let mut values = FieldMap::new();
        values.insert("amount".to_string(), "1.234,56".to_string());
        values.insert("currency".to_string(), "EUR".to_string());
        values.insert("date".to_string(), "17.01.2024".to_string());
        let mut document = DocumentContext::new();
        let mut securities = InMemorySecurities::new();

        let ctx = StepContext::new(&mut values, &mut document, &mut securities);
        assert_eq!(
            ctx.money("amount", "currency").unwrap(),
            Money::of("EUR", 123456)
        );
        assert_eq!(ctx.date("date").unwrap().time(), chrono::NaiveTime::MIN);
    }

    #[test]
    fn missing_field_is_an_error() {
        let mut values = FieldMap::new();
        let mut document = DocumentContext::new();
        let mut securities = InMemorySecurities::new();
        let ctx = StepContext::new(&mut values, &mut document, &mut securities);
        assert_eq!(
            ctx.require("amount"),
            Err(ExtractError::MissingField("amount".to_string()))
        );
    }

    #[test]
    fn document_flags() {
        let mut document = DocumentContext::new();
        assert!(!document.flag("joint_account"));
        document.set_flag("joint_account", true);
        assert!(document.flag("joint_account"));
    }
}
