//! In-progress and finalized transaction records.
//!
//! A pipeline's subject is either a [`TransferEntry`] (paired security
//! and cash movement, buys/sells) or an [`AccountEntry`] (single
//! cash-affecting event, dividends/interest/taxes). Assignment callbacks
//! accumulate fields and units; the wrap step validates and produces a
//! [`Finalized`] value.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};
use crate::money::{Money, Unit, UnitKind, Units};
use crate::security::SecurityRef;

/// Direction of a transfer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    Buy,
    Sell,
}

/// Kind of a single cash-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountEntryKind {
    Dividend,
    Interest,
    Taxes,
    TaxRefund,
    Fees,
}

/// A paired security movement and cash movement in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEntry {
    pub kind: TradeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    pub units: Units,
}

impl TransferEntry {
    pub fn new(kind: TradeKind) -> Self {
        Self {
            kind,
            security: None,
            shares: None,
            date: None,
            currency: None,
            amount: None,
            units: Units::new(),
        }
    }

    pub fn set_money(&mut self, money: Money) {
        self.currency = Some(money.currency().to_string());
        self.amount = Some(money.amount());
    }

    /// Principal amount with currency; both must be set by now.
    pub fn money(&self) -> Result<Money> {
        money_of(&self.currency, self.amount)
    }

    pub fn add_unit(&mut self, unit: Unit) {
        self.units.push(unit);
    }

    /// Sum of attached units of one kind, in the transaction currency.
    pub fn unit_total(&self, kind: UnitKind) -> Result<Money> {
        let currency = require_currency(&self.currency)?;
        self.units.total(kind, currency)
    }
}

/// A single cash-affecting event in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub kind: AccountEntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    pub units: Units,
}

impl AccountEntry {
    pub fn new(kind: AccountEntryKind) -> Self {
        Self {
            kind,
            security: None,
            shares: None,
            date: None,
            currency: None,
            amount: None,
            units: Units::new(),
        }
    }

    pub fn set_money(&mut self, money: Money) {
        self.currency = Some(money.currency().to_string());
        self.amount = Some(money.amount());
    }

    pub fn money(&self) -> Result<Money> {
        money_of(&self.currency, self.amount)
    }

    pub fn add_unit(&mut self, unit: Unit) {
        self.units.push(unit);
    }

    pub fn unit_total(&self, kind: UnitKind) -> Result<Money> {
        let currency = require_currency(&self.currency)?;
        self.units.total(kind, currency)
    }

    /// Replace the accumulated state with a tax-only entry whose amount
    /// is the sum of the attached tax units. Used when the settlement
    /// total is negative, i.e. the taxes exceeded the distribution.
    pub fn into_tax_only(&mut self) -> Result<()> {
        let taxes = self.unit_total(UnitKind::Tax)?;
        self.kind = AccountEntryKind::Taxes;
        self.units.clear();
        self.set_money(taxes);
        Ok(())
    }
}

fn money_of(currency: &Option<String>, amount: Option<i64>) -> Result<Money> {
    let currency = require_currency(currency)?;
    let amount = amount.ok_or_else(|| ExtractError::MissingField("amount".to_string()))?;
    Ok(Money::of(currency, amount))
}

fn require_currency(currency: &Option<String>) -> Result<&str> {
    currency
        .as_deref()
        .ok_or_else(|| ExtractError::MissingField("currency".to_string()))
}

/// A finalized transaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionItem {
    Transfer(TransferEntry),
    Account(AccountEntry),
}

impl TransactionItem {
    /// Settlement date, for whichever entry shape this is.
    pub fn date(&self) -> Option<NaiveDateTime> {
        match self {
            TransactionItem::Transfer(t) => t.date,
            TransactionItem::Account(t) => t.date,
        }
    }

    pub fn money(&self) -> Result<Money> {
        match self {
            TransactionItem::Transfer(t) => t.money(),
            TransactionItem::Account(t) => t.money(),
        }
    }
}

/// Outcome of a wrap step: a usable item, or a legitimate "nothing to
/// import here" notice. Structural failures are `Err(ExtractError)`
/// instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Finalized {
    Transaction(TransactionItem),
    NonImportable { reason: String },
}

impl Finalized {
    pub fn transfer(entry: TransferEntry) -> Self {
        Finalized::Transaction(TransactionItem::Transfer(entry))
    }

    pub fn account(entry: AccountEntry) -> Self {
        Finalized::Transaction(TransactionItem::Account(entry))
    }

    pub fn non_importable(reason: impl Into<String>) -> Self {
        Finalized::NonImportable {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn money_requires_currency_and_amount() {
        let mut entry = TransferEntry::new(TradeKind::Buy);
        assert_eq!(
            entry.money(),
            Err(ExtractError::MissingField("currency".to_string()))
        );
        entry.set_money(Money::of("EUR", 123456));
        assert_eq!(entry.money().unwrap(), Money::of("EUR", 123456));
    }

    #[test]
    fn transaction_items_serialize_with_a_type_tag() {
        let mut entry = AccountEntry::new(AccountEntryKind::Dividend);
        entry.set_money(Money::of("EUR", 10000));
        let json = serde_json::to_value(TransactionItem::Account(entry)).unwrap();
        assert_eq!(json["type"], "account");
        assert_eq!(json["kind"], "dividend");
        assert_eq!(json["currency"], "EUR");
        assert_eq!(json["amount"], 10000);
    }

    #[test]
    fn tax_only_conversion_uses_unit_sum() {
        let mut entry = AccountEntry::new(AccountEntryKind::Dividend);
        entry.set_money(Money::of("EUR", 500));
        entry.add_unit(Unit::new(UnitKind::Tax, Money::of("EUR", 400)).unwrap());
        entry.add_unit(Unit::new(UnitKind::Tax, Money::of("EUR", 100)).unwrap());

        entry.into_tax_only().unwrap();

        assert_eq!(entry.kind, AccountEntryKind::Taxes);
        assert!(entry.units.is_empty());
        assert_eq!(entry.money().unwrap(), Money::of("EUR", 500));
    }
}
