//! Bundled rule sets for German direct-bank statements.
//!
//! Three document families: purchase confirmations, sale confirmations
//! and distribution notices. Together they exercise the whole rule
//! surface: alternative execution-date lines, repeatable tax sections,
//! foreign-currency gross amounts and a pre-scanned trade time.

use lazy_static::lazy_static;
use regex::Regex;

use stex_core::{
    AccountEntry, AccountEntryKind, Block, DocumentContext, ExtractError, Finalized, Pipeline,
    Router, RuleSet, Section, TradeKind, TransferEntry, Unit, UnitKind, inverse_rate,
};

lazy_static! {
    /// Trade time printed in the page header, outside any block region.
    static ref TRADE_TIME: Regex = Regex::new(r"Handelszeit (?<time>\d{2}:\d{2})(?: Uhr)?").unwrap();
}

/// All bundled rule sets, registered on a fresh router.
pub fn bundled() -> Router {
    let mut router = Router::new();
    router.register(purchase());
    router.register(sale());
    router.register(distribution());
    router
}

/// Purchase and subscription confirmations.
pub fn purchase() -> RuleSet {
    let pipeline = Pipeline::new(|| TransferEntry::new(TradeKind::Buy))
        .section(security_section())
        .section(shares_section())
        .one_of(execution_sections())
        .section(fee_section("Provision"))
        .section(fee_section("Handelsplatzgebühr"))
        .section(total_section())
        .wrap(trade_wrap);

    RuleSet::new("direktbank-kauf", r"Wertpapierabrechnung (Kauf|Bezug)")
        .prescan(trade_time_prescan)
        .block(Block::new(r"Wertpapierabrechnung (Kauf|Bezug).*", pipeline))
}

/// Sale confirmations, with tax lines between price and settlement total.
pub fn sale() -> RuleSet {
    let pipeline = Pipeline::new(|| TransferEntry::new(TradeKind::Sell))
        .section(security_section())
        .section(shares_section())
        .one_of(execution_sections())
        .section(tax_section())
        .section(total_section())
        .wrap(trade_wrap);

    RuleSet::new("direktbank-verkauf", r"Wertpapierabrechnung Verkauf")
        .prescan(trade_time_prescan)
        .block(Block::new(r"Wertpapierabrechnung Verkauf.*", pipeline))
}

/// Dividend and fund distribution notices.
///
/// Foreign distributions show the gross amount in the security currency
/// followed by the conversion line; the stored rate converts settled to
/// foreign, so the attached unit carries its inverse.
pub fn distribution() -> RuleSet {
    let pipeline = Pipeline::new(|| AccountEntry::new(AccountEntryKind::Dividend))
        .section(
            Section::new(&["isin", "wkn", "name"])
                .match_line(r"ISIN \(WKN\) (?<isin>\S+) \((?<wkn>\S+)\)")
                .match_line(r"Wertpapierbezeichnung (?<name>.*)")
                .assign(|t: &mut AccountEntry, v| {
                    t.security = Some(v.resolve_security()?);
                    Ok(())
                }),
        )
        .section(
            Section::new(&["shares"])
                .optional()
                .match_line(r"Nominale (?<shares>[\d.]+(?:,\d+)?) (?:Stück|\w{3})")
                .assign(|t: &mut AccountEntry, v| {
                    t.shares = Some(v.shares("shares")?);
                    Ok(())
                }),
        )
        .section(
            Section::new(&["amount", "currency"])
                .match_line(r"Brutto (?<currency>\w{3}) (?<amount>[\d.]+,\d+)")
                .assign(|t: &mut AccountEntry, v| {
                    t.set_money(v.money("amount", "currency")?);
                    Ok(())
                }),
        )
        .section(
            Section::new(&["fxrate", "currency", "fxamount"])
                .optional()
                .match_line(
                    r"Umg\. z\. Dev\.-Kurs \((?<fxrate>[\d.]+,\d+)\) (?<currency>\w{3}) (?<fxamount>[\d.]+,\d+)",
                )
                .assign(|t: &mut AccountEntry, v| {
                    let rate = v.rate("fxrate")?;
                    v.document().put("exchange_rate", rate.to_string());

                    let foreign = t.money()?;
                    let settled = v.money("fxamount", "currency")?;
                    t.set_money(settled.clone());
                    t.add_unit(Unit::with_foreign(
                        UnitKind::GrossValue,
                        settled,
                        foreign,
                        inverse_rate(rate),
                    )?);
                    Ok(())
                }),
        )
        .section(
            Section::new(&["tax", "currency"])
                .repeatable()
                .match_line(
                    r"(?:Kapitalertragsteuer|Solidaritätszuschlag|Kirchensteuer|QuSt)(?: anteilig)? [\d,]+\s?% (?<currency>\w{3}) (?<tax>[\d.]+,\d+)",
                )
                .assign(|t: &mut AccountEntry, v| {
                    t.add_unit(Unit::new(UnitKind::Tax, v.money("tax", "currency")?)?);
                    Ok(())
                }),
        )
        .section(
            Section::new(&["date"])
                .match_line(r"(?:Zahltag|Valuta) (?<date>\d{2}\.\d{2}\.\d{4})")
                .assign(|t: &mut AccountEntry, v| {
                    t.date = Some(v.date("date")?);
                    Ok(())
                }),
        )
        .section(
            Section::new(&["total"])
                .match_line(
                    r"Gesamtbetrag (?:zur Zahlung|zu Ihren (?:Gunsten|Lasten)) \w{3} (?<total>-?[\d.]+,\d+)",
                )
                .assign(|t: &mut AccountEntry, v| {
                    // Taxes exceeding the distribution settle as a debit;
                    // the entry then books the taxes alone.
                    if v.require("total")?.starts_with('-') {
                        t.into_tax_only()?;
                    }
                    Ok(())
                }),
        )
        .wrap(|t| {
            if t.date.is_none() {
                return Err(ExtractError::MissingField("date".to_string()));
            }
            if t.amount == Some(0) {
                return Ok(Finalized::non_importable("zero-amount distribution notice"));
            }
            Ok(Finalized::account(t))
        });

    RuleSet::new(
        "direktbank-ertrag",
        r"(Dividendengutschrift|Ertragsgutschrift)",
    )
    .block(Block::new(
        r"(Dividendengutschrift|Ertragsgutschrift).*",
        pipeline,
    ))
}

fn security_section() -> Section<TransferEntry> {
    Section::new(&["isin", "wkn", "name"])
        .match_line(r"ISIN \(WKN\) (?<isin>\S+) \((?<wkn>\S+)\)")
        .match_line(r"Wertpapierbezeichnung (?<name>.*)")
        .assign(|t: &mut TransferEntry, v| {
            t.security = Some(v.resolve_security()?);
            Ok(())
        })
}

fn shares_section() -> Section<TransferEntry> {
    Section::new(&["shares"])
        .match_line(r"Nominale(?: / Stück)? (?<shares>[\d.]+(?:,\d+)?) (?:Stück|St\.)")
        .assign(|t: &mut TransferEntry, v| {
            t.shares = Some(v.shares("shares")?);
            Ok(())
        })
}

/// Execution day variants: with an exact time, or date only. The
/// date-only form still picks up a pre-scanned trade time from the
/// document context.
fn execution_sections() -> Vec<Section<TransferEntry>> {
    vec![
        Section::new(&["date", "time"])
            .match_line(
                r"(?:Ausführungstag|Schlusstag) / -zeit (?<date>\d{2}\.\d{2}\.\d{4}) um (?<time>\d{2}:\d{2}:\d{2}) Uhr",
            )
            .assign(|t: &mut TransferEntry, v| {
                t.date = Some(v.date("date")?);
                Ok(())
            }),
        Section::new(&["date"])
            .match_line(r"(?:Ausführungstag|Schlusstag) (?<date>\d{2}\.\d{2}\.\d{4})")
            .assign(|t: &mut TransferEntry, v| {
                t.date = Some(v.date("date")?);
                Ok(())
            }),
    ]
}

fn fee_section(label: &str) -> Section<TransferEntry> {
    Section::new(&["fee", "currency"])
        .optional()
        .match_line(&format!(r"{label} (?<currency>\w{{3}}) (?<fee>[\d.]+,\d+)"))
        .assign(|t: &mut TransferEntry, v| {
            t.add_unit(Unit::new(UnitKind::Fee, v.money("fee", "currency")?)?);
            Ok(())
        })
}

fn tax_section() -> Section<TransferEntry> {
    Section::new(&["tax", "currency"])
        .repeatable()
        .match_line(
            r"(?:Kapitalertragsteuer|Solidaritätszuschlag|Kirchensteuer)(?: anteilig)? [\d,]+\s?% (?<currency>\w{3}) (?<tax>[\d.]+,\d+)",
        )
        .assign(|t: &mut TransferEntry, v| {
            t.add_unit(Unit::new(UnitKind::Tax, v.money("tax", "currency")?)?);
            Ok(())
        })
}

fn total_section() -> Section<TransferEntry> {
    Section::new(&["amount", "currency"])
        .match_line(
            r"Endbetrag(?: zu Ihren (?:Gunsten|Lasten))? (?<currency>\w{3}) (?<amount>-?[\d.]+,\d+)",
        )
        .assign(|t: &mut TransferEntry, v| {
            t.set_money(v.money("amount", "currency")?);
            Ok(())
        })
}

fn trade_wrap(entry: TransferEntry) -> stex_core::Result<Finalized> {
    if entry.date.is_none() {
        return Err(ExtractError::MissingField("date".to_string()));
    }
    Ok(Finalized::transfer(entry))
}

fn trade_time_prescan(lines: &[&str], document: &mut DocumentContext) {
    for line in lines {
        if let Some(caps) = TRADE_TIME.captures(line) {
            document.put("time", &caps["time"]);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use stex_core::{ExtractionOutcome, InMemorySecurities, Money, TransactionItem};

    fn single_transaction(outcomes: Vec<ExtractionOutcome>) -> TransactionItem {
        assert_eq!(outcomes.len(), 1, "expected one outcome: {outcomes:?}");
        match outcomes.into_iter().next().unwrap() {
            ExtractionOutcome::Transaction { item, .. } => item,
            other => panic!("expected a transaction, got {other:?}"),
        }
    }

    #[test]
    fn purchase_with_prescanned_trade_time() {
        let text = "\
Wertpapierabrechnung Kauf
Handelszeit 16:38 Uhr
ISIN (WKN) DE0002635307 (263530)
Wertpapierbezeichnung iSh.STOXX Europe 600 U.ETF DE
Nominale 14,00 Stück
Kurs EUR 37,30
Ausführungstag 17.11.2015
Kurswert EUR 522,20
Provision EUR 9,90
Handelsplatzgebühr EUR 1,75
Endbetrag EUR 533,85
";
        let mut securities = InMemorySecurities::new();
        let item = single_transaction(bundled().extract_text(text, &mut securities));

        let TransactionItem::Transfer(entry) = item else {
            panic!("expected a transfer entry");
        };
        assert_eq!(entry.kind, TradeKind::Buy);
        assert_eq!(entry.shares, Some(Decimal::from(14)));
        assert_eq!(entry.money().unwrap(), Money::of("EUR", 53385));
        assert_eq!(entry.unit_total(UnitKind::Fee).unwrap(), Money::of("EUR", 1165));
        // Date-only execution line plus the pre-scanned header time.
        let date = entry.date.unwrap();
        assert_eq!(date.format("%Y-%m-%d %H:%M").to_string(), "2015-11-17 16:38");
    }

    #[test]
    fn sale_collects_every_tax_line() {
        let text = "\
Wertpapierabrechnung Verkauf
ISIN (WKN) DE0002635307 (263530)
Wertpapierbezeichnung iSh.STOXX Europe 600 U.ETF DE
Nominale 51,00 Stück
Schlusstag / -zeit 20.03.2017 um 20:02:27 Uhr
Kurswert EUR 1.887,64
Kapitalertragsteuer 25,00 % EUR 97,47
Solidaritätszuschlag 5,50 % EUR 5,36
Kirchensteuer 8,00 % EUR 7,80
Endbetrag zu Ihren Gunsten EUR 1.776,91
";
        let mut securities = InMemorySecurities::new();
        let item = single_transaction(bundled().extract_text(text, &mut securities));

        let TransactionItem::Transfer(entry) = item else {
            panic!("expected a transfer entry");
        };
        assert_eq!(entry.kind, TradeKind::Sell);
        assert_eq!(entry.units.len(), 3);
        assert_eq!(entry.unit_total(UnitKind::Tax).unwrap(), Money::of("EUR", 11063));
        assert_eq!(entry.money().unwrap(), Money::of("EUR", 177691));
        assert_eq!(entry.date.unwrap().format("%H:%M:%S").to_string(), "20:02:27");
    }

    #[test]
    fn foreign_distribution_carries_a_gross_value_unit() {
        let text = "\
Ertragsgutschrift
ISIN (WKN) US0378331005 (865985)
Wertpapierbezeichnung Apple Inc.
Nominale 66,00 Stück
Brutto USD 34,32
Umg. z. Dev.-Kurs (1,091800) EUR 31,43
Kapitalertragsteuer 25,00 % EUR 7,86
Zahltag 15.02.2016
Gesamtbetrag zur Zahlung EUR 23,57
";
        let mut securities = InMemorySecurities::new();
        let item = single_transaction(bundled().extract_text(text, &mut securities));

        let TransactionItem::Account(entry) = item else {
            panic!("expected an account entry");
        };
        assert_eq!(entry.kind, AccountEntryKind::Dividend);
        assert_eq!(entry.money().unwrap(), Money::of("EUR", 3143));
        let gross = entry.units.first(UnitKind::GrossValue).unwrap();
        assert_eq!(gross.amount(), &Money::of("EUR", 3143));
        assert_eq!(gross.foreign(), Some(&Money::of("USD", 3432)));
        assert_eq!(entry.unit_total(UnitKind::Tax).unwrap(), Money::of("EUR", 786));
    }

    #[test]
    fn zero_amount_distribution_is_not_importable() {
        let text = "\
Ertragsgutschrift
ISIN (WKN) DE000A0F5UF5 (A0F5UF)
Wertpapierbezeichnung iShares NASDAQ-100 UCITS ETF
Nominale 100,00 Stück
Brutto EUR 0,00
Zahltag 15.03.2024
Gesamtbetrag zur Zahlung EUR 0,00
";
        let mut securities = InMemorySecurities::new();
        let outcomes = bundled().extract_text(text, &mut securities);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            &outcomes[0],
            ExtractionOutcome::NonImportable { reason, .. }
                if reason == "zero-amount distribution notice"
        ));
    }
}
