//! Price and currency extraction from the shapes affiliate feeds send:
//! nested `{value|amount, currency}` objects, bare JSON numbers, numeric
//! strings, and free text such as `"$1,299.00 USD"`.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3}(?:,\d{3})+|\d+)(\.\d+)?").expect("valid amount regex")
});

static ISO_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(USD|EUR|GBP|CAD|AUD|NZD|JPY|CHF|SEK|DKK|NOK)\b").expect("valid currency regex")
});

/// How a price was expressed. Lower ranks win when a record carries several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PriceShape {
    Nested,
    Number,
    NumericString,
    FreeText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceCandidate {
    pub shape: PriceShape,
    /// `None` when the field was present but held nothing usable.
    pub amount: Option<Decimal>,
    /// Currency carried by the value itself (nested field or text).
    pub currency: Option<String>,
}

/// Interprets one JSON value as a price. Returns `None` for null, booleans,
/// arrays and objects without a `value`/`amount` key.
#[must_use]
pub fn read_price(value: &Value) -> Option<PriceCandidate> {
    match value {
        Value::Object(map) => {
            let inner = map.get("value").or_else(|| map.get("amount"))?;
            let amount = match inner {
                Value::Number(n) => decimal_from_number(n),
                Value::String(s) => parse_numeric_str(s).or_else(|| parse_free_text(s)),
                _ => None,
            };
            let currency = map
                .get("currency")
                .and_then(Value::as_str)
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty());
            Some(PriceCandidate {
                shape: PriceShape::Nested,
                amount,
                currency,
            })
        }
        Value::Number(n) => Some(PriceCandidate {
            shape: PriceShape::Number,
            amount: decimal_from_number(n),
            currency: None,
        }),
        Value::String(s) => {
            if s.trim().is_empty() {
                return None;
            }
            if let Some(amount) = parse_numeric_str(s) {
                Some(PriceCandidate {
                    shape: PriceShape::NumericString,
                    amount: Some(amount),
                    currency: None,
                })
            } else {
                Some(PriceCandidate {
                    shape: PriceShape::FreeText,
                    amount: parse_free_text(s),
                    currency: detect_currency(s),
                })
            }
        }
        _ => None,
    }
}

/// Picks the best positive amount among `candidates`: lowest [`PriceShape`]
/// rank first, field order within a rank. Non-positive amounts count as
/// absent.
#[must_use]
pub fn choose_price(candidates: &[PriceCandidate]) -> Option<&PriceCandidate> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.amount.is_some_and(|a| a > Decimal::ZERO))
        .min_by_key(|(idx, c)| (c.shape, *idx))
        .map(|(_, c)| c)
}

/// Resolves the listing currency: a nested object's currency, then the
/// record's flat currency field, then a code or symbol found in free text.
#[must_use]
pub fn choose_currency(candidates: &[PriceCandidate], flat_field: Option<&str>) -> Option<String> {
    let nested = candidates
        .iter()
        .filter(|c| c.shape == PriceShape::Nested)
        .find_map(|c| c.currency.clone());
    if nested.is_some() {
        return nested;
    }

    let flat = flat_field
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty());
    if flat.is_some() {
        return flat;
    }

    candidates
        .iter()
        .filter(|c| c.shape == PriceShape::FreeText)
        .find_map(|c| c.currency.clone())
}

/// Finds an ISO code, or failing that a `$`/`€`/`£` symbol, in `text`.
#[must_use]
pub fn detect_currency(text: &str) -> Option<String> {
    let upper = text.to_uppercase();
    if let Some(m) = ISO_CODE_RE.captures(&upper).and_then(|c| c.get(1)) {
        return Some(m.as_str().to_string());
    }
    if text.contains('€') {
        Some("EUR".to_string())
    } else if text.contains('£') {
        Some("GBP".to_string())
    } else if text.contains('$') {
        Some("USD".to_string())
    } else {
        None
    }
}

/// Parses the first amount found in free text, ignoring thousands separators.
#[must_use]
pub fn parse_free_text(text: &str) -> Option<Decimal> {
    let caps = AMOUNT_RE.captures(text)?;
    let whole = caps.get(1)?.as_str().replace(',', "");
    let frac = caps.get(2).map_or("", |m| m.as_str());
    Decimal::from_str(&format!("{whole}{frac}")).ok()
}

fn parse_numeric_str(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

fn decimal_from_number(n: &serde_json::Number) -> Option<Decimal> {
    parse_numeric_str(&n.to_string())
}
