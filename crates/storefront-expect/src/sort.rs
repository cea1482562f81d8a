//! Sort criteria and ordering checks for rendered listings.
//!
//! Values are classified once when read ([`SortValue`]); every comparison
//! after that dispatches on the variant.

use crate::config::EmptyPolicy;
use crate::result::{ExpectError, ExpectResult};
use icu_collator::{Collator, CollatorOptions, Numeric, Strength};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// How a field's text is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Trimmed text, compared in natural order
    Text,
    /// Number parsed out of the text (currency symbols and the like are stripped)
    Numeric,
}

/// Field a listing is sorted by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    /// Product name
    Name,
    /// Product price
    Price,
    /// Any other textual field, by label
    Text(String),
    /// Any other numeric field, by label
    Numeric(String),
}

impl SortField {
    /// How values of this field are read
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Name | Self::Text(_) => FieldKind::Text,
            Self::Price | Self::Numeric(_) => FieldKind::Numeric,
        }
    }

    /// Label used in messages
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Name => "name",
            Self::Price => "price",
            Self::Text(label) | Self::Numeric(label) => label,
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SortField {
    type Err = ExpectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" | "names" => Ok(Self::Name),
            "price" | "prices" => Ok(Self::Price),
            other => Err(ExpectError::Config {
                message: format!("unknown sort field {other:?} (expected name or price)"),
            }),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first
    #[default]
    Asc,
    /// Largest first
    Desc,
}

impl SortOrder {
    /// Short name used in messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// Operator every adjacent pair must satisfy
    #[must_use]
    pub const fn expected_operator(self) -> &'static str {
        match self {
            Self::Asc => "≤",
            Self::Desc => "≥",
        }
    }

    /// Operator describing a pair that breaks the order
    #[must_use]
    pub const fn violation_operator(self) -> &'static str {
        match self {
            Self::Asc => ">",
            Self::Desc => "<",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ExpectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            other => Err(ExpectError::Config {
                message: format!("unknown sort order {other:?} (expected asc or desc)"),
            }),
        }
    }
}

/// Expected ordering of a listing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    /// Field compared
    pub by: SortField,
    /// Direction
    pub order: SortOrder,
}

impl SortSpec {
    /// Create a sort spec
    #[must_use]
    pub const fn new(by: SortField, order: SortOrder) -> Self {
        Self { by, order }
    }

    /// Spec matching an option of the storefront's sort dropdown.
    ///
    /// Accepts both option values (`az`, `za`, `lohi`, `hilo`) and their
    /// English labels ("Price (low to high)").
    #[must_use]
    pub fn from_option_label(option: &str) -> Option<Self> {
        let spec = match option.trim().to_ascii_lowercase().as_str() {
            "az" | "name (a to z)" => Self::new(SortField::Name, SortOrder::Asc),
            "za" | "name (z to a)" => Self::new(SortField::Name, SortOrder::Desc),
            "lohi" | "price (low to high)" => Self::new(SortField::Price, SortOrder::Asc),
            "hilo" | "price (high to low)" => Self::new(SortField::Price, SortOrder::Desc),
            _ => return None,
        };
        Some(spec)
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.by, self.order)
    }
}

/// A value read from one rendered element
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    /// Parsed number
    Numeric(f64),
    /// Trimmed text
    Text(String),
}

impl SortValue {
    /// Compare two values: numbers numerically, text in natural order
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::Text(a), Self::Text(b)) => natural_cmp(a, b),
            (a, b) => natural_cmp(&a.to_string(), &b.to_string()),
        }
    }
}

impl fmt::Display for SortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

thread_local! {
    static COLLATOR: Option<Collator> = natural_collator();
}

fn natural_collator() -> Option<Collator> {
    let mut options = CollatorOptions::new();
    options.strength = Some(Strength::Tertiary);
    options.numeric = Some(Numeric::On);
    match Collator::try_new(&Default::default(), options) {
        Ok(collator) => Some(collator),
        Err(err) => {
            warn!(error = ?err, "root collator unavailable, text falls back to code point order");
            None
        }
    }
}

/// Locale-aware natural order (root collation, numeric digit runs).
///
/// Digit runs compare by value, so `item-2` sorts before `item-10`.
/// Accents and case only break ties, with lowercase first. Strings that
/// differ only in leading zeros compare equal.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    COLLATOR.with(|collator| match collator {
        Some(collator) => collator.compare(a, b),
        None => a.cmp(b),
    })
}

/// Parse the number embedded in rendered text such as `"$29.99"`.
///
/// Everything except digits, `.` and `-` is dropped, then the longest
/// leading decimal literal is read. Returns `None` when nothing numeric
/// remains.
#[must_use]
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let numeric: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if numeric.is_empty() {
        return None;
    }

    let bytes = numeric.as_bytes();
    let mut end = usize::from(bytes.first() == Some(&b'-'));
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    numeric[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Classify rendered texts for the given field.
///
/// Numeric fields fail on the first element without a number; the caller is
/// expected to treat that as a transient read (placeholder text while loading).
pub fn extract_values(texts: &[String], field: &SortField) -> ExpectResult<Vec<SortValue>> {
    texts
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let raw = text.trim();
            match field.kind() {
                FieldKind::Text => Ok(SortValue::Text(raw.to_string())),
                FieldKind::Numeric => parse_numeric(raw).map(SortValue::Numeric).ok_or_else(|| {
                    ExpectError::ValueParse {
                        index,
                        raw: raw.to_string(),
                    }
                }),
            }
        })
        .collect()
}

/// Whether `prev` may precede `curr` in the given order (ties allowed)
#[must_use]
pub fn in_order(prev: &SortValue, curr: &SortValue, order: SortOrder) -> bool {
    match (order, prev.compare(curr)) {
        (SortOrder::Asc, Ordering::Greater) | (SortOrder::Desc, Ordering::Less) => false,
        _ => true,
    }
}

/// Whether the whole sequence follows `order`
#[must_use]
pub fn is_sorted(values: &[SortValue], order: SortOrder, empty: EmptyPolicy) -> bool {
    if values.is_empty() {
        return empty == EmptyPolicy::Pass;
    }
    values.windows(2).all(|pair| in_order(&pair[0], &pair[1], order))
}

/// First adjacent pair breaking an order
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Index of the earlier element of the pair
    pub index: usize,
    /// Earlier element
    pub prev: SortValue,
    /// Later element
    pub curr: SortValue,
}

/// Locate the first adjacent pair that breaks `order`
#[must_use]
pub fn first_violation(values: &[SortValue], order: SortOrder) -> Option<Violation> {
    values
        .windows(2)
        .enumerate()
        .find(|(_, pair)| !in_order(&pair[0], &pair[1], order))
        .map(|(index, pair)| Violation {
            index,
            prev: pair[0].clone(),
            curr: pair[1].clone(),
        })
}

/// A locally sorted copy of `values` (stable)
#[must_use]
pub fn sorted_copy(values: &[SortValue], order: SortOrder) -> Vec<SortValue> {
    let mut sorted = values.to_vec();
    match order {
        SortOrder::Asc => sorted.sort_by(SortValue::compare),
        SortOrder::Desc => sorted.sort_by(|a, b| b.compare(a)),
    }
    sorted
}
