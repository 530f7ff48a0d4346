// 🧱 Record Model
// One row of tabular data: ordered columns + a synthetic identity kept apart from the data

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Field name that addresses the synthetic identifier of a [`Record`]
pub const DEFAULT_ID_FIELD: &str = "id";

// ============================================================================
// SCALAR VALUES
// ============================================================================

/// Scalar - a single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Coerce a raw field: a finite numeric literal becomes a number,
    /// anything else (including the empty string) stays text.
    ///
    /// # Examples:
    /// ```
    /// use formgrid::Scalar;
    /// assert_eq!(Scalar::coerce(" 42 "), Scalar::Number(42.0));
    /// assert_eq!(Scalar::coerce("x"), Scalar::Text("x".to_string()));
    /// ```
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();
        if is_numeric_literal(trimmed) {
            if let Ok(n) = trimmed.parse::<f64>() {
                if n.is_finite() {
                    return Scalar::Number(n);
                }
            }
        }
        Scalar::Text(trimmed.to_string())
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Scalar::Number(_))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // f64 Display already drops the trailing ".0"
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value as f64)
    }
}

/// Decimal literals only: optional sign, digits with at most one dot, optional exponent.
/// Rejects words f64::from_str would accept ("inf", "NaN").
fn is_numeric_literal(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
        None => (body, None),
    };

    let mut digits = 0;
    let mut dots = 0;
    for c in mantissa.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    if digits == 0 || dots > 1 {
        return false;
    }

    match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && exp.chars().all(|c| c.is_ascii_digit())
        }
    }
}

// ============================================================================
// IDENTITY
// ============================================================================

/// RecordId - synthetic identity attached to every record
///
/// Drawn from a process-wide strictly monotonic counter, seeded from the
/// wall clock on first use, so two records never share an id within one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

static NEXT_ID: OnceLock<AtomicU64> = OnceLock::new();

impl RecordId {
    /// Allocate the next identifier
    pub fn next() -> Self {
        RecordId(id_counter().fetch_add(1, Ordering::Relaxed))
    }

    /// Keep later allocations above an id restored from storage
    pub fn observe(id: RecordId) {
        id_counter().fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
    }
}

fn id_counter() -> &'static AtomicU64 {
    NEXT_ID.get_or_init(|| {
        let seed = chrono::Utc::now().timestamp_millis().max(1) as u64;
        AtomicU64::new(seed)
    })
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// KEYED ROWS
// ============================================================================

/// RowKey - the value a row is identified by for selection purposes
pub type RowKey = String;

/// Keyed - rows that can report their identity for a configurable id field
///
/// Two distinct rows reporting the same key are one row as far as
/// selection is concerned.
pub trait Keyed {
    fn key(&self, id_field: &str) -> Option<RowKey>;
}

// ============================================================================
// RECORD
// ============================================================================

/// Record (CsvRow) - ordered column → scalar mapping plus synthetic id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    fields: Vec<(String, Scalar)>,
}

impl Record {
    /// Create an empty record with the given identity
    pub fn new(id: RecordId) -> Self {
        Record {
            id,
            fields: Vec::new(),
        }
    }

    /// Build a record with a fresh id from (column, value) pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Scalar>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = Record::new(RecordId::next());
        for (k, v) in pairs {
            record.set(k, v);
        }
        record
    }

    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Set a column value; a new column is appended, an existing one keeps its position
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Scalar>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Scalar> {
        self.fields.iter().map(|(_, value)| value)
    }

    pub fn fields(&self) -> &[(String, Scalar)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Same columns and values, identity ignored
    pub fn same_values(&self, other: &Record) -> bool {
        self.fields == other.fields
    }
}

impl Keyed for Record {
    fn key(&self, id_field: &str) -> Option<RowKey> {
        if id_field == DEFAULT_ID_FIELD {
            return Some(self.id.to_string());
        }
        self.get(id_field).map(|value| value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_integers_and_decimals() {
        assert_eq!(Scalar::coerce("30"), Scalar::Number(30.0));
        assert_eq!(Scalar::coerce("-3.5"), Scalar::Number(-3.5));
        assert_eq!(Scalar::coerce(".5"), Scalar::Number(0.5));
        assert_eq!(Scalar::coerce("1e3"), Scalar::Number(1000.0));
    }

    #[test]
    fn test_coerce_keeps_text() {
        assert_eq!(Scalar::coerce("John Doe"), Scalar::from("John Doe"));
        assert_eq!(Scalar::coerce("2022-01-15"), Scalar::from("2022-01-15"));
        assert_eq!(Scalar::coerce(""), Scalar::from(""));
        assert_eq!(Scalar::coerce("inf"), Scalar::from("inf"));
        assert_eq!(Scalar::coerce("NaN"), Scalar::from("NaN"));
        assert_eq!(Scalar::coerce("1.2.3"), Scalar::from("1.2.3"));
        assert_eq!(Scalar::coerce("1e"), Scalar::from("1e"));
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Number(75000.0).to_string(), "75000");
        assert_eq!(Scalar::Number(1.5).to_string(), "1.5");
        assert_eq!(Scalar::from("x").to_string(), "x");
    }

    #[test]
    fn test_record_ids_are_unique_and_increasing() {
        let a = RecordId::next();
        let b = RecordId::next();
        assert!(b > a);
    }

    #[test]
    fn test_set_preserves_column_order() {
        let mut record = Record::from_pairs([("a", 1i64), ("b", 2i64)]);
        record.set("a", "changed");
        record.set("c", 3i64);

        let columns: Vec<&str> = record.columns().collect();
        assert_eq!(columns, vec!["a", "b", "c"]);
        assert_eq!(record.get("a"), Some(&Scalar::from("changed")));
    }

    #[test]
    fn test_key_uses_synthetic_id_by_default() {
        let mut record = Record::from_pairs([("id", "column-value")]);
        record.id = RecordId(7);

        assert_eq!(record.key(DEFAULT_ID_FIELD), Some("7".to_string()));
    }

    #[test]
    fn test_key_by_column() {
        let record = Record::from_pairs([("email", "a@b.c"), ("age", "30")]);
        assert_eq!(record.key("email"), Some("a@b.c".to_string()));
        assert_eq!(record.key("age"), Some("30".to_string()));
        assert_eq!(record.key("missing"), None);
    }
}
