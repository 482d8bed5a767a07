//! Row filters and pagination for listing.

use std::cmp::Ordering;

use crate::value::{Fields, Value};

/// A single field predicate.
///
/// Comparisons involving a null field value are false, as in SQL; use
/// [`Predicate::IsNull`] to select nulls.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field equals value.
    Eq(String, Value),
    /// Field differs from value.
    Ne(String, Value),
    /// Field is less than value.
    Lt(String, Value),
    /// Field is less than or equal to value.
    Le(String, Value),
    /// Field is greater than value.
    Gt(String, Value),
    /// Field is greater than or equal to value.
    Ge(String, Value),
    /// Field equals one of the values.
    In(String, Vec<Value>),
    /// Field is null.
    IsNull(String),
    /// Field is not null.
    IsNotNull(String),
}

impl Predicate {
    /// The field this predicate inspects.
    pub fn field(&self) -> &str {
        match self {
            Predicate::Eq(f, _)
            | Predicate::Ne(f, _)
            | Predicate::Lt(f, _)
            | Predicate::Le(f, _)
            | Predicate::Gt(f, _)
            | Predicate::Ge(f, _)
            | Predicate::In(f, _)
            | Predicate::IsNull(f)
            | Predicate::IsNotNull(f) => f,
        }
    }

    /// Evaluate against a row.
    pub fn matches(&self, row: &Fields) -> bool {
        let value = row.get(self.field()).unwrap_or(&Value::Null);

        match self {
            Predicate::IsNull(_) => value.is_null(),
            Predicate::IsNotNull(_) => !value.is_null(),
            Predicate::In(_, candidates) => candidates
                .iter()
                .any(|c| compare(value, c) == Some(Ordering::Equal)),
            Predicate::Eq(_, v) => compare(value, v) == Some(Ordering::Equal),
            Predicate::Ne(_, v) => compare(value, v).is_some_and(Ordering::is_ne),
            Predicate::Lt(_, v) => compare(value, v).is_some_and(Ordering::is_lt),
            Predicate::Le(_, v) => compare(value, v).is_some_and(Ordering::is_le),
            Predicate::Gt(_, v) => compare(value, v).is_some_and(Ordering::is_gt),
            Predicate::Ge(_, v) => compare(value, v).is_some_and(Ordering::is_ge),
        }
    }
}

/// Order two values of compatible kinds. Null and mixed kinds do not compare.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(_) | Value::Int(_), Value::Float(_) | Value::Int(_)) => {
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        (Value::Id(a), Value::Id(b)) => Some(a.cmp(b)),
        (Value::Json(a), Value::Json(b)) => (a == b).then_some(Ordering::Equal),
        _ => None,
    }
}

/// A conjunction of predicates. The empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    /// Create a filter matching every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate.
    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Require `field == value`.
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Predicate::Eq(field.into(), value.into()))
    }

    /// Require `field` to be null.
    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.and(Predicate::IsNull(field.into()))
    }

    /// Require `field` to be set.
    pub fn is_not_null(self, field: impl Into<String>) -> Self {
        self.and(Predicate::IsNotNull(field.into()))
    }

    /// The predicates in this filter.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Whether every predicate holds for the row.
    pub fn matches(&self, row: &Fields) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }
}

/// Limit/offset window over an id-ordered listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    /// Maximum rows returned. None means no limit.
    pub limit: Option<usize>,
    /// Matching rows skipped before the first returned one.
    pub offset: usize,
}

impl Pagination {
    /// Every matching row.
    pub fn all() -> Self {
        Self::default()
    }

    /// A window of at most `limit` rows starting at `offset`.
    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Rows in the window, ordered by id.
    pub items: Vec<T>,
    /// Number of matching rows ignoring the window.
    pub total: usize,
}

impl<T> Page<T> {
    /// Convert every item, keeping the total. Stops at the first error.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<Vec<U>, E>>()?,
            total: self.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Id;

    fn item(price: f64, location: Option<&str>) -> Fields {
        let mut row = Fields::new();
        row.insert("price".into(), Value::Float(price));
        row.insert("location".into(), location.map(String::from).into());
        row.insert("user_id".into(), Value::Id(Id(3)));
        row
    }

    #[test]
    fn test_comparisons() {
        let row = item(100.0, Some("Brno"));

        assert!(Predicate::Lt("price".into(), Value::Int(200)).matches(&row));
        assert!(Predicate::Ge("price".into(), Value::Float(100.0)).matches(&row));
        assert!(!Predicate::Gt("price".into(), Value::Float(100.0)).matches(&row));
        assert!(Predicate::Eq("user_id".into(), Value::Id(Id(3))).matches(&row));
        let cities = vec!["Praha".into(), "Brno".into()];
        assert!(Predicate::In("location".into(), cities).matches(&row));
    }

    #[test]
    fn test_null_semantics() {
        let row = item(1.0, None);

        assert!(Predicate::IsNull("location".into()).matches(&row));
        assert!(!Predicate::Eq("location".into(), Value::Null).matches(&row));
        assert!(!Predicate::Ne("location".into(), "Brno".into()).matches(&row));
        assert!(Predicate::IsNull("missing".into()).matches(&row));
    }

    #[test]
    fn test_mixed_kinds_never_match() {
        let row = item(1.0, Some("1"));
        assert!(!Predicate::Eq("location".into(), Value::Int(1)).matches(&row));
        assert!(!Predicate::Ne("location".into(), Value::Int(1)).matches(&row));
    }

    #[test]
    fn test_filter_is_conjunction() {
        let row = item(50.0, Some("Brno"));
        let filter = Filter::new().eq("location", "Brno").is_not_null("user_id");
        assert!(filter.matches(&row));
        assert!(!filter.eq("price", 51.0).matches(&row));
        assert!(Filter::new().matches(&row));
    }
}
