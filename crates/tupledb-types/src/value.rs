use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A single element of a composite key.
///
/// Values form a total order across types. The type order is:
///
/// ```text
/// MIN < null < object < array < number < string < boolean < MAX
/// ```
///
/// `Min` and `Max` are synthetic sentinels that sort below and above every
/// real value. They exist so that range bounds can say "everything under
/// this prefix" without knowing what the first or last real element is;
/// applications do not normally store them.
///
/// Numbers are IEEE-754 doubles compared with [`f64::total_cmp`], so the
/// comparator is total even for `-0.0`/`+0.0` (which are distinct, with
/// `-0.0` first). Callers are expected to store finite numbers only.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Value {
    /// Sorts below every other value. Bounds only.
    Min,
    /// Null.
    Null,
    /// Ordered string-keyed mapping. Entries compare key-first, in key
    /// order; a missing entry is simply not present (there is no "absent"
    /// marker to filter).
    Object(BTreeMap<String, Value>),
    /// Ordered sequence, compared element-wise then by length.
    Array(Vec<Value>),
    /// Finite IEEE-754 double.
    Number(f64),
    /// Unicode string, compared by code point.
    String(String),
    /// Boolean, `false < true`.
    Bool(bool),
    /// Sorts above every other value. Bounds only.
    Max,
}

impl Value {
    /// Rank of this value's type in the cross-type order.
    const fn type_rank(&self) -> u8 {
        match self {
            Self::Min => 0,
            Self::Null => 1,
            Self::Object(_) => 2,
            Self::Array(_) => 3,
            Self::Number(_) => 4,
            Self::String(_) => 5,
            Self::Bool(_) => 6,
            Self::Max => 7,
        }
    }

    /// Whether this is one of the `Min`/`Max` bound sentinels.
    #[must_use]
    pub const fn is_sentinel(&self) -> bool {
        matches!(self, Self::Min | Self::Max)
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            // Vec and BTreeMap compare lexicographically over their
            // elements/entries, which is exactly the element-wise-then-length
            // and key-sorted-entry order the comparator needs.
            (Self::Array(a), Self::Array(b)) => a.cmp(b),
            (Self::Object(a), Self::Object(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Min => f.write_str("MIN"),
            Self::Null => f.write_str("null"),
            Self::Object(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Max => f.write_str("MAX"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self::Object(entries)
    }
}

/// An ordered sequence of [`Value`]s forming a composite key.
///
/// The derived `Ord` is element-wise with the prefix-is-less rule: a tuple
/// that is a strict prefix of another sorts before it.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize,
)]
pub struct Tuple(Vec<Value>);

impl Tuple {
    /// The empty tuple.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append an element, builder style.
    #[must_use]
    pub fn push(mut self, value: impl Into<Value>) -> Self {
        self.0.push(value.into());
        self
    }

    /// Append an element in place.
    pub fn push_mut(&mut self, value: impl Into<Value>) {
        self.0.push(value.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    /// Whether `prefix` is a (possibly equal-length) prefix of this tuple.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// A new tuple holding the first `len` elements.
    #[must_use]
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    /// `self ++ other`.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        let mut out = Vec::with_capacity(self.0.len() + other.0.len());
        out.extend_from_slice(&self.0);
        out.extend_from_slice(&other.0);
        Self(out)
    }

    /// The tuple with `prefix` stripped, or `None` if `prefix` does not
    /// prefix this tuple.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &Self) -> Option<Self> {
        self.0.strip_prefix(prefix.0.as_slice()).map(|rest| Self(rest.to_vec()))
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for Tuple {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Tuple {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Tuple {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str(")")
    }
}

/// Build a [`Tuple`] from a comma-separated list of values, each converted
/// via `Into<Value>`.
///
/// ```
/// use tupledb_types::{tuple, Value};
///
/// let t = tuple!["score", 42];
/// assert_eq!(t.len(), 2);
/// assert_eq!(t.get(0), Some(&Value::String("score".into())));
/// ```
#[macro_export]
macro_rules! tuple {
    () => { $crate::Tuple::new() };
    ($($item:expr),+ $(,)?) => {
        $crate::Tuple::from(vec![$($crate::Value::from($item)),+])
    };
}

/// A key-value pair as returned by scans.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KeyValuePair<V> {
    pub key: Tuple,
    pub value: V,
}

impl<V> KeyValuePair<V> {
    pub fn new(key: Tuple, value: V) -> Self {
        Self { key, value }
    }
}
