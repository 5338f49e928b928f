//! Scan configuration and normalized range bounds.

use crate::value::{Tuple, Value};

/// Configuration for a range scan.
///
/// All options are optional and compose:
///
/// - `prefix` restricts results to keys strictly extending the prefix
///   tuple. When combined with `gt`/`gte`/`lt`/`lte`, those bounds are
///   interpreted *relative to* the prefix.
/// - `gt`/`gte` and `lt`/`lte` are exclusive/inclusive endpoints; if both
///   flavors of an endpoint are given the inclusive one wins.
/// - `limit` caps the result count, applied after `reverse`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScanArgs {
    pub prefix: Option<Tuple>,
    pub gt: Option<Tuple>,
    pub gte: Option<Tuple>,
    pub lt: Option<Tuple>,
    pub lte: Option<Tuple>,
    pub limit: Option<usize>,
    pub reverse: bool,
}

impl ScanArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn prefix(mut self, prefix: Tuple) -> Self {
        self.prefix = Some(prefix);
        self
    }

    #[must_use]
    pub fn gt(mut self, bound: Tuple) -> Self {
        self.gt = Some(bound);
        self
    }

    #[must_use]
    pub fn gte(mut self, bound: Tuple) -> Self {
        self.gte = Some(bound);
        self
    }

    #[must_use]
    pub fn lt(mut self, bound: Tuple) -> Self {
        self.lt = Some(bound);
        self
    }

    #[must_use]
    pub fn lte(mut self, bound: Tuple) -> Self {
        self.lte = Some(bound);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Resolve `prefix`/`gt`/`gte`/`lt`/`lte` into normalized bounds.
    ///
    /// A bare `prefix = P` becomes `gte = P ++ [MIN]`, `lte = P ++ [MAX]`,
    /// which selects exactly the keys strictly extending `P`. Relative
    /// endpoints are prepended with the prefix.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        let lower = match (&self.prefix, &self.gte, &self.gt) {
            (Some(p), Some(gte), _) => Some(Bound::inclusive(p.concat(gte))),
            (Some(p), None, Some(gt)) => Some(Bound::exclusive(p.concat(gt))),
            (Some(p), None, None) => Some(Bound::inclusive(p.clone().push(Value::Min))),
            (None, Some(gte), _) => Some(Bound::inclusive(gte.clone())),
            (None, None, Some(gt)) => Some(Bound::exclusive(gt.clone())),
            (None, None, None) => None,
        };
        let upper = match (&self.prefix, &self.lte, &self.lt) {
            (Some(p), Some(lte), _) => Some(Bound::inclusive(p.concat(lte))),
            (Some(p), None, Some(lt)) => Some(Bound::exclusive(p.concat(lt))),
            (Some(p), None, None) => Some(Bound::inclusive(p.clone().push(Value::Max))),
            (None, Some(lte), _) => Some(Bound::inclusive(lte.clone())),
            (None, None, Some(lt)) => Some(Bound::exclusive(lt.clone())),
            (None, None, None) => None,
        };
        Bounds { lower, upper }
    }
}

/// One endpoint of a normalized range.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Bound {
    pub key: Tuple,
    pub inclusive: bool,
}

impl Bound {
    #[must_use]
    pub const fn inclusive(key: Tuple) -> Self {
        Self {
            key,
            inclusive: true,
        }
    }

    #[must_use]
    pub const fn exclusive(key: Tuple) -> Self {
        Self {
            key,
            inclusive: false,
        }
    }
}

/// A normalized range: at most one lower and one upper endpoint.
///
/// `Bounds::default()` is the unbounded range.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Bounds {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl Bounds {
    /// Whether `key` lies within this range.
    #[must_use]
    pub fn contains(&self, key: &Tuple) -> bool {
        if let Some(lower) = &self.lower {
            let ok = if lower.inclusive {
                *key >= lower.key
            } else {
                *key > lower.key
            };
            if !ok {
                return false;
            }
        }
        if let Some(upper) = &self.upper {
            let ok = if upper.inclusive {
                *key <= upper.key
            } else {
                *key < upper.key
            };
            if !ok {
                return false;
            }
        }
        true
    }

    /// The longest tuple prefix shared by both endpoints.
    ///
    /// Every key inside the range extends this prefix, which is what makes
    /// the reactivity tracker's prefix-indexed listener registry work. A
    /// half-open range has no usable prefix, so it lands at the empty tuple.
    #[must_use]
    pub fn common_prefix(&self) -> Tuple {
        let (Some(lower), Some(upper)) = (&self.lower, &self.upper) else {
            return Tuple::new();
        };
        lower
            .key
            .iter()
            .zip(upper.key.iter())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a.clone())
            .collect()
    }
}
