//! Deep merging of raw mappings.
//!
//! Merge is the single conflict-resolution rule for layered data: the
//! incoming (more specific) mapping wins, except that two mappings under the
//! same key are combined field by field.
//!
//! # Merging Rules
//!
//! - Keys only in the base: kept unchanged
//! - Keys only in the incoming mapping: added
//! - Mapping onto mapping: recursive merge
//! - Anything else: the incoming value replaces the base value wholesale.
//!   Lists are never concatenated, and mappings inside lists are never merged.

use crate::value::{Mapping, Value};

/// Merge `incoming` onto `base`, returning the combined mapping.
///
/// # Examples
///
/// ```
/// use strata::{mapping, merge, Value};
///
/// let base = mapping! { "a" => mapping! { "x" => 1, "y" => 2 }, "list" => vec![Value::from(1)] };
/// let incoming = mapping! { "a" => mapping! { "y" => 3 }, "list" => vec![Value::from(9)] };
///
/// let merged = merge(base, incoming);
/// let a = merged["a"].as_mapping().unwrap();
/// assert_eq!(a["x"], Value::from(1));
/// assert_eq!(a["y"], Value::from(3));
/// assert_eq!(merged["list"], Value::List(vec![Value::from(9)]));
/// ```
#[must_use]
pub fn merge(mut base: Mapping, incoming: Mapping) -> Mapping {
    merge_into(&mut base, incoming);
    base
}

/// Merge `incoming` onto `target` in place.
pub fn merge_into(target: &mut Mapping, incoming: Mapping) {
    for (key, value) in incoming {
        let Value::Mapping(nested) = value else {
            target.insert(key, value);
            continue;
        };
        if let Some(Value::Mapping(existing)) = target.get_mut(&key) {
            merge_into(existing, nested);
            continue;
        }
        target.insert(key, Value::Mapping(nested));
    }
}

/// Merge a sequence of mappings, lowest precedence first.
///
/// # Examples
///
/// ```
/// use strata::{mapping, merge_all, Value};
///
/// let merged = merge_all(vec![
///     mapping! { "common" => "low", "only_low" => 1 },
///     mapping! { "common" => "high" },
/// ]);
/// assert_eq!(merged["common"], Value::from("high"));
/// assert_eq!(merged["only_low"], Value::from(1));
/// ```
#[must_use]
pub fn merge_all<I>(layers: I) -> Mapping
where
    I: IntoIterator<Item = Mapping>,
{
    let mut result = Mapping::new();
    for layer in layers {
        merge_into(&mut result, layer);
    }
    result
}

#[cfg(all(test, feature = "property-tests"))]
mod proptests;
