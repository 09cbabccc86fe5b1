// SPDX-License-Identifier: Apache-2.0

//! Index coverage and field existence.
//!
//! Coverage only credits the contiguous leading prefix of an index, the same
//! way a compound B-tree index is usable: an index on `(a, b, c)` helps a
//! query on `{a, b}` but not one on `{b, c}`.

use std::collections::{BTreeSet, HashSet};

use crate::filter::top_level_name;

/// Returns the query fields absent from the schema, in input order
pub fn get_non_existing_fields<S: AsRef<str>>(
    fields: &[S],
    schema_fields: &BTreeSet<String>,
) -> Vec<String> {
    fields
        .iter()
        .filter_map(|field| {
            let field: &str = field.as_ref();
            (!schema_fields.contains(field)).then(|| field.to_string())
        })
        .collect()
}

/// Number of query fields matched by the leading prefix of `index`
pub fn prefix_coverage<S: AsRef<str>>(query: &HashSet<&str>, index: &[S]) -> usize {
    index
        .iter()
        .take_while(|field| query.contains(top_level_name(field.as_ref())))
        .count()
}

/// Returns true when at least one index covers `min_coverage` of the query.
///
/// Duplicate query fields are counted once. An empty query is vacuously
/// covered.
pub fn is_covered<Q, I>(query_fields: &[Q], indexes: &[I], min_coverage: f64) -> bool
where
    Q: AsRef<str>,
    I: AsRef<[String]>,
{
    let query: HashSet<&str> = query_fields.iter().map(|field| field.as_ref()).collect();
    if query.is_empty() {
        return true;
    }

    let total = query.len() as f64;
    indexes
        .iter()
        .any(|index| prefix_coverage(&query, index.as_ref()) as f64 / total >= min_coverage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    fn schema(fields: &[&str]) -> BTreeSet<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_non_existing_fields() {
        assert_eq!(
            get_non_existing_fields(&["_id", "createdAt"], &schema(&["_id"])),
            vec!["createdAt".to_string()]
        );
        assert!(
            get_non_existing_fields(&["_id", "createdAt"], &schema(&["_id", "createdAt", "customer"]))
                .is_empty()
        );
    }

    #[test]
    fn test_full_prefix_is_covered() {
        let indexes = vec![index(&["createdAt", "_id"])];
        assert!(is_covered(&["_id", "createdAt"], &indexes, 1.0));
    }

    #[test]
    fn test_partial_coverage_respects_threshold() {
        let indexes = vec![index(&["_id"])];
        assert!(!is_covered(&["_id", "createdAt"], &indexes, 1.0));
        assert!(is_covered(&["_id", "createdAt"], &indexes, 0.5));
    }

    #[test]
    fn test_index_fields_compare_by_root() {
        let indexes = vec![index(&["customer.name", "customer.id"])];
        assert!(is_covered(&["customer"], &indexes, 1.0));
        assert!(is_covered(&["customer", "customer"], &indexes, 1.0));
    }

    #[test]
    fn test_walk_stops_at_first_gap() {
        let indexes = vec![index(&["a", "b", "c"])];
        assert!(!is_covered(&["b", "c"], &indexes, 0.5));
        assert!(is_covered(&["a", "b"], &indexes, 1.0));
        assert!(!is_covered(&["a", "c"], &indexes, 1.0));
        assert!(is_covered(&["a", "c"], &indexes, 0.5));
    }

    #[test]
    fn test_any_index_may_satisfy() {
        let indexes = vec![index(&["status"]), index(&["name", "createdAt"])];
        assert!(is_covered(&["createdAt", "name"], &indexes, 1.0));
        assert!(!is_covered(&["createdAt", "status"], &indexes, 1.0));
    }

    #[test]
    fn test_empty_query_is_vacuously_covered() {
        let empty: [&str; 0] = [];
        assert!(is_covered(&empty, &[index(&["a"])], 1.0));
    }

    #[test]
    fn test_zero_threshold_always_passes() {
        let indexes = vec![index(&["z"])];
        assert!(is_covered(&["a"], &indexes, 0.0));
    }
}
