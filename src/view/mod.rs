//! Derived views: pure projections recomputed from raw collections on
//! every read. Nothing here is ever persisted.

pub mod aggregate;
pub mod bucket;
pub mod filter;
pub mod sort;

pub use aggregate::{average, percentage, rate, Aggregate, Rounding, Sentinel};
pub use bucket::{Performance, PrescriptionState, ServiceStatus, StockStatus};
pub use filter::{filter, matches, parse_query, Filterable, Query};
pub use sort::{sort, Direction, SortState, SortValue, Sortable};

use crate::error::{Result, TrackbookError};

/// Filter then sort, rejecting facet and sort names the record type does
/// not know.
pub fn project<'a, T>(records: &'a [T], query: &Query, state: &SortState) -> Result<Vec<&'a T>>
where
    T: Filterable + Sortable,
{
    check_keys::<T>(query, state)?;
    let mut rows = filter(records, query);
    sort(&mut rows, state);
    Ok(rows)
}

pub(crate) fn check_keys<T: Filterable + Sortable>(query: &Query, state: &SortState) -> Result<()> {
    if let Some((name, _)) = query
        .active_facets()
        .find(|(name, _)| !T::FACETS.contains(name))
    {
        return Err(TrackbookError::InvalidFilter {
            key: name.to_string(),
            valid: T::FACETS.join(", "),
        });
    }
    if let Some(key) = state.key() {
        if !T::SORT_KEYS.contains(&key) {
            return Err(TrackbookError::InvalidSortKey {
                key: key.to_string(),
                valid: T::SORT_KEYS.join(", "),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Score {
        name: String,
        points: f64,
        group: String,
    }

    impl Filterable for Score {
        const FACETS: &'static [&'static str] = &["group"];

        fn search_fields(&self) -> Vec<&str> {
            vec![self.name.as_str()]
        }

        fn facet(&self, name: &str) -> Option<String> {
            (name == "group").then(|| self.group.clone())
        }
    }

    impl Sortable for Score {
        const SORT_KEYS: &'static [&'static str] = &["name", "points"];

        fn sort_value(&self, key: &str) -> SortValue<'_> {
            match key {
                "name" => SortValue::text(&self.name),
                _ => SortValue::Number(self.points),
            }
        }
    }

    #[test]
    fn test_project_rejects_unknown_facet() {
        let scores: Vec<Score> = Vec::new();
        let query = Query::new().with_facet("colour", "red");
        let err = project(&scores, &query, &SortState::new()).unwrap_err();
        assert!(matches!(err, TrackbookError::InvalidFilter { .. }));
    }

    #[test]
    fn test_project_rejects_unknown_sort_key() {
        let scores: Vec<Score> = Vec::new();
        let err = project(&scores, &Query::new(), &SortState::by("height")).unwrap_err();
        assert!(matches!(err, TrackbookError::InvalidSortKey { .. }));
    }

    fn score_strategy() -> impl Strategy<Value = Score> {
        ("[a-dA-D]{1,4}", 0.0f64..100.0, "[xy]").prop_map(|(name, points, group)| Score {
            name,
            points,
            group,
        })
    }

    proptest! {
        #[test]
        fn filter_then_sort_is_idempotent(
            scores in prop::collection::vec(score_strategy(), 0..30),
            text in "[a-d]{0,2}",
            by_name in any::<bool>(),
            descending in any::<bool>(),
        ) {
            let query = Query::new().with_text(text).with_facet("group", "x");
            let mut state = SortState::by(if by_name { "name" } else { "points" });
            if descending {
                let key = state.key().unwrap().to_string();
                state.select(&key);
            }

            let once: Vec<Score> = project(&scores, &query, &state)
                .unwrap()
                .into_iter()
                .cloned()
                .collect();
            let twice: Vec<Score> = project(&once, &query, &state)
                .unwrap()
                .into_iter()
                .cloned()
                .collect();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn average_of_percentages_stays_in_range(
            pairs in prop::collection::vec((0.0f64..=1.0, 1.0f64..500.0), 1..40),
        ) {
            let values = pairs
                .iter()
                .filter_map(|(fraction, total)| percentage(fraction * total, *total));
            let avg = average(values, Rounding::OneDecimal, Sentinel::Missing);
            let value = avg.value().unwrap();
            prop_assert!((0.0..=100.0).contains(&value));
        }
    }
}
