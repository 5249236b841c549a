//! Stable column sorting with toggle-on-reselect semantics.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    pub fn toggled(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Ascending => write!(f, "asc"),
            Direction::Descending => write!(f, "desc"),
        }
    }
}

/// The column currently sorted on and its direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    key: Option<String>,
    direction: Direction,
}

impl SortState {
    /// Unsorted: records keep insertion order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted ascending by `key`.
    pub fn by(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            direction: Direction::Ascending,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Select a column header.
    ///
    /// Selecting the current key again flips the direction; selecting a
    /// different key switches to it ascending.
    pub fn select(&mut self, key: &str) {
        if self.key.as_deref() == Some(key) {
            self.direction = self.direction.toggled();
        } else {
            self.key = Some(key.to_string());
            self.direction = Direction::Ascending;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A comparable cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue<'a> {
    Missing,
    Number(f64),
    Text(Cow<'a, str>),
}

impl<'a> SortValue<'a> {
    pub fn text(s: &'a str) -> Self {
        SortValue::Text(Cow::Borrowed(s))
    }

    pub fn owned(s: String) -> Self {
        SortValue::Text(Cow::Owned(s))
    }

    pub fn opt_text(s: Option<&'a str>) -> Self {
        s.map(Self::text).unwrap_or(SortValue::Missing)
    }

    fn rank(&self) -> u8 {
        match self {
            SortValue::Missing => 0,
            SortValue::Number(_) => 1,
            SortValue::Text(_) => 2,
        }
    }
}

/// Records that expose named sort columns.
pub trait Sortable {
    const SORT_KEYS: &'static [&'static str];

    fn sort_value(&self, key: &str) -> SortValue<'_>;
}

/// Collation for text cells: case-folded order first, then lowercase
/// before uppercase at the first differing character.
pub fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| {
        for (x, y) in a.chars().zip(b.chars()) {
            if x != y {
                return match (x.is_lowercase(), y.is_lowercase()) {
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    _ => x.cmp(&y),
                };
            }
        }
        a.len().cmp(&b.len())
    })
}

pub fn compare_values(a: &SortValue<'_>, b: &SortValue<'_>) -> Ordering {
    match (a, b) {
        (SortValue::Number(x), SortValue::Number(y)) => x.total_cmp(y),
        (SortValue::Text(x), SortValue::Text(y)) => collate(x, y),
        _ => a.rank().cmp(&b.rank()),
    }
}

/// Sort records in place by the state's key.
///
/// The sort is stable in both directions: records with equal keys keep
/// their relative input order. With no key selected this is a no-op.
pub fn sort<T: Sortable>(records: &mut [&T], state: &SortState) {
    let Some(key) = state.key() else {
        return;
    };

    match state.direction() {
        Direction::Ascending => {
            records.sort_by(|a, b| compare_values(&a.sort_value(key), &b.sort_value(key)))
        }
        Direction::Descending => {
            records.sort_by(|a, b| compare_values(&b.sort_value(key), &a.sort_value(key)))
        }
    }
}
