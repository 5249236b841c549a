//! Read-time aggregates over record sets.

use serde::{Deserialize, Serialize, Serializer};

/// What an aggregate reports when there is nothing to aggregate.
///
/// Apps differ here: some show `0`, some show `N/A`. The choice is kept
/// per app rather than unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentinel {
    /// Render as `N/A`.
    Missing,
    /// Render as `0`.
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Integer,
    OneDecimal,
}

impl Rounding {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Rounding::Integer => value.round(),
            Rounding::OneDecimal => (value * 10.0).round() / 10.0,
        }
    }
}

/// Result of an aggregate: a number or the `N/A` sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate {
    Value(f64),
    Missing,
}

impl Aggregate {
    /// The aggregate of an empty set under the given sentinel.
    pub fn empty(sentinel: Sentinel) -> Self {
        match sentinel {
            Sentinel::Missing => Aggregate::Missing,
            Sentinel::Zero => Aggregate::Value(0.0),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Aggregate::Value(v) => Some(*v),
            Aggregate::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Aggregate::Missing)
    }
}

impl std::fmt::Display for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aggregate::Value(v) => write!(f, "{}", v),
            Aggregate::Missing => write!(f, "N/A"),
        }
    }
}

impl Serialize for Aggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Aggregate::Value(v) => serializer.serialize_f64(*v),
            Aggregate::Missing => serializer.serialize_str("N/A"),
        }
    }
}

/// Score as a percentage of a total.
///
/// Returns `None` for a non-positive or non-finite total so callers never
/// divide by zero.
pub fn percentage(score: f64, total: f64) -> Option<f64> {
    if total > 0.0 && total.is_finite() && score.is_finite() {
        Some(score / total * 100.0)
    } else {
        None
    }
}

/// Mean of the values, rounded. Non-finite values are ignored.
pub fn average<I>(values: I, rounding: Rounding, sentinel: Sentinel) -> Aggregate
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        Aggregate::empty(sentinel)
    } else {
        Aggregate::Value(rounding.apply(sum / count as f64))
    }
}

/// `hits / total` as a rounded percentage.
pub fn rate(hits: usize, total: usize, rounding: Rounding, sentinel: Sentinel) -> Aggregate {
    if total == 0 {
        Aggregate::empty(sentinel)
    } else {
        Aggregate::Value(rounding.apply(hits as f64 / total as f64 * 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_integer_rounding() {
        let avg = average([87.5, 90.0, 70.0], Rounding::Integer, Sentinel::Missing);
        assert_eq!(avg, Aggregate::Value(83.0));
    }

    #[test]
    fn test_average_one_decimal() {
        let avg = average([10.0, 20.0, 25.0], Rounding::OneDecimal, Sentinel::Zero);
        assert_eq!(avg, Aggregate::Value(18.3));
    }

    #[test]
    fn test_empty_uses_sentinel() {
        assert_eq!(
            average(Vec::new(), Rounding::Integer, Sentinel::Missing),
            Aggregate::Missing
        );
        assert_eq!(
            average(Vec::new(), Rounding::Integer, Sentinel::Zero),
            Aggregate::Value(0.0)
        );
    }

    #[test]
    fn test_average_skips_nan() {
        let avg = average([f64::NAN, 50.0], Rounding::Integer, Sentinel::Zero);
        assert_eq!(avg, Aggregate::Value(50.0));
    }

    #[test]
    fn test_percentage_guards_denominator() {
        assert_eq!(percentage(45.0, 50.0), Some(90.0));
        assert_eq!(percentage(10.0, 0.0), None);
        assert_eq!(percentage(10.0, -5.0), None);
    }

    #[test]
    fn test_rate() {
        assert_eq!(
            rate(2, 3, Rounding::Integer, Sentinel::Zero),
            Aggregate::Value(67.0)
        );
        assert_eq!(
            rate(0, 0, Rounding::Integer, Sentinel::Missing),
            Aggregate::Missing
        );
    }

    #[test]
    fn test_display_and_serialize() {
        assert_eq!(Aggregate::Missing.to_string(), "N/A");
        assert_eq!(Aggregate::Value(87.0).to_string(), "87");
        assert_eq!(Aggregate::Value(18.3).to_string(), "18.3");
        assert_eq!(serde_json::to_string(&Aggregate::Missing).unwrap(), "\"N/A\"");
        assert_eq!(serde_json::to_string(&Aggregate::Value(0.0)).unwrap(), "0.0");
    }
}
