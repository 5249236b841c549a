//! Threshold buckets derived from numeric fields.
//!
//! Boundaries are inclusive exactly as written on each function; moving
//! one by a unit changes observable status labels.

use chrono::NaiveDate;
use serde::Serialize;

use super::Aggregate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StockStatus {
    #[serde(rename = "Out of Stock")]
    OutOfStock,
    #[serde(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "In Stock")]
    InStock,
}

impl StockStatus {
    /// `quantity <= 0` is out of stock, `quantity <= min_level` is low.
    pub fn from_levels(quantity: i64, min_level: i64) -> Self {
        if quantity <= 0 {
            StockStatus::OutOfStock
        } else if quantity <= min_level {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockStatus::OutOfStock => write!(f, "Out of Stock"),
            StockStatus::LowStock => write!(f, "Low Stock"),
            StockStatus::InStock => write!(f, "In Stock"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Performance {
    Excellent,
    Good,
    Satisfactory,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
    #[serde(rename = "No Data")]
    NoData,
}

impl Performance {
    /// Band a percentage average: 90, 75 and 60 are the inclusive lower
    /// bounds of Excellent, Good and Satisfactory.
    pub fn from_average(average: Aggregate) -> Self {
        match average.value() {
            None => Performance::NoData,
            Some(avg) if avg >= 90.0 => Performance::Excellent,
            Some(avg) if avg >= 75.0 => Performance::Good,
            Some(avg) if avg >= 60.0 => Performance::Satisfactory,
            Some(_) => Performance::NeedsImprovement,
        }
    }
}

impl std::fmt::Display for Performance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Performance::Excellent => write!(f, "Excellent"),
            Performance::Good => write!(f, "Good"),
            Performance::Satisfactory => write!(f, "Satisfactory"),
            Performance::NeedsImprovement => write!(f, "Needs Improvement"),
            Performance::NoData => write!(f, "No Data"),
        }
    }
}

/// Kilometres before the service mark at which a vehicle is due soon.
pub const SERVICE_WARNING_KM: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceStatus {
    Overdue,
    #[serde(rename = "Due Soon")]
    DueSoon,
    #[serde(rename = "OK")]
    Ok,
}

impl ServiceStatus {
    /// Overdue once mileage reaches the service mark, due soon within
    /// [`SERVICE_WARNING_KM`] of it.
    pub fn from_mileage(mileage_km: f64, next_service_km: f64) -> Self {
        if mileage_km >= next_service_km {
            ServiceStatus::Overdue
        } else if next_service_km - mileage_km <= SERVICE_WARNING_KM {
            ServiceStatus::DueSoon
        } else {
            ServiceStatus::Ok
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Overdue => write!(f, "Overdue"),
            ServiceStatus::DueSoon => write!(f, "Due Soon"),
            ServiceStatus::Ok => write!(f, "OK"),
        }
    }
}

/// Days before the end date at which a prescription is ending soon.
pub const ENDING_SOON_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrescriptionState {
    Upcoming,
    Active,
    #[serde(rename = "Ending Soon")]
    EndingSoon,
    Expired,
}

impl PrescriptionState {
    /// State on `today`. The end date itself is still a treatment day.
    pub fn on(starts_on: Option<NaiveDate>, ends_on: Option<NaiveDate>, today: NaiveDate) -> Self {
        if let Some(end) = ends_on {
            if end < today {
                return PrescriptionState::Expired;
            }
        }
        if let Some(start) = starts_on {
            if start > today {
                return PrescriptionState::Upcoming;
            }
        }
        match ends_on {
            Some(end) if (end - today).num_days() <= ENDING_SOON_DAYS => {
                PrescriptionState::EndingSoon
            }
            _ => PrescriptionState::Active,
        }
    }
}

impl std::fmt::Display for PrescriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrescriptionState::Upcoming => write!(f, "Upcoming"),
            PrescriptionState::Active => write!(f, "Active"),
            PrescriptionState::EndingSoon => write!(f, "Ending Soon"),
            PrescriptionState::Expired => write!(f, "Expired"),
        }
    }
}
