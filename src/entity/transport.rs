use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{format_date, parse_date, Record};
use crate::error::ImportError;
use crate::transfer::{CsvRecord, Row};
use crate::view::{Filterable, ServiceStatus, SortValue, Sortable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DriverStatus {
    #[default]
    Available,
    OnDuty,
    OffDuty,
}

impl std::fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverStatus::Available => write!(f, "available"),
            DriverStatus::OnDuty => write!(f, "on-duty"),
            DriverStatus::OffDuty => write!(f, "off-duty"),
        }
    }
}

impl std::str::FromStr for DriverStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', ' '], "-").as_str() {
            "available" => Ok(DriverStatus::Available),
            "on-duty" => Ok(DriverStatus::OnDuty),
            "off-duty" => Ok(DriverStatus::OffDuty),
            _ => Err(format!("Invalid driver status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    #[default]
    Active,
    Maintenance,
    Retired,
}

impl std::fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VehicleStatus::Active => write!(f, "active"),
            VehicleStatus::Maintenance => write!(f, "maintenance"),
            VehicleStatus::Retired => write!(f, "retired"),
        }
    }
}

impl std::str::FromStr for VehicleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(VehicleStatus::Active),
            "maintenance" | "in-service" => Ok(VehicleStatus::Maintenance),
            "retired" => Ok(VehicleStatus::Retired),
            _ => Err(format!("Invalid vehicle status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ShipmentStatus {
    #[default]
    Pending,
    InTransit,
    Delivered,
    Cancelled,
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShipmentStatus::Pending => write!(f, "pending"),
            ShipmentStatus::InTransit => write!(f, "in-transit"),
            ShipmentStatus::Delivered => write!(f, "delivered"),
            ShipmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ShipmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', ' '], "-").as_str() {
            "pending" => Ok(ShipmentStatus::Pending),
            "in-transit" | "intransit" => Ok(ShipmentStatus::InTransit),
            "delivered" => Ok(ShipmentStatus::Delivered),
            "cancelled" | "canceled" => Ok(ShipmentStatus::Cancelled),
            _ => Err(format!("Invalid shipment status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub license_number: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: DriverStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub registration: String,
    pub model: String,
    pub capacity_kg: f64,
    pub mileage_km: f64,
    pub next_service_km: f64,
    #[serde(default)]
    pub status: VehicleStatus,
    #[serde(default)]
    pub driver_id: Option<String>,
}

impl Vehicle {
    pub fn service_status(&self) -> ServiceStatus {
        ServiceStatus::from_mileage(self.mileage_km, self.next_service_km)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: String,
    pub reference: String,
    pub origin: String,
    pub destination: String,
    pub weight_kg: f64,
    #[serde(default)]
    pub status: ShipmentStatus,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub scheduled_on: Option<NaiveDate>,
}

impl Record for Driver {
    const KEY: &'static str = "transport.drivers";
    const LABEL: &'static str = "driver";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Record for Vehicle {
    const KEY: &'static str = "transport.vehicles";
    const LABEL: &'static str = "vehicle";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Record for Shipment {
    const KEY: &'static str = "transport.shipments";
    const LABEL: &'static str = "shipment";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl CsvRecord for Driver {
    const COLUMNS: &'static [&'static str] = &["Name", "License Number", "Phone", "Status"];
    const REQUIRED: &'static [&'static str] = &["Name", "License Number"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.license_number.clone(),
            self.phone.clone().unwrap_or_default(),
            self.status.to_string(),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(Driver {
            id: String::new(),
            name: row.required("Name", "Unnamed driver")?,
            license_number: row.required("License Number", "")?,
            phone: row.text("Phone"),
            status: row.choice("Status")?,
        })
    }
}

impl CsvRecord for Vehicle {
    const COLUMNS: &'static [&'static str] = &[
        "Registration",
        "Model",
        "Capacity (kg)",
        "Mileage (km)",
        "Next Service (km)",
        "Status",
        "Driver ID",
    ];
    const REQUIRED: &'static [&'static str] = &["Registration"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.registration.clone(),
            self.model.clone(),
            self.capacity_kg.to_string(),
            self.mileage_km.to_string(),
            self.next_service_km.to_string(),
            self.status.to_string(),
            self.driver_id.clone().unwrap_or_default(),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(Vehicle {
            id: String::new(),
            registration: row.required("Registration", "")?,
            model: row.required("Model", "Unknown")?,
            capacity_kg: row.number("Capacity (kg)", 0.0)?,
            mileage_km: row.number("Mileage (km)", 0.0)?,
            next_service_km: row.number("Next Service (km)", 0.0)?,
            status: row.choice("Status")?,
            driver_id: row.text("Driver ID"),
        })
    }
}

impl CsvRecord for Shipment {
    const COLUMNS: &'static [&'static str] = &[
        "Reference",
        "Origin",
        "Destination",
        "Weight (kg)",
        "Status",
        "Vehicle ID",
        "Driver ID",
        "Scheduled",
    ];
    const REQUIRED: &'static [&'static str] = &["Reference", "Origin", "Destination"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.reference.clone(),
            self.origin.clone(),
            self.destination.clone(),
            self.weight_kg.to_string(),
            self.status.to_string(),
            self.vehicle_id.clone().unwrap_or_default(),
            self.driver_id.clone().unwrap_or_default(),
            format_date(self.scheduled_on),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(Shipment {
            id: String::new(),
            reference: row.required("Reference", "")?,
            origin: row.required("Origin", "Unknown")?,
            destination: row.required("Destination", "Unknown")?,
            weight_kg: row.number("Weight (kg)", 0.0)?,
            status: row.choice("Status")?,
            vehicle_id: row.text("Vehicle ID"),
            driver_id: row.text("Driver ID"),
            scheduled_on: row.date("Scheduled")?,
        })
    }
}

impl Filterable for Driver {
    const FACETS: &'static [&'static str] = &["status"];

    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.license_number.as_str()]
    }

    fn facet(&self, name: &str) -> Option<String> {
        (name == "status").then(|| self.status.to_string())
    }
}

impl Sortable for Driver {
    const SORT_KEYS: &'static [&'static str] = &["name", "license", "status"];

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "license" => SortValue::text(&self.license_number),
            "status" => SortValue::owned(self.status.to_string()),
            _ => SortValue::text(&self.name),
        }
    }
}

impl Filterable for Vehicle {
    const FACETS: &'static [&'static str] = &["status", "service", "driver"];

    fn search_fields(&self) -> Vec<&str> {
        vec![self.registration.as_str(), self.model.as_str()]
    }

    fn facet(&self, name: &str) -> Option<String> {
        match name {
            "status" => Some(self.status.to_string()),
            "service" => Some(self.service_status().to_string()),
            "driver" => self.driver_id.clone(),
            _ => None,
        }
    }
}

impl Sortable for Vehicle {
    const SORT_KEYS: &'static [&'static str] =
        &["registration", "model", "capacity", "mileage", "next_service", "status"];

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "model" => SortValue::text(&self.model),
            "capacity" => SortValue::Number(self.capacity_kg),
            "mileage" => SortValue::Number(self.mileage_km),
            "next_service" => SortValue::Number(self.next_service_km),
            "status" => SortValue::owned(self.status.to_string()),
            _ => SortValue::text(&self.registration),
        }
    }
}

impl Filterable for Shipment {
    const FACETS: &'static [&'static str] = &["status", "vehicle", "driver", "destination"];

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.reference.as_str(),
            self.origin.as_str(),
            self.destination.as_str(),
        ]
    }

    fn facet(&self, name: &str) -> Option<String> {
        match name {
            "status" => Some(self.status.to_string()),
            "vehicle" => self.vehicle_id.clone(),
            "driver" => self.driver_id.clone(),
            "destination" => Some(self.destination.clone()),
            _ => None,
        }
    }
}

impl Sortable for Shipment {
    const SORT_KEYS: &'static [&'static str] =
        &["reference", "origin", "destination", "weight", "status", "scheduled"];

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "origin" => SortValue::text(&self.origin),
            "destination" => SortValue::text(&self.destination),
            "weight" => SortValue::Number(self.weight_kg),
            "status" => SortValue::owned(self.status.to_string()),
            "scheduled" => match self.scheduled_on {
                Some(d) => SortValue::owned(format_date(Some(d))),
                None => SortValue::Missing,
            },
            _ => SortValue::text(&self.reference),
        }
    }
}

pub fn seed_drivers() -> Vec<Driver> {
    vec![
        Driver {
            id: "driver-1".to_string(),
            name: "Sam Mensah".to_string(),
            license_number: "DL-48213".to_string(),
            phone: Some("555-0190".to_string()),
            status: DriverStatus::OnDuty,
        },
        Driver {
            id: "driver-2".to_string(),
            name: "Rita Kowalski".to_string(),
            license_number: "DL-77102".to_string(),
            phone: None,
            status: DriverStatus::Available,
        },
    ]
}

pub fn seed_vehicles() -> Vec<Vehicle> {
    vec![
        Vehicle {
            id: "vehicle-1".to_string(),
            registration: "TRK-101".to_string(),
            model: "Volvo FH16".to_string(),
            capacity_kg: 18000.0,
            mileage_km: 120500.0,
            next_service_km: 121000.0,
            status: VehicleStatus::Active,
            driver_id: Some("driver-1".to_string()),
        },
        Vehicle {
            id: "vehicle-2".to_string(),
            registration: "VAN-220".to_string(),
            model: "Ford Transit".to_string(),
            capacity_kg: 1400.0,
            mileage_km: 45200.0,
            next_service_km: 60000.0,
            status: VehicleStatus::Active,
            driver_id: Some("driver-2".to_string()),
        },
        Vehicle {
            id: "vehicle-3".to_string(),
            registration: "TRK-102".to_string(),
            model: "Scania R450".to_string(),
            capacity_kg: 20000.0,
            mileage_km: 200300.0,
            next_service_km: 200000.0,
            status: VehicleStatus::Maintenance,
            driver_id: None,
        },
    ]
}

pub fn seed_shipments() -> Vec<Shipment> {
    let shipment = |id: &str, reference: &str, origin: &str, destination: &str, weight, status, vehicle: &str, driver: &str, date: &str| Shipment {
        id: id.to_string(),
        reference: reference.to_string(),
        origin: origin.to_string(),
        destination: destination.to_string(),
        weight_kg: weight,
        status,
        vehicle_id: Some(vehicle.to_string()),
        driver_id: Some(driver.to_string()),
        scheduled_on: parse_date(date),
    };
    vec![
        shipment("shipment-1", "SHP-1001", "Leeds", "Manchester", 12000.0, ShipmentStatus::Delivered, "vehicle-1", "driver-1", "2024-10-01"),
        shipment("shipment-2", "SHP-1002", "York", "Hull", 900.0, ShipmentStatus::InTransit, "vehicle-2", "driver-2", "2024-10-22"),
        shipment("shipment-3", "SHP-1003", "Leeds", "Sheffield", 15000.0, ShipmentStatus::Pending, "vehicle-1", "driver-1", "2024-10-29"),
    ]
}
