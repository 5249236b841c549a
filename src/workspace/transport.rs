//! Fleet management: drivers, vehicles and shipments.

use super::{
    choice, entry_for, export_from, import_into, json, number, number_or, optional_date, reference,
    required, roll_back, save, unknown_field, AppKind, DeleteReport, EntityKind, Entry, FormState,
    ImportOptions, Stat, Workspace,
};
use crate::entity::transport::{
    seed_drivers, seed_shipments, seed_vehicles, Driver, Shipment, ShipmentStatus, Vehicle,
};
use crate::entity::{find, format_date, non_blank, resolve_label};
use crate::error::{Result, ValidationError};
use crate::storage::{Collection, KvBackend, Patch};
use crate::transfer::{self, Format, ImportPolicy};
use crate::view::{
    average, percentage, project, rate, Aggregate, Query, Rounding, Sentinel, ServiceStatus,
    SortState,
};
use crate::warnings::{check_references, Warning};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Driver,
    Vehicle,
    Shipment,
}

impl EntityKind for TransportKind {
    const ALL: &'static [Self] = &[
        TransportKind::Driver,
        TransportKind::Vehicle,
        TransportKind::Shipment,
    ];
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Driver => write!(f, "drivers"),
            TransportKind::Vehicle => write!(f, "vehicles"),
            TransportKind::Shipment => write!(f, "shipments"),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "driver" | "drivers" => Ok(TransportKind::Driver),
            "vehicle" | "vehicles" | "fleet" => Ok(TransportKind::Vehicle),
            "shipment" | "shipments" => Ok(TransportKind::Shipment),
            _ => Err(format!(
                "Unknown collection '{}'. Valid collections: drivers, vehicles, shipments",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverForm {
    pub name: String,
    pub license_number: String,
    pub phone: String,
    pub status: String,
}

impl DriverForm {
    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let slot = match field {
            "name" => &mut self.name,
            "license_number" | "license" => &mut self.license_number,
            "phone" => &mut self.phone,
            "status" => &mut self.status,
            _ => return Err(unknown_field(field)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("license_number", self.license_number.clone()),
            ("phone", self.phone.clone()),
            ("status", self.status.clone()),
        ]
    }

    fn validate(&self) -> std::result::Result<Driver, ValidationError> {
        Ok(Driver {
            id: String::new(),
            name: required("name", &self.name)?,
            license_number: required("license_number", &self.license_number)?,
            phone: non_blank(&self.phone),
            status: choice("status", &self.status)?,
        })
    }
}

impl From<&Driver> for DriverForm {
    fn from(driver: &Driver) -> Self {
        Self {
            name: driver.name.clone(),
            license_number: driver.license_number.clone(),
            phone: driver.phone.clone().unwrap_or_default(),
            status: driver.status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleForm {
    pub registration: String,
    pub model: String,
    pub capacity_kg: String,
    pub mileage_km: String,
    pub next_service_km: String,
    pub status: String,
    pub driver_id: String,
}

impl VehicleForm {
    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let slot = match field {
            "registration" => &mut self.registration,
            "model" => &mut self.model,
            "capacity_kg" | "capacity" => &mut self.capacity_kg,
            "mileage_km" | "mileage" => &mut self.mileage_km,
            "next_service_km" | "next_service" => &mut self.next_service_km,
            "status" => &mut self.status,
            "driver_id" | "driver" => &mut self.driver_id,
            _ => return Err(unknown_field(field)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("registration", self.registration.clone()),
            ("model", self.model.clone()),
            ("capacity_kg", self.capacity_kg.clone()),
            ("mileage_km", self.mileage_km.clone()),
            ("next_service_km", self.next_service_km.clone()),
            ("status", self.status.clone()),
            ("driver_id", self.driver_id.clone()),
        ]
    }

    fn validate(&self, drivers: &Collection<Driver>) -> std::result::Result<Vehicle, ValidationError> {
        let capacity_kg: f64 = number("capacity_kg", &self.capacity_kg)?;
        if !capacity_kg.is_finite() || capacity_kg <= 0.0 {
            return Err(ValidationError::new("capacity_kg", "must be greater than 0"));
        }
        let mileage_km: f64 = number_or("mileage_km", &self.mileage_km, 0.0)?;
        let next_service_km: f64 = number_or("next_service_km", &self.next_service_km, 0.0)?;
        for (field, value) in [("mileage_km", mileage_km), ("next_service_km", next_service_km)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::new(field, "cannot be negative"));
            }
        }
        Ok(Vehicle {
            id: String::new(),
            registration: required("registration", &self.registration)?,
            model: required("model", &self.model)?,
            capacity_kg,
            mileage_km,
            next_service_km,
            status: choice("status", &self.status)?,
            driver_id: reference("driver_id", &self.driver_id, drivers)?,
        })
    }
}

impl From<&Vehicle> for VehicleForm {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            registration: vehicle.registration.clone(),
            model: vehicle.model.clone(),
            capacity_kg: vehicle.capacity_kg.to_string(),
            mileage_km: vehicle.mileage_km.to_string(),
            next_service_km: vehicle.next_service_km.to_string(),
            status: vehicle.status.to_string(),
            driver_id: vehicle.driver_id.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShipmentForm {
    pub reference: String,
    pub origin: String,
    pub destination: String,
    pub weight_kg: String,
    pub status: String,
    pub vehicle_id: String,
    pub driver_id: String,
    pub scheduled_on: String,
}

impl ShipmentForm {
    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let slot = match field {
            "reference" | "ref" => &mut self.reference,
            "origin" => &mut self.origin,
            "destination" => &mut self.destination,
            "weight_kg" | "weight" => &mut self.weight_kg,
            "status" => &mut self.status,
            "vehicle_id" | "vehicle" => &mut self.vehicle_id,
            "driver_id" | "driver" => &mut self.driver_id,
            "scheduled_on" | "scheduled" => &mut self.scheduled_on,
            _ => return Err(unknown_field(field)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("reference", self.reference.clone()),
            ("origin", self.origin.clone()),
            ("destination", self.destination.clone()),
            ("weight_kg", self.weight_kg.clone()),
            ("status", self.status.clone()),
            ("vehicle_id", self.vehicle_id.clone()),
            ("driver_id", self.driver_id.clone()),
            ("scheduled_on", self.scheduled_on.clone()),
        ]
    }

    fn validate(
        &self,
        vehicles: &Collection<Vehicle>,
        drivers: &Collection<Driver>,
    ) -> std::result::Result<Shipment, ValidationError> {
        let weight_kg: f64 = number("weight_kg", &self.weight_kg)?;
        if !weight_kg.is_finite() || weight_kg < 0.0 {
            return Err(ValidationError::new("weight_kg", "cannot be negative"));
        }
        let vehicle_id = reference("vehicle_id", &self.vehicle_id, vehicles)?;
        if let Some(vehicle) = vehicle_id.as_deref().and_then(|id| vehicles.get(id)) {
            if weight_kg > vehicle.capacity_kg {
                return Err(ValidationError::new(
                    "weight_kg",
                    format!("exceeds {} capacity of {} kg", vehicle.registration, vehicle.capacity_kg),
                ));
            }
        }
        Ok(Shipment {
            id: String::new(),
            reference: required("reference", &self.reference)?,
            origin: required("origin", &self.origin)?,
            destination: required("destination", &self.destination)?,
            weight_kg,
            status: choice("status", &self.status)?,
            vehicle_id,
            driver_id: reference("driver_id", &self.driver_id, drivers)?,
            scheduled_on: optional_date("scheduled_on", &self.scheduled_on)?,
        })
    }
}

impl From<&Shipment> for ShipmentForm {
    fn from(shipment: &Shipment) -> Self {
        Self {
            reference: shipment.reference.clone(),
            origin: shipment.origin.clone(),
            destination: shipment.destination.clone(),
            weight_kg: shipment.weight_kg.to_string(),
            status: shipment.status.to_string(),
            vehicle_id: shipment.vehicle_id.clone().unwrap_or_default(),
            driver_id: shipment.driver_id.clone().unwrap_or_default(),
            scheduled_on: format_date(shipment.scheduled_on),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportForm {
    Driver(DriverForm),
    Vehicle(VehicleForm),
    Shipment(ShipmentForm),
}

impl FormState for TransportForm {
    type Kind = TransportKind;

    fn kind(&self) -> TransportKind {
        match self {
            TransportForm::Driver(_) => TransportKind::Driver,
            TransportForm::Vehicle(_) => TransportKind::Vehicle,
            TransportForm::Shipment(_) => TransportKind::Shipment,
        }
    }

    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        match self {
            TransportForm::Driver(form) => form.set(field, value),
            TransportForm::Vehicle(form) => form.set(field, value),
            TransportForm::Shipment(form) => form.set(field, value),
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            TransportForm::Driver(form) => form.fields(),
            TransportForm::Vehicle(form) => form.fields(),
            TransportForm::Shipment(form) => form.fields(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransportWorkspace {
    pub drivers: Collection<Driver>,
    pub vehicles: Collection<Vehicle>,
    pub shipments: Collection<Shipment>,
}

impl TransportWorkspace {
    const ROUNDING: Rounding = Rounding::Integer;

    /// Delivered shipments as a share of all non-cancelled ones.
    pub fn delivery_rate(&self) -> Aggregate {
        let live: Vec<&Shipment> = self
            .shipments
            .iter()
            .filter(|s| s.status != ShipmentStatus::Cancelled)
            .collect();
        let delivered = live.iter().filter(|s| s.status == ShipmentStatus::Delivered).count();
        rate(delivered, live.len(), Self::ROUNDING, Self::SENTINEL)
    }

    /// Mean load as a percentage of the assigned vehicle's capacity.
    /// Shipments without a resolvable vehicle are skipped.
    pub fn load_factor(&self) -> Aggregate {
        average(
            self.shipments.iter().filter_map(|s| {
                let vehicle = find(self.vehicles.records(), s.vehicle_id.as_deref()?)?;
                percentage(s.weight_kg, vehicle.capacity_kg)
            }),
            Self::ROUNDING,
            Self::SENTINEL,
        )
    }

    fn driver_name(&self, id: Option<&str>) -> &str {
        resolve_label(self.drivers.records(), id, |d| &d.name)
    }

    fn driver_entry(&self, driver: &Driver) -> Result<Entry> {
        let vehicles = self
            .vehicles
            .iter()
            .filter(|v| v.driver_id.as_deref() == Some(driver.id.as_str()))
            .count();
        let summary = format!(
            "{} | {} | {} | {} vehicle(s)",
            driver.name, driver.license_number, driver.status, vehicles
        );
        entry_for(driver, summary, &[("vehicles", json(vehicles))])
    }

    fn vehicle_entry(&self, vehicle: &Vehicle) -> Result<Entry> {
        let driver = self.driver_name(vehicle.driver_id.as_deref());
        let service = vehicle.service_status();
        let summary = format!(
            "{} {} | {} | {} km (service at {}) {} | {}",
            vehicle.registration,
            vehicle.model,
            vehicle.status,
            vehicle.mileage_km,
            vehicle.next_service_km,
            service,
            driver
        );
        entry_for(
            vehicle,
            summary,
            &[("service", json(service)), ("driver_name", json(driver))],
        )
    }

    fn shipment_entry(&self, shipment: &Shipment) -> Result<Entry> {
        let vehicle = resolve_label(self.vehicles.records(), shipment.vehicle_id.as_deref(), |v| {
            &v.registration
        });
        let driver = self.driver_name(shipment.driver_id.as_deref());
        let summary = format!(
            "{} {} -> {} | {} kg | {} | {} / {} | {}",
            shipment.reference,
            shipment.origin,
            shipment.destination,
            shipment.weight_kg,
            shipment.status,
            vehicle,
            driver,
            format_date(shipment.scheduled_on)
        );
        entry_for(
            shipment,
            summary,
            &[("vehicle_registration", json(vehicle)), ("driver_name", json(driver))],
        )
    }
}

impl Workspace for TransportWorkspace {
    type Kind = TransportKind;
    type Form = TransportForm;

    const APP: AppKind = AppKind::Transport;
    const IMPORT_POLICY: ImportPolicy = ImportPolicy::Lenient;
    const SENTINEL: Sentinel = Sentinel::Zero;

    fn load(backend: &mut dyn KvBackend) -> (Self, Vec<Warning>) {
        let (drivers, w1) = Collection::load(backend, seed_drivers);
        let (vehicles, w2) = Collection::load(backend, seed_vehicles);
        let (shipments, w3) = Collection::load(backend, seed_shipments);
        let mut warnings: Vec<Warning> = [w1, w2, w3].into_iter().flatten().collect();

        warnings.extend(check_references(
            "vehicle",
            "driver_id",
            vehicles.iter().filter_map(|v: &Vehicle| v.driver_id.as_deref()),
            |id| drivers.contains(id),
        ));
        warnings.extend(check_references(
            "shipment",
            "vehicle_id",
            shipments.iter().filter_map(|s: &Shipment| s.vehicle_id.as_deref()),
            |id| vehicles.contains(id),
        ));
        warnings.extend(check_references(
            "shipment",
            "driver_id",
            shipments.iter().filter_map(|s: &Shipment| s.driver_id.as_deref()),
            |id| drivers.contains(id),
        ));

        (
            Self {
                drivers,
                vehicles,
                shipments,
            },
            warnings,
        )
    }

    fn blank_form(kind: TransportKind) -> TransportForm {
        match kind {
            TransportKind::Driver => TransportForm::Driver(DriverForm::default()),
            TransportKind::Vehicle => TransportForm::Vehicle(VehicleForm::default()),
            TransportKind::Shipment => TransportForm::Shipment(ShipmentForm::default()),
        }
    }

    fn edit_form(&self, kind: TransportKind, id: &str) -> Result<TransportForm> {
        Ok(match kind {
            TransportKind::Driver => TransportForm::Driver(self.drivers.require(id)?.into()),
            TransportKind::Vehicle => TransportForm::Vehicle(self.vehicles.require(id)?.into()),
            TransportKind::Shipment => TransportForm::Shipment(self.shipments.require(id)?.into()),
        })
    }

    fn submit(
        &mut self,
        backend: &mut dyn KvBackend,
        form: &TransportForm,
        target: Option<&str>,
    ) -> Result<String> {
        match form {
            TransportForm::Driver(form) => {
                let driver = form.validate()?;
                save(&mut self.drivers, backend, driver, target)
            }
            TransportForm::Vehicle(form) => {
                let vehicle = form.validate(&self.drivers)?;
                save(&mut self.vehicles, backend, vehicle, target)
            }
            TransportForm::Shipment(form) => {
                let shipment = form.validate(&self.vehicles, &self.drivers)?;
                save(&mut self.shipments, backend, shipment, target)
            }
        }
    }

    fn patch(
        &mut self,
        backend: &mut dyn KvBackend,
        kind: TransportKind,
        id: &str,
        patch: &Patch,
    ) -> Result<String> {
        match kind {
            TransportKind::Driver => self.drivers.update(backend, id, patch).map(|r| r.id),
            TransportKind::Vehicle => self.vehicles.update(backend, id, patch).map(|r| r.id),
            TransportKind::Shipment => self.shipments.update(backend, id, patch).map(|r| r.id),
        }
    }

    /// Nothing cascades here: removing a driver or vehicle only clears
    /// the references to it.
    fn delete(&mut self, backend: &mut dyn KvBackend, kind: TransportKind, id: &str) -> Result<DeleteReport> {
        match kind {
            TransportKind::Driver => {
                self.drivers.require(id)?;
                let vehicles_before = self.vehicles.snapshot();
                let shipments_before = self.shipments.snapshot();
                let mut unlinked = self.vehicles.update_where(
                    backend,
                    |v| v.driver_id.as_deref() == Some(id),
                    |v| v.driver_id = None,
                )?;
                let unlinked_shipments = self.shipments.update_where(
                    backend,
                    |s| s.driver_id.as_deref() == Some(id),
                    |s| s.driver_id = None,
                );
                match unlinked_shipments {
                    Ok(n) => unlinked += n,
                    Err(e) => {
                        roll_back(&mut self.vehicles, backend, vehicles_before);
                        return Err(e);
                    }
                }
                let driver = match self.drivers.delete(backend, id) {
                    Ok(driver) => driver,
                    Err(e) => {
                        roll_back(&mut self.shipments, backend, shipments_before);
                        roll_back(&mut self.vehicles, backend, vehicles_before);
                        return Err(e);
                    }
                };
                Ok(DeleteReport {
                    label: driver.name,
                    cascaded: 0,
                    unlinked,
                })
            }
            TransportKind::Vehicle => {
                self.vehicles.require(id)?;
                let shipments_before = self.shipments.snapshot();
                let unlinked = self.shipments.update_where(
                    backend,
                    |s| s.vehicle_id.as_deref() == Some(id),
                    |s| s.vehicle_id = None,
                )?;
                let vehicle = match self.vehicles.delete(backend, id) {
                    Ok(vehicle) => vehicle,
                    Err(e) => {
                        roll_back(&mut self.shipments, backend, shipments_before);
                        return Err(e);
                    }
                };
                Ok(DeleteReport {
                    label: vehicle.registration,
                    cascaded: 0,
                    unlinked,
                })
            }
            TransportKind::Shipment => {
                let shipment = self.shipments.delete(backend, id)?;
                Ok(DeleteReport {
                    label: shipment.reference,
                    ..DeleteReport::default()
                })
            }
        }
    }

    fn import(
        &mut self,
        backend: &mut dyn KvBackend,
        kind: TransportKind,
        text: &str,
        options: &ImportOptions,
    ) -> Result<usize> {
        match kind {
            TransportKind::Driver => import_into(&mut self.drivers, backend, text, options),
            TransportKind::Vehicle => import_into(&mut self.vehicles, backend, text, options),
            TransportKind::Shipment => import_into(&mut self.shipments, backend, text, options),
        }
    }

    fn export(&self, kind: TransportKind, format: Format) -> Result<String> {
        match kind {
            TransportKind::Driver => export_from(&self.drivers, format),
            TransportKind::Vehicle => export_from(&self.vehicles, format),
            TransportKind::Shipment => export_from(&self.shipments, format),
        }
    }

    fn template(kind: TransportKind) -> String {
        match kind {
            TransportKind::Driver => transfer::template::<Driver>(),
            TransportKind::Vehicle => transfer::template::<Vehicle>(),
            TransportKind::Shipment => transfer::template::<Shipment>(),
        }
    }

    fn listing(&self, kind: TransportKind, query: &Query, sort: &SortState) -> Result<Vec<Entry>> {
        match kind {
            TransportKind::Driver => project(self.drivers.records(), query, sort)?
                .into_iter()
                .map(|d| self.driver_entry(d))
                .collect(),
            TransportKind::Vehicle => project(self.vehicles.records(), query, sort)?
                .into_iter()
                .map(|v| self.vehicle_entry(v))
                .collect(),
            TransportKind::Shipment => project(self.shipments.records(), query, sort)?
                .into_iter()
                .map(|s| self.shipment_entry(s))
                .collect(),
        }
    }

    fn entry(&self, kind: TransportKind, id: &str) -> Result<Entry> {
        match kind {
            TransportKind::Driver => self.driver_entry(self.drivers.require(id)?),
            TransportKind::Vehicle => self.vehicle_entry(self.vehicles.require(id)?),
            TransportKind::Shipment => self.shipment_entry(self.shipments.require(id)?),
        }
    }

    fn dashboard(&self) -> Vec<Stat> {
        let service = |status: ServiceStatus| {
            self.vehicles
                .iter()
                .filter(|v| v.service_status() == status)
                .count()
        };
        let shipments = |status: ShipmentStatus| {
            self.shipments.iter().filter(|s| s.status == status).count()
        };
        vec![
            Stat::new("Drivers", self.drivers.len()),
            Stat::new("Vehicles", self.vehicles.len()),
            Stat::new("Service overdue", service(ServiceStatus::Overdue)),
            Stat::new("Service due soon", service(ServiceStatus::DueSoon)),
            Stat::new("Shipments", self.shipments.len()),
            Stat::new("In transit", shipments(ShipmentStatus::InTransit)),
            Stat::new("Delivery rate %", self.delivery_rate()),
            Stat::new("Average load %", self.load_factor()),
        ]
    }
}
