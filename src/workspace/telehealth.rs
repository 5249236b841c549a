//! Telehealth clinic: patients, consultations and prescriptions.

use chrono::{Local, NaiveDate};

use super::{
    choice, entry_for, export_from, import_into, json, optional_date, reference, required,
    required_reference, roll_back, save, unknown_field, AppKind, DeleteReport, EntityKind, Entry, FormState,
    ImportOptions, Stat, Workspace,
};
use crate::entity::telehealth::{
    seed_consultations, seed_patients, seed_prescriptions, Consultation, ConsultationStatus,
    Patient, Prescription,
};
use crate::entity::{format_date, non_blank, resolve_label};
use crate::error::{Result, ValidationError};
use crate::storage::{Collection, KvBackend, Patch};
use crate::transfer::{self, Format, ImportPolicy};
use crate::view::{
    average, project, rate, Aggregate, Filterable, PrescriptionState, Query, Rounding, Sentinel,
    SortState, SortValue, Sortable,
};
use crate::warnings::{check_references, Warning};

/// Accepted satisfaction ratings, inclusive.
pub const RATING_RANGE: std::ops::RangeInclusive<f64> = 1.0..=5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelehealthKind {
    Patient,
    Consultation,
    Prescription,
}

impl EntityKind for TelehealthKind {
    const ALL: &'static [Self] = &[
        TelehealthKind::Patient,
        TelehealthKind::Consultation,
        TelehealthKind::Prescription,
    ];
}

impl std::fmt::Display for TelehealthKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelehealthKind::Patient => write!(f, "patients"),
            TelehealthKind::Consultation => write!(f, "consultations"),
            TelehealthKind::Prescription => write!(f, "prescriptions"),
        }
    }
}

impl std::str::FromStr for TelehealthKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "patient" | "patients" => Ok(TelehealthKind::Patient),
            "consultation" | "consultations" | "visits" => Ok(TelehealthKind::Consultation),
            "prescription" | "prescriptions" | "rx" => Ok(TelehealthKind::Prescription),
            _ => Err(format!(
                "Unknown collection '{}'. Valid collections: patients, consultations, prescriptions",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientForm {
    pub name: String,
    pub date_of_birth: String,
    pub email: String,
    pub phone: String,
    pub condition: String,
}

impl PatientForm {
    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let slot = match field {
            "name" => &mut self.name,
            "date_of_birth" | "dob" | "born" => &mut self.date_of_birth,
            "email" => &mut self.email,
            "phone" => &mut self.phone,
            "condition" => &mut self.condition,
            _ => return Err(unknown_field(field)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("date_of_birth", self.date_of_birth.clone()),
            ("email", self.email.clone()),
            ("phone", self.phone.clone()),
            ("condition", self.condition.clone()),
        ]
    }

    fn validate(&self, today: NaiveDate) -> std::result::Result<Patient, ValidationError> {
        let date_of_birth = optional_date("date_of_birth", &self.date_of_birth)?;
        if date_of_birth.is_some_and(|d| d > today) {
            return Err(ValidationError::new("date_of_birth", "cannot be in the future"));
        }
        let email = non_blank(&self.email);
        if email.as_deref().is_some_and(|e| !e.contains('@')) {
            return Err(ValidationError::new("email", "must contain '@'"));
        }
        Ok(Patient {
            id: String::new(),
            name: required("name", &self.name)?,
            date_of_birth,
            email,
            phone: non_blank(&self.phone),
            condition: non_blank(&self.condition),
        })
    }
}

impl From<&Patient> for PatientForm {
    fn from(patient: &Patient) -> Self {
        Self {
            name: patient.name.clone(),
            date_of_birth: format_date(patient.date_of_birth),
            email: patient.email.clone().unwrap_or_default(),
            phone: patient.phone.clone().unwrap_or_default(),
            condition: patient.condition.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsultationForm {
    pub patient_id: String,
    pub scheduled_on: String,
    pub mode: String,
    pub status: String,
    pub rating: String,
    pub notes: String,
}

impl ConsultationForm {
    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let slot = match field {
            "patient_id" | "patient" => &mut self.patient_id,
            "scheduled_on" | "date" => &mut self.scheduled_on,
            "mode" => &mut self.mode,
            "status" => &mut self.status,
            "rating" => &mut self.rating,
            "notes" => &mut self.notes,
            _ => return Err(unknown_field(field)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("patient_id", self.patient_id.clone()),
            ("scheduled_on", self.scheduled_on.clone()),
            ("mode", self.mode.clone()),
            ("status", self.status.clone()),
            ("rating", self.rating.clone()),
            ("notes", self.notes.clone()),
        ]
    }

    fn validate(&self, patients: &Collection<Patient>) -> std::result::Result<Consultation, ValidationError> {
        let rating = match non_blank(&self.rating) {
            None => None,
            Some(raw) => {
                let value: f64 = raw
                    .parse()
                    .map_err(|_| ValidationError::new("rating", format!("'{}' is not a number", raw)))?;
                if !RATING_RANGE.contains(&value) {
                    return Err(ValidationError::new("rating", "must be between 1 and 5"));
                }
                Some(value)
            }
        };
        Ok(Consultation {
            id: String::new(),
            patient_id: required_reference("patient_id", &self.patient_id, patients)?,
            scheduled_on: optional_date("scheduled_on", &self.scheduled_on)?,
            mode: choice("mode", &self.mode)?,
            status: choice("status", &self.status)?,
            rating,
            notes: non_blank(&self.notes),
        })
    }
}

impl From<&Consultation> for ConsultationForm {
    fn from(consultation: &Consultation) -> Self {
        Self {
            patient_id: consultation.patient_id.clone(),
            scheduled_on: format_date(consultation.scheduled_on),
            mode: consultation.mode.to_string(),
            status: consultation.status.to_string(),
            rating: consultation.rating.map(|r| r.to_string()).unwrap_or_default(),
            notes: consultation.notes.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrescriptionForm {
    pub patient_id: String,
    pub consultation_id: String,
    pub medication: String,
    pub dosage: String,
    pub starts_on: String,
    pub ends_on: String,
}

impl PrescriptionForm {
    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let slot = match field {
            "patient_id" | "patient" => &mut self.patient_id,
            "consultation_id" | "consultation" => &mut self.consultation_id,
            "medication" => &mut self.medication,
            "dosage" => &mut self.dosage,
            "starts_on" | "start" => &mut self.starts_on,
            "ends_on" | "end" => &mut self.ends_on,
            _ => return Err(unknown_field(field)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("patient_id", self.patient_id.clone()),
            ("consultation_id", self.consultation_id.clone()),
            ("medication", self.medication.clone()),
            ("dosage", self.dosage.clone()),
            ("starts_on", self.starts_on.clone()),
            ("ends_on", self.ends_on.clone()),
        ]
    }

    fn validate(
        &self,
        patients: &Collection<Patient>,
        consultations: &Collection<Consultation>,
    ) -> std::result::Result<Prescription, ValidationError> {
        let patient_id = required_reference("patient_id", &self.patient_id, patients)?;
        let consultation_id = reference("consultation_id", &self.consultation_id, consultations)?;
        if let Some(consultation) = consultation_id.as_deref().and_then(|id| consultations.get(id)) {
            if consultation.patient_id != patient_id {
                return Err(ValidationError::new(
                    "consultation_id",
                    "belongs to a different patient",
                ));
            }
        }
        let starts_on = optional_date("starts_on", &self.starts_on)?;
        let ends_on = optional_date("ends_on", &self.ends_on)?;
        if let (Some(start), Some(end)) = (starts_on, ends_on) {
            if end < start {
                return Err(ValidationError::new("ends_on", "must not be before starts_on"));
            }
        }
        Ok(Prescription {
            id: String::new(),
            patient_id,
            consultation_id,
            medication: required("medication", &self.medication)?,
            dosage: required("dosage", &self.dosage)?,
            starts_on,
            ends_on,
        })
    }
}

impl From<&Prescription> for PrescriptionForm {
    fn from(prescription: &Prescription) -> Self {
        Self {
            patient_id: prescription.patient_id.clone(),
            consultation_id: prescription.consultation_id.clone().unwrap_or_default(),
            medication: prescription.medication.clone(),
            dosage: prescription.dosage.clone(),
            starts_on: format_date(prescription.starts_on),
            ends_on: format_date(prescription.ends_on),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelehealthForm {
    Patient(PatientForm),
    Consultation(ConsultationForm),
    Prescription(PrescriptionForm),
}

impl FormState for TelehealthForm {
    type Kind = TelehealthKind;

    fn kind(&self) -> TelehealthKind {
        match self {
            TelehealthForm::Patient(_) => TelehealthKind::Patient,
            TelehealthForm::Consultation(_) => TelehealthKind::Consultation,
            TelehealthForm::Prescription(_) => TelehealthKind::Prescription,
        }
    }

    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        match self {
            TelehealthForm::Patient(form) => form.set(field, value),
            TelehealthForm::Consultation(form) => form.set(field, value),
            TelehealthForm::Prescription(form) => form.set(field, value),
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            TelehealthForm::Patient(form) => form.fields(),
            TelehealthForm::Consultation(form) => form.fields(),
            TelehealthForm::Prescription(form) => form.fields(),
        }
    }
}

/// A prescription with its date-dependent state resolved.
#[derive(Debug, Clone, Copy)]
pub struct PrescriptionView<'a> {
    pub prescription: &'a Prescription,
    pub patient_name: &'a str,
    pub state: PrescriptionState,
}

impl Filterable for PrescriptionView<'_> {
    const FACETS: &'static [&'static str] = &["patient", "state"];

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.prescription.medication.as_str(),
            self.prescription.dosage.as_str(),
            self.patient_name,
        ]
    }

    fn facet(&self, name: &str) -> Option<String> {
        match name {
            "patient" => Some(self.prescription.patient_id.clone()),
            "state" => Some(self.state.to_string()),
            _ => None,
        }
    }
}

impl Sortable for PrescriptionView<'_> {
    const SORT_KEYS: &'static [&'static str] = &["medication", "patient", "start", "end", "state"];

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        let date = |d: Option<NaiveDate>| match d {
            Some(d) => SortValue::owned(format_date(Some(d))),
            None => SortValue::Missing,
        };
        match key {
            "patient" => SortValue::text(self.patient_name),
            "start" => date(self.prescription.starts_on),
            "end" => date(self.prescription.ends_on),
            "state" => SortValue::owned(self.state.to_string()),
            _ => SortValue::text(&self.prescription.medication),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelehealthWorkspace {
    pub patients: Collection<Patient>,
    pub consultations: Collection<Consultation>,
    pub prescriptions: Collection<Prescription>,
    today: NaiveDate,
}

impl TelehealthWorkspace {
    const ROUNDING: Rounding = Rounding::OneDecimal;

    /// Evaluate date-dependent views as of `today` instead of the local date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Mean rating of completed consultations, optionally for one patient.
    pub fn average_rating(&self, patient_id: Option<&str>) -> Aggregate {
        average(
            self.consultations
                .iter()
                .filter(|c| c.status == ConsultationStatus::Completed)
                .filter(|c| patient_id.map_or(true, |id| c.patient_id == id))
                .filter_map(|c| c.rating),
            Self::ROUNDING,
            Self::SENTINEL,
        )
    }

    /// Completed consultations as a share of those no longer scheduled.
    pub fn completion_rate(&self) -> Aggregate {
        let closed: Vec<&Consultation> = self
            .consultations
            .iter()
            .filter(|c| c.status != ConsultationStatus::Scheduled)
            .collect();
        let completed = closed
            .iter()
            .filter(|c| c.status == ConsultationStatus::Completed)
            .count();
        rate(completed, closed.len(), Self::ROUNDING, Self::SENTINEL)
    }

    pub fn prescription_view<'a>(&'a self, prescription: &'a Prescription) -> PrescriptionView<'a> {
        PrescriptionView {
            prescription,
            patient_name: self.patient_name(&prescription.patient_id),
            state: prescription.state(self.today),
        }
    }

    fn patient_name(&self, id: &str) -> &str {
        resolve_label(self.patients.records(), Some(id), |p| &p.name)
    }

    fn patient_entry(&self, patient: &Patient) -> Result<Entry> {
        let consultations = self
            .consultations
            .iter()
            .filter(|c| c.patient_id == patient.id)
            .count();
        let active = self
            .prescriptions
            .iter()
            .filter(|p| p.patient_id == patient.id)
            .filter(|p| {
                matches!(
                    p.state(self.today),
                    PrescriptionState::Active | PrescriptionState::EndingSoon
                )
            })
            .count();
        let rating = self.average_rating(Some(&patient.id));
        let summary = format!(
            "{} | {} | {} consultation(s) | rating {} | {} active prescription(s)",
            patient.name,
            patient.condition.as_deref().unwrap_or("-"),
            consultations,
            rating,
            active
        );
        entry_for(
            patient,
            summary,
            &[
                ("consultations", json(consultations)),
                ("average_rating", json(rating)),
                ("active_prescriptions", json(active)),
            ],
        )
    }

    fn consultation_entry(&self, consultation: &Consultation) -> Result<Entry> {
        let patient = self.patient_name(&consultation.patient_id);
        let rating = consultation
            .rating
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        let summary = format!(
            "{} | {} | {} | {} | rating {}",
            format_date(consultation.scheduled_on),
            patient,
            consultation.mode,
            consultation.status,
            rating
        );
        entry_for(consultation, summary, &[("patient_name", json(patient))])
    }

    fn prescription_entry(&self, view: &PrescriptionView<'_>) -> Result<Entry> {
        let prescription = view.prescription;
        let summary = format!(
            "{} {} | {} | {} to {} | {}",
            prescription.medication,
            prescription.dosage,
            view.patient_name,
            format_date(prescription.starts_on),
            format_date(prescription.ends_on),
            view.state
        );
        entry_for(
            prescription,
            summary,
            &[("patient_name", json(view.patient_name)), ("state", json(view.state))],
        )
    }
}

impl Workspace for TelehealthWorkspace {
    type Kind = TelehealthKind;
    type Form = TelehealthForm;

    const APP: AppKind = AppKind::Telehealth;
    const IMPORT_POLICY: ImportPolicy = ImportPolicy::Strict;
    const SENTINEL: Sentinel = Sentinel::Missing;

    fn load(backend: &mut dyn KvBackend) -> (Self, Vec<Warning>) {
        let (patients, w1) = Collection::load(backend, seed_patients);
        let (consultations, w2) = Collection::load(backend, seed_consultations);
        let (prescriptions, w3) = Collection::load(backend, seed_prescriptions);
        let mut warnings: Vec<Warning> = [w1, w2, w3].into_iter().flatten().collect();

        warnings.extend(check_references(
            "consultation",
            "patient_id",
            consultations.iter().map(|c: &Consultation| c.patient_id.as_str()),
            |id| patients.contains(id),
        ));
        warnings.extend(check_references(
            "prescription",
            "patient_id",
            prescriptions.iter().map(|p: &Prescription| p.patient_id.as_str()),
            |id| patients.contains(id),
        ));
        warnings.extend(check_references(
            "prescription",
            "consultation_id",
            prescriptions
                .iter()
                .filter_map(|p: &Prescription| p.consultation_id.as_deref()),
            |id| consultations.contains(id),
        ));

        (
            Self {
                patients,
                consultations,
                prescriptions,
                today: Local::now().date_naive(),
            },
            warnings,
        )
    }

    fn blank_form(kind: TelehealthKind) -> TelehealthForm {
        match kind {
            TelehealthKind::Patient => TelehealthForm::Patient(PatientForm::default()),
            TelehealthKind::Consultation => TelehealthForm::Consultation(ConsultationForm::default()),
            TelehealthKind::Prescription => TelehealthForm::Prescription(PrescriptionForm::default()),
        }
    }

    fn edit_form(&self, kind: TelehealthKind, id: &str) -> Result<TelehealthForm> {
        Ok(match kind {
            TelehealthKind::Patient => TelehealthForm::Patient(self.patients.require(id)?.into()),
            TelehealthKind::Consultation => {
                TelehealthForm::Consultation(self.consultations.require(id)?.into())
            }
            TelehealthKind::Prescription => {
                TelehealthForm::Prescription(self.prescriptions.require(id)?.into())
            }
        })
    }

    fn submit(
        &mut self,
        backend: &mut dyn KvBackend,
        form: &TelehealthForm,
        target: Option<&str>,
    ) -> Result<String> {
        match form {
            TelehealthForm::Patient(form) => {
                let patient = form.validate(self.today)?;
                save(&mut self.patients, backend, patient, target)
            }
            TelehealthForm::Consultation(form) => {
                let consultation = form.validate(&self.patients)?;
                save(&mut self.consultations, backend, consultation, target)
            }
            TelehealthForm::Prescription(form) => {
                let prescription = form.validate(&self.patients, &self.consultations)?;
                save(&mut self.prescriptions, backend, prescription, target)
            }
        }
    }

    fn patch(
        &mut self,
        backend: &mut dyn KvBackend,
        kind: TelehealthKind,
        id: &str,
        patch: &Patch,
    ) -> Result<String> {
        match kind {
            TelehealthKind::Patient => self.patients.update(backend, id, patch).map(|r| r.id),
            TelehealthKind::Consultation => self.consultations.update(backend, id, patch).map(|r| r.id),
            TelehealthKind::Prescription => self.prescriptions.update(backend, id, patch).map(|r| r.id),
        }
    }

    /// A patient takes their consultations and prescriptions with them.
    /// A consultation only detaches the prescriptions written during it.
    fn delete(&mut self, backend: &mut dyn KvBackend, kind: TelehealthKind, id: &str) -> Result<DeleteReport> {
        match kind {
            TelehealthKind::Patient => {
                self.patients.require(id)?;
                let consultations_before = self.consultations.snapshot();
                let prescriptions_before = self.prescriptions.snapshot();
                let mut cascaded = self.consultations.remove_where(backend, |c| c.patient_id == id)?;
                match self.prescriptions.remove_where(backend, |p| p.patient_id == id) {
                    Ok(n) => cascaded += n,
                    Err(e) => {
                        roll_back(&mut self.consultations, backend, consultations_before);
                        return Err(e);
                    }
                }
                let patient = match self.patients.delete(backend, id) {
                    Ok(patient) => patient,
                    Err(e) => {
                        roll_back(&mut self.prescriptions, backend, prescriptions_before);
                        roll_back(&mut self.consultations, backend, consultations_before);
                        return Err(e);
                    }
                };
                tracing::debug!(patient = %patient.id, cascaded, "removed patient history");
                Ok(DeleteReport {
                    label: patient.name,
                    cascaded,
                    unlinked: 0,
                })
            }
            TelehealthKind::Consultation => {
                self.consultations.require(id)?;
                let prescriptions_before = self.prescriptions.snapshot();
                let unlinked = self.prescriptions.update_where(
                    backend,
                    |p| p.consultation_id.as_deref() == Some(id),
                    |p| p.consultation_id = None,
                )?;
                let consultation = match self.consultations.delete(backend, id) {
                    Ok(consultation) => consultation,
                    Err(e) => {
                        roll_back(&mut self.prescriptions, backend, prescriptions_before);
                        return Err(e);
                    }
                };
                Ok(DeleteReport {
                    label: format!(
                        "consultation on {}",
                        format_date(consultation.scheduled_on)
                    ),
                    cascaded: 0,
                    unlinked,
                })
            }
            TelehealthKind::Prescription => {
                let prescription = self.prescriptions.delete(backend, id)?;
                Ok(DeleteReport {
                    label: prescription.medication,
                    ..DeleteReport::default()
                })
            }
        }
    }

    fn import(
        &mut self,
        backend: &mut dyn KvBackend,
        kind: TelehealthKind,
        text: &str,
        options: &ImportOptions,
    ) -> Result<usize> {
        match kind {
            TelehealthKind::Patient => import_into(&mut self.patients, backend, text, options),
            TelehealthKind::Consultation => import_into(&mut self.consultations, backend, text, options),
            TelehealthKind::Prescription => import_into(&mut self.prescriptions, backend, text, options),
        }
    }

    fn export(&self, kind: TelehealthKind, format: Format) -> Result<String> {
        match kind {
            TelehealthKind::Patient => export_from(&self.patients, format),
            TelehealthKind::Consultation => export_from(&self.consultations, format),
            TelehealthKind::Prescription => export_from(&self.prescriptions, format),
        }
    }

    fn template(kind: TelehealthKind) -> String {
        match kind {
            TelehealthKind::Patient => transfer::template::<Patient>(),
            TelehealthKind::Consultation => transfer::template::<Consultation>(),
            TelehealthKind::Prescription => transfer::template::<Prescription>(),
        }
    }

    fn listing(&self, kind: TelehealthKind, query: &Query, sort: &SortState) -> Result<Vec<Entry>> {
        match kind {
            TelehealthKind::Patient => project(self.patients.records(), query, sort)?
                .into_iter()
                .map(|p| self.patient_entry(p))
                .collect(),
            TelehealthKind::Consultation => project(self.consultations.records(), query, sort)?
                .into_iter()
                .map(|c| self.consultation_entry(c))
                .collect(),
            TelehealthKind::Prescription => {
                let views: Vec<_> = self
                    .prescriptions
                    .iter()
                    .map(|p| self.prescription_view(p))
                    .collect();
                project(&views, query, sort)?
                    .into_iter()
                    .map(|v| self.prescription_entry(v))
                    .collect()
            }
        }
    }

    fn entry(&self, kind: TelehealthKind, id: &str) -> Result<Entry> {
        match kind {
            TelehealthKind::Patient => self.patient_entry(self.patients.require(id)?),
            TelehealthKind::Consultation => self.consultation_entry(self.consultations.require(id)?),
            TelehealthKind::Prescription => {
                let view = self.prescription_view(self.prescriptions.require(id)?);
                self.prescription_entry(&view)
            }
        }
    }

    fn dashboard(&self) -> Vec<Stat> {
        let states = |state: PrescriptionState| {
            self.prescriptions
                .iter()
                .filter(|p| p.state(self.today) == state)
                .count()
        };
        let upcoming = self
            .consultations
            .iter()
            .filter(|c| c.status == ConsultationStatus::Scheduled)
            .count();
        vec![
            Stat::new("Patients", self.patients.len()),
            Stat::new("Consultations", self.consultations.len()),
            Stat::new("Scheduled", upcoming),
            Stat::new("Completion rate %", self.completion_rate()),
            Stat::new("Average rating", self.average_rating(None)),
            Stat::new("Active prescriptions", states(PrescriptionState::Active)),
            Stat::new("Ending soon", states(PrescriptionState::EndingSoon)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::parse_date;
    use crate::storage::{FailingBackend, MemoryBackend};
    use crate::transfer::CsvDialect;

    fn day(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn workspace() -> (TelehealthWorkspace, MemoryBackend) {
        let mut backend = MemoryBackend::new();
        let (ws, warnings) = TelehealthWorkspace::load(&mut backend);
        assert!(warnings.is_empty());
        (ws.with_today(day("2024-12-05")), backend)
    }

    #[test]
    fn test_rating_and_completion() {
        let (ws, _) = workspace();
        // (4.5 + 4.0) / 2
        assert_eq!(ws.average_rating(None), Aggregate::Value(4.3));
        assert_eq!(ws.average_rating(Some("patient-2")), Aggregate::Value(4.0));
        assert_eq!(ws.completion_rate(), Aggregate::Value(100.0));
    }

    #[test]
    fn test_empty_aggregates_are_missing() {
        let mut backend = MemoryBackend::new();
        let (mut ws, _) = TelehealthWorkspace::load(&mut backend);
        ws.consultations.remove_where(&mut backend, |_| true).unwrap();
        assert_eq!(ws.average_rating(None), Aggregate::Missing);
        assert_eq!(ws.completion_rate(), Aggregate::Missing);
        let rating = ws
            .dashboard()
            .into_iter()
            .find(|s| s.label == "Average rating")
            .unwrap();
        assert_eq!(rating.value, "N/A");
    }

    #[test]
    fn test_delete_patient_cascades() {
        let (mut ws, mut backend) = workspace();
        let report = ws.delete(&mut backend, TelehealthKind::Patient, "patient-1").unwrap();
        // two consultations, one prescription
        assert_eq!(report.cascaded, 3);
        assert_eq!(ws.consultations.len(), 1);
        assert_eq!(ws.prescriptions.len(), 1);
        assert!(ws.prescriptions.iter().all(|p| p.patient_id == "patient-2"));
    }

    #[test]
    fn test_failed_patient_write_restores_history() {
        let mut backend = FailingBackend::failing_on("telehealth.patients");
        let (mut ws, _) = TelehealthWorkspace::load(&mut backend);

        assert!(ws.delete(&mut backend, TelehealthKind::Patient, "patient-1").is_err());
        assert_eq!(ws.consultations.len(), 3);
        assert_eq!(ws.prescriptions.len(), 2);

        let (reloaded, warnings) = TelehealthWorkspace::load(&mut backend);
        assert!(warnings.is_empty());
        assert_eq!(reloaded.consultations.len(), 3);
        assert_eq!(reloaded.prescriptions.len(), 2);
    }

    #[test]
    fn test_failed_prescription_write_restores_consultations() {
        let mut backend = FailingBackend::failing_on("telehealth.prescriptions");
        let (mut ws, _) = TelehealthWorkspace::load(&mut backend);

        assert!(ws.delete(&mut backend, TelehealthKind::Patient, "patient-1").is_err());
        assert!(ws.patients.contains("patient-1"));
        let (reloaded, _) = TelehealthWorkspace::load(&mut backend);
        assert_eq!(reloaded.consultations.len(), 3);
    }

    #[test]
    fn test_delete_consultation_detaches_prescription() {
        let (mut ws, mut backend) = workspace();
        let report = ws
            .delete(&mut backend, TelehealthKind::Consultation, "consultation-2")
            .unwrap();
        assert_eq!(report.unlinked, 1);
        let prescription = ws.prescriptions.get("prescription-2").unwrap();
        assert_eq!(prescription.consultation_id, None);
    }

    #[test]
    fn test_prescription_state_facet() {
        let (ws, _) = workspace();
        let query = Query::new().with_facet("state", "Ending Soon");
        let rows = ws
            .listing(TelehealthKind::Prescription, &query, &SortState::new())
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "prescription-2");
        assert_eq!(rows[0].detail["state"], "Ending Soon");
        assert_eq!(rows[0].detail["patient_name"], "Omar Haddad");
    }

    #[test]
    fn test_state_follows_today() {
        let (ws, _) = workspace();
        let ws = ws.with_today(day("2025-01-01"));
        let entry = ws.entry(TelehealthKind::Prescription, "prescription-2").unwrap();
        assert_eq!(entry.detail["state"], "Expired");
    }

    #[test]
    fn test_rating_out_of_range_rejected() {
        let (mut ws, mut backend) = workspace();
        let mut form = TelehealthWorkspace::blank_form(TelehealthKind::Consultation);
        form.set("patient", "patient-2").unwrap();
        form.set("rating", "6").unwrap();
        let err = ws.submit(&mut backend, &form, None).unwrap_err();
        assert!(err.to_string().contains("between 1 and 5"));

        form.set("rating", "5").unwrap();
        form.set("status", "completed").unwrap();
        ws.submit(&mut backend, &form, None).unwrap();
        assert_eq!(ws.average_rating(Some("patient-2")), Aggregate::Value(4.5));
    }

    #[test]
    fn test_prescription_must_match_consultation_patient() {
        let (mut ws, mut backend) = workspace();
        let mut form = TelehealthWorkspace::blank_form(TelehealthKind::Prescription);
        for (field, value) in [
            ("patient", "patient-2"),
            ("consultation", "consultation-1"),
            ("medication", "Budesonide"),
            ("dosage", "200mcg"),
        ] {
            form.set(field, value).unwrap();
        }
        let err = ws.submit(&mut backend, &form, None).unwrap_err();
        assert!(err.to_string().contains("different patient"));
        assert_eq!(ws.prescriptions.len(), 2);
    }

    #[test]
    fn test_future_birth_date_rejected() {
        let (mut ws, mut backend) = workspace();
        let mut form = TelehealthWorkspace::blank_form(TelehealthKind::Patient);
        form.set("name", "Nia Brooks").unwrap();
        form.set("dob", "2030-01-01").unwrap();
        assert!(ws.submit(&mut backend, &form, None).is_err());
    }

    #[test]
    fn test_strict_import_rolls_back() {
        let (mut ws, mut backend) = workspace();
        let options = ImportOptions {
            format: Format::Csv,
            dialect: CsvDialect::Standard,
            policy: ImportPolicy::Strict,
        };
        let csv = "Patient ID,Date,Mode,Status,Rating,Notes\n\
                   patient-1,2024-12-01,video,completed,5,Follow-up\n\
                   patient-2,2024-12-02,fax,completed,4,Check\n";
        let err = ws
            .import(&mut backend, TelehealthKind::Consultation, csv, &options)
            .unwrap_err();
        assert!(err.to_string().contains("line 3"));
        assert_eq!(ws.consultations.len(), 3);
    }
}
