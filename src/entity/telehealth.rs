use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{format_date, parse_date, Record};
use crate::error::ImportError;
use crate::transfer::{CsvRecord, Row};
use crate::view::{Filterable, PrescriptionState, SortValue, Sortable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConsultationMode {
    #[default]
    Video,
    Phone,
    InPerson,
}

impl std::fmt::Display for ConsultationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsultationMode::Video => write!(f, "video"),
            ConsultationMode::Phone => write!(f, "phone"),
            ConsultationMode::InPerson => write!(f, "in-person"),
        }
    }
}

impl std::str::FromStr for ConsultationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', ' '], "-").as_str() {
            "video" => Ok(ConsultationMode::Video),
            "phone" | "audio" => Ok(ConsultationMode::Phone),
            "in-person" | "inperson" => Ok(ConsultationMode::InPerson),
            _ => Err(format!("Invalid consultation mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConsultationStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl std::fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsultationStatus::Scheduled => write!(f, "scheduled"),
            ConsultationStatus::Completed => write!(f, "completed"),
            ConsultationStatus::Cancelled => write!(f, "cancelled"),
            ConsultationStatus::NoShow => write!(f, "no-show"),
        }
    }
}

impl std::str::FromStr for ConsultationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', ' '], "-").as_str() {
            "scheduled" => Ok(ConsultationStatus::Scheduled),
            "completed" => Ok(ConsultationStatus::Completed),
            "cancelled" | "canceled" => Ok(ConsultationStatus::Cancelled),
            "no-show" | "noshow" => Ok(ConsultationStatus::NoShow),
            _ => Err(format!("Invalid consultation status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    pub id: String,
    pub patient_id: String,
    #[serde(default)]
    pub scheduled_on: Option<NaiveDate>,
    #[serde(default)]
    pub mode: ConsultationMode,
    #[serde(default)]
    pub status: ConsultationStatus,
    /// Patient satisfaction, 1 to 5.
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: String,
    pub patient_id: String,
    #[serde(default)]
    pub consultation_id: Option<String>,
    pub medication: String,
    pub dosage: String,
    #[serde(default)]
    pub starts_on: Option<NaiveDate>,
    #[serde(default)]
    pub ends_on: Option<NaiveDate>,
}

impl Prescription {
    pub fn state(&self, today: NaiveDate) -> PrescriptionState {
        PrescriptionState::on(self.starts_on, self.ends_on, today)
    }
}

impl Record for Patient {
    const KEY: &'static str = "telehealth.patients";
    const LABEL: &'static str = "patient";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Record for Consultation {
    const KEY: &'static str = "telehealth.consultations";
    const LABEL: &'static str = "consultation";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Record for Prescription {
    const KEY: &'static str = "telehealth.prescriptions";
    const LABEL: &'static str = "prescription";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl CsvRecord for Patient {
    const COLUMNS: &'static [&'static str] =
        &["Full Name", "Date of Birth", "Email", "Phone", "Condition"];
    const REQUIRED: &'static [&'static str] = &["Full Name"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            format_date(self.date_of_birth),
            self.email.clone().unwrap_or_default(),
            self.phone.clone().unwrap_or_default(),
            self.condition.clone().unwrap_or_default(),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(Patient {
            id: String::new(),
            name: row.required("Full Name", "Unnamed patient")?,
            date_of_birth: row.date("Date of Birth")?,
            email: row.text("Email"),
            phone: row.text("Phone"),
            condition: row.text("Condition"),
        })
    }
}

impl CsvRecord for Consultation {
    const COLUMNS: &'static [&'static str] =
        &["Patient ID", "Date", "Mode", "Status", "Rating", "Notes"];
    const REQUIRED: &'static [&'static str] = &["Patient ID", "Date"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.patient_id.clone(),
            format_date(self.scheduled_on),
            self.mode.to_string(),
            self.status.to_string(),
            self.rating.map(|r| r.to_string()).unwrap_or_default(),
            self.notes.clone().unwrap_or_default(),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self, ImportError> {
        let rating = match row.get("Rating") {
            Some(_) => Some(row.number("Rating", 0.0)?),
            None => None,
        };
        Ok(Consultation {
            id: String::new(),
            patient_id: row.required("Patient ID", "")?,
            scheduled_on: row.required_date("Date")?,
            mode: row.choice("Mode")?,
            status: row.choice("Status")?,
            rating,
            notes: row.text("Notes"),
        })
    }
}

impl CsvRecord for Prescription {
    const COLUMNS: &'static [&'static str] = &[
        "Patient ID",
        "Consultation ID",
        "Medication",
        "Dosage",
        "Start Date",
        "End Date",
    ];
    const REQUIRED: &'static [&'static str] = &["Patient ID", "Medication"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.patient_id.clone(),
            self.consultation_id.clone().unwrap_or_default(),
            self.medication.clone(),
            self.dosage.clone(),
            format_date(self.starts_on),
            format_date(self.ends_on),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(Prescription {
            id: String::new(),
            patient_id: row.required("Patient ID", "")?,
            consultation_id: row.text("Consultation ID"),
            medication: row.required("Medication", "")?,
            dosage: row.text("Dosage").unwrap_or_default(),
            starts_on: row.date("Start Date")?,
            ends_on: row.date("End Date")?,
        })
    }
}

impl Filterable for Patient {
    const FACETS: &'static [&'static str] = &["condition"];

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.email.as_deref());
        fields.extend(self.condition.as_deref());
        fields
    }

    fn facet(&self, name: &str) -> Option<String> {
        match name {
            "condition" => self.condition.clone(),
            _ => None,
        }
    }
}

impl Sortable for Patient {
    const SORT_KEYS: &'static [&'static str] = &["name", "born", "condition"];

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "born" => date_value(self.date_of_birth),
            "condition" => SortValue::opt_text(self.condition.as_deref()),
            _ => SortValue::text(&self.name),
        }
    }
}

impl Filterable for Consultation {
    const FACETS: &'static [&'static str] = &["patient", "mode", "status"];

    fn search_fields(&self) -> Vec<&str> {
        self.notes.as_deref().into_iter().collect()
    }

    fn facet(&self, name: &str) -> Option<String> {
        match name {
            "patient" => Some(self.patient_id.clone()),
            "mode" => Some(self.mode.to_string()),
            "status" => Some(self.status.to_string()),
            _ => None,
        }
    }
}

impl Sortable for Consultation {
    const SORT_KEYS: &'static [&'static str] = &["date", "mode", "status", "rating"];

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "mode" => SortValue::owned(self.mode.to_string()),
            "status" => SortValue::owned(self.status.to_string()),
            "rating" => self.rating.map(SortValue::Number).unwrap_or(SortValue::Missing),
            _ => date_value(self.scheduled_on),
        }
    }
}

fn date_value(date: Option<NaiveDate>) -> SortValue<'static> {
    match date {
        Some(d) => SortValue::owned(format_date(Some(d))),
        None => SortValue::Missing,
    }
}

pub fn seed_patients() -> Vec<Patient> {
    vec![
        Patient {
            id: "patient-1".to_string(),
            name: "Grace Liu".to_string(),
            date_of_birth: parse_date("1984-03-12"),
            email: Some("grace@mail.test".to_string()),
            phone: Some("555-0111".to_string()),
            condition: Some("Hypertension".to_string()),
        },
        Patient {
            id: "patient-2".to_string(),
            name: "Omar Haddad".to_string(),
            date_of_birth: parse_date("1991-07-30"),
            email: None,
            phone: Some("555-0178".to_string()),
            condition: Some("Asthma".to_string()),
        },
    ]
}

pub fn seed_consultations() -> Vec<Consultation> {
    vec![
        Consultation {
            id: "consultation-1".to_string(),
            patient_id: "patient-1".to_string(),
            scheduled_on: parse_date("2024-10-02"),
            mode: ConsultationMode::Video,
            status: ConsultationStatus::Completed,
            rating: Some(4.5),
            notes: Some("Blood pressure review".to_string()),
        },
        Consultation {
            id: "consultation-2".to_string(),
            patient_id: "patient-2".to_string(),
            scheduled_on: parse_date("2024-10-09"),
            mode: ConsultationMode::Phone,
            status: ConsultationStatus::Completed,
            rating: Some(4.0),
            notes: Some("Inhaler refill".to_string()),
        },
        Consultation {
            id: "consultation-3".to_string(),
            patient_id: "patient-1".to_string(),
            scheduled_on: parse_date("2024-11-06"),
            mode: ConsultationMode::Video,
            status: ConsultationStatus::Scheduled,
            rating: None,
            notes: None,
        },
    ]
}

pub fn seed_prescriptions() -> Vec<Prescription> {
    vec![
        Prescription {
            id: "prescription-1".to_string(),
            patient_id: "patient-1".to_string(),
            consultation_id: Some("consultation-1".to_string()),
            medication: "Lisinopril".to_string(),
            dosage: "10mg daily".to_string(),
            starts_on: parse_date("2024-10-02"),
            ends_on: parse_date("2025-04-02"),
        },
        Prescription {
            id: "prescription-2".to_string(),
            patient_id: "patient-2".to_string(),
            consultation_id: Some("consultation-2".to_string()),
            medication: "Salbutamol".to_string(),
            dosage: "2 puffs as needed".to_string(),
            starts_on: parse_date("2024-10-09"),
            ends_on: parse_date("2024-12-09"),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{import_csv, CsvDialect, ImportPolicy};

    #[test]
    fn test_prescription_state() {
        let prescription = seed_prescriptions().remove(1);
        let day = |s| parse_date(s).unwrap();
        assert_eq!(prescription.state(day("2024-10-01")), PrescriptionState::Upcoming);
        assert_eq!(prescription.state(day("2024-11-01")), PrescriptionState::Active);
        assert_eq!(prescription.state(day("2024-12-05")), PrescriptionState::EndingSoon);
        assert_eq!(prescription.state(day("2024-12-10")), PrescriptionState::Expired);
    }

    #[test]
    fn test_consultation_rating_is_optional() {
        let rows: Vec<Consultation> = import_csv(
            "Patient ID,Date,Rating\npatient-1,2024-10-01,\npatient-2,2024-10-02,3.5\n",
            CsvDialect::Standard,
            ImportPolicy::Strict,
        )
        .unwrap();
        assert_eq!(rows[0].rating, None);
        assert_eq!(rows[1].rating, Some(3.5));
    }

    #[test]
    fn test_strict_rejects_bad_date() {
        let err = import_csv::<Consultation>(
            "Patient ID,Date\npatient-1,next week\n",
            CsvDialect::Standard,
            ImportPolicy::Strict,
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::InvalidDate { line: 2, .. }));
    }

    #[test]
    fn test_strict_rejects_blank_date() {
        let err = import_csv::<Consultation>(
            "Patient ID,Date\npatient-1,\n",
            CsvDialect::Standard,
            ImportPolicy::Strict,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ImportError::MissingValue {
                line: 2,
                column: "Date".to_string()
            }
        );

        let rows: Vec<Consultation> = import_csv(
            "Patient ID,Date\npatient-1,\n",
            CsvDialect::Standard,
            ImportPolicy::Lenient,
        )
        .unwrap();
        assert_eq!(rows[0].scheduled_on, None);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("In Person".parse::<ConsultationMode>().unwrap(), ConsultationMode::InPerson);
        assert_eq!(ConsultationStatus::NoShow.to_string(), "no-show");
    }
}
