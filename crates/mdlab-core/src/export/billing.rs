//! Billing export for the clinic's accounting system.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{AppointmentFilter, Database, DbError};
use crate::models::{Appointment, AppointmentStatus};

const CSV_HEADER: &str =
    "appointment_code,patient_name,patient_user_id,service_id,service_name,price,appointment_date,completed_at\n";

/// Export errors.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        source: chrono::ParseError,
    },
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Billing export for a single completed appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingExport {
    pub metadata: BillingMetadata,
    pub line_items: Vec<BillingLineItem>,
    /// Amount billed (the appointment's stored total)
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingMetadata {
    pub appointment_id: String,
    pub appointment_code: String,
    pub patient_name: String,
    pub patient_user_id: Option<String>,
    pub appointment_date: String,
    pub completed_at: String,
    pub exported_at: String,
}

/// One billed service, at its snapshot price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingLineItem {
    pub service_id: String,
    pub service_name: String,
    pub price: f64,
}

impl BillingExport {
    /// Build the export for a completed appointment; `None` for any other status.
    pub fn from_appointment(appointment: &Appointment) -> Option<Self> {
        if appointment.status != AppointmentStatus::Completed {
            return None;
        }
        let completed_at = appointment.completed_at.clone()?;

        let line_items = appointment
            .services
            .iter()
            .map(|s| BillingLineItem {
                service_id: s.service_id.clone(),
                service_name: s.name.clone(),
                price: s.price,
            })
            .collect();

        Some(Self {
            metadata: BillingMetadata {
                appointment_id: appointment.id.clone(),
                appointment_code: appointment.appointment_code.clone(),
                patient_name: appointment.patient.name.clone(),
                patient_user_id: appointment.patient_user_id.clone(),
                appointment_date: appointment.appointment_date.format("%Y-%m-%d").to_string(),
                completed_at,
                exported_at: chrono::Utc::now().to_rfc3339(),
            },
            line_items,
            total: appointment.total_price,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::from(CSV_HEADER);
        self.write_csv_rows(&mut csv);
        csv
    }

    fn write_csv_rows(&self, csv: &mut String) {
        let meta = &self.metadata;
        for item in &self.line_items {
            csv.push_str(&format!(
                "{},{},{},{},{},{:.2},{},{}\n",
                escape_csv(&meta.appointment_code),
                escape_csv(&meta.patient_name),
                meta.patient_user_id.as_deref().unwrap_or(""),
                escape_csv(&item.service_id),
                escape_csv(&item.service_name),
                item.price,
                meta.appointment_date,
                escape_csv(&meta.completed_at),
            ));
        }
    }
}

/// Batch billing export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchBillingExport {
    pub exported_at: String,
    pub appointments: Vec<BillingExport>,
    pub total_items: usize,
    pub total_amount: f64,
}

impl BatchBillingExport {
    fn from_exports(appointments: Vec<BillingExport>) -> Self {
        Self {
            exported_at: chrono::Utc::now().to_rfc3339(),
            total_items: appointments.iter().map(|a| a.line_items.len()).sum(),
            total_amount: appointments.iter().map(|a| a.total).sum(),
            appointments,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::from(CSV_HEADER);
        for export in &self.appointments {
            export.write_csv_rows(&mut csv);
        }
        csv
    }
}

/// Billing exporter.
pub struct BillingExporter<'a> {
    db: &'a Database,
}

impl<'a> BillingExporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Export every completed appointment.
    pub fn export_all(&self) -> ExportResult<BatchBillingExport> {
        self.export_where(|_| true)
    }

    /// Export appointments completed at or after `since` (RFC 3339).
    pub fn export_since(&self, since: &str) -> ExportResult<BatchBillingExport> {
        let since = chrono::DateTime::parse_from_rfc3339(since).map_err(|source| {
            ExportError::InvalidTimestamp {
                value: since.to_string(),
                source,
            }
        })?;
        self.export_where(|export| {
            chrono::DateTime::parse_from_rfc3339(&export.metadata.completed_at)
                .map(|at| at >= since)
                .unwrap_or(false)
        })
    }

    fn export_where<F>(&self, keep: F) -> ExportResult<BatchBillingExport>
    where
        F: Fn(&BillingExport) -> bool,
    {
        let filter = AppointmentFilter {
            status: Some(AppointmentStatus::Completed),
            ..Default::default()
        };
        let exports: Vec<BillingExport> = self
            .db
            .list_appointments(&filter)?
            .iter()
            .filter_map(BillingExport::from_appointment)
            .filter(|e| keep(e))
            .collect();

        tracing::debug!(appointments = exports.len(), "billing export built");
        Ok(BatchBillingExport::from_exports(exports))
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
