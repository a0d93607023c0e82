//! Appointment database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};
use serde::Deserialize;

use super::{Database, DbError, DbResult};
use crate::ids::{appointment_code_candidate, MAX_UNIQUE_ATTEMPTS};
use crate::models::{
    Appointment, AppointmentStatus, AppointmentType, PatientSnapshot, Priority, ServiceSnapshot,
    StatusChange,
};

const APPOINTMENT_COLUMNS: &str = r#"
    id, appointment_code, patient_user_id, patient, services, service_name,
    total_price, appointment_date, appointment_time, appointment_type, priority,
    notes, reason_for_visit, status, status_history, submitted_by,
    checked_in_at, sample_collected_at, completed_at, cancelled_at,
    cancellation_reason, created_at, updated_at
"#;

/// Filter for appointment listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub patient_user_id: Option<String>,
    pub date: Option<NaiveDate>,
}

impl Database {
    /// Insert a new appointment.
    ///
    /// The appointment code is tried as given; on a code collision a fresh
    /// code is generated and the insert retried, up to
    /// [`MAX_UNIQUE_ATTEMPTS`] times in total.
    pub fn insert_appointment(&self, appointment: &mut Appointment) -> DbResult<()> {
        let created_on = chrono::DateTime::parse_from_rfc3339(&appointment.created_at)
            .map(|dt| dt.date_naive())
            .unwrap_or_else(|_| chrono::Utc::now().date_naive());

        for attempt in 1..=MAX_UNIQUE_ATTEMPTS {
            match self.try_insert_appointment(appointment) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_unique_violation("appointments", "appointment_code") => {
                    tracing::warn!(
                        attempt,
                        code = %appointment.appointment_code,
                        "appointment code collision, regenerating"
                    );
                    appointment.appointment_code = appointment_code_candidate(created_on);
                }
                Err(e) => return Err(e),
            }
        }

        Err(DbError::Constraint(format!(
            "No unique appointment code after {} attempts",
            MAX_UNIQUE_ATTEMPTS
        )))
    }

    fn try_insert_appointment(&self, appointment: &Appointment) -> DbResult<()> {
        if appointment.services.is_empty() {
            return Err(DbError::Constraint(
                "Appointment must reference at least one service".into(),
            ));
        }

        let patient_json = serde_json::to_string(&appointment.patient)?;
        let services_json = serde_json::to_string(&appointment.services)?;
        let history_json = serde_json::to_string(&appointment.status_history)?;

        self.conn.execute(
            r#"
            INSERT INTO appointments (
                id, appointment_code, patient_user_id, patient, services, service_name,
                total_price, appointment_date, appointment_time, appointment_type, priority,
                notes, reason_for_visit, status, status_history, submitted_by,
                checked_in_at, sample_collected_at, completed_at, cancelled_at,
                cancellation_reason, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                      ?17, ?18, ?19, ?20, ?21, ?22, ?23)
            "#,
            params![
                appointment.id,
                appointment.appointment_code,
                appointment.patient_user_id,
                patient_json,
                services_json,
                appointment.service_name,
                appointment.total_price,
                appointment.appointment_date.format("%Y-%m-%d").to_string(),
                appointment.appointment_time,
                appointment.appointment_type.as_str(),
                appointment.priority.as_str(),
                appointment.notes,
                appointment.reason_for_visit,
                appointment.status.as_str(),
                history_json,
                appointment.submitted_by,
                appointment.checked_in_at,
                appointment.sample_collected_at,
                appointment.completed_at,
                appointment.cancelled_at,
                appointment.cancellation_reason,
                appointment.created_at,
                appointment.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Persist status, lifecycle timestamps and history.
    ///
    /// Only applies while the stored status is still `expected`; returns
    /// `false` when the row is gone or another writer moved it first.
    pub fn update_appointment_status(
        &self,
        appointment: &Appointment,
        expected: AppointmentStatus,
    ) -> DbResult<bool> {
        let history_json = serde_json::to_string(&appointment.status_history)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE appointments SET
                status = ?2,
                status_history = ?3,
                checked_in_at = ?4,
                sample_collected_at = ?5,
                completed_at = ?6,
                cancelled_at = ?7,
                cancellation_reason = ?8,
                updated_at = ?9
            WHERE id = ?1 AND status = ?10
            "#,
            params![
                appointment.id,
                appointment.status.as_str(),
                history_json,
                appointment.checked_in_at,
                appointment.sample_collected_at,
                appointment.completed_at,
                appointment.cancelled_at,
                appointment.cancellation_reason,
                appointment.updated_at,
                expected.as_str(),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get an appointment by internal ID.
    pub fn get_appointment(&self, id: &str) -> DbResult<Option<Appointment>> {
        self.get_appointment_where("id", id)
    }

    /// Get an appointment by its human-readable code.
    pub fn get_appointment_by_code(&self, code: &str) -> DbResult<Option<Appointment>> {
        self.get_appointment_where("appointment_code", code)
    }

    fn get_appointment_where(&self, column: &'static str, value: &str) -> DbResult<Option<Appointment>> {
        let sql = format!("SELECT {} FROM appointments WHERE {} = ?", APPOINTMENT_COLUMNS, column);
        self.conn
            .query_row(&sql, [value], AppointmentRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List appointments, earliest date first.
    pub fn list_appointments(&self, filter: &AppointmentFilter) -> DbResult<Vec<Appointment>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM appointments
            WHERE (?1 IS NULL OR status = ?1)
            AND (?2 IS NULL OR patient_user_id = ?2)
            AND (?3 IS NULL OR appointment_date = ?3)
            ORDER BY appointment_date, appointment_time, created_at
            "#,
            APPOINTMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                filter.status.map(|s| s.as_str()),
                filter.patient_user_id,
                filter.date.map(|d| d.format("%Y-%m-%d").to_string()),
            ],
            AppointmentRow::from_row,
        )?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.try_into()?);
        }
        Ok(appointments)
    }
}

/// Intermediate row struct for database mapping.
struct AppointmentRow {
    id: String,
    appointment_code: String,
    patient_user_id: Option<String>,
    patient: String,
    services: String,
    service_name: String,
    total_price: f64,
    appointment_date: String,
    appointment_time: String,
    appointment_type: String,
    priority: String,
    notes: Option<String>,
    reason_for_visit: Option<String>,
    status: String,
    status_history: String,
    submitted_by: Option<String>,
    checked_in_at: Option<String>,
    sample_collected_at: Option<String>,
    completed_at: Option<String>,
    cancelled_at: Option<String>,
    cancellation_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

impl AppointmentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(AppointmentRow {
            id: row.get(0)?,
            appointment_code: row.get(1)?,
            patient_user_id: row.get(2)?,
            patient: row.get(3)?,
            services: row.get(4)?,
            service_name: row.get(5)?,
            total_price: row.get(6)?,
            appointment_date: row.get(7)?,
            appointment_time: row.get(8)?,
            appointment_type: row.get(9)?,
            priority: row.get(10)?,
            notes: row.get(11)?,
            reason_for_visit: row.get(12)?,
            status: row.get(13)?,
            status_history: row.get(14)?,
            submitted_by: row.get(15)?,
            checked_in_at: row.get(16)?,
            sample_collected_at: row.get(17)?,
            completed_at: row.get(18)?,
            cancelled_at: row.get(19)?,
            cancellation_reason: row.get(20)?,
            created_at: row.get(21)?,
            updated_at: row.get(22)?,
        })
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let patient: PatientSnapshot = serde_json::from_str(&row.patient)?;
        let services: Vec<ServiceSnapshot> = serde_json::from_str(&row.services)?;
        let status_history: Vec<StatusChange> = serde_json::from_str(&row.status_history)?;
        let appointment_date = NaiveDate::parse_from_str(&row.appointment_date, "%Y-%m-%d")
            .map_err(|e| DbError::Constraint(format!("Bad appointment date: {}", e)))?;
        let appointment_type: AppointmentType =
            row.appointment_type.parse().map_err(DbError::Constraint)?;
        let priority: Priority = row.priority.parse().map_err(DbError::Constraint)?;
        let status: AppointmentStatus = row.status.parse().map_err(DbError::Constraint)?;

        Ok(Appointment {
            id: row.id,
            appointment_code: row.appointment_code,
            patient_user_id: row.patient_user_id,
            patient,
            services,
            service_name: row.service_name,
            total_price: row.total_price,
            appointment_date,
            appointment_time: row.appointment_time,
            appointment_type,
            priority,
            notes: row.notes,
            reason_for_visit: row.reason_for_visit,
            status,
            status_history,
            submitted_by: row.submitted_by,
            checked_in_at: row.checked_in_at,
            sample_collected_at: row.sample_collected_at,
            completed_at: row.completed_at,
            cancelled_at: row.cancelled_at,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
