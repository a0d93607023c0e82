//! Appointment intake: validate a raw request and normalize it into an
//! [`Appointment`] ready for persistence.
//!
//! Three passes, in order:
//!
//! 1. Structural checks on every field ([`fields`]), all violations collected.
//! 2. Resolution of service IDs against the catalog and `patientId` against
//!    the identity store. Every service position is checked, then the
//!    request stops if anything failed to resolve.
//! 3. Derived fields (snapshots, combined name, total price).

pub mod fields;

use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::catalog::ServiceCatalog;
use crate::db::{Database, DbError};
use crate::identity::{IdentityError, IdentityStore};
use crate::ids::appointment_code_candidate;
use crate::models::{combined_service_name, Appointment, PatientSnapshot, ServiceSnapshot};

use fields::CheckedRequest;

/// Largest accepted gap between `totalPrice` and the catalog sum.
pub const PRICE_TOLERANCE: f64 = 0.005;

/// One rejected field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// Field path, e.g. `contactNumber` or `serviceIds[3]`
    pub field: String,
    /// Value as received
    pub value: Value,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, value: Value, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value,
            message: message.into(),
        }
    }
}

// Wire shape: { path, param, msg, value }
impl Serialize for FieldError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            path: &'a str,
            param: &'a str,
            msg: &'a str,
            value: &'a Value,
        }

        Wire {
            path: &self.field,
            param: &self.field,
            msg: &self.message,
            value: &self.value,
        }
        .serialize(serializer)
    }
}

/// Intake errors.
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    #[error("Resolution failed: {}", summarize(.0))]
    Resolution(Vec<FieldError>),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),
}

impl IntakeError {
    /// Field errors carried by validation and resolution failures.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            IntakeError::Validation(errors) | IntakeError::Resolution(errors) => errors,
            _ => &[],
        }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type IntakeResult<T> = Result<T, IntakeError>;

/// How `totalPrice` relates to the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PricePolicy {
    /// Reject a total that differs from the resolved sum; store the sum.
    #[default]
    Enforce,
    /// Store whatever the client sent.
    ClientTrusted,
}

impl std::str::FromStr for PricePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "enforce" => Ok(PricePolicy::Enforce),
            "trust" | "client-trusted" => Ok(PricePolicy::ClientTrusted),
            other => Err(format!("Unknown price policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntakeConfig {
    pub price_policy: PricePolicy,
}

/// Validate a raw request and build the appointment it describes.
///
/// Nothing is written; see [`AppointmentIntake::submit`] for persistence.
pub fn validate_and_normalize(
    request: &Value,
    catalog: &dyn ServiceCatalog,
    identity: &dyn IdentityStore,
    config: &IntakeConfig,
) -> IntakeResult<Appointment> {
    let checked = fields::check(request).map_err(IntakeError::Validation)?;

    let resolved = catalog.resolve_services(&checked.service_ids)?;
    let mut errors: Vec<FieldError> = resolved
        .iter()
        .zip(&checked.service_ids)
        .enumerate()
        .filter(|(_, (service, _))| service.is_none())
        .map(|(i, (_, id))| {
            FieldError::new(
                checked.service_id_source.path(i),
                Value::String(id.clone()),
                "Service not found or inactive",
            )
        })
        .collect();

    let patient = match checked.patient_user_id.as_deref() {
        Some(user_id) => match identity.find_user(user_id)? {
            Some(user) if user.is_active => Some(user),
            _ => {
                errors.push(FieldError::new(
                    "patientId",
                    Value::String(user_id.to_string()),
                    "Patient not found",
                ));
                None
            }
        },
        None => None,
    };

    if !errors.is_empty() {
        tracing::info!(errors = errors.len(), "appointment request failed resolution");
        return Err(IntakeError::Resolution(errors));
    }

    let services: Vec<ServiceSnapshot> = resolved.iter().flatten().map(|s| s.snapshot()).collect();
    let total_price = settle_total(&checked, &services, config.price_policy)?;

    Ok(build(checked, patient, services, total_price))
}

fn settle_total(
    checked: &CheckedRequest,
    services: &[ServiceSnapshot],
    policy: PricePolicy,
) -> IntakeResult<f64> {
    let catalog_total: f64 = services.iter().map(|s| s.price).sum();
    match policy {
        PricePolicy::ClientTrusted => Ok(checked.total_price),
        PricePolicy::Enforce if (checked.total_price - catalog_total).abs() <= PRICE_TOLERANCE => {
            Ok(catalog_total)
        }
        PricePolicy::Enforce => Err(IntakeError::Resolution(vec![FieldError::new(
            "totalPrice",
            serde_json::json!(checked.total_price),
            format!("totalPrice must equal the sum of selected services ({:.2})", catalog_total),
        )])),
    }
}

fn build(
    checked: CheckedRequest,
    patient: Option<crate::models::User>,
    services: Vec<ServiceSnapshot>,
    total_price: f64,
) -> Appointment {
    // Request values win; the linked account fills the gaps
    let snapshot = match &patient {
        Some(user) => PatientSnapshot {
            name: checked.patient_name.unwrap_or_else(|| user.full_name()),
            contact_number: checked.contact_number.or_else(|| user.contact_number.clone()),
            email: checked.email.or_else(|| Some(user.email.clone())),
            address: checked.address.or_else(|| user.address.clone()),
            age: checked.age.or(user.age),
            sex: checked.sex.or(user.sex),
        },
        None => PatientSnapshot {
            name: checked.patient_name.unwrap_or_default(),
            contact_number: checked.contact_number,
            email: checked.email,
            address: checked.address,
            age: checked.age,
            sex: checked.sex,
        },
    };

    let now = chrono::Utc::now();
    let timestamp = now.to_rfc3339();
    Appointment {
        id: uuid::Uuid::new_v4().to_string(),
        appointment_code: appointment_code_candidate(now.date_naive()),
        patient_user_id: patient.map(|u| u.id),
        patient: snapshot,
        service_name: combined_service_name(&services),
        services,
        total_price,
        appointment_date: checked.appointment_date,
        appointment_time: checked.appointment_time,
        appointment_type: checked.appointment_type,
        priority: checked.priority,
        notes: checked.notes,
        reason_for_visit: checked.reason_for_visit,
        status: checked.appointment_type.initial_status(),
        status_history: Vec::new(),
        submitted_by: None,
        checked_in_at: None,
        sample_collected_at: None,
        completed_at: None,
        cancelled_at: None,
        cancellation_reason: None,
        created_at: timestamp.clone(),
        updated_at: timestamp,
    }
}

/// Validates requests and stores the resulting appointments.
pub struct AppointmentIntake<'a> {
    db: &'a Database,
    identity: &'a dyn IdentityStore,
    config: IntakeConfig,
}

impl<'a> AppointmentIntake<'a> {
    pub fn new(db: &'a Database, identity: &'a dyn IdentityStore, config: IntakeConfig) -> Self {
        Self {
            db,
            identity,
            config,
        }
    }

    /// Validate, normalize and insert. `submitted_by` is the acting account, if known.
    pub fn submit(&self, request: &Value, submitted_by: Option<&str>) -> IntakeResult<Appointment> {
        let mut appointment = validate_and_normalize(request, self.db, self.identity, &self.config)
            .inspect_err(|e| {
                if let IntakeError::Validation(errors) = e {
                    tracing::info!(errors = errors.len(), "appointment request rejected");
                }
            })?;
        appointment.submitted_by = submitted_by.map(str::to_string);

        self.db.insert_appointment(&mut appointment)?;
        tracing::info!(
            appointment_id = %appointment.id,
            code = %appointment.appointment_code,
            status = %appointment.status,
            services = appointment.services.len(),
            "appointment created"
        );
        Ok(appointment)
    }
}
