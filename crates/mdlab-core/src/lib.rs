//! MDLAB Core Library
//!
//! Appointment intake, patient identity and service catalog for a medical
//! laboratory.
//!
//! # Architecture
//!
//! ```text
//!   Booking request (JSON)
//!           │
//!           ▼
//!   ┌───────────────────┐   ServiceCatalog    ┌──────────────┐
//!   │  Intake validator │ ──────────────────▶ │   services   │
//!   │  fields → resolve │   IdentityStore     ├──────────────┤
//!   │  → derive         │ ──────────────────▶ │    users     │
//!   └─────────┬─────────┘                     └──────────────┘
//!             │ Appointment (APT-YYYYMMDD-XXXXX)
//!             ▼
//!   ┌───────────────────┐
//!   │   appointments    │ ◀── Lifecycle: confirm, check-in, collect,
//!   └─────────┬─────────┘     process, complete, cancel, no-show
//!             │ completed
//!             ▼
//!       Billing export
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer with FTS5 service search
//! - [`models`]: Domain types (User, Service, Appointment, Address)
//! - [`identity`]: Accounts, password hashing, patient IDs
//! - [`catalog`]: Service resolution for intake
//! - [`intake`]: Appointment request validation and normalization
//! - [`lifecycle`]: Appointment status transitions
//! - [`export`]: Billing export

pub mod catalog;
pub mod db;
pub mod export;
pub mod identity;
pub mod ids;
pub mod intake;
pub mod lifecycle;
pub mod models;
pub mod validate;

// Re-export commonly used types
pub use catalog::ServiceCatalog;
pub use db::{AppointmentFilter, Database, DbError};
pub use identity::{IdentityError, IdentityService, IdentityStore, PasswordHasher};
pub use intake::{
    validate_and_normalize, AppointmentIntake, FieldError, IntakeConfig, IntakeError, PricePolicy,
};
pub use lifecycle::{Action, Actor, AppointmentLifecycle, LifecycleError};
pub use models::{
    format_address, Address, Appointment, AppointmentStatus, NewUser, Role, Service,
    ServiceCategory, User,
};

pub const APP_NAME: &str = "MDLAB Direct";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum MdlabError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON array of `{path, param, msg, value}` entries
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<DbError> for MdlabError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => MdlabError::NotFound(what),
            other => MdlabError::DatabaseError(other.to_string()),
        }
    }
}

impl From<export::ExportError> for MdlabError {
    fn from(e: export::ExportError) -> Self {
        match e {
            export::ExportError::Database(db) => db.into(),
            invalid @ export::ExportError::InvalidTimestamp { .. } => {
                MdlabError::InvalidInput(invalid.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for MdlabError {
    fn from(e: serde_json::Error) -> Self {
        MdlabError::SerializationError(e.to_string())
    }
}

impl From<IdentityError> for MdlabError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::Database(db) => db.into(),
            IdentityError::NotFound(what) => MdlabError::NotFound(what),
            IdentityError::Conflict(what) => MdlabError::Conflict(what),
            IdentityError::Invalid(what) => MdlabError::InvalidInput(what),
            exhausted @ IdentityError::AssignmentExhausted { .. } => {
                MdlabError::DatabaseError(exhausted.to_string())
            }
        }
    }
}

impl From<IntakeError> for MdlabError {
    fn from(e: IntakeError) -> Self {
        match e {
            IntakeError::Validation(errors) | IntakeError::Resolution(errors) => {
                match serde_json::to_string(&errors) {
                    Ok(json) => MdlabError::ValidationError(json),
                    Err(e) => e.into(),
                }
            }
            IntakeError::Database(db) => db.into(),
            IntakeError::Identity(identity) => identity.into(),
        }
    }
}

impl From<LifecycleError> for MdlabError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::InvalidTransition { .. } => MdlabError::InvalidTransition(e.to_string()),
            LifecycleError::Forbidden { .. } | LifecycleError::UnknownActor(_) => {
                MdlabError::Forbidden(e.to_string())
            }
            LifecycleError::NotFound(what) => MdlabError::NotFound(what),
            LifecycleError::Database(db) => db.into(),
            LifecycleError::Identity(identity) => identity.into(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for MdlabError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        MdlabError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<MdlabCore>, MdlabError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(MdlabCore::new(db)))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<MdlabCore>, MdlabError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(MdlabCore::new(db)))
}

/// Display form of an address given as JSON (a string or an object).
#[uniffi::export]
pub fn format_address_json(address_json: String) -> Result<String, MdlabError> {
    let address: Option<Address> = serde_json::from_str(&address_json)?;
    Ok(models::format_optional_address(address.as_ref()))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct MdlabCore {
    db: Arc<Mutex<Database>>,
    hasher: PasswordHasher,
    intake: IntakeConfig,
}

impl MdlabCore {
    fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            hasher: PasswordHasher::default(),
            intake: IntakeConfig::default(),
        }
    }
}

#[uniffi::export]
impl MdlabCore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Add or update a service.
    pub fn upsert_service(&self, service: FfiService) -> Result<(), MdlabError> {
        let db = self.db.lock()?;
        let service = Service::try_from(service)?;
        db.upsert_service(&service)?;
        Ok(())
    }

    pub fn get_service(&self, id: String) -> Result<Option<FfiService>, MdlabError> {
        let db = self.db.lock()?;
        Ok(db.get_service(&id)?.map(Into::into))
    }

    pub fn list_services(&self, active_only: bool) -> Result<Vec<FfiService>, MdlabError> {
        let db = self.db.lock()?;
        Ok(db.list_services(active_only)?.into_iter().map(Into::into).collect())
    }

    /// Search active services by name, category or description.
    pub fn search_services(&self, query: String, limit: u32) -> Result<Vec<FfiService>, MdlabError> {
        let db = self.db.lock()?;
        let services = db.search_services(&query, limit as usize)?;
        Ok(services.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Identity Operations
    // =========================================================================

    /// Register an account from a JSON `NewUser` body.
    pub fn register_user(&self, user_json: String) -> Result<FfiUser, MdlabError> {
        let new: NewUser = serde_json::from_str(&user_json)?;
        let db = self.db.lock()?;
        let user = IdentityService::new(&db, self.hasher).register_user(&new)?;
        Ok(user.into())
    }

    /// Assign a patient ID (returns the existing one if already set).
    pub fn assign_patient_id(&self, user_id: String) -> Result<String, MdlabError> {
        let db = self.db.lock()?;
        Ok(IdentityService::new(&db, self.hasher).assign_patient_id(&user_id)?)
    }

    // =========================================================================
    // Appointment Operations
    // =========================================================================

    /// Validate and store a booking request given as JSON.
    pub fn create_appointment(
        &self,
        request_json: String,
        submitted_by: Option<String>,
    ) -> Result<FfiAppointment, MdlabError> {
        let request: serde_json::Value = serde_json::from_str(&request_json)?;
        let db = self.db.lock()?;
        let identity = IdentityService::new(&db, self.hasher);
        let appointment = AppointmentIntake::new(&db, &identity, self.intake)
            .submit(&request, submitted_by.as_deref())?;
        Ok(appointment.into())
    }

    pub fn get_appointment(&self, id: String) -> Result<Option<FfiAppointment>, MdlabError> {
        let db = self.db.lock()?;
        Ok(db.get_appointment(&id)?.map(Into::into))
    }

    /// List appointments, optionally by status and patient user ID.
    pub fn list_appointments(
        &self,
        status: Option<String>,
        patient_user_id: Option<String>,
    ) -> Result<Vec<FfiAppointment>, MdlabError> {
        let status = status
            .map(|s| s.parse::<AppointmentStatus>())
            .transpose()
            .map_err(MdlabError::InvalidInput)?;
        let filter = AppointmentFilter {
            status,
            patient_user_id,
            ..Default::default()
        };
        let db = self.db.lock()?;
        Ok(db.list_appointments(&filter)?.into_iter().map(Into::into).collect())
    }

    /// Apply a lifecycle action (`check_in`, `complete`, ...) as the given user.
    pub fn transition_appointment(
        &self,
        appointment_id: String,
        action: String,
        actor_id: String,
        reason: Option<String>,
    ) -> Result<FfiAppointment, MdlabError> {
        let action: Action = action.parse().map_err(MdlabError::InvalidInput)?;
        let db = self.db.lock()?;
        let actor = Actor::resolve(&IdentityService::new(&db, self.hasher), &actor_id)?;
        let appointment = AppointmentLifecycle::new(&db).transition(
            &appointment_id,
            action,
            &actor,
            reason.as_deref(),
        )?;
        Ok(appointment.into())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export billing data as JSON.
    pub fn export_billing_json(&self) -> Result<String, MdlabError> {
        let db = self.db.lock()?;
        let batch = export::BillingExporter::new(&db).export_all()?;
        Ok(batch.to_json()?)
    }

    /// Export billing data as CSV.
    pub fn export_billing_csv(&self) -> Result<String, MdlabError> {
        let db = self.db.lock()?;
        let batch = export::BillingExporter::new(&db).export_all()?;
        Ok(batch.to_csv())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe service.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiService {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub duration: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_popular: bool,
    pub requires_fasting: bool,
    pub home_visit_available: bool,
}

impl From<Service> for FfiService {
    fn from(service: Service) -> Self {
        Self {
            id: service.id,
            name: service.name,
            category: service.category.as_str().to_string(),
            price: service.price,
            duration: service.duration,
            description: service.description,
            is_active: service.is_active,
            is_popular: service.is_popular,
            requires_fasting: service.requires_fasting,
            home_visit_available: service.home_visit_available,
        }
    }
}

impl TryFrom<FfiService> for Service {
    type Error = MdlabError;

    fn try_from(service: FfiService) -> Result<Self, Self::Error> {
        let category: ServiceCategory = service.category.parse().map_err(MdlabError::InvalidInput)?;
        Ok(Service {
            id: service.id,
            name: service.name,
            category,
            price: service.price,
            duration: service.duration,
            description: service.description,
            is_active: service.is_active,
            is_popular: service.is_popular,
            requires_fasting: service.requires_fasting,
            home_visit_available: service.home_visit_available,
        })
    }
}

/// FFI-safe user (never carries the password hash).
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub full_name: String,
    pub contact_number: Option<String>,
    pub patient_id: Option<String>,
    pub address: String,
    pub is_active: bool,
}

impl From<User> for FfiUser {
    fn from(user: User) -> Self {
        Self {
            full_name: user.full_name(),
            address: user.formatted_address(),
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role.as_str().to_string(),
            contact_number: user.contact_number,
            patient_id: user.patient_id,
            is_active: user.is_active,
        }
    }
}

/// FFI-safe appointment summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointment {
    pub id: String,
    pub appointment_code: String,
    pub patient_user_id: Option<String>,
    pub patient_name: String,
    pub contact_number: Option<String>,
    pub address: String,
    pub service_ids: Vec<String>,
    pub service_name: String,
    pub total_price: f64,
    pub appointment_date: String,
    pub appointment_time: String,
    pub appointment_type: String,
    pub priority: String,
    pub status: String,
    pub notes: Option<String>,
}

impl From<Appointment> for FfiAppointment {
    fn from(apt: Appointment) -> Self {
        Self {
            address: apt.patient.formatted_address(),
            service_ids: apt.services.iter().map(|s| s.service_id.clone()).collect(),
            appointment_date: apt.appointment_date.format("%Y-%m-%d").to_string(),
            appointment_type: apt.appointment_type.as_str().to_string(),
            priority: apt.priority.as_str().to_string(),
            status: apt.status.as_str().to_string(),
            id: apt.id,
            appointment_code: apt.appointment_code,
            patient_user_id: apt.patient_user_id,
            patient_name: apt.patient.name,
            contact_number: apt.patient.contact_number,
            service_name: apt.service_name,
            total_price: apt.total_price,
            appointment_time: apt.appointment_time,
            notes: apt.notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Arc<MdlabCore>, String) {
        let core = open_database_in_memory().unwrap();
        let service = FfiService {
            id: "3f1c2d4e-5a6b-4c7d-8e9f-0a1b2c3d4e5f".into(),
            name: "Complete Blood Count".into(),
            category: "hematology".into(),
            price: 100.0,
            duration: Some("30 minutes".into()),
            description: None,
            is_active: true,
            is_popular: true,
            requires_fasting: false,
            home_visit_available: true,
        };
        let id = service.id.clone();
        core.upsert_service(service).unwrap();
        (core, id)
    }

    #[test]
    fn test_create_and_list_appointment() {
        let (core, service_id) = seeded();
        let request = serde_json::json!({
            "patientName": "jasmine",
            "contactNumber": "09496858361",
            "serviceIds": [service_id],
            "serviceName": "CBC",
            "appointmentDate": "2025-10-13",
            "appointmentTime": "10:00",
            "totalPrice": 100
        });

        let created = core.create_appointment(request.to_string(), None).unwrap();
        assert_eq!(created.status, "scheduled");
        assert_eq!(created.address, "Not provided");

        let listed = core.list_appointments(Some("scheduled".into()), None).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(matches!(
            core.list_appointments(Some("bogus".into()), None),
            Err(MdlabError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validation_error_carries_field_json() {
        let (core, _) = seeded();
        let err = core
            .create_appointment(r#"{"patientName":"jasmine"}"#.into(), None)
            .unwrap_err();
        let MdlabError::ValidationError(json) = err else {
            panic!("expected validation error");
        };
        let errors: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert!(errors.iter().any(|e| e["path"] == "serviceName"));
    }

    #[test]
    fn test_invalid_category_rejected() {
        let core = open_database_in_memory().unwrap();
        let mut service: FfiService = Service::new("X".into(), ServiceCategory::Other, 1.0).into();
        service.category = "astrology".into();
        assert!(matches!(core.upsert_service(service), Err(MdlabError::InvalidInput(_))));
    }

    #[test]
    fn test_format_address_json() {
        assert_eq!(format_address_json(r#""  Imus  ""#.into()).unwrap(), "Imus");
        assert_eq!(
            format_address_json(r#"{"city":"Imus","province":"undefined"}"#.into()).unwrap(),
            "Imus"
        );
        assert_eq!(format_address_json("null".into()).unwrap(), "Not provided");
        assert!(format_address_json("{".into()).is_err());
    }
}
