//! Identity store: user accounts, password checks and patient IDs.
//!
//! [`IdentityService`] is the concrete store over [`Database`]; intake and
//! lifecycle code depend only on the [`IdentityStore`] trait.

pub mod password;
mod patient_id;

pub use password::{PasswordHasher, DEFAULT_PBKDF2_ITERATIONS};
pub use patient_id::Assignment;

use thiserror::Error;

use crate::db::{Database, DbError};
use crate::ids::patient_id_candidate;
use crate::models::{Address, NewUser, Role, User};

/// Shortest accepted password.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Identity errors.
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("No unique patient ID after {attempts} attempts")]
    AssignmentExhausted { attempts: usize },

    #[error("Invalid input: {0}")]
    Invalid(String),
}

pub type IdentityResult<T> = Result<T, IdentityError>;

impl IdentityError {
    /// Map an insert failure, turning username/email collisions into conflicts.
    fn from_insert(err: DbError, user: &User) -> Self {
        if err.is_unique_violation("users", "username") {
            IdentityError::Conflict(format!("username '{}' is taken", user.username))
        } else if err.is_unique_violation("users", "email") {
            IdentityError::Conflict(format!("email '{}' is already registered", user.email))
        } else {
            IdentityError::Database(err)
        }
    }
}

/// Lookups and assignment needed by intake and the HTTP layer.
pub trait IdentityStore {
    fn find_user(&self, id: &str) -> IdentityResult<Option<User>>;

    fn find_user_by_patient_id(&self, patient_id: &str) -> IdentityResult<Option<User>>;

    /// Return the user matching `new.email` (else `new.username`), creating it if absent.
    fn find_or_create_user(&self, new: &NewUser) -> IdentityResult<User>;

    /// Assign a patient ID, or return the one already stored.
    fn assign_patient_id(&self, user_id: &str) -> IdentityResult<String>;
}

/// Result of [`IdentityService::backfill_patient_ids`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub assigned: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// SQLite-backed identity store.
pub struct IdentityService<'a> {
    db: &'a Database,
    hasher: PasswordHasher,
}

impl<'a> IdentityService<'a> {
    pub fn new(db: &'a Database, hasher: PasswordHasher) -> Self {
        Self { db, hasher }
    }

    /// Register a new account.
    ///
    /// Patients receive a patient ID in the same insert.
    pub fn register_user(&self, new: &NewUser) -> IdentityResult<User> {
        validate_new_user(new)?;

        let mut user = User::from_new(new, self.hasher.hash(&new.password));
        if user.role == Role::Patient {
            patient_id::insert_with(self.db, &mut user, patient_id_candidate)?;
        } else {
            self.db
                .insert_user(&user)
                .map_err(|e| IdentityError::from_insert(e, &user))?;
        }

        tracing::info!(
            user_id = %user.id,
            role = %user.role,
            patient_id = user.patient_id.as_deref().unwrap_or("-"),
            "user registered"
        );
        Ok(user)
    }

    /// Return the user when the password matches. Inactive accounts never verify.
    pub fn verify_password(&self, username: &str, password: &str) -> IdentityResult<Option<User>> {
        let Some(user) = self.db.get_user_by_username(username.trim())? else {
            return Ok(None);
        };
        if !user.is_active || !self.hasher.verify(password, &user.password_hash) {
            return Ok(None);
        }
        Ok(Some(user))
    }

    pub fn update_address(&self, user_id: &str, address: &Address) -> IdentityResult<()> {
        if !self.db.update_user_address(user_id, address)? {
            return Err(IdentityError::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }

    pub fn deactivate_user(&self, user_id: &str) -> IdentityResult<()> {
        if !self.db.deactivate_user(user_id)? {
            return Err(IdentityError::NotFound(format!("user {}", user_id)));
        }
        tracing::info!(user_id, "user deactivated");
        Ok(())
    }

    /// Assign patient IDs to every active patient that lacks one.
    ///
    /// Per-user failures are counted and logged; the pass continues.
    pub fn backfill_patient_ids(&self) -> IdentityResult<BackfillReport> {
        let mut report = BackfillReport::default();
        for user in self.db.list_patients_missing_patient_id()? {
            match patient_id::assign_with(self.db, &user.id, patient_id_candidate) {
                Ok(a) if a.newly_assigned => report.assigned += 1,
                Ok(_) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(user_id = %user.id, error = %e, "patient ID backfill failed");
                    report.failed += 1;
                }
            }
        }
        tracing::info!(
            assigned = report.assigned,
            skipped = report.skipped,
            failed = report.failed,
            "patient ID backfill finished"
        );
        Ok(report)
    }

    /// Create each account unless it already exists. Safe to re-run.
    pub fn seed_users(&self, users: &[NewUser]) -> IdentityResult<Vec<User>> {
        users.iter().map(|new| self.find_or_create_user(new)).collect()
    }
}

impl IdentityStore for IdentityService<'_> {
    fn find_user(&self, id: &str) -> IdentityResult<Option<User>> {
        Ok(self.db.get_user(id)?)
    }

    fn find_user_by_patient_id(&self, patient_id: &str) -> IdentityResult<Option<User>> {
        Ok(self.db.get_user_by_patient_id(patient_id)?)
    }

    fn find_or_create_user(&self, new: &NewUser) -> IdentityResult<User> {
        if let Some(user) = self.db.get_user_by_email(&new.email)? {
            return Ok(user);
        }
        if let Some(user) = self.db.get_user_by_username(new.username.trim())? {
            return Ok(user);
        }
        self.register_user(new)
    }

    fn assign_patient_id(&self, user_id: &str) -> IdentityResult<String> {
        patient_id::assign_with(self.db, user_id, patient_id_candidate).map(|a| a.patient_id)
    }
}

fn validate_new_user(new: &NewUser) -> IdentityResult<()> {
    if new.username.trim().is_empty() {
        return Err(IdentityError::Invalid("username is required".into()));
    }
    if !crate::validate::is_valid_email(new.email.trim()) {
        return Err(IdentityError::Invalid(format!("invalid email '{}'", new.email)));
    }
    if new.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(IdentityError::Invalid(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if let Some(contact) = new.contact_number.as_deref() {
        if !crate::validate::is_valid_contact_number(contact) {
            return Err(IdentityError::Invalid(format!("invalid contact number '{}'", contact)));
        }
    }
    Ok(())
}
