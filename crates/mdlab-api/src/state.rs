//! Shared handler state.

use std::sync::{Arc, Mutex, MutexGuard};

use mdlab_core::{Database, IdentityService, IntakeConfig, PasswordHasher};

use crate::config::ApiConfig;
use crate::error::ApiError;

/// State passed to every handler via `State<AppState>`.
///
/// One database handle per process; handlers lock it for the duration of a
/// request and never hold the guard across an `.await`.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Database>>,
    pub hasher: PasswordHasher,
    pub intake: IntakeConfig,
}

impl AppState {
    pub fn new(db: Database, hasher: PasswordHasher, intake: IntakeConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            hasher,
            intake,
        }
    }

    pub fn from_config(db: Database, config: &ApiConfig) -> Self {
        Self::new(
            db,
            PasswordHasher::new(config.pbkdf2_iterations),
            IntakeConfig {
                price_policy: config.price_policy,
            },
        )
    }

    pub fn lock_db(&self) -> Result<MutexGuard<'_, Database>, ApiError> {
        Ok(self.db.lock()?)
    }

    /// Identity store bound to a locked database.
    pub fn identity<'a>(&self, db: &'a Database) -> IdentityService<'a> {
        IdentityService::new(db, self.hasher)
    }
}
