//! Patient ID assignment.
//!
//! IDs are written with a conditional update behind a UNIQUE index. A
//! collision is a conflict signal: a new candidate is drawn and the write
//! retried, never a read-check-write sequence.

use crate::db::Database;
use crate::ids::MAX_UNIQUE_ATTEMPTS;
use crate::models::User;

use super::{IdentityError, IdentityResult};

/// Outcome of an assignment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub patient_id: String,
    /// False when the user already had an ID (nothing was written).
    pub newly_assigned: bool,
}

/// Assign a patient ID to an existing user, drawing candidates from `next_candidate`.
///
/// Never overwrites: if the user already has an ID (or another writer sets
/// one first), that ID is returned.
pub fn assign_with<F>(db: &Database, user_id: &str, mut next_candidate: F) -> IdentityResult<Assignment>
where
    F: FnMut() -> String,
{
    let user = db
        .get_user(user_id)?
        .ok_or_else(|| IdentityError::NotFound(format!("user {}", user_id)))?;
    if let Some(existing) = user.patient_id {
        return Ok(Assignment {
            patient_id: existing,
            newly_assigned: false,
        });
    }

    for attempt in 1..=MAX_UNIQUE_ATTEMPTS {
        let candidate = next_candidate();
        match db.set_patient_id_if_absent(user_id, &candidate) {
            Ok(true) => {
                tracing::info!(user_id, patient_id = %candidate, attempt, "patient ID assigned");
                return Ok(Assignment {
                    patient_id: candidate,
                    newly_assigned: true,
                });
            }
            Ok(false) => {
                // Lost a race with another writer; keep theirs
                return stored_patient_id(db, user_id).map(|patient_id| Assignment {
                    patient_id,
                    newly_assigned: false,
                });
            }
            Err(e) if e.is_unique_violation("users", "patient_id") => {
                tracing::warn!(user_id, attempt, "patient ID collision, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::error!(user_id, attempts = MAX_UNIQUE_ATTEMPTS, "patient ID assignment exhausted");
    Err(IdentityError::AssignmentExhausted {
        attempts: MAX_UNIQUE_ATTEMPTS,
    })
}

/// Insert a new user with a freshly generated patient ID.
///
/// Collisions on `patient_id` regenerate and retry; any other UNIQUE
/// violation (username, email) is a [`IdentityError::Conflict`].
pub fn insert_with<F>(db: &Database, user: &mut User, mut next_candidate: F) -> IdentityResult<()>
where
    F: FnMut() -> String,
{
    for attempt in 1..=MAX_UNIQUE_ATTEMPTS {
        user.patient_id = Some(next_candidate());
        match db.insert_user(user) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_unique_violation("users", "patient_id") => {
                tracing::warn!(username = %user.username, attempt, "patient ID collision, retrying");
            }
            Err(e) => return Err(IdentityError::from_insert(e, user)),
        }
    }

    user.patient_id = None;
    Err(IdentityError::AssignmentExhausted {
        attempts: MAX_UNIQUE_ATTEMPTS,
    })
}

fn stored_patient_id(db: &Database, user_id: &str) -> IdentityResult<String> {
    db.get_user(user_id)?
        .and_then(|u| u.patient_id)
        .ok_or_else(|| IdentityError::NotFound(format!("user {}", user_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{is_valid_patient_id, patient_id_candidate};
    use crate::models::{NewUser, Role};

    fn insert_plain(db: &Database, username: &str) -> User {
        let new = NewUser::new(username, &format!("{}@example.com", username), "pw", Role::Patient);
        let user = User::from_new(&new, "hash".into());
        db.insert_user(&user).unwrap();
        user
    }

    #[test]
    fn test_assigns_valid_id() {
        let db = Database::open_in_memory().unwrap();
        let user = insert_plain(&db, "ana");

        let assignment = assign_with(&db, &user.id, patient_id_candidate).unwrap();
        assert!(assignment.newly_assigned);
        assert!(is_valid_patient_id(&assignment.patient_id));

        let stored = db.get_user(&user.id).unwrap().unwrap();
        assert_eq!(stored.patient_id, Some(assignment.patient_id));
    }

    #[test]
    fn test_assignment_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let user = insert_plain(&db, "ana");

        let first = assign_with(&db, &user.id, patient_id_candidate).unwrap();
        let second = assign_with(&db, &user.id, patient_id_candidate).unwrap();
        assert_eq!(first.patient_id, second.patient_id);
        assert!(!second.newly_assigned);
    }

    #[test]
    fn test_collision_retries_with_next_candidate() {
        let db = Database::open_in_memory().unwrap();
        let taken = insert_plain(&db, "ana");
        let user = insert_plain(&db, "ben");
        db.set_patient_id_if_absent(&taken.id, "PAAAAAAAAA").unwrap();

        let mut candidates = vec!["PBBBBBBBBB", "PAAAAAAAAA"];
        let assignment =
            assign_with(&db, &user.id, || candidates.pop().unwrap().to_string()).unwrap();
        assert_eq!(assignment.patient_id, "PBBBBBBBBB");
    }

    #[test]
    fn test_exhaustion_after_bounded_attempts() {
        let db = Database::open_in_memory().unwrap();
        let taken = insert_plain(&db, "ana");
        let user = insert_plain(&db, "ben");
        db.set_patient_id_if_absent(&taken.id, "PAAAAAAAAA").unwrap();

        let mut calls = 0;
        let result = assign_with(&db, &user.id, || {
            calls += 1;
            "PAAAAAAAAA".to_string()
        });
        assert!(matches!(
            result,
            Err(IdentityError::AssignmentExhausted { attempts: MAX_UNIQUE_ATTEMPTS })
        ));
        assert_eq!(calls, MAX_UNIQUE_ATTEMPTS);
        assert!(db.get_user(&user.id).unwrap().unwrap().patient_id.is_none());
    }

    #[test]
    fn test_unknown_user() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            assign_with(&db, "nope", patient_id_candidate),
            Err(IdentityError::NotFound(_))
        ));
    }

    #[test]
    fn test_insert_with_retries_collisions() {
        let db = Database::open_in_memory().unwrap();
        let taken = insert_plain(&db, "ana");
        db.set_patient_id_if_absent(&taken.id, "PAAAAAAAAA").unwrap();

        let new = NewUser::new("ben", "ben@example.com", "pw", Role::Patient);
        let mut user = User::from_new(&new, "hash".into());
        let mut candidates = vec!["PCCCCCCCCC", "PAAAAAAAAA"];
        insert_with(&db, &mut user, || candidates.pop().unwrap().to_string()).unwrap();

        assert_eq!(user.patient_id, Some("PCCCCCCCCC".into()));
        assert!(db.get_user_by_patient_id("PCCCCCCCCC").unwrap().is_some());
    }
}
