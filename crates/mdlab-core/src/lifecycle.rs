//! Appointment status lifecycle.
//!
//! ```text
//!   pending ──confirm──▶ scheduled
//!      │                    │
//!      └──────check_in──────┴──▶ checked-in ──collect_sample──▶ sample-collected
//!                                                                 │        │
//!                                              start_processing ◀─┘        │
//!                                                     │                    │
//!                                                in-progress ──complete──▶ completed
//!
//!   any non-terminal ──cancel──▶ cancelled
//!   any non-terminal ──mark_no_show──▶ no-show
//! ```
//!
//! Every transition is checked against the current status and the actor's
//! role before anything is written.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{Database, DbError};
use crate::identity::{IdentityError, IdentityStore};
use crate::models::{Appointment, AppointmentStatus, Role, StatusChange};

/// Lifecycle errors.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Cannot {attempted} an appointment that is {current}")]
    InvalidTransition {
        current: AppointmentStatus,
        attempted: Action,
    },

    #[error("Role {role} may not {action}")]
    Forbidden { role: Role, action: Action },

    #[error("Unknown or inactive actor: {0}")]
    UnknownActor(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// A requested status change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Confirm,
    CheckIn,
    CollectSample,
    StartProcessing,
    Complete,
    Cancel,
    MarkNoShow,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Confirm,
        Action::CheckIn,
        Action::CollectSample,
        Action::StartProcessing,
        Action::Complete,
        Action::Cancel,
        Action::MarkNoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Confirm => "confirm",
            Action::CheckIn => "check_in",
            Action::CollectSample => "collect_sample",
            Action::StartProcessing => "start_processing",
            Action::Complete => "complete",
            Action::Cancel => "cancel",
            Action::MarkNoShow => "mark_no_show",
        }
    }

    /// Status the appointment ends up in.
    pub fn target(&self) -> AppointmentStatus {
        match self {
            Action::Confirm => AppointmentStatus::Scheduled,
            Action::CheckIn => AppointmentStatus::CheckedIn,
            Action::CollectSample => AppointmentStatus::SampleCollected,
            Action::StartProcessing => AppointmentStatus::InProgress,
            Action::Complete => AppointmentStatus::Completed,
            Action::Cancel => AppointmentStatus::Cancelled,
            Action::MarkNoShow => AppointmentStatus::NoShow,
        }
    }

    /// Whether the action may start from `from`.
    pub fn allowed_from(&self, from: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        match self {
            Action::Confirm => from == Pending,
            Action::CheckIn => matches!(from, Pending | Scheduled),
            Action::CollectSample => from == CheckedIn,
            Action::StartProcessing => from == SampleCollected,
            Action::Complete => matches!(from, SampleCollected | InProgress),
            Action::Cancel | Action::MarkNoShow => !from.is_terminal(),
        }
    }

    /// Staff roles that may perform the action on any appointment.
    pub fn staff_roles(&self) -> &'static [Role] {
        match self {
            Action::Confirm | Action::MarkNoShow => &[Role::Receptionist, Role::Admin],
            Action::CheckIn => &[Role::Receptionist, Role::MedTech, Role::Admin],
            Action::CollectSample => &[Role::MedTech, Role::Admin],
            Action::StartProcessing | Action::Complete => {
                &[Role::MedTech, Role::Pathologist, Role::Admin]
            }
            Action::Cancel => &[
                Role::MedTech,
                Role::Pathologist,
                Role::Receptionist,
                Role::Admin,
            ],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("Unknown action: {}", s))
    }
}

/// Who is performing a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Look up an active account and act as it.
    pub fn resolve(identity: &dyn IdentityStore, user_id: &str) -> LifecycleResult<Self> {
        match identity.find_user(user_id)? {
            Some(user) if user.is_active => Ok(Self::new(user.id, user.role)),
            _ => Err(LifecycleError::UnknownActor(user_id.to_string())),
        }
    }
}

/// Check status and role without mutating anything.
///
/// Status is checked first, so a terminal record reports
/// `InvalidTransition` whoever asks.
pub fn check_transition(
    appointment: &Appointment,
    action: Action,
    actor: &Actor,
) -> LifecycleResult<()> {
    if !action.allowed_from(appointment.status) {
        return Err(LifecycleError::InvalidTransition {
            current: appointment.status,
            attempted: action,
        });
    }

    if action.staff_roles().contains(&actor.role) || owner_may_cancel(appointment, action, actor) {
        Ok(())
    } else {
        Err(LifecycleError::Forbidden {
            role: actor.role,
            action,
        })
    }
}

// Patients may cancel their own booking until they arrive
fn owner_may_cancel(appointment: &Appointment, action: Action, actor: &Actor) -> bool {
    action == Action::Cancel
        && actor.role == Role::Patient
        && appointment.patient_user_id.as_deref() == Some(actor.id.as_str())
        && matches!(
            appointment.status,
            AppointmentStatus::Pending | AppointmentStatus::Scheduled
        )
}

/// Apply a transition in memory: status, timestamp and history entry.
pub fn apply_transition(
    appointment: &mut Appointment,
    action: Action,
    actor: &Actor,
    reason: Option<&str>,
) -> LifecycleResult<()> {
    check_transition(appointment, action, actor)?;

    let now = chrono::Utc::now().to_rfc3339();
    let from = appointment.status;
    let to = action.target();

    match action {
        Action::CheckIn => appointment.checked_in_at = Some(now.clone()),
        Action::CollectSample => appointment.sample_collected_at = Some(now.clone()),
        Action::Complete => appointment.completed_at = Some(now.clone()),
        Action::Cancel => {
            appointment.cancelled_at = Some(now.clone());
            appointment.cancellation_reason = reason
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string);
        }
        Action::Confirm | Action::StartProcessing | Action::MarkNoShow => {}
    }

    appointment.status = to;
    appointment.status_history.push(StatusChange {
        from,
        to,
        actor_id: actor.id.clone(),
        actor_role: actor.role,
        at: now.clone(),
    });
    appointment.updated_at = now;
    Ok(())
}

/// Loads, transitions and stores appointments.
pub struct AppointmentLifecycle<'a> {
    db: &'a Database,
}

impl<'a> AppointmentLifecycle<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn transition(
        &self,
        appointment_id: &str,
        action: Action,
        actor: &Actor,
        reason: Option<&str>,
    ) -> LifecycleResult<Appointment> {
        let mut appointment = self
            .db
            .get_appointment(appointment_id)?
            .ok_or_else(|| LifecycleError::NotFound(format!("appointment {}", appointment_id)))?;

        let previous = appointment.status;
        if let Err(e) = apply_transition(&mut appointment, action, actor, reason) {
            tracing::warn!(
                appointment_id,
                action = %action,
                status = %appointment.status,
                actor_role = %actor.role,
                error = %e,
                "transition rejected"
            );
            return Err(e);
        }

        if !self.db.update_appointment_status(&appointment, previous)? {
            // Another writer changed the record between read and write
            return Err(match self.db.get_appointment(appointment_id)? {
                Some(current) => LifecycleError::InvalidTransition {
                    current: current.status,
                    attempted: action,
                },
                None => LifecycleError::NotFound(format!("appointment {}", appointment_id)),
            });
        }

        tracing::info!(
            appointment_id,
            code = %appointment.appointment_code,
            action = %action,
            status = %appointment.status,
            actor_id = %actor.id,
            "appointment transitioned"
        );
        Ok(appointment)
    }

    pub fn confirm(&self, id: &str, actor: &Actor) -> LifecycleResult<Appointment> {
        self.transition(id, Action::Confirm, actor, None)
    }

    pub fn check_in(&self, id: &str, actor: &Actor) -> LifecycleResult<Appointment> {
        self.transition(id, Action::CheckIn, actor, None)
    }

    pub fn collect_sample(&self, id: &str, actor: &Actor) -> LifecycleResult<Appointment> {
        self.transition(id, Action::CollectSample, actor, None)
    }

    pub fn start_processing(&self, id: &str, actor: &Actor) -> LifecycleResult<Appointment> {
        self.transition(id, Action::StartProcessing, actor, None)
    }

    pub fn complete(&self, id: &str, actor: &Actor) -> LifecycleResult<Appointment> {
        self.transition(id, Action::Complete, actor, None)
    }

    pub fn cancel(&self, id: &str, actor: &Actor, reason: Option<&str>) -> LifecycleResult<Appointment> {
        self.transition(id, Action::Cancel, actor, reason)
    }

    pub fn mark_no_show(&self, id: &str, actor: &Actor) -> LifecycleResult<Appointment> {
        self.transition(id, Action::MarkNoShow, actor, None)
    }
}
