//! Appointment models and status lifecycle values.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::service::ServiceSnapshot;
use super::user::{format_optional_address, Address, Role, Sex};

/// Appointment status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    /// Walk-in registered at the desk, not yet confirmed
    Pending,
    /// Booked ahead of time
    Scheduled,
    /// Patient arrived at the clinic
    CheckedIn,
    /// Specimen taken
    SampleCollected,
    /// Results being processed
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::CheckedIn => "checked-in",
            AppointmentStatus::SampleCollected => "sample-collected",
            AppointmentStatus::InProgress => "in-progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no-show",
        }
    }

    /// No transition may leave a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AppointmentStatus::Pending),
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "checked-in" => Ok(AppointmentStatus::CheckedIn),
            "sample-collected" => Ok(AppointmentStatus::SampleCollected),
            "in-progress" => Ok(AppointmentStatus::InProgress),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no-show" => Ok(AppointmentStatus::NoShow),
            other => Err(format!("Unknown appointment status: {}", other)),
        }
    }
}

/// How the appointment entered the system.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentType {
    Scheduled,
    WalkIn,
}

impl AppointmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentType::Scheduled => "scheduled",
            AppointmentType::WalkIn => "walk-in",
        }
    }

    /// Status a freshly created appointment starts in.
    pub fn initial_status(&self) -> AppointmentStatus {
        match self {
            AppointmentType::Scheduled => AppointmentStatus::Scheduled,
            AppointmentType::WalkIn => AppointmentStatus::Pending,
        }
    }
}

impl FromStr for AppointmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentType::Scheduled),
            "walk-in" => Ok(AppointmentType::WalkIn),
            other => Err(format!("Unknown appointment type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Regular,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Regular => "regular",
            Priority::Urgent => "urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(Priority::Regular),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("Unknown priority: {}", other)),
        }
    }
}

/// One applied status change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
    pub actor_id: String,
    pub actor_role: Role,
    pub at: String,
}

/// Patient details copied onto the appointment at submission time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientSnapshot {
    pub name: String,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub address: Option<Address>,
    pub age: Option<u8>,
    pub sex: Option<Sex>,
}

impl PatientSnapshot {
    pub fn formatted_address(&self) -> String {
        format_optional_address(self.address.as_ref())
    }
}

/// A lab appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    /// Internal UUID
    pub id: String,
    /// Human-readable date-coded code, e.g. `APT-20251013-4QZ8M`
    pub appointment_code: String,
    /// Linked account, absent for walk-ins without one
    pub patient_user_id: Option<String>,
    pub patient: PatientSnapshot,
    /// Never empty once created
    pub services: Vec<ServiceSnapshot>,
    /// Snapshot names joined with ", "
    pub service_name: String,
    pub total_price: f64,
    pub appointment_date: NaiveDate,
    /// Free-text slot label (e.g. "10:00", "Any time during clinic hours")
    pub appointment_time: String,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub priority: Priority,
    pub notes: Option<String>,
    pub reason_for_visit: Option<String>,
    pub status: AppointmentStatus,
    pub status_history: Vec<StatusChange>,
    pub submitted_by: Option<String>,
    pub checked_in_at: Option<String>,
    pub sample_collected_at: Option<String>,
    pub completed_at: Option<String>,
    pub cancelled_at: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Appointment {
    /// Sum of snapshot prices.
    pub fn services_total(&self) -> f64 {
        self.services.iter().map(|s| s.price).sum()
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// Join snapshot names for display.
pub fn combined_service_name(services: &[ServiceSnapshot]) -> String {
    services
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
