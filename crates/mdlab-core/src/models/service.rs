//! Lab service catalog models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Catalog grouping for lab services.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Hematology,
    Chemistry,
    ClinicalMicroscopy,
    Serology,
    Microbiology,
    Imaging,
    Package,
    Other,
}

impl ServiceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceCategory::Hematology => "hematology",
            ServiceCategory::Chemistry => "chemistry",
            ServiceCategory::ClinicalMicroscopy => "clinical_microscopy",
            ServiceCategory::Serology => "serology",
            ServiceCategory::Microbiology => "microbiology",
            ServiceCategory::Imaging => "imaging",
            ServiceCategory::Package => "package",
            ServiceCategory::Other => "other",
        }
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hematology" => Ok(ServiceCategory::Hematology),
            "chemistry" => Ok(ServiceCategory::Chemistry),
            "clinical_microscopy" => Ok(ServiceCategory::ClinicalMicroscopy),
            "serology" => Ok(ServiceCategory::Serology),
            "microbiology" => Ok(ServiceCategory::Microbiology),
            "imaging" => Ok(ServiceCategory::Imaging),
            "package" => Ok(ServiceCategory::Package),
            "other" => Ok(ServiceCategory::Other),
            other => Err(format!("Unknown service category: {}", other)),
        }
    }
}

/// A lab test or package offered by the clinic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Internal UUID
    pub id: String,
    /// Display name (e.g., "Complete Blood Count")
    pub name: String,
    pub category: ServiceCategory,
    /// Price in pesos, never negative
    pub price: f64,
    /// Expected duration label (e.g., "30 minutes")
    pub duration: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_popular: bool,
    pub requires_fasting: bool,
    pub home_visit_available: bool,
}

impl Service {
    /// Create an active service with required fields.
    pub fn new(name: String, category: ServiceCategory, price: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            category,
            price: price.max(0.0),
            duration: None,
            description: None,
            is_active: true,
            is_popular: false,
            requires_fasting: false,
            home_visit_available: false,
        }
    }

    /// Freeze name and price for an appointment.
    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            service_id: self.id.clone(),
            name: self.name.clone(),
            price: self.price,
        }
    }
}

/// Service name and price as they were when an appointment was booked.
///
/// Later catalog edits do not touch existing snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub service_id: String,
    pub name: String,
    pub price: f64,
}
