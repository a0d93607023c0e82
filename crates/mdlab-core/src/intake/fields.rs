//! Structural checks on the raw request body.
//!
//! Every field is checked independently and all violations are collected.
//! Values are never coerced: a number where a string is expected is a type
//! violation, not a string.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::FieldError;
use crate::models::{Address, AppointmentType, Priority, Sex};
use crate::validate::{is_valid_contact_number, is_valid_email};

pub const PATIENT_NAME_LEN: (usize, usize) = (2, 100);
pub const SERVICE_NAME_LEN: (usize, usize) = (1, 1000);
pub const APPOINTMENT_TIME_LEN: (usize, usize) = (1, 50);
pub const NOTES_MAX: usize = 500;
pub const REASON_MAX: usize = 300;
pub const AGE_RANGE: (u64, u64) = (1, 120);

/// Where the requested service IDs came from, for error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceIdSource {
    /// `serviceId`
    Single,
    /// `serviceIds`
    List,
}

impl ServiceIdSource {
    pub fn path(&self, index: usize) -> String {
        match self {
            ServiceIdSource::Single => "serviceId".to_string(),
            ServiceIdSource::List => format!("serviceIds[{}]", index),
        }
    }
}

/// A request that passed every structural check.
#[derive(Debug, Clone)]
pub struct CheckedRequest {
    pub patient_name: Option<String>,
    pub patient_user_id: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub age: Option<u8>,
    pub sex: Option<Sex>,
    pub address: Option<Address>,
    pub service_ids: Vec<String>,
    pub service_id_source: ServiceIdSource,
    pub service_name: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub total_price: f64,
    pub notes: Option<String>,
    pub reason_for_visit: Option<String>,
    pub appointment_type: AppointmentType,
    pub priority: Priority,
}

/// Run every structural check against `body`.
pub fn check(body: &Value) -> Result<CheckedRequest, Vec<FieldError>> {
    let Some(obj) = body.as_object() else {
        return Err(vec![FieldError::new(
            "body",
            body.clone(),
            "Request body must be a JSON object",
        )]);
    };

    let mut f = Fields {
        obj,
        errors: Vec::new(),
    };

    let patient_user_id = f.optional_string("patientId", 1, 100);
    let patient_known = patient_user_id.is_some();

    let patient_name = f.optional_string("patientName", PATIENT_NAME_LEN.0, PATIENT_NAME_LEN.1);
    if patient_name.is_none() && !patient_known && !f.has_content("patientName") {
        f.require_present("patientName", "Patient name is required");
    }

    let contact_number = f.contact_number();
    if contact_number.is_none() && !patient_known && !f.has_content("contactNumber") {
        f.require_present("contactNumber", "Contact number is required");
    }

    let email = f.email();
    let age = f.age();
    let sex = f.sex();
    let address = f.address();
    let services = f.service_ids();

    let service_name = f.required_string("serviceName", SERVICE_NAME_LEN.0, SERVICE_NAME_LEN.1);
    let appointment_date = f.appointment_date();
    let appointment_time =
        f.required_string("appointmentTime", APPOINTMENT_TIME_LEN.0, APPOINTMENT_TIME_LEN.1);
    let total_price = f.total_price();
    let notes = f.optional_string("notes", 0, NOTES_MAX);
    let reason_for_visit = f.optional_string("reasonForVisit", 0, REASON_MAX);
    let appointment_type = f.appointment_type();
    let priority = f.priority();

    match (
        services,
        service_name,
        appointment_date,
        appointment_time,
        total_price,
        f.errors.is_empty(),
    ) {
        (
            Some((service_ids, service_id_source)),
            Some(service_name),
            Some(appointment_date),
            Some(appointment_time),
            Some(total_price),
            true,
        ) => Ok(CheckedRequest {
            patient_name,
            patient_user_id,
            contact_number,
            email,
            age,
            sex,
            address,
            service_ids,
            service_id_source,
            service_name,
            appointment_date,
            appointment_time,
            total_price,
            notes,
            reason_for_visit,
            appointment_type,
            priority,
        }),
        _ => Err(f.errors),
    }
}

struct Fields<'a> {
    obj: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> Fields<'a> {
    /// The field's value, treating JSON `null` as absent.
    fn get(&self, field: &str) -> Option<&'a Value> {
        self.obj.get(field).filter(|v| !v.is_null())
    }

    /// The value exactly as received, `null` when missing.
    fn received(&self, field: &str) -> Value {
        self.obj.get(field).cloned().unwrap_or(Value::Null)
    }

    /// Record an error against the untrimmed received value.
    fn reject(&mut self, field: &str, msg: impl Into<String>) {
        let value = self.received(field);
        self.errors.push(FieldError::new(field, value, msg));
    }

    fn push(&mut self, field: &str, value: &Value, msg: impl Into<String>) {
        self.errors.push(FieldError::new(field, value.clone(), msg));
    }

    fn require_present(&mut self, field: &str, msg: &str) {
        self.reject(field, msg);
    }

    /// Trimmed string, or a type error. Blank strings count as absent.
    fn string(&mut self, field: &str) -> Option<String> {
        let value = self.get(field)?;
        match value.as_str() {
            Some(s) if s.trim().is_empty() => None,
            Some(s) => Some(s.trim().to_string()),
            None => {
                self.push(field, value, format!("{} must be a string", field));
                None
            }
        }
    }

    /// True when the field holds something other than a blank string.
    fn has_content(&self, field: &str) -> bool {
        match self.get(field) {
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
            None => false,
        }
    }

    fn check_len(&mut self, field: &str, value: String, min: usize, max: usize) -> Option<String> {
        let len = value.chars().count();
        if len < min || len > max {
            let msg = if min <= 1 {
                format!("{} must be at most {} characters", field, max)
            } else {
                format!("{} must be between {} and {} characters", field, min, max)
            };
            self.reject(field, msg);
            return None;
        }
        Some(value)
    }

    fn optional_string(&mut self, field: &str, min: usize, max: usize) -> Option<String> {
        let value = self.string(field)?;
        self.check_len(field, value, min, max)
    }

    fn required_string(&mut self, field: &str, min: usize, max: usize) -> Option<String> {
        let had_content = self.has_content(field);
        let value = self.string(field);
        match value {
            Some(v) => self.check_len(field, v, min, max),
            None => {
                // A type error was already recorded for non-strings
                if !had_content {
                    self.require_present(field, &format!("{} is required", field));
                }
                None
            }
        }
    }

    fn contact_number(&mut self) -> Option<String> {
        let value = self.string("contactNumber")?;
        if !is_valid_contact_number(&value) {
            self.reject(
                "contactNumber",
                "Contact number must be a valid Philippine mobile number",
            );
            return None;
        }
        Some(value)
    }

    fn email(&mut self) -> Option<String> {
        let value = self.string("email")?;
        if !is_valid_email(&value) {
            self.reject("email", "Email must be a valid email address");
            return None;
        }
        Some(value.to_lowercase())
    }

    fn age(&mut self) -> Option<u8> {
        let value = self.get("age")?.clone();
        let whole = match &value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_i64().map(|_| 0))
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
            _ => None,
        };
        match whole {
            Some(age) if (AGE_RANGE.0..=AGE_RANGE.1).contains(&age) => u8::try_from(age).ok(),
            Some(_) => {
                self.push(
                    "age",
                    &value,
                    format!("Age must be between {} and {}", AGE_RANGE.0, AGE_RANGE.1),
                );
                None
            }
            None => {
                self.push("age", &value, "Age must be a whole number");
                None
            }
        }
    }

    fn sex(&mut self) -> Option<Sex> {
        let value = self.string("sex")?;
        match value.parse() {
            Ok(sex) => Some(sex),
            Err(_) => {
                self.reject("sex", "Sex must be Male or Female");
                None
            }
        }
    }

    fn address(&mut self) -> Option<Address> {
        let value = self.get("address")?.clone();
        match &value {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(_) | Value::Object(_) => match serde_json::from_value::<Address>(value.clone()) {
                Ok(address) => Some(address),
                Err(_) => {
                    self.push("address", &value, "Address fields must be strings");
                    None
                }
            },
            _ => {
                self.push("address", &value, "Address must be a string or an object");
                None
            }
        }
    }

    /// `serviceIds` wins when both forms are present; `serviceId` is still type-checked.
    fn service_ids(&mut self) -> Option<(Vec<String>, ServiceIdSource)> {
        let single = self.get("serviceId").cloned();
        let list = self.get("serviceIds").cloned();

        let single_id = single.as_ref().and_then(|v| self.service_id(v, "serviceId"));

        match list {
            Some(Value::Array(items)) if items.is_empty() => {
                self.push(
                    "serviceIds",
                    &Value::Array(items),
                    "At least one service must be selected",
                );
                None
            }
            Some(Value::Array(items)) => {
                let before = self.errors.len();
                let ids: Vec<String> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| self.service_id(item, &ServiceIdSource::List.path(i)))
                    .collect();
                (self.errors.len() == before).then_some((ids, ServiceIdSource::List))
            }
            Some(other) => {
                self.push("serviceIds", &other, "serviceIds must be an array");
                None
            }
            None => match (single, single_id) {
                (_, Some(id)) => Some((vec![id], ServiceIdSource::Single)),
                (Some(_), None) => None,
                (None, None) => {
                    self.require_present("serviceIds", "At least one service must be selected");
                    None
                }
            },
        }
    }

    fn service_id(&mut self, value: &Value, path: &str) -> Option<String> {
        let Some(s) = value.as_str() else {
            self.push(path, value, "Service ID must be a string");
            return None;
        };
        if uuid::Uuid::parse_str(s.trim()).is_err() {
            self.push(path, value, "Service ID must be a valid UUID");
            return None;
        }
        Some(s.trim().to_string())
    }

    fn appointment_date(&mut self) -> Option<NaiveDate> {
        let had_content = self.has_content("appointmentDate");
        let Some(raw) = self.string("appointmentDate") else {
            if !had_content {
                self.require_present("appointmentDate", "appointmentDate is required");
            }
            return None;
        };
        let parsed = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok().or_else(|| {
            chrono::DateTime::parse_from_rfc3339(&raw)
                .ok()
                .map(|dt| dt.date_naive())
        });
        if parsed.is_none() {
            self.reject(
                "appointmentDate",
                "appointmentDate must be a valid date (YYYY-MM-DD)",
            );
        }
        parsed
    }

    fn total_price(&mut self) -> Option<f64> {
        let Some(value) = self.get("totalPrice").cloned() else {
            self.require_present("totalPrice", "totalPrice is required");
            return None;
        };
        match value.as_f64() {
            Some(price) if price.is_finite() && price >= 0.0 => Some(price),
            Some(_) => {
                self.push("totalPrice", &value, "totalPrice must be zero or more");
                None
            }
            None => {
                self.push("totalPrice", &value, "totalPrice must be a number");
                None
            }
        }
    }

    fn appointment_type(&mut self) -> AppointmentType {
        let Some(raw) = self.string("type") else {
            return AppointmentType::Scheduled;
        };
        raw.parse().unwrap_or_else(|_| {
            self.reject("type", "type must be scheduled or walk-in");
            AppointmentType::Scheduled
        })
    }

    fn priority(&mut self) -> Priority {
        let Some(raw) = self.string("priority") else {
            return Priority::Regular;
        };
        raw.parse().unwrap_or_else(|_| {
            self.reject("priority", "priority must be regular or urgent");
            Priority::Regular
        })
    }
}
