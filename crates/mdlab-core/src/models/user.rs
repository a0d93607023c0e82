//! User models (patients and lab staff).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Displayed when an address is missing or has no usable parts.
pub const ADDRESS_NOT_PROVIDED: &str = "Not provided";

/// Account role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    MedTech,
    Pathologist,
    Receptionist,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::MedTech => "medtech",
            Role::Pathologist => "pathologist",
            Role::Receptionist => "receptionist",
            Role::Admin => "admin",
        }
    }

    /// Everyone except patients.
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Patient)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "medtech" => Ok(Role::MedTech),
            "pathologist" => Ok(Role::Pathologist),
            "receptionist" => Ok(Role::Receptionist),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Biological sex as recorded on lab requests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
        }
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Sex::Male),
            "Female" => Ok(Sex::Female),
            other => Err(format!("Unknown sex: {}", other)),
        }
    }
}

/// Postal address, either free text or broken into parts.
///
/// Older records carry a plain string while newer ones carry an object, so
/// the JSON form is untagged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Address {
    Text(String),
    Structured(StructuredAddress),
}

/// Address broken into optional parts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuredAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub zip_code: Option<String>,
}

impl Address {
    /// Single-line display form. See [`format_address`].
    pub fn formatted(&self) -> String {
        format_address(self)
    }
}

/// Render an address for display.
///
/// Text is trimmed; structured parts are joined with `", "` in street, city,
/// province, zip order. Empty input yields [`ADDRESS_NOT_PROVIDED`].
pub fn format_address(address: &Address) -> String {
    match address {
        Address::Text(text) => usable_part(Some(text))
            .map(str::to_string)
            .unwrap_or_else(|| ADDRESS_NOT_PROVIDED.to_string()),
        Address::Structured(parts) => {
            let joined = [&parts.street, &parts.city, &parts.province, &parts.zip_code]
                .into_iter()
                .filter_map(|part| usable_part(part.as_ref()))
                .collect::<Vec<_>>()
                .join(", ");
            if joined.is_empty() {
                ADDRESS_NOT_PROVIDED.to_string()
            } else {
                joined
            }
        }
    }
}

/// Format an optional address, treating `None` like an empty one.
pub fn format_optional_address(address: Option<&Address>) -> String {
    address
        .map(format_address)
        .unwrap_or_else(|| ADDRESS_NOT_PROVIDED.to_string())
}

// Legacy rows sometimes stored the literal strings "undefined"/"null".
fn usable_part(part: Option<&String>) -> Option<&str> {
    let trimmed = part?.trim();
    if trimmed.is_empty() || trimmed == "undefined" || trimmed == "null" {
        None
    } else {
        Some(trimmed)
    }
}

/// A user account. Patients and staff share one table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Internal UUID
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub contact_number: Option<String>,
    pub age: Option<u8>,
    pub sex: Option<Sex>,
    pub address: Option<Address>,
    /// Human-readable patient ID, immutable once set
    pub patient_id: Option<String>,
    /// PBKDF2 hash; never leaves the process
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Build a user record from a registration request and a computed hash.
    pub fn from_new(new: &NewUser, password_hash: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: new.username.trim().to_string(),
            email: new.email.trim().to_lowercase(),
            role: new.role,
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            contact_number: new.contact_number.clone(),
            age: new.age,
            sex: new.sex,
            address: new.address.clone(),
            patient_id: None,
            password_hash,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// First and last name, falling back to the username.
    pub fn full_name(&self) -> String {
        let name = [&self.first_name, &self.last_name]
            .into_iter()
            .filter_map(|part| part.as_deref().map(str::trim))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.username.clone()
        } else {
            name
        }
    }

    pub fn formatted_address(&self) -> String {
        format_optional_address(self.address.as_ref())
    }
}

/// Registration/seeding input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub address: Option<Address>,
}

impl NewUser {
    pub fn new(username: &str, email: &str, password: &str, role: Role) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role,
            first_name: None,
            last_name: None,
            contact_number: None,
            age: None,
            sex: None,
            address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn structured(parts: [Option<&str>; 4]) -> Address {
        Address::Structured(StructuredAddress {
            street: parts[0].map(Into::into),
            city: parts[1].map(Into::into),
            province: parts[2].map(Into::into),
            zip_code: parts[3].map(Into::into),
        })
    }

    #[test]
    fn test_format_text_address() {
        let address = Address::Text("  123 Rizal St, Manila ".into());
        assert_eq!(format_address(&address), "123 Rizal St, Manila");
        assert_eq!(format_address(&Address::Text("   ".into())), ADDRESS_NOT_PROVIDED);
    }

    #[test]
    fn test_format_structured_address_skips_missing_parts() {
        let address = structured([Some("123 Rizal St"), None, Some("Laguna"), Some("4027")]);
        assert_eq!(format_address(&address), "123 Rizal St, Laguna, 4027");
    }

    #[test]
    fn test_format_structured_all_empty_is_sentinel() {
        assert_eq!(format_address(&structured([None; 4])), ADDRESS_NOT_PROVIDED);
        let blanks = structured([Some(""), Some(" "), Some("undefined"), Some("null")]);
        assert_eq!(format_address(&blanks), ADDRESS_NOT_PROVIDED);
    }

    #[test]
    fn test_missing_address_is_sentinel() {
        assert_eq!(format_optional_address(None), ADDRESS_NOT_PROVIDED);
    }

    #[test]
    fn test_address_json_is_polymorphic() {
        let text: Address = serde_json::from_str(r#""Calamba City""#).unwrap();
        assert_eq!(text, Address::Text("Calamba City".into()));

        let object: Address =
            serde_json::from_str(r#"{"street":"1 Mabini","zipCode":"4027"}"#).unwrap();
        assert_eq!(object, structured([Some("1 Mabini"), None, None, Some("4027")]));
    }

    #[test]
    fn test_role_round_trip_and_staff() {
        assert_eq!("medtech".parse::<Role>().unwrap(), Role::MedTech);
        assert!("doctor".parse::<Role>().is_err());
        assert!(!Role::Patient.is_staff());
        assert!(Role::Receptionist.is_staff());
    }

    #[test]
    fn test_full_name_falls_back_to_username() {
        let new = NewUser::new("jdelacruz", "J@Example.com", "secret", Role::Patient);
        let mut user = User::from_new(&new, String::new());
        assert_eq!(user.full_name(), "jdelacruz");
        assert_eq!(user.email, "j@example.com");

        user.first_name = Some("Juan".into());
        user.last_name = Some("Dela Cruz".into());
        assert_eq!(user.full_name(), "Juan Dela Cruz");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let new = NewUser::new("ana", "ana@example.com", "secret", Role::Patient);
        let user = User::from_new(&new, "pbkdf2-sha256$1$00$00".into());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("pbkdf2"));
    }

    proptest! {
        #[test]
        fn prop_structured_address_never_undefined(
            street in proptest::option::of(".{0,20}"),
            city in proptest::option::of(".{0,20}"),
            province in proptest::option::of(".{0,20}"),
            zip_code in proptest::option::of("[0-9]{0,6}"),
        ) {
            let address = Address::Structured(StructuredAddress { street, city, province, zip_code });
            let formatted = format_address(&address);
            prop_assert_ne!(formatted.as_str(), "undefined");
            prop_assert_ne!(formatted.as_str(), "null");
            prop_assert!(!formatted.is_empty());
            prop_assert_eq!(formatted.clone(), format_address(&address));
        }

        #[test]
        fn prop_text_address_is_trimmed(text in ".{0,40}") {
            let formatted = format_address(&Address::Text(text.clone()));
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed == "undefined" || trimmed == "null" {
                prop_assert_eq!(formatted.as_str(), ADDRESS_NOT_PROVIDED);
            } else {
                prop_assert_eq!(formatted.as_str(), trimmed);
            }
        }
    }
}
