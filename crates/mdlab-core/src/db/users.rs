//! User database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Address, Role, Sex, User};

const USER_COLUMNS: &str = r#"
    id, username, email, role, first_name, last_name, contact_number,
    age, sex, address, patient_id, password_hash, is_active, created_at, updated_at
"#;

impl Database {
    /// Insert a new user.
    pub fn insert_user(&self, user: &User) -> DbResult<()> {
        let address_json = user
            .address
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            r#"
            INSERT INTO users (
                id, username, email, role, first_name, last_name, contact_number,
                age, sex, address, patient_id, password_hash, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                user.id,
                user.username,
                user.email,
                user.role.as_str(),
                user.first_name,
                user.last_name,
                user.contact_number,
                user.age,
                user.sex.map(|s| s.as_str()),
                address_json,
                user.patient_id,
                user.password_hash,
                user.is_active,
                user.created_at,
                user.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a user by internal ID.
    pub fn get_user(&self, id: &str) -> DbResult<Option<User>> {
        self.get_user_where("id", id)
    }

    /// Get a user by username.
    pub fn get_user_by_username(&self, username: &str) -> DbResult<Option<User>> {
        self.get_user_where("username", username)
    }

    /// Get a user by email (stored lowercase).
    pub fn get_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        self.get_user_where("email", &email.trim().to_lowercase())
    }

    /// Get a user by human-readable patient ID.
    pub fn get_user_by_patient_id(&self, patient_id: &str) -> DbResult<Option<User>> {
        self.get_user_where("patient_id", patient_id)
    }

    fn get_user_where(&self, column: &'static str, value: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
        self.conn
            .query_row(&sql, [value], UserRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List users, optionally restricted to one role.
    pub fn list_users(&self, role: Option<Role>) -> DbResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE (?1 IS NULL OR role = ?1) ORDER BY username",
            USER_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([role.map(|r| r.as_str())], UserRow::from_row)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?.try_into()?);
        }
        Ok(users)
    }

    /// Active patients that have no patient ID yet.
    pub fn list_patients_missing_patient_id(&self) -> DbResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE role = 'patient' AND is_active = 1 AND patient_id IS NULL ORDER BY created_at",
            USER_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], UserRow::from_row)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?.try_into()?);
        }
        Ok(users)
    }

    /// Set the patient ID only if none is stored yet.
    ///
    /// Returns `false` when the user already had one (or does not exist).
    /// A colliding value surfaces as a UNIQUE violation on `users.patient_id`.
    pub fn set_patient_id_if_absent(&self, user_id: &str, patient_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE users SET patient_id = ?1, updated_at = datetime('now') WHERE id = ?2 AND patient_id IS NULL",
            params![patient_id, user_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Replace a user's address.
    pub fn update_user_address(&self, user_id: &str, address: &Address) -> DbResult<bool> {
        let address_json = serde_json::to_string(address)?;
        let rows_affected = self.conn.execute(
            "UPDATE users SET address = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![address_json, user_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Soft-deactivate a user. Users are never hard-deleted.
    pub fn deactivate_user(&self, user_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE users SET is_active = 0, updated_at = datetime('now') WHERE id = ?",
            [user_id],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct UserRow {
    id: String,
    username: String,
    email: String,
    role: String,
    first_name: Option<String>,
    last_name: Option<String>,
    contact_number: Option<String>,
    age: Option<u8>,
    sex: Option<String>,
    address: Option<String>,
    patient_id: Option<String>,
    password_hash: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(UserRow {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            role: row.get(3)?,
            first_name: row.get(4)?,
            last_name: row.get(5)?,
            contact_number: row.get(6)?,
            age: row.get(7)?,
            sex: row.get(8)?,
            address: row.get(9)?,
            patient_id: row.get(10)?,
            password_hash: row.get(11)?,
            is_active: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row.role.parse().map_err(DbError::Constraint)?;
        let sex: Option<Sex> = row
            .sex
            .map(|s| s.parse())
            .transpose()
            .map_err(DbError::Constraint)?;
        let address = row
            .address
            .map(|a| serde_json::from_str::<Address>(&a))
            .transpose()?;

        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            role,
            first_name: row.first_name,
            last_name: row.last_name,
            contact_number: row.contact_number,
            age: row.age,
            sex,
            address,
            patient_id: row.patient_id,
            password_hash: row.password_hash,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
