//! Service catalog database operations.

use rusqlite::{params, OptionalExtension, Row};
use strsim::{jaro_winkler, normalized_levenshtein};

use super::{Database, DbError, DbResult};
use crate::models::{Service, ServiceCategory};

/// Number of FTS5 hits re-ranked by similarity.
const FTS_CANDIDATE_LIMIT: usize = 50;

/// Minimum similarity for the typo-tolerant fallback.
const MIN_FUZZY_SCORE: f64 = 0.70;

const SERVICE_COLUMNS: &str = r#"
    s.id, s.name, s.category, s.price, s.duration, s.description,
    s.is_active, s.is_popular, s.requires_fasting, s.home_visit_available
"#;

impl Database {
    /// Insert or update a service.
    pub fn upsert_service(&self, service: &Service) -> DbResult<()> {
        if service.price < 0.0 || !service.price.is_finite() {
            return Err(DbError::Constraint(format!(
                "Service price must be a non-negative number: {}",
                service.price
            )));
        }

        self.conn.execute(
            r#"
            INSERT INTO services (
                id, name, category, price, duration, description,
                is_active, is_popular, requires_fasting, home_visit_available, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                price = excluded.price,
                duration = excluded.duration,
                description = excluded.description,
                is_active = excluded.is_active,
                is_popular = excluded.is_popular,
                requires_fasting = excluded.requires_fasting,
                home_visit_available = excluded.home_visit_available,
                updated_at = datetime('now')
            "#,
            params![
                service.id,
                service.name,
                service.category.as_str(),
                service.price,
                service.duration,
                service.description,
                service.is_active,
                service.is_popular,
                service.requires_fasting,
                service.home_visit_available,
            ],
        )?;
        Ok(())
    }

    /// Get a service by ID, active or not.
    pub fn get_service(&self, id: &str) -> DbResult<Option<Service>> {
        let sql = format!("SELECT {} FROM services s WHERE s.id = ?", SERVICE_COLUMNS);
        self.conn
            .query_row(&sql, [id], ServiceRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List services ordered by category then name.
    pub fn list_services(&self, active_only: bool) -> DbResult<Vec<Service>> {
        let sql = format!(
            "SELECT {} FROM services s WHERE (?1 = 0 OR s.is_active = 1) ORDER BY s.category, s.name",
            SERVICE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([active_only], ServiceRow::from_row)?;

        let mut services = Vec::new();
        for row in rows {
            services.push(row?.try_into()?);
        }
        Ok(services)
    }

    /// Search active services by name, category or description.
    ///
    /// FTS5 prefix matches are re-ranked by name similarity. When FTS5 finds
    /// nothing (typos such as "hemoglobn"), active services are scored by
    /// similarity alone and kept above [`MIN_FUZZY_SCORE`].
    pub fn search_services(&self, query: &str, limit: usize) -> DbResult<Vec<Service>> {
        let query_lower = query.trim().to_lowercase();
        if query_lower.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates = self.fts_candidates(&query_lower)?;
        let fuzzy_only = candidates.is_empty();
        if fuzzy_only {
            candidates = self.list_services(true)?;
        }

        let mut scored: Vec<(f64, Service)> = candidates
            .into_iter()
            .map(|service| (name_score(&query_lower, &service.name), service))
            .filter(|(score, _)| !fuzzy_only || *score >= MIN_FUZZY_SCORE)
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.name.cmp(&b.1.name))
        });

        Ok(scored.into_iter().take(limit).map(|(_, s)| s).collect())
    }

    fn fts_candidates(&self, query: &str) -> DbResult<Vec<Service>> {
        let escaped_query = escape_fts_query(query);
        if escaped_query.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT {}
            FROM services s
            JOIN services_fts fts ON s.rowid = fts.rowid
            WHERE services_fts MATCH ?
            AND s.is_active = 1
            ORDER BY bm25(services_fts)
            LIMIT ?
            "#,
            SERVICE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![escaped_query, FTS_CANDIDATE_LIMIT as i64],
            ServiceRow::from_row,
        )?;

        let mut services = Vec::new();
        for row in rows {
            services.push(row?.try_into()?);
        }
        Ok(services)
    }

    /// Mark a service inactive. Existing appointments keep their snapshots.
    pub fn deactivate_service(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE services SET is_active = 0, updated_at = datetime('now') WHERE id = ?",
            [id],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct ServiceRow {
    id: String,
    name: String,
    category: String,
    price: f64,
    duration: Option<String>,
    description: Option<String>,
    is_active: bool,
    is_popular: bool,
    requires_fasting: bool,
    home_visit_available: bool,
}

impl ServiceRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ServiceRow {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            price: row.get(3)?,
            duration: row.get(4)?,
            description: row.get(5)?,
            is_active: row.get(6)?,
            is_popular: row.get(7)?,
            requires_fasting: row.get(8)?,
            home_visit_available: row.get(9)?,
        })
    }
}

impl TryFrom<ServiceRow> for Service {
    type Error = DbError;

    fn try_from(row: ServiceRow) -> Result<Self, Self::Error> {
        let category: ServiceCategory = row.category.parse().map_err(DbError::Constraint)?;
        Ok(Service {
            id: row.id,
            name: row.name,
            category,
            price: row.price,
            duration: row.duration,
            description: row.description,
            is_active: row.is_active,
            is_popular: row.is_popular,
            requires_fasting: row.requires_fasting,
            home_visit_available: row.home_visit_available,
        })
    }
}

/// Similarity of a query to a service name (0.0 - 1.0).
fn name_score(query: &str, name: &str) -> f64 {
    let name_lower = name.to_lowercase();
    if name_lower.contains(query) {
        return 1.0;
    }
    // Best match against the whole name or any single word of it
    std::iter::once(name_lower.as_str())
        .chain(name_lower.split_whitespace())
        .map(|candidate| jaro_winkler(query, candidate) * 0.6 + normalized_levenshtein(query, candidate) * 0.4)
        .fold(0.0, f64::max)
}

/// Escape special FTS5 characters and prepare query for prefix matching.
fn escape_fts_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .map(|word| format!("{}*", word))
        .collect::<Vec<_>>()
        .join(" ")
}
