//! Service catalog lookups used by intake.

use crate::db::{Database, DbResult};
use crate::models::Service;

/// Resolves requested service IDs against the catalog.
pub trait ServiceCatalog {
    /// One entry per requested ID, in request order.
    ///
    /// Unknown and inactive services resolve to `None`.
    fn resolve_services(&self, ids: &[String]) -> DbResult<Vec<Option<Service>>>;
}

impl ServiceCatalog for Database {
    fn resolve_services(&self, ids: &[String]) -> DbResult<Vec<Option<Service>>> {
        ids.iter()
            .map(|id| Ok(self.get_service(id)?.filter(|s| s.is_active)))
            .collect()
    }
}
