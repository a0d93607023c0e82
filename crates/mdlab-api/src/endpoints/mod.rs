//! Route handlers, one module per resource.

pub mod appointments;
pub mod health;
pub mod services;
pub mod users;
