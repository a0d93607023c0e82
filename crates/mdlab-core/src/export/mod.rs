//! Billing export of completed appointments.

mod billing;

pub use billing::*;
