//! # Registry Constants
//!
//! The handful of fixed parameters the registry is built around. Changing
//! any of these after certificates have been issued changes the meaning of
//! existing records, so treat them as part of the data format.

/// The first certificate id handed out by a fresh registry. Ids count up
/// from here and are never reused, retired certificates included.
pub const FIRST_CERTIFICATE_ID: u64 = 1;

/// Unit of `energy_amount` on every certificate.
pub const ENERGY_UNIT: &str = "MWh";

/// Maximum number of notifications returned by one
/// [`EventLog::since`](crate::events::EventLog::since) page.
pub const EVENT_PAGE_LIMIT: usize = 500;

/// Registry format version, reported by hosts alongside their own version.
pub const REGISTRY_VERSION: &str = "0.1.0";
