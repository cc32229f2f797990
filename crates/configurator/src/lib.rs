//! Product configuration and eligibility resolution: component visibility, material
//! eligibility, labor applicability, rate-sheet selection, and labor cost precomputation
//! over a snapshot of administrator-authored rule tables.

pub mod config;
pub mod costing;
pub mod engine;
pub mod error;
pub mod pricing;
pub mod router;
pub mod store;
pub mod telemetry;
