//! Ray segment entity and per-trace configuration.
//!
//! A [`Ray`] is one straight segment of a photon path. The trace engine keeps
//! rays either in its active queue or in the completed-path list, never both;
//! a completed ray always carries a non-`None` termination reason.
//!
//! [`TraceConfig`] replaces the original process-wide mutable settings object:
//! the engine receives it explicitly and every ray copies its thresholds at
//! construction, so a mid-trace settings edit can never skew an in-flight
//! frame.

pub mod config;
pub mod ray;

pub use config::TraceConfig;
pub use ray::{Polarization, Ray, RayError, RaySpec, TerminationReason};
