//! # fitbridge-domain
//!
//! Pure domain model for the fitbridge FTMS-to-FIT bridge.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **DeviceDescriptor** (a discovered fitness machine) and the
//!   connection-state vocabulary
//! - Define **Sample** (a normalized telemetry snapshot decoded from an
//!   FTMS record)
//! - Define **Workout** (a recording session) and its lifecycle states
//! - Define **WorkoutSummary** plus the incremental aggregator that
//!   produces it
//! - Define **UserProfile** (weight, age, heart-rate bounds) feeding the
//!   VO2max estimate
//! - Define **BridgeEvent** (telemetry push-channel records)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod event;
pub mod profile;
pub mod sample;
pub mod summary;
pub mod workout;
