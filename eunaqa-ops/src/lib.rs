//! eunaqa-ops library - operator maintenance procedures
//!
//! One module per maintenance procedure; the binary in `main.rs` is a thin
//! clap dispatcher over these. Every procedure takes the pool explicitly
//! and runs to completion as a single unit of work.

pub mod apicheck;
pub mod backfill;
pub mod diagnose;
pub mod entitlements;
pub mod reports;
pub mod seed;
