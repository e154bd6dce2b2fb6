// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Homeostat Coherence Kernel
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Adaptive coherence controller with a constitutional circuit breaker.
//!
//! [`CoherenceGovernor`] is the caller-owned context: every tick turns a
//! coherence measurement into bounded guidance and, when coherence
//! collapses, trips the breaker that freezes the operation catalog until
//! the seven-phase recovery completes.
//!
//! The component crates are re-exported for callers that drive the
//! controller or the breaker on their own.

pub mod governor;

pub use governor::{CoherenceGovernor, GovernorMode, GovernorStatus, TickOutcome};

pub use homeostat_breaker as breaker;
pub use homeostat_control as control;
pub use homeostat_types as types;

pub use homeostat_types::{HomeostatConfig, HomeostatError, HomeostatResult, PhasePolicy};
