// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Homeostat Kernel Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Configuration, error hierarchy and fixed-capacity windows shared by
//! the Homeostat coherence controller and its circuit breaker.

pub mod config;
pub mod error;
pub mod measure;
pub mod ring;

pub use config::{HomeostatConfig, PhasePolicy};
pub use error::{HomeostatError, HomeostatResult};
pub use measure::{clamp_bounded, require_finite, require_unit};
pub use ring::RingBuffer;
