// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Homeostat Control Loop
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Coherence → guidance control math.
//!
//! - [`pid`]: PID core with anti-windup and bounded output
//! - [`criticality`]: power-law exponent estimator over event sizes
//! - [`valley`]: plateau detection and controlled-dip escape
//! - [`adaptive`]: PID composed with the optional criticality strategy
//! - [`diffusion`]: PID guidance scaled for a diffusion sampler
//! - [`simulate`]: first-order plant for offline runs
//!
//! Every component is synchronous and owned by a single driver; `dt` is
//! always supplied by the caller.

pub mod adaptive;
pub mod criticality;
pub mod diffusion;
pub mod pid;
pub mod simulate;
pub mod valley;

pub use adaptive::{AdaptiveController, AdaptiveStatus, GuidanceReport, SocStrategy, TuningParameters};
pub use criticality::{power_law_exponent, CriticalityEstimator, CriticalityMetrics};
pub use diffusion::{model_uncertainty, ControlSignal, DiffusionGuidance, DEFAULT_BASE_SCALE};
pub use pid::{ControllerParameters, ControllerState, PerformanceMetrics, PidCore, PidSnapshot};
pub use simulate::{simulate_response, SimulationTrace};
pub use valley::{ValleyAscentController, ValleyAscentState};
