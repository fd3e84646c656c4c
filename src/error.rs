// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for normal-mode moves, meters, and the overlap driver.
//!
//! Replaces `Result<_, String>` in public APIs with a proper enum so callers
//! can pattern-match on failure modes (bad setup, invariant violation,
//! degenerate overlap parameter) rather than parsing opaque strings.
//!
//! Setup errors (`DuplicateWaveVector`, `ShapeMismatch`, `ConfigLoad`) are
//! raised before the first trial; the simulation must not start. The
//! remaining variants are invariant violations detected mid-run and are
//! never retried.

use std::fmt;

/// Errors arising from basis setup, Monte Carlo trials, or data loading.
#[derive(Debug)]
pub enum RodSpringError {
    /// The same wave-vector index was whitelisted twice.
    DuplicateWaveVector(usize),

    /// Basis or buffer arrays disagree on dimension (what went wrong).
    ShapeMismatch(String),

    /// Potential energy was infinite after zeroing the compared modes.
    ///
    /// Removal should guarantee a non-overlapping configuration; carries
    /// the full position dump so the operator can see which pair touched.
    OverlapAfterRemoval { positions: Vec<f64> },

    /// The Bennett parameter search produced NaN, zero, or infinity.
    DegenerateBennettParameter(f64),

    /// The insertion/removal loop populated a different number of reduced
    /// coordinates than the bases imply. Implementation bug, not bad physics.
    EtaCountMismatch { expected: usize, got: usize },

    /// Parameter file loading failed (path, underlying IO or parse error).
    ConfigLoad(String),
}

impl fmt::Display for RodSpringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateWaveVector(idx) => {
                write!(f, "Wave vector {idx} registered as changeable twice")
            }
            Self::ShapeMismatch(what) => write!(f, "Array shape mismatch: {what}"),
            Self::OverlapAfterRemoval { positions } => {
                write!(
                    f,
                    "Hard-core overlap persists after mode removal; positions: {positions:?}"
                )
            }
            Self::DegenerateBennettParameter(v) => {
                write!(f, "Bennett parameter search produced {v}; cannot proceed")
            }
            Self::EtaCountMismatch { expected, got } => {
                write!(
                    f,
                    "Reduced-coordinate count mismatch: expected {expected}, got {got}"
                )
            }
            Self::ConfigLoad(msg) => write!(f, "Parameter loading failed: {msg}"),
        }
    }
}

impl std::error::Error for RodSpringError {}
