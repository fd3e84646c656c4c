//! rodspring — normal-mode overlap sampling for 1-D hard rods
//!
//! Measures free-energy differences between hard-rod chains whose
//! low-lying normal modes are governed by the true hard-core potential
//! and chains where those modes follow the harmonic approximation, via
//! Bennett overlap sampling in collective (normal-mode) coordinates.
//!
//! ## Modules
//!   - `modes` — wave vectors, mode coefficients, ω², 1DHR analytic basis
//!   - `chain` — periodic hard-rod chain, displacement bookkeeping, potential
//!   - `transform` — forward/inverse collective-coordinate transform
//!   - `moves` — mode-space Metropolis moves and the trial controller
//!   - `meters` — hybrid (hard + harmonic) energy meters
//!   - `different_image` — N ↔ N±1 mode insertion/removal meters
//!   - `overlap` — Boltzmann ratio meters feeding the accumulator
//!   - `bennett` — acceptance-ratio accumulation over an α ladder
//!   - `quadrature` — brute-force trapezoid oracle for small systems
//!   - `config` — run parameter cases and JSON loading
//!
//! ## Binaries
//!   - `overlap_wv` — harmonic-vs-hard free energy at fixed N
//!   - `different_image` — one-mode insertion free energy, N vs N+1

pub mod bennett;
pub mod chain;
pub mod config;
pub mod constants;
pub mod different_image;
pub mod error;
pub mod meters;
pub mod modes;
pub mod moves;
pub mod overlap;
pub mod quadrature;
pub mod transform;
