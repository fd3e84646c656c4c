// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized constants for the normal-mode Monte Carlo modules.
//!
//! Collects LCG PRNG parameters, the hard-rod core length, and numerical
//! guards used across `transform.rs`, `moves.rs`, `different_image.rs`, and
//! `quadrature.rs`.

/// Hard-rod core length σ in lattice units.
///
/// Two rods at positions x_i < x_j overlap when x_i + σ/2 >= x_j − σ/2.
pub const ROD_LENGTH: f64 = 1.0;

/// LCG multiplier (Knuth MMIX).
///
/// Used for deterministic pseudo-random number generation in trial moves
/// and Gaussian mode insertion.
pub const LCG_MULTIPLIER: u64 = 6_364_136_223_846_793_005;

/// LCG increment (Knuth MMIX).
pub const LCG_INCREMENT: u64 = 1_442_695_040_888_963_407;

/// Mantissa bits for LCG → uniform [0, 1) conversion.
///
/// `(seed >> 11) as f64 / (1u64 << 53) as f64` gives 53 bits of precision.
pub const LCG_53_DIVISOR: f64 = (1u64 << 53) as f64;

/// Division guard for Box-Muller and mode normalization.
///
/// Prevents ln(0) in the Gaussian deviate and division by zero when a
/// spring constant underflows. Well below any physical mode scale.
pub const DIVISION_GUARD: f64 = 1e-30;

/// Tolerance for the quadrature boundary-adequacy check.
///
/// An integrand that fails to vanish to this level at the domain boundary
/// means the integration window is too narrow for the Gaussian tails.
pub const BOUNDARY_TOL: f64 = 1e-10;

/// Advance the LCG state by one step.
#[inline]
pub fn lcg_step(seed: &mut u64) {
    *seed = seed
        .wrapping_mul(LCG_MULTIPLIER)
        .wrapping_add(LCG_INCREMENT);
}

/// Generate a uniform f64 in [0, 1) from 53 bits of LCG state.
#[inline]
pub fn lcg_uniform_f64(seed: &mut u64) -> f64 {
    lcg_step(seed);
    (*seed >> 11) as f64 / LCG_53_DIVISOR
}

/// Uniform f64 in [−half_width, +half_width).
#[inline]
pub fn lcg_symmetric_f64(seed: &mut u64, half_width: f64) -> f64 {
    2.0f64.mul_add(lcg_uniform_f64(seed), -1.0) * half_width
}

/// Box-Muller Gaussian deviate N(0, 1) from two LCG draws.
///
/// Uses the polar form: z = sqrt(-2 ln u1) cos(2π u2).
/// The `ln` argument is clamped to `DIVISION_GUARD` to avoid ln(0).
#[inline]
pub fn lcg_gaussian(seed: &mut u64) -> f64 {
    let u1 = lcg_uniform_f64(seed);
    let u2 = lcg_uniform_f64(seed);
    (-2.0 * u1.max(DIVISION_GUARD).ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
