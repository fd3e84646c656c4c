// SPDX-License-Identifier: AGPL-3.0-only

//! Brute-force verification integrals.
//!
//! `DoubleIntegral` is a plain 2-D composite trapezoid rule;
//! `TwoThreeRodIntegral` uses it to evaluate the overlap-sampling ratio
//! for the 2-vs-3 hard-rod system in closed form, as an external oracle
//! for the Monte Carlo estimators. Neither belongs in a hot path; the
//! grids are embarrassingly parallel and fan out across cores.

use rayon::prelude::*;

use crate::chain::HardRodChain;
use crate::constants::{BOUNDARY_TOL, ROD_LENGTH};
use crate::modes::ModeBasis;

/// 2-D composite trapezoid rule on `[x_start,x_end] × [y_start,y_end]`
/// with `x_n × y_n` intervals. Corner points weigh 1, edges 2, interior 4,
/// under the prefix `(Δx·Δy)/(4·x_n·y_n)`.
#[derive(Clone, Copy, Debug)]
pub struct DoubleIntegral {
    pub x_start: f64,
    pub x_end: f64,
    pub y_start: f64,
    pub y_end: f64,
    pub x_n: usize,
    pub y_n: usize,
}

impl DoubleIntegral {
    #[must_use]
    pub fn integrate<F>(&self, f: &F) -> f64
    where
        F: Fn(f64, f64) -> f64 + Sync,
    {
        let dx = (self.x_end - self.x_start) / self.x_n as f64;
        let dy = (self.y_end - self.y_start) / self.y_n as f64;
        let total: f64 = (0..=self.x_n)
            .into_par_iter()
            .map(|i| {
                let x = self.x_start + i as f64 * dx;
                let wx = if i == 0 || i == self.x_n { 1.0 } else { 2.0 };
                let mut row = 0.0;
                for j in 0..=self.y_n {
                    let y = self.y_start + j as f64 * dy;
                    let wy = if j == 0 || j == self.y_n { 1.0 } else { 2.0 };
                    row += wx * wy * f(x, y);
                }
                row
            })
            .sum();
        let prefix = (self.x_end - self.x_start) * (self.y_end - self.y_start)
            / (4.0 * self.x_n as f64 * self.y_n as f64);
        prefix * total
    }

    /// Warn when `f` fails to vanish on the domain boundary: the window is
    /// too narrow, which invalidates the interior-dominated trapezoid sum.
    /// Diagnostic only; the number still comes back.
    pub fn check_boundary<F>(&self, f: &F, label: &str)
    where
        F: Fn(f64, f64) -> f64 + Sync,
    {
        let tol = BOUNDARY_TOL;
        let dx = (self.x_end - self.x_start) / self.x_n as f64;
        let dy = (self.y_end - self.y_start) / self.y_n as f64;
        for i in 0..=self.x_n {
            let x = self.x_start + i as f64 * dx;
            if f(x, self.y_start).abs() >= tol || f(x, self.y_end).abs() >= tol {
                eprintln!("{label}: integrand does not vanish on the y boundary; widen the window");
                break;
            }
        }
        for j in 0..=self.y_n {
            let y = self.y_start + j as f64 * dy;
            if f(self.x_start, y).abs() >= tol || f(self.x_end, y).abs() >= tol {
                eprintln!("{label}: integrand does not vanish on the x boundary; widen the window");
                break;
            }
        }
    }
}

/// Lattice row of hard rods displaced by a single wave vector's sinusoid.
struct RodRow {
    lattice: Vec<f64>,
    box_length: f64,
    k: f64,
    sqrt_wvc: f64,
    norm: f64,
}

impl RodRow {
    fn new(n: usize, density: f64, basis: &ModeBasis) -> Self {
        let chain = HardRodChain::new(n, density);
        let lattice: Vec<f64> = (0..n).map(|i| chain.position(i)).collect();
        Self {
            lattice,
            box_length: n as f64 / density,
            k: basis.wave_vector(1).k[0],
            sqrt_wvc: (2.0 * basis.coefficient(1)).sqrt(),
            norm: 1.0 / (n as f64).sqrt(),
        }
    }

    /// Non-overlap test after displacing every rod by the wave-vector-1
    /// sinusoid with amplitude `(eta_real, eta_imag)`.
    fn overlaps(&self, eta_real: f64, eta_imag: f64) -> bool {
        let half = 0.5 * ROD_LENGTH;
        let pos: Vec<f64> = self
            .lattice
            .iter()
            .map(|&x0| {
                let kr = self.k * x0;
                x0 + self.sqrt_wvc * (eta_real * kr.cos() - eta_imag * kr.sin()) * self.norm
            })
            .collect();
        for w in pos.windows(2) {
            if w[0] + half >= w[1] - half {
                return true;
            }
        }
        pos[0] + self.box_length - half <= pos[pos.len() - 1] + half
    }
}

/// Integrals of the three closed-form probability ratios for the 2-rod
/// reference vs 3-rod target overlap measurement, over the (real,
/// imaginary) amplitude plane of wave vector 1.
pub struct TwoThreeRodIntegral {
    grid: DoubleIntegral,
    alpha: f64,
    reference: RodRow,
    target: RodRow,
    omega2_ref: f64,
}

/// The three integrals and the ratio they combine into.
#[derive(Clone, Copy, Debug)]
pub struct RatioResult {
    pub numerator: f64,
    pub denom_reference: f64,
    pub denom_target: f64,
    /// I_ref / I_target = denom_target / denom_reference.
    pub ratio: f64,
}

impl TwoThreeRodIntegral {
    #[must_use]
    pub fn new(density: f64, alpha: f64, grid: DoubleIntegral) -> Self {
        let basis_ref = ModeBasis::one_d_hard_rods(2, density, 1.0);
        let basis_targ = ModeBasis::one_d_hard_rods(3, density, 1.0);
        let omega2_ref = basis_ref.omega2(1, 0);
        Self {
            grid,
            alpha,
            reference: RodRow::new(2, density, &basis_ref),
            target: RodRow::new(3, density, &basis_targ),
            omega2_ref,
        }
    }

    fn integrand_ref_denom(&self, x: f64, y: f64) -> f64 {
        // Two hard rods plus a harmonic y mode.
        if self.reference.overlaps(x, 0.0) {
            0.0
        } else {
            (-0.5 * self.omega2_ref * y * y).exp()
        }
    }

    fn integrand_targ_denom(&self, x: f64, y: f64) -> f64 {
        if self.target.overlaps(x, y) {
            0.0
        } else {
            1.0
        }
    }

    fn integrand_numerator(&self, x: f64, y: f64) -> f64 {
        if self.reference.overlaps(x, 0.0) || self.target.overlaps(x, y) {
            0.0
        } else {
            let d = (-0.5 * self.omega2_ref * y * y).exp();
            d / (1.0 + self.alpha * d)
        }
    }

    /// Evaluate all three integrals and their combined ratio, logging each
    /// piece and warning when any integrand leaks past the window.
    #[must_use]
    pub fn calculate(&self) -> RatioResult {
        let numerator = {
            let f = |x, y| self.integrand_numerator(x, y);
            self.grid.check_boundary(&f, "numerator");
            self.grid.integrate(&f)
        };
        let denom_reference = {
            let f = |x, y| self.integrand_ref_denom(x, y);
            self.grid.check_boundary(&f, "reference denominator");
            self.grid.integrate(&f)
        };
        let denom_target = {
            let f = |x, y| self.integrand_targ_denom(x, y);
            self.grid.check_boundary(&f, "target denominator");
            self.grid.integrate(&f)
        };
        let i_ref = numerator / denom_reference;
        let i_targ = numerator / denom_target;
        println!("numerator        = {numerator}");
        println!("denom(reference) = {denom_reference}");
        println!("denom(target)    = {denom_target}");
        println!("I_ref = {i_ref}  I_targ = {i_targ}  ratio = {}", i_ref / i_targ);
        RatioResult {
            numerator,
            denom_reference,
            denom_target,
            ratio: i_ref / i_targ,
        }
    }
}
