// SPDX-License-Identifier: AGPL-3.0-only

//! Overlap ratio meters.
//!
//! An overlap meter combines two scalar energy sources A (reference) and
//! B (target) into the Boltzmann ratio the Bennett accumulator consumes:
//! `exp(-((B - B_base) - (A - A_base)) / T)`. The bases are the per-run
//! reference energies (typically the lattice energies of each ensemble)
//! so the ratio stays O(1) instead of underflowing.

use crate::chain::HardRodChain;
use crate::different_image::ModeAdditionMeter;
use crate::meters::ScalarSource;

/// `(1.0, ratio)` pair for the overlap accumulator.
pub struct OverlapMeter<A: ScalarSource, B: ScalarSource> {
    pub reference: A,
    pub target: B,
    pub reference_base: f64,
    pub target_base: f64,
    pub temperature: f64,
}

impl<A: ScalarSource, B: ScalarSource> OverlapMeter<A, B> {
    #[must_use]
    pub fn new(reference: A, target: B, temperature: f64) -> Self {
        Self {
            reference,
            target,
            reference_base: 0.0,
            target_base: 0.0,
            temperature,
        }
    }

    pub fn set_bases(&mut self, reference_base: f64, target_base: f64) {
        self.reference_base = reference_base;
        self.target_base = target_base;
    }

    /// Fixed draw order: reference first, then target.
    pub fn value(&mut self, chain: &mut HardRodChain, seed: &mut u64) -> [f64; 2] {
        let a = self.reference.value(chain, seed);
        let b = self.target.value(chain, seed);
        let ratio =
            (-((b - self.target_base) - (a - self.reference_base)) / self.temperature).exp();
        [1.0, ratio]
    }
}

/// Overlap meter whose target is an insertion meter, with the insertion's
/// own Gaussian draw cancelled out of the ratio.
///
/// The naive ratio would score the freshly drawn surplus modes under both
/// the target potential and, implicitly, the sampling distribution they
/// were just drawn from. Folding `Σ 0.5·g²` of the most recent unit-normal
/// draws into the exponent removes that double count.
pub struct SameGaussianOverlapMeter<A: ScalarSource> {
    pub reference: A,
    pub target: ModeAdditionMeter,
    pub reference_base: f64,
    pub target_base: f64,
    pub temperature: f64,
}

impl<A: ScalarSource> SameGaussianOverlapMeter<A> {
    #[must_use]
    pub fn new(reference: A, target: ModeAdditionMeter, temperature: f64) -> Self {
        Self {
            reference,
            target,
            reference_base: 0.0,
            target_base: 0.0,
            temperature,
        }
    }

    pub fn set_bases(&mut self, reference_base: f64, target_base: f64) {
        self.reference_base = reference_base;
        self.target_base = target_base;
    }

    pub fn value(&mut self, chain: &mut HardRodChain, seed: &mut u64) -> [f64; 2] {
        let a = self.reference.value(chain, seed);
        let b = self.target.value(chain, seed);
        let gauss_sq: f64 = self
            .target
            .last_gaussians()
            .iter()
            .map(|g| 0.5 * g * g)
            .sum();
        let ratio = (-((b - self.target_base) - (a - self.reference_base)) / self.temperature
            - gauss_sq)
            .exp();
        [1.0, ratio]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meters::ConstantSource;

    #[test]
    fn constant_sources_give_boltzmann_ratio() {
        let mut chain = HardRodChain::new(4, 0.2);
        let mut seed = 1u64;
        let mut meter = OverlapMeter::new(ConstantSource(1.0), ConstantSource(3.0), 2.0);
        let v = meter.value(&mut chain, &mut seed);
        assert_eq!(v[0], 1.0);
        assert!((v[1] - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn swapping_roles_inverts_the_ratio() {
        let mut chain = HardRodChain::new(4, 0.2);
        let mut seed = 1u64;
        let mut direct = OverlapMeter::new(ConstantSource(0.7), ConstantSource(2.1), 1.3);
        let mut swapped = OverlapMeter::new(ConstantSource(2.1), ConstantSource(0.7), 1.3);
        let d = direct.value(&mut chain, &mut seed)[1];
        let s = swapped.value(&mut chain, &mut seed)[1];
        assert!((d - 1.0 / s).abs() < 1e-12 * d.abs());
    }

    #[test]
    fn bases_cancel_out_of_the_ratio() {
        let mut chain = HardRodChain::new(4, 0.2);
        let mut seed = 1u64;
        let mut meter = OverlapMeter::new(ConstantSource(5.0), ConstantSource(9.0), 1.0);
        meter.set_bases(5.0, 9.0);
        let v = meter.value(&mut chain, &mut seed);
        assert!((v[1] - 1.0).abs() < 1e-12);
    }
}
