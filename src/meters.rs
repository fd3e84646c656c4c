// SPDX-License-Identifier: AGPL-3.0-only

//! Scalar and vector meters over the hard-rod chain.
//!
//! Every meter is effect-free from the caller's perspective: it may
//! temporarily mutate the shared chain, but restores the displacement
//! vector bit-for-bit before returning. The hybrid meters implement the
//! "compared modes governed by harmonic theory" side of the overlap
//! sampling ratio: true potential with the compared modes stripped out,
//! plus the harmonic energy Σ wvc·ω²·|amplitude|² those modes carry.

use crate::chain::{Energy, HardRodChain};
use crate::error::RodSpringError;
use crate::moves::{validate_whitelist, ModeCompareMove};
use crate::transform::ModeTransform;

/// Scalar data source consumed by the overlap ratio meter.
///
/// The chain and seed are threaded through explicitly; a source that
/// needs neither (a constant, the plain potential) simply ignores them.
pub trait ScalarSource {
    fn value(&mut self, chain: &mut HardRodChain, seed: &mut u64) -> f64;
}

/// The bare hard-rod potential energy.
pub struct PotentialEnergyMeter;

impl ScalarSource for PotentialEnergyMeter {
    fn value(&mut self, chain: &mut HardRodChain, _seed: &mut u64) -> f64 {
        chain.potential_energy()
    }
}

/// Fixed value, for wiring baselines and tests.
pub struct ConstantSource(pub f64);

impl ScalarSource for ConstantSource {
    fn value(&mut self, _chain: &mut HardRodChain, _seed: &mut u64) -> f64 {
        self.0
    }
}

/// Brute-force hybrid energy: true potential with the compared wave
/// vectors' modes removed, plus their harmonic energy.
pub struct HybridEnergyMeter {
    transform: ModeTransform,
    compared: Vec<usize>,
    amp_real: Vec<Vec<f64>>,
    amp_imag: Vec<Vec<f64>>,
}

impl HybridEnergyMeter {
    /// # Errors
    ///
    /// Returns [`RodSpringError::DuplicateWaveVector`] or
    /// [`RodSpringError::ShapeMismatch`] on an invalid compared set.
    pub fn new(transform: ModeTransform, compared: &[usize]) -> Result<Self, RodSpringError> {
        if compared.is_empty() {
            return Err(RodSpringError::ShapeMismatch(
                "compared wave-vector set is empty".into(),
            ));
        }
        validate_whitelist(compared, transform.basis().num_wave_vectors())?;
        let dim = transform.basis().coordinate_dim();
        let n = compared.len();
        Ok(Self {
            transform,
            compared: compared.to_vec(),
            amp_real: vec![vec![0.0; dim]; n],
            amp_imag: vec![vec![0.0; dim]; n],
        })
    }
}

impl ScalarSource for HybridEnergyMeter {
    fn value(&mut self, chain: &mut HardRodChain, _seed: &mut u64) -> f64 {
        let old_u = chain.snapshot_u();

        // Strip every compared mode, keeping the amplitudes measured from
        // the live configuration (not re-derived from the zeroed state).
        let mut energy_harmonic = 0.0;
        for i in 0..self.compared.len() {
            let wv = self.compared[i];
            self.transform
                .analyze(chain, wv, &mut self.amp_real[i], &mut self.amp_imag[i]);
            self.transform
                .synthesize(chain, wv, &self.amp_real[i], &self.amp_imag[i], -1.0);
            energy_harmonic +=
                self.transform
                    .harmonic_energy(wv, &self.amp_real[i], &self.amp_imag[i]);
        }
        let energy_hard_rod = chain.potential_energy();

        chain.restore_u(&old_u);
        energy_hard_rod + energy_harmonic
    }
}

/// Shortcut hybrid meter for exactly one compared wave vector.
///
/// Instead of re-analyzing the chain it reuses the harmonic amplitudes the
/// companion compare move inserted in its last phase-3 draw, so the move
/// that altered the configuration and the meter that scores it see the
/// same sample.
pub struct SingleModeHybridMeter {
    transform: ModeTransform,
    wave_vector: usize,
}

impl SingleModeHybridMeter {
    /// # Errors
    ///
    /// Returns [`RodSpringError::ShapeMismatch`] when `wave_vector` is out
    /// of range.
    pub fn new(transform: ModeTransform, wave_vector: usize) -> Result<Self, RodSpringError> {
        validate_whitelist(&[wave_vector], transform.basis().num_wave_vectors())?;
        Ok(Self {
            transform,
            wave_vector,
        })
    }

    /// Hybrid energy reusing the companion move's last inserted sample.
    ///
    /// The companion must compare exactly this meter's wave vector.
    pub fn value_from_move(
        &mut self,
        chain: &mut HardRodChain,
        companion: &ModeCompareMove,
    ) -> Result<f64, RodSpringError> {
        let compared = companion.compared_wave_vectors();
        if compared != [self.wave_vector] {
            return Err(RodSpringError::ShapeMismatch(format!(
                "companion move compares {compared:?}, meter expects [{}]",
                self.wave_vector
            )));
        }
        let (real, imag) = companion.last_inserted_amplitudes(0);

        let old_u = chain.snapshot_u();
        self.transform
            .synthesize(chain, self.wave_vector, real, imag, -1.0);
        let energy_hard_rod = chain.potential_energy();
        chain.restore_u(&old_u);

        Ok(energy_hard_rod + self.transform.harmonic_energy(self.wave_vector, real, imag))
    }
}

/// Vector meter: every wave vector's mode amplitudes, laid out as
/// `[real_0 .. real_{n-1}, imag_0 .. imag_{n-1}]` with `coordinate_dim`
/// entries per block.
pub struct ModeAmplitudeMeter {
    transform: ModeTransform,
    real: Vec<f64>,
    imag: Vec<f64>,
}

impl ModeAmplitudeMeter {
    #[must_use]
    pub fn new(transform: ModeTransform) -> Self {
        let dim = transform.basis().coordinate_dim();
        Self {
            transform,
            real: vec![0.0; dim],
            imag: vec![0.0; dim],
        }
    }

    #[must_use]
    pub fn data_length(&self) -> usize {
        2 * self.transform.basis().num_wave_vectors() * self.transform.basis().coordinate_dim()
    }

    pub fn value(&mut self, chain: &HardRodChain) -> Vec<f64> {
        let n_wv = self.transform.basis().num_wave_vectors();
        let dim = self.transform.basis().coordinate_dim();
        let mut out = vec![0.0; 2 * n_wv * dim];
        for wv in 0..n_wv {
            self.transform
                .analyze(chain, wv, &mut self.real, &mut self.imag);
            out[wv * dim..(wv + 1) * dim].copy_from_slice(&self.real);
            let off = n_wv * dim;
            out[off + wv * dim..off + (wv + 1) * dim].copy_from_slice(&self.imag);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::ModeBasis;
    use crate::moves::McMove;

    fn transform(n: usize) -> ModeTransform {
        ModeTransform::new(ModeBasis::one_d_hard_rods(n, 0.5, 1.0))
    }

    #[test]
    fn hybrid_meter_restores_chain() {
        let mut chain = HardRodChain::new(8, 0.5);
        let mut tx = transform(8);
        let re = vec![0.02];
        let im = vec![-0.013];
        tx.synthesize(&mut chain, 2, &re, &im, 1.0);
        let before = chain.snapshot_u();

        let mut meter = HybridEnergyMeter::new(transform(8), &[2]).expect("valid set");
        let mut seed = 1u64;
        let _ = meter.value(&mut chain, &mut seed);
        assert_eq!(chain.snapshot_u(), before);
    }

    #[test]
    fn hybrid_meter_matches_harmonic_energy_for_clean_mode() {
        // With exactly one excited mode, stripping it leaves the lattice
        // (zero potential), so the hybrid energy equals the harmonic term.
        let mut chain = HardRodChain::new(8, 0.5);
        let mut tx = transform(8);
        let re = vec![0.05];
        let im = vec![0.03];
        tx.synthesize(&mut chain, 2, &re, &im, 1.0);
        let expected = tx.harmonic_energy(2, &re, &im);

        let mut meter = HybridEnergyMeter::new(transform(8), &[2]).expect("valid set");
        let mut seed = 1u64;
        let got = meter.value(&mut chain, &mut seed);
        assert!(
            (got - expected).abs() < 1e-10,
            "hybrid {got} vs harmonic {expected}"
        );
    }

    #[test]
    fn hybrid_meter_rejects_duplicate_set() {
        let err = HybridEnergyMeter::new(transform(8), &[1, 1]);
        assert!(matches!(err, Err(RodSpringError::DuplicateWaveVector(1))));
    }

    #[test]
    fn single_mode_meter_agrees_with_brute_force() {
        let mut chain = HardRodChain::new(8, 0.5);
        let mut mv = ModeCompareMove::new(transform(8), &[2], &[1], 1, 0.01, 1.0).expect("valid");
        let mut seed = 9u64;
        mv.propose_trial(&mut chain, &mut seed).expect("trial");
        mv.commit();

        let mut shortcut = SingleModeHybridMeter::new(transform(8), 2).expect("valid");
        let got = shortcut.value_from_move(&mut chain, &mv).expect("companion");

        let mut brute = HybridEnergyMeter::new(transform(8), &[2]).expect("valid");
        let want = brute.value(&mut chain, &mut seed);
        assert!((got - want).abs() < 1e-9, "shortcut {got} vs brute {want}");
    }

    #[test]
    fn amplitude_meter_layout() {
        let mut chain = HardRodChain::new(8, 0.5);
        let mut tx = transform(8);
        let re = vec![0.04];
        let im = vec![0.02];
        tx.synthesize(&mut chain, 3, &re, &im, 1.0);

        let mut meter = ModeAmplitudeMeter::new(transform(8));
        let data = meter.value(&chain);
        assert_eq!(data.len(), meter.data_length());
        let n_wv = 5; // n = 8: indices 0..=4
        assert_eq!(data.len(), 2 * n_wv);
        assert!((data[3] - 0.04).abs() < 1e-10);
        assert!((data[n_wv + 3] - 0.02).abs() < 1e-10);
        // Other wave vectors stay dark.
        assert!(data[2].abs() < 1e-12);
        assert!(data[n_wv + 2].abs() < 1e-12);
    }
}
