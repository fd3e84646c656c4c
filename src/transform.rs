// SPDX-License-Identifier: AGPL-3.0-only

//! Collective coordinate transform: displacements ↔ mode amplitudes.
//!
//! The single shared analyze/synthesize primitive consumed by every move
//! and meter. The wvc/ω² branching normalization lives here and nowhere
//! else:
//!
//!   synthesize:  ΔU_cell[j] = sqrt(2·wvc) · Σ_m E[m][j] ·
//!                             (Re_m·cos(kR) − Im_m·sin(kR)) / sqrt(N)
//!   analyze:     amplitude_m = sqrt(2·wvc/N) · Σ_j E[m][j] ·
//!                              (Σ_cells cos(kR)·u[j], −Σ_cells sin(kR)·u[j])
//!
//! The forward scaling `sqrt(2·wvc/N)` makes synthesize-then-analyze exact
//! for both complex-pair (wvc = 1) and self-conjugate (wvc = 0.5) wave
//! vectors: the lattice sums Σcos² differ by a factor of two between the
//! two classes, and 2·wvc absorbs exactly that factor.
//!
//! For a self-conjugate vector the imaginary amplitude is not a physical
//! degree of freedom and is ignored on synthesis; modes with infinite ω²
//! are skipped on both paths and reported as exactly zero.
//!
//! The transform owns its scratch buffers (sized cells × coordinate_dim at
//! construction), so moves and meters share one allocation-free primitive
//! instead of hidden per-object displacement arrays.

use crate::chain::Coordinates;
use crate::modes::ModeBasis;

/// Forward/inverse normal-mode transform for one basis.
#[derive(Clone, Debug)]
pub struct ModeTransform {
    basis: ModeBasis,
    /// Pre-computed `sqrt(2·wvc)` per wave vector.
    sqrt_coeff: Vec<f64>,
    // Scratch: raw per-coordinate accumulators and one cell's displacement.
    raw_real: Vec<f64>,
    raw_imag: Vec<f64>,
    cell_u: Vec<f64>,
}

impl ModeTransform {
    #[must_use]
    pub fn new(basis: ModeBasis) -> Self {
        let dim = basis.coordinate_dim();
        let sqrt_coeff = (0..basis.num_wave_vectors())
            .map(|i| (2.0 * basis.coefficient(i)).sqrt())
            .collect();
        Self {
            basis,
            sqrt_coeff,
            raw_real: vec![0.0; dim],
            raw_imag: vec![0.0; dim],
            cell_u: vec![0.0; dim],
        }
    }

    #[must_use]
    pub fn basis(&self) -> &ModeBasis {
        &self.basis
    }

    /// Forward transform: project the current displacement field onto one
    /// wave vector's normal modes.
    ///
    /// `out_real`/`out_imag` must have length `coordinate_dim`. Modes with
    /// infinite ω² come out exactly zero.
    pub fn analyze<C: Coordinates>(
        &mut self,
        coords: &C,
        wv: usize,
        out_real: &mut [f64],
        out_imag: &mut [f64],
    ) {
        let dim = self.basis.coordinate_dim();
        let n_cells = coords.num_cells();
        self.raw_real.fill(0.0);
        self.raw_imag.fill(0.0);

        for cell in 0..n_cells {
            let k_r = self.basis.wave_vector(wv).dot(coords.cell_position(cell));
            let (sin_kr, cos_kr) = k_r.sin_cos();
            coords.calc_u(cell, &mut self.cell_u);
            for j in 0..dim {
                self.raw_real[j] += cos_kr * self.cell_u[j];
                self.raw_imag[j] -= sin_kr * self.cell_u[j];
            }
        }

        // Eigenvector rotation with the round-trip-exact scaling.
        let norm = (2.0 * self.basis.coefficient(wv) / n_cells as f64).sqrt();
        let evecs = self.basis.eigenvectors(wv);
        for m in 0..dim {
            if self.basis.omega2(wv, m).is_infinite() {
                out_real[m] = 0.0;
                out_imag[m] = 0.0;
                continue;
            }
            let mut re = 0.0;
            let mut im = 0.0;
            for j in 0..dim {
                re += evecs[m][j] * self.raw_real[j];
                im += evecs[m][j] * self.raw_imag[j];
            }
            out_real[m] = norm * re;
            out_imag[m] = norm * im;
        }
    }

    /// Inverse transform: add (`sign = +1`) or remove (`sign = −1`) one
    /// wave vector's amplitude contribution from every cell's displacement.
    ///
    /// For a self-conjugate wave vector the imaginary amplitudes are
    /// ignored; modes with infinite ω² contribute nothing.
    pub fn synthesize<C: Coordinates>(
        &mut self,
        coords: &mut C,
        wv: usize,
        real: &[f64],
        imag: &[f64],
        sign: f64,
    ) {
        let dim = self.basis.coordinate_dim();
        let n_cells = coords.num_cells();
        let sqrt_wvc = self.sqrt_coeff[wv];
        let self_conjugate = self.basis.coefficient(wv) == 0.5;
        let inv_sqrt_cells = 1.0 / (n_cells as f64).sqrt();
        let evecs = self.basis.eigenvectors(wv);

        for cell in 0..n_cells {
            let k_r = self.basis.wave_vector(wv).dot(coords.cell_position(cell));
            let (sin_kr, cos_kr) = k_r.sin_cos();
            coords.calc_u(cell, &mut self.cell_u);
            for j in 0..dim {
                let mut delta = 0.0;
                for m in 0..dim {
                    if self.basis.omega2(wv, m).is_infinite() {
                        continue;
                    }
                    let mut term = real[m] * cos_kr;
                    if !self_conjugate {
                        term -= imag[m] * sin_kr;
                    }
                    delta += evecs[m][j] * term;
                }
                self.cell_u[j] += sign * sqrt_wvc * inv_sqrt_cells * delta;
            }
            coords.set_to_u(cell, &self.cell_u);
        }
    }

    /// Harmonic energy `Σ_m wvc·ω²·(Re² + Im²)` of one wave vector's
    /// amplitudes, skipping infinite-ω² modes.
    #[must_use]
    pub fn harmonic_energy(&self, wv: usize, real: &[f64], imag: &[f64]) -> f64 {
        let wvc = self.basis.coefficient(wv);
        let mut energy = 0.0;
        for m in 0..self.basis.coordinate_dim() {
            let omega2 = self.basis.omega2(wv, m);
            if omega2.is_finite() {
                energy += wvc * omega2 * (real[m] * real[m] + imag[m] * imag[m]);
            }
        }
        energy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::HardRodChain;
    use crate::modes::ModeBasis;

    fn transform(n: usize, density: f64) -> (ModeTransform, HardRodChain) {
        let basis = ModeBasis::one_d_hard_rods(n, density, 1.0);
        (ModeTransform::new(basis), HardRodChain::new(n, density))
    }

    #[test]
    fn round_trip_complex_pair() {
        // Odd chain: wave vector 1 is a complex pair (wvc = 1).
        let (mut tf, mut chain) = transform(7, 0.5);
        let re_in = [0.031];
        let im_in = [-0.017];
        tf.synthesize(&mut chain, 1, &re_in, &im_in, 1.0);

        let mut re = [0.0];
        let mut im = [0.0];
        tf.analyze(&chain, 1, &mut re, &mut im);
        assert!(
            (re[0] - re_in[0]).abs() < 1e-10 * re_in[0].abs(),
            "re: {} vs {}",
            re[0],
            re_in[0]
        );
        assert!(
            (im[0] - im_in[0]).abs() < 1e-10 * im_in[0].abs(),
            "im: {} vs {}",
            im[0],
            im_in[0]
        );
    }

    #[test]
    fn round_trip_self_conjugate() {
        // Even chain: the zone-boundary vector is self-conjugate (wvc = 0.5).
        let (mut tf, mut chain) = transform(8, 0.5);
        let zone = 4;
        let re_in = [0.042];
        tf.synthesize(&mut chain, zone, &re_in, &[0.0], 1.0);

        let mut re = [0.0];
        let mut im = [0.0];
        tf.analyze(&chain, zone, &mut re, &mut im);
        assert!((re[0] - re_in[0]).abs() < 1e-10 * re_in[0].abs());
        assert!(im[0].abs() < 1e-12, "self-conjugate imag must vanish");
    }

    #[test]
    fn round_trip_every_finite_mode() {
        let (mut tf, _) = transform(10, 0.5);
        for wv in 1..tf.basis().num_wave_vectors() {
            let mut chain = HardRodChain::new(10, 0.5);
            tf.synthesize(&mut chain, wv, &[0.02], &[0.011], 1.0);
            let mut re = [0.0];
            let mut im = [0.0];
            tf.analyze(&chain, wv, &mut re, &mut im);
            assert!((re[0] - 0.02).abs() < 1e-12, "wv {wv}: re {}", re[0]);
            if tf.basis().coefficient(wv) == 1.0 {
                assert!((im[0] - 0.011).abs() < 1e-12, "wv {wv}: im {}", im[0]);
            }
        }
    }

    #[test]
    fn self_conjugate_imaginary_is_ignored() {
        // Two synthesize calls differing only in the imaginary component
        // must produce identical displacements when the coefficient is 0.5.
        let (mut tf, mut a) = transform(8, 0.5);
        let mut b = HardRodChain::new(8, 0.5);
        tf.synthesize(&mut a, 4, &[0.03], &[0.0], 1.0);
        tf.synthesize(&mut b, 4, &[0.03], &[123.456], 1.0);
        assert_eq!(a.snapshot_u(), b.snapshot_u());
    }

    #[test]
    fn com_mode_contributes_nothing() {
        let (mut tf, mut chain) = transform(6, 0.5);
        tf.synthesize(&mut chain, 0, &[0.5], &[0.5], 1.0);
        assert_eq!(chain.snapshot_u(), vec![0.0; 6]);
    }

    #[test]
    fn synthesize_negative_sign_removes_exactly() {
        let (mut tf, mut chain) = transform(9, 0.5);
        tf.synthesize(&mut chain, 2, &[0.04], &[0.01], 1.0);
        let mut re = [0.0];
        let mut im = [0.0];
        tf.analyze(&chain, 2, &mut re, &mut im);
        tf.synthesize(&mut chain, 2, &re, &im, -1.0);
        for u in chain.snapshot_u() {
            assert!(u.abs() < 1e-14, "residual displacement {u}");
        }
    }

    #[test]
    fn harmonic_energy_skips_infinite_modes() {
        let (tf, _) = transform(6, 0.5);
        assert_eq!(tf.harmonic_energy(0, &[1.0], &[1.0]), 0.0);
        let e = tf.harmonic_energy(1, &[0.1], &[0.2]);
        let omega2 = tf.basis().omega2(1, 0);
        assert!((e - omega2 * (0.01 + 0.04)).abs() < 1e-14);
    }

    #[test]
    fn modes_superpose_linearly() {
        // Amplitudes written on different wave vectors read back unchanged.
        let (mut tf, mut chain) = transform(11, 0.5);
        tf.synthesize(&mut chain, 1, &[0.02], &[-0.01], 1.0);
        tf.synthesize(&mut chain, 3, &[-0.015], &[0.025], 1.0);

        let mut re = [0.0];
        let mut im = [0.0];
        tf.analyze(&chain, 1, &mut re, &mut im);
        assert!((re[0] - 0.02).abs() < 1e-12);
        assert!((im[0] - (-0.01)).abs() < 1e-12);
        tf.analyze(&chain, 3, &mut re, &mut im);
        assert!((re[0] - (-0.015)).abs() < 1e-12);
        assert!((im[0] - 0.025).abs() < 1e-12);
    }
}
