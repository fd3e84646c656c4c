// SPDX-License-Identifier: AGPL-3.0-only

//! Mode basis provider: wave vectors, coefficients, eigenvectors, ω².
//!
//! A `ModeBasis` carries everything the collective transform needs for one
//! box geometry: the reciprocal-space wave vectors, the per-wave-vector
//! coefficient (1.0 for complex pairs, 0.5 for self-conjugate vectors), the
//! eigenvector matrix rotating raw amplitudes into normal modes, and the
//! harmonic spring constants ω² with `f64::INFINITY` flagging
//! non-oscillatory (center-of-mass) directions.
//!
//! The basis depends only on geometry, never on the current particle
//! positions, so it is built once per box and injected into moves and
//! meters at setup time.

use std::f64::consts::PI;

use crate::constants::ROD_LENGTH;
use crate::error::RodSpringError;

/// A reciprocal-space vector indexing one collective oscillation pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveVector {
    /// Cartesian components (length = spatial dimension).
    pub k: Vec<f64>,
}

impl WaveVector {
    /// Phase k·R with a basis-cell position.
    #[must_use]
    pub fn dot(&self, position: &[f64]) -> f64 {
        self.k
            .iter()
            .zip(position.iter())
            .map(|(ki, ri)| ki * ri)
            .sum()
    }
}

/// Normal-mode basis for one box geometry.
///
/// Shape invariants, checked at construction:
///   - one coefficient and one ω² row per wave vector,
///   - each eigenvector matrix square of size `coordinate_dim`,
///   - each ω² row of length `coordinate_dim`.
#[derive(Clone, Debug)]
pub struct ModeBasis {
    wave_vectors: Vec<WaveVector>,
    coefficients: Vec<f64>,
    /// `eigenvectors[wv][mode][coordinate]`, orthogonal per wave vector.
    eigenvectors: Vec<Vec<Vec<f64>>>,
    /// `omega2[wv][mode]`, `+∞` marks a pure translation to be skipped.
    omega2: Vec<Vec<f64>>,
    coordinate_dim: usize,
}

impl ModeBasis {
    /// Build a basis from raw factory output, validating shapes.
    ///
    /// # Errors
    ///
    /// Returns [`RodSpringError::ShapeMismatch`] when the array shapes
    /// disagree with each other or with `coordinate_dim`.
    pub fn new(
        wave_vectors: Vec<WaveVector>,
        coefficients: Vec<f64>,
        eigenvectors: Vec<Vec<Vec<f64>>>,
        omega2: Vec<Vec<f64>>,
        coordinate_dim: usize,
    ) -> Result<Self, RodSpringError> {
        let n_wv = wave_vectors.len();
        if coefficients.len() != n_wv {
            return Err(RodSpringError::ShapeMismatch(format!(
                "{} coefficients for {n_wv} wave vectors",
                coefficients.len()
            )));
        }
        if eigenvectors.len() != n_wv || omega2.len() != n_wv {
            return Err(RodSpringError::ShapeMismatch(format!(
                "{} eigenvector matrices / {} omega2 rows for {n_wv} wave vectors",
                eigenvectors.len(),
                omega2.len()
            )));
        }
        for (i, (evecs, o2)) in eigenvectors.iter().zip(omega2.iter()).enumerate() {
            if evecs.len() != coordinate_dim || o2.len() != coordinate_dim {
                return Err(RodSpringError::ShapeMismatch(format!(
                    "wave vector {i}: {} modes, {} omega2 entries, coordinate_dim {coordinate_dim}",
                    evecs.len(),
                    o2.len()
                )));
            }
            for (m, row) in evecs.iter().enumerate() {
                if row.len() != coordinate_dim {
                    return Err(RodSpringError::ShapeMismatch(format!(
                        "wave vector {i} mode {m}: eigenvector length {} != {coordinate_dim}",
                        row.len()
                    )));
                }
            }
        }
        Ok(Self {
            wave_vectors,
            coefficients,
            eigenvectors,
            omega2,
            coordinate_dim,
        })
    }

    /// Analytic basis for a chain of `n` hard rods at the given density.
    ///
    /// Wave vectors `k_i = 2π·density·i/n` for `i = 0..=n/2`. The `k = 0`
    /// vector is the center-of-mass translation (ω² = ∞); for even `n` the
    /// zone-boundary vector is self-conjugate (coefficient 0.5).
    ///
    /// Oscillatory spring constants come from the harmonic expansion of the
    /// hard-rod free-volume potential `V(r) = −T·ln(r − σ)` about the mean
    /// spacing `a = 1/density`:
    ///
    ///   ω²(k) = (2T / (a − σ)²) · (1 − cos(k·a))
    ///
    /// # Panics
    ///
    /// Panics when `density >= 1/σ` (rods cannot fit) or `n < 2`.
    #[must_use]
    pub fn one_d_hard_rods(n: usize, density: f64, temperature: f64) -> Self {
        assert!(n >= 2, "need at least two rods, got {n}");
        let spacing = 1.0 / density;
        assert!(
            spacing > ROD_LENGTH,
            "density {density} leaves no free volume for σ = {ROD_LENGTH}"
        );

        let n_wv = n / 2 + 1;
        let spring = 2.0 * temperature / ((spacing - ROD_LENGTH) * (spacing - ROD_LENGTH));

        let mut wave_vectors = Vec::with_capacity(n_wv);
        let mut coefficients = Vec::with_capacity(n_wv);
        let mut eigenvectors = Vec::with_capacity(n_wv);
        let mut omega2 = Vec::with_capacity(n_wv);

        for i in 0..n_wv {
            let k = 2.0 * PI * density * i as f64 / n as f64;
            wave_vectors.push(WaveVector { k: vec![k] });
            // Self-conjugate: k = 0 always; zone boundary only when n is even.
            let self_conjugate = i == 0 || (n % 2 == 0 && i == n / 2);
            coefficients.push(if self_conjugate { 0.5 } else { 1.0 });
            eigenvectors.push(vec![vec![1.0]]);
            let o2 = if i == 0 {
                f64::INFINITY
            } else {
                spring * (1.0 - (k * spacing).cos())
            };
            omega2.push(vec![o2]);
        }

        Self {
            wave_vectors,
            coefficients,
            eigenvectors,
            omega2,
            coordinate_dim: 1,
        }
    }

    #[must_use]
    pub fn num_wave_vectors(&self) -> usize {
        self.wave_vectors.len()
    }

    #[must_use]
    pub fn coordinate_dim(&self) -> usize {
        self.coordinate_dim
    }

    #[must_use]
    pub fn wave_vector(&self, i: usize) -> &WaveVector {
        &self.wave_vectors[i]
    }

    #[must_use]
    pub fn coefficient(&self, i: usize) -> f64 {
        self.coefficients[i]
    }

    #[must_use]
    pub fn eigenvectors(&self, i: usize) -> &[Vec<f64>] {
        &self.eigenvectors[i]
    }

    #[must_use]
    pub fn omega2(&self, wv: usize, mode: usize) -> f64 {
        self.omega2[wv][mode]
    }

    /// Number of physical degrees of freedom with finite ω², counting the
    /// real and imaginary amplitude of each complex-pair mode separately.
    #[must_use]
    pub fn oscillatory_dof(&self) -> usize {
        let mut dof = 0usize;
        for wv in 0..self.wave_vectors.len() {
            for mode in 0..self.coordinate_dim {
                if self.omega2[wv][mode].is_finite() {
                    dof += if self.coefficients[wv] == 1.0 { 2 } else { 1 };
                }
            }
        }
        dof
    }
}
