// SPDX-License-Identifier: AGPL-3.0-only

//! 1-D hard-rod chain: the simulation substrate at its interface boundary.
//!
//! The wider particle/box/potential machinery is out of scope; moves and
//! meters only need the two traits below. `HardRodChain` is the concrete
//! box used throughout: `n` rods of length σ on a periodic line of length
//! `L = n/density`, one rod per basis cell, displacements `u` measured from
//! the lattice sites.
//!
//! The displacement vector is the only state the Monte Carlo machinery ever
//! mutates; every meter that touches it must restore it bit-for-bit before
//! returning.

use crate::constants::ROD_LENGTH;

/// Per-cell displacement access for the collective transform.
pub trait Coordinates {
    /// Degrees of freedom per basis cell.
    fn coordinate_dim(&self) -> usize;
    fn num_cells(&self) -> usize;
    /// Equilibrium (lattice) position of one cell.
    fn cell_position(&self, cell: usize) -> &[f64];
    /// Read the cell's current displacement into `out`.
    fn calc_u(&self, cell: usize, out: &mut [f64]);
    /// Overwrite the cell's displacement.
    fn set_to_u(&mut self, cell: usize, u: &[f64]);
}

/// Potential-energy evaluation; `+∞` signals hard-core overlap.
pub trait Energy {
    fn potential_energy(&self) -> f64;
}

/// A periodic chain of hard rods, one rod per lattice cell.
#[derive(Clone, Debug)]
pub struct HardRodChain {
    n: usize,
    box_length: f64,
    /// Lattice site of each cell, centered on the origin.
    sites: Vec<f64>,
    /// Displacement of each rod from its site.
    u: Vec<f64>,
}

impl HardRodChain {
    /// Lay `n` rods on a centered lattice at the given number density.
    ///
    /// # Panics
    ///
    /// Panics when the rods cannot fit (`density >= 1/σ`) or `n < 2`.
    #[must_use]
    pub fn new(n: usize, density: f64) -> Self {
        assert!(n >= 2, "need at least two rods, got {n}");
        let spacing = 1.0 / density;
        assert!(
            spacing > ROD_LENGTH,
            "density {density} leaves no free volume for σ = {ROD_LENGTH}"
        );
        let box_length = n as f64 / density;
        let sites = (0..n)
            .map(|i| -box_length / 2.0 + i as f64 * spacing)
            .collect();
        Self {
            n,
            box_length,
            sites,
            u: vec![0.0; n],
        }
    }

    #[must_use]
    pub fn num_rods(&self) -> usize {
        self.n
    }

    #[must_use]
    pub fn box_length(&self) -> f64 {
        self.box_length
    }

    /// Current absolute position of rod `i`.
    #[must_use]
    pub fn position(&self, i: usize) -> f64 {
        self.sites[i] + self.u[i]
    }

    /// Reset every displacement to zero (perfect lattice).
    pub fn reset_to_lattice(&mut self) {
        self.u.fill(0.0);
    }

    /// Snapshot of the full displacement vector, for exact restoration.
    #[must_use]
    pub fn snapshot_u(&self) -> Vec<f64> {
        self.u.clone()
    }

    /// Restore a snapshot taken with [`Self::snapshot_u`].
    ///
    /// # Panics
    ///
    /// Panics when the snapshot length does not match the rod count.
    pub fn restore_u(&mut self, snapshot: &[f64]) {
        assert_eq!(snapshot.len(), self.n, "snapshot length mismatch");
        self.u.copy_from_slice(snapshot);
    }

    /// All rod positions, for the overlap-after-removal diagnostic dump.
    #[must_use]
    pub fn diagnostic_dump(&self) -> Vec<f64> {
        (0..self.n).map(|i| self.position(i)).collect()
    }
}

impl Coordinates for HardRodChain {
    fn coordinate_dim(&self) -> usize {
        1
    }

    fn num_cells(&self) -> usize {
        self.n
    }

    fn cell_position(&self, cell: usize) -> &[f64] {
        std::slice::from_ref(&self.sites[cell])
    }

    fn calc_u(&self, cell: usize, out: &mut [f64]) {
        out[0] = self.u[cell];
    }

    fn set_to_u(&mut self, cell: usize, u: &[f64]) {
        self.u[cell] = u[0];
    }
}

impl Energy for HardRodChain {
    /// Zero unless any neighbouring pair overlaps, then `+∞`.
    ///
    /// Rods are laterally ordered by construction (the lattice order is
    /// preserved by every mode-space move), so only adjacent pairs and the
    /// periodic wrap pair need checking.
    fn potential_energy(&self) -> f64 {
        let half = ROD_LENGTH / 2.0;
        for i in 0..self.n - 1 {
            if self.position(i) + half >= self.position(i + 1) - half {
                return f64::INFINITY;
            }
        }
        // Periodic image of rod 0 against the last rod.
        if self.position(0) + self.box_length - half <= self.position(self.n - 1) + half {
            return f64::INFINITY;
        }
        0.0
    }
}
