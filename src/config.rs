// SPDX-License-Identifier: AGPL-3.0-only

//! Run configuration for the overlap-sampling drivers.
//!
//! Parameters are fixed at construction and never mutated mid-run; the
//! drivers either take a built-in case or load one from JSON.

use std::path::Path;

use serde::Deserialize;

use crate::error::RodSpringError;

/// Parameters for a multiple-wave-vector overlap run: harmonic-vs-hard
/// free-energy difference at fixed particle count.
#[derive(Clone, Debug, Deserialize)]
#[must_use]
pub struct OverlapParams {
    /// Label for this case
    pub label: String,
    /// Number of rods
    pub n_atoms: usize,
    /// Rods per unit length (σ = 1)
    pub density: f64,
    /// Temperature in reduced units
    pub temperature: f64,
    /// Wave vectors handed to the harmonic model
    pub compared_wvs: Vec<usize>,
    /// Wave vectors kept under the true potential
    pub hard_wvs: Vec<usize>,
    /// Wave vectors perturbed per trial, picked with replacement
    pub modes_per_trial: usize,
    /// Half-width of the uniform mode perturbation
    pub step_size: f64,
    /// Center of the Bennett α ladder
    pub alpha_center: f64,
    /// Geometric half-span of the ladder
    pub alpha_span: f64,
    /// Rungs in the search-phase ladder
    pub num_alpha: usize,
    /// Trials in the α search phase (per ensemble)
    pub search_steps: usize,
    /// Trials in the production phase (per ensemble)
    pub production_steps: usize,
    /// LCG seed
    pub seed: u64,
}

impl OverlapParams {
    /// Periodic box length L = N/ρ
    #[must_use]
    pub fn box_length(&self) -> f64 {
        self.n_atoms as f64 / self.density
    }

    /// Oscillatory degrees of freedom of the chain
    #[must_use]
    pub const fn degrees_of_freedom(&self) -> usize {
        self.n_atoms - 1
    }

    /// Load from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`RodSpringError::ConfigLoad`] when the file cannot be
    /// opened or parsed.
    pub fn from_file(path: &Path) -> Result<Self, RodSpringError> {
        load_json(path)
    }
}

/// Parameters for a different-image run: free-energy cost of one mode,
/// N vs N±1.
#[derive(Clone, Debug, Deserialize)]
#[must_use]
pub struct DifferentImageParams {
    /// Label for this case
    pub label: String,
    /// Rods in the donor (simulated) chain
    pub n_atoms: usize,
    /// Rods per unit length (σ = 1)
    pub density: f64,
    /// Temperature in reduced units
    pub temperature: f64,
    /// Match donor and target slots by wave-vector k (target is exactly
    /// twice the donor) instead of sequentially
    pub double_size: bool,
    /// Wave vectors perturbed per trial, picked with replacement
    pub modes_per_trial: usize,
    /// Half-width of the uniform mode perturbation
    pub step_size: f64,
    /// Center of the Bennett α ladder
    pub alpha_center: f64,
    /// Geometric half-span of the ladder
    pub alpha_span: f64,
    /// Rungs in the search-phase ladder
    pub num_alpha: usize,
    /// Trials in the α search phase (per ensemble)
    pub search_steps: usize,
    /// Trials in the production phase (per ensemble)
    pub production_steps: usize,
    /// LCG seed
    pub seed: u64,
}

impl DifferentImageParams {
    /// Rods in the insertion target
    #[must_use]
    pub const fn target_atoms(&self) -> usize {
        if self.double_size {
            2 * self.n_atoms
        } else {
            self.n_atoms + 1
        }
    }

    /// Load from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`RodSpringError::ConfigLoad`] when the file cannot be
    /// opened or parsed.
    pub fn from_file(path: &Path) -> Result<Self, RodSpringError> {
        load_json(path)
    }
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, RodSpringError> {
    let file = std::fs::File::open(path)
        .map_err(|e| RodSpringError::ConfigLoad(format!("{}: {e}", path.display())))?;
    let reader = std::io::BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| RodSpringError::ConfigLoad(format!("{}: {e}", path.display())))
}

/// Ten-rod quick case: lowest two wave vectors harmonic, rest hard.
pub fn overlap_quick_case() -> OverlapParams {
    OverlapParams {
        label: String::from("n10_rho0.5_wv12"),
        n_atoms: 10,
        density: 0.5,
        temperature: 1.0,
        compared_wvs: vec![1, 2],
        hard_wvs: vec![3, 4, 5],
        modes_per_trial: 1,
        step_size: 0.1,
        alpha_center: 1.0,
        alpha_span: 100.0,
        num_alpha: 11,
        search_steps: 20_000,
        production_steps: 100_000,
        seed: 42,
    }
}

/// Two-to-three-rod insertion case whose exact answer the quadrature
/// oracle knows.
pub fn different_image_oracle_case() -> DifferentImageParams {
    DifferentImageParams {
        label: String::from("n2_to_n3_rho0.7_oracle"),
        n_atoms: 2,
        density: 0.7,
        temperature: 1.0,
        double_size: false,
        modes_per_trial: 1,
        step_size: 0.1,
        alpha_center: 1.5,
        alpha_span: 10.0,
        num_alpha: 11,
        search_steps: 20_000,
        production_steps: 200_000,
        seed: 42,
    }
}

/// Ten-rod insertion case, sequential slot matching.
pub fn different_image_quick_case() -> DifferentImageParams {
    DifferentImageParams {
        label: String::from("n10_rho0.5_add1"),
        n_atoms: 10,
        density: 0.5,
        temperature: 1.0,
        double_size: false,
        modes_per_trial: 1,
        step_size: 0.1,
        alpha_center: 1.0,
        alpha_span: 100.0,
        num_alpha: 11,
        search_steps: 20_000,
        production_steps: 100_000,
        seed: 42,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_length_from_density() {
        let p = overlap_quick_case();
        assert!((p.box_length() - 20.0).abs() < 1e-12);
        assert_eq!(p.degrees_of_freedom(), 9);
    }

    #[test]
    fn double_size_target_count() {
        let mut p = different_image_quick_case();
        assert_eq!(p.target_atoms(), 11);
        p.double_size = true;
        assert_eq!(p.target_atoms(), 20);
    }

    #[test]
    fn oracle_case_bridges_two_and_three_rods() {
        let p = different_image_oracle_case();
        assert_eq!(p.n_atoms, 2);
        assert_eq!(p.target_atoms(), 3);
        assert!(!p.double_size);
    }

    #[test]
    fn quick_case_sets_are_disjoint() {
        let p = overlap_quick_case();
        for wv in &p.compared_wvs {
            assert!(!p.hard_wvs.contains(wv));
        }
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = OverlapParams::from_file(Path::new("/nonexistent/params.json"));
        assert!(matches!(err, Err(RodSpringError::ConfigLoad(_))));
    }

    #[test]
    fn params_load_from_json() {
        let dir = std::env::temp_dir();
        let path = dir.join("rodspring_overlap_params_test.json");
        std::fs::write(
            &path,
            r#"{
                "label": "file_case",
                "n_atoms": 8,
                "density": 0.6,
                "temperature": 1.0,
                "compared_wvs": [1],
                "hard_wvs": [2, 3],
                "modes_per_trial": 2,
                "step_size": 0.05,
                "alpha_center": 1.0,
                "alpha_span": 10.0,
                "num_alpha": 5,
                "search_steps": 100,
                "production_steps": 200,
                "seed": 7
            }"#,
        )
        .expect("write temp file");
        let p = OverlapParams::from_file(&path).expect("parse");
        assert_eq!(p.label, "file_case");
        assert_eq!(p.n_atoms, 8);
        assert_eq!(p.hard_wvs, vec![2, 3]);
        assert_eq!(p.modes_per_trial, 2);
        std::fs::remove_file(&path).ok();
    }
}
