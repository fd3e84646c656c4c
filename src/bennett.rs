// SPDX-License-Identifier: AGPL-3.0-only

//! Bennett acceptance-ratio accumulation over an α ladder.
//!
//! Two biased sample streams feed the accumulator: reference-ensemble
//! ratios v = exp(-(U_B - U_A)/T) and target-ensemble ratios
//! w = exp(-(U_A - U_B)/T). For any weighting parameter α,
//!
//!   Z_B / Z_A = ⟨ v/(α+v) ⟩_ref / ⟨ w/(1+α·w) ⟩_targ ,
//!
//! but the variance is smallest where the measured ratio equals α itself.
//! The search phase scans a geometric ladder of α values and picks the
//! self-consistent point; the production phase reruns at that single α.

use crate::error::RodSpringError;

/// Result of the self-consistency search.
#[derive(Clone, Copy, Debug)]
pub struct OverlapRatio {
    /// The α closest to self-consistency.
    pub alpha: f64,
    /// The measured Z_target / Z_reference at that α.
    pub ratio: f64,
}

/// Per-α sums of both sample streams.
pub struct BennettAccumulator {
    alphas: Vec<f64>,
    sum_reference: Vec<f64>,
    sum_target: Vec<f64>,
    count_reference: u64,
    count_target: u64,
}

impl BennettAccumulator {
    /// Geometric ladder of `num_alpha` values spanning
    /// `[center/span, center·span]`. `num_alpha == 1` collapses to the
    /// center alone (the production-phase configuration).
    #[must_use]
    pub fn new(alpha_center: f64, alpha_span: f64, num_alpha: usize) -> Self {
        assert!(num_alpha > 0, "alpha ladder must be non-empty");
        assert!(
            alpha_center > 0.0 && alpha_span >= 1.0,
            "alpha ladder must be positive"
        );
        let alphas = if num_alpha == 1 {
            vec![alpha_center]
        } else {
            (0..num_alpha)
                .map(|i| {
                    let t = 2.0 * i as f64 / (num_alpha - 1) as f64 - 1.0;
                    alpha_center * alpha_span.powf(t)
                })
                .collect()
        };
        let n = alphas.len();
        Self {
            alphas,
            sum_reference: vec![0.0; n],
            sum_target: vec![0.0; n],
            count_reference: 0,
            count_target: 0,
        }
    }

    #[must_use]
    pub fn alphas(&self) -> &[f64] {
        &self.alphas
    }

    /// Fold in one reference-ensemble sample v = exp(-(U_B - U_A)/T).
    pub fn add_reference(&mut self, v: f64) {
        for (i, &alpha) in self.alphas.iter().enumerate() {
            self.sum_reference[i] += v / (alpha + v);
        }
        self.count_reference += 1;
    }

    /// Fold in one target-ensemble sample w = exp(-(U_A - U_B)/T).
    pub fn add_target(&mut self, w: f64) {
        for (i, &alpha) in self.alphas.iter().enumerate() {
            self.sum_target[i] += w / (1.0 + alpha * w);
        }
        self.count_target += 1;
    }

    #[must_use]
    pub fn counts(&self) -> (u64, u64) {
        (self.count_reference, self.count_target)
    }

    /// Z_target / Z_reference measured at ladder rung `i`.
    #[must_use]
    pub fn ratio(&self, i: usize) -> f64 {
        let ref_avg = self.sum_reference[i] / self.count_reference as f64;
        let targ_avg = self.sum_target[i] / self.count_target as f64;
        ref_avg / targ_avg
    }

    /// Locate the self-consistent α: the rung minimizing
    /// |ln(ratio_i / α_i)|, log-interpolated against its best neighbor
    /// when the sign change is bracketed.
    ///
    /// # Errors
    ///
    /// Returns [`RodSpringError::DegenerateBennettParameter`] when the
    /// selected ratio is NaN, zero, or infinite; the run cannot proceed
    /// without a valid reference point.
    pub fn bennett_parameter(&self) -> Result<OverlapRatio, RodSpringError> {
        let mut best = 0;
        let mut best_dev = f64::INFINITY;
        for i in 0..self.alphas.len() {
            let r = self.ratio(i);
            if !r.is_finite() || r <= 0.0 {
                return Err(RodSpringError::DegenerateBennettParameter(r));
            }
            let dev = (r / self.alphas[i]).ln().abs();
            if dev < best_dev {
                best_dev = dev;
                best = i;
            }
        }

        let r_best = self.ratio(best);
        // Log-interpolate toward the neighbor on the other side of the
        // self-consistency line, when one exists.
        let d_best = (r_best / self.alphas[best]).ln();
        for &j in &[best.wrapping_sub(1), best + 1] {
            if j >= self.alphas.len() {
                continue;
            }
            let r_j = self.ratio(j);
            let d_j = (r_j / self.alphas[j]).ln();
            if d_best * d_j < 0.0 {
                let f = d_best / (d_best - d_j);
                let ln_ratio = r_best.ln() * (1.0 - f) + r_j.ln() * f;
                let ln_alpha = self.alphas[best].ln() * (1.0 - f) + self.alphas[j].ln() * f;
                let ratio = ln_ratio.exp();
                if !ratio.is_finite() || ratio <= 0.0 {
                    return Err(RodSpringError::DegenerateBennettParameter(ratio));
                }
                return Ok(OverlapRatio {
                    alpha: ln_alpha.exp(),
                    ratio,
                });
            }
        }

        Ok(OverlapRatio {
            alpha: self.alphas[best],
            ratio: r_best,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_spans_center_over_span_to_center_times_span() {
        let acc = BennettAccumulator::new(1.0, 10.0, 5);
        let a = acc.alphas();
        assert_eq!(a.len(), 5);
        assert!((a[0] - 0.1).abs() < 1e-12);
        assert!((a[2] - 1.0).abs() < 1e-12);
        assert!((a[4] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn single_alpha_ladder_is_the_center() {
        let acc = BennettAccumulator::new(0.37, 5.0, 1);
        assert_eq!(acc.alphas(), &[0.37]);
    }

    #[test]
    fn constant_streams_recover_exact_ratio() {
        // v ≡ c in the reference stream and w ≡ 1/c in the target stream
        // describe two ensembles with exact ratio c, at every α:
        // ⟨v/(α+v)⟩ / ⟨w/(1+αw)⟩ = (c/(α+c)) / ((1/c)/(1+α/c)) = c.
        let c = 2.5;
        let mut acc = BennettAccumulator::new(1.0, 10.0, 11);
        for _ in 0..100 {
            acc.add_reference(c);
            acc.add_target(1.0 / c);
        }
        for i in 0..acc.alphas().len() {
            assert!((acc.ratio(i) - c).abs() < 1e-12, "rung {i}");
        }
        let bp = acc.bennett_parameter().expect("finite ratio");
        assert!((bp.ratio - c).abs() < 1e-9);
    }

    #[test]
    fn degenerate_ratio_is_fatal() {
        let mut acc = BennettAccumulator::new(1.0, 10.0, 3);
        acc.add_reference(0.0);
        acc.add_target(1.0);
        let err = acc.bennett_parameter();
        assert!(matches!(
            err,
            Err(RodSpringError::DegenerateBennettParameter(_))
        ));
    }
}
