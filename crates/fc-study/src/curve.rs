//! Operating point planning for polarization curves.
//!
//! The curve loop first runs a handful of points spread over
//! `[lower, upper]`, then repeatedly asks a [`PointPlanner`] where to add
//! points given everything that has converged so far.

use fc_core::{Tolerances, sorted_unique};

/// Midpoints between neighbouring entries of `values`.
///
/// With `add_edge_points` the first and last input values are kept at the
/// ends, so the result is one element longer than the input.
pub fn interpolate_1d(values: &[f64], add_edge_points: bool) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len() + 1);
    if add_edge_points {
        out.extend(values.first().copied());
    }
    out.extend(values.windows(2).map(|w| (w[0] + w[1]) * 0.5));
    if add_edge_points && values.len() > 1 {
        out.extend(values.last().copied());
    }
    out
}

/// `num_points` evenly spaced values from `start` to `end` inclusive.
pub fn linear_points(start: f64, end: f64, num_points: usize) -> Vec<f64> {
    match num_points {
        0 => Vec::new(),
        1 => vec![start],
        n => {
            let delta = (end - start) / (n - 1) as f64;
            let mut points: Vec<f64> = (0..n).map(|i| start + i as f64 * delta).collect();
            // Ensure exact endpoint
            points[n - 1] = end;
            points
        }
    }
}

/// A converged point of a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSample {
    pub current_density: f64,
    /// Scalar response used to weight refinement (usually cell voltage).
    pub response: Option<f64>,
}

pub trait PointPlanner {
    /// Points for one search attempt with upper bound `upper`.
    fn initial_points(&self, lower: f64, upper: f64) -> Vec<f64>;

    /// New points for one refinement pass. May be empty.
    fn refinement_points(&self, samples: &[CurveSample]) -> Vec<f64>;
}

/// Splits the largest gaps of the accepted curve in half.
///
/// Gap size is the distance between neighbouring samples in the
/// (current density, response) plane, each axis normalised to its range, so
/// steep parts of the curve are refined first. Without responses only the
/// current density spacing counts.
#[derive(Debug, Clone, PartialEq)]
pub struct BisectionPlanner {
    pub initial_points: usize,
    pub points_per_pass: usize,
    /// Also try one point beyond the largest accepted current density.
    pub probe_beyond_max: bool,
    pub tolerances: Tolerances,
}

impl Default for BisectionPlanner {
    fn default() -> Self {
        Self {
            initial_points: 6,
            points_per_pass: 4,
            probe_beyond_max: true,
            tolerances: Tolerances::default(),
        }
    }
}

impl BisectionPlanner {
    /// Samples sorted by current density, one per distinct value.
    fn curve(&self, samples: &[CurveSample]) -> Vec<CurveSample> {
        let mut curve: Vec<CurveSample> = samples
            .iter()
            .filter(|s| s.current_density.is_finite())
            .copied()
            .collect();
        curve.sort_by(|a, b| a.current_density.total_cmp(&b.current_density));
        curve.dedup_by(|b, a| {
            fc_core::nearly_equal(a.current_density, b.current_density, self.tolerances)
        });
        curve
    }
}

fn span(values: impl Iterator<Item = f64>) -> f64 {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if hi > lo { hi - lo } else { 0.0 }
}

impl PointPlanner for BisectionPlanner {
    fn initial_points(&self, lower: f64, upper: f64) -> Vec<f64> {
        linear_points(lower, upper, self.initial_points.max(2))
    }

    fn refinement_points(&self, samples: &[CurveSample]) -> Vec<f64> {
        let curve = self.curve(samples);
        if curve.len() < 2 {
            return Vec::new();
        }

        let x: Vec<f64> = curve.iter().map(|s| s.current_density).collect();
        let x_span = span(x.iter().copied());
        let y_span = span(curve.iter().filter_map(|s| s.response));
        let midpoints = interpolate_1d(&x, false);

        let mut gaps: Vec<(f64, f64)> = curve
            .windows(2)
            .zip(midpoints)
            .map(|(pair, mid)| {
                let dx = if x_span > 0.0 {
                    (pair[1].current_density - pair[0].current_density) / x_span
                } else {
                    0.0
                };
                let dy = match (pair[0].response, pair[1].response) {
                    (Some(a), Some(b)) if y_span > 0.0 => (b - a) / y_span,
                    _ => 0.0,
                };
                (dx.hypot(dy), mid)
            })
            .collect();
        // Largest gap first; equal gaps keep curve order.
        gaps.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut points: Vec<f64> = gaps
            .iter()
            .take(self.points_per_pass)
            .map(|(_, mid)| *mid)
            .collect();

        if self.probe_beyond_max {
            let last = x[x.len() - 1];
            let step = last - x[x.len() - 2];
            points.push(last + 0.5 * step);
        }

        sorted_unique(&points, self.tolerances)
            .into_iter()
            .filter(|p| {
                !x.iter()
                    .any(|known| fc_core::nearly_equal(*known, *p, self.tolerances))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(points: &[(f64, f64)]) -> Vec<CurveSample> {
        points
            .iter()
            .map(|&(i, v)| CurveSample {
                current_density: i,
                response: Some(v),
            })
            .collect()
    }

    #[test]
    fn interpolate_midpoints_and_edges() {
        assert_eq!(interpolate_1d(&[0.0, 2.0, 6.0], false), vec![1.0, 4.0]);
        assert_eq!(
            interpolate_1d(&[0.0, 2.0, 6.0], true),
            vec![0.0, 1.0, 4.0, 6.0]
        );
        assert!(interpolate_1d(&[], true).is_empty());
        assert_eq!(interpolate_1d(&[3.0], true), vec![3.0]);
    }

    #[test]
    fn linear_points_hit_both_ends() {
        let points = linear_points(1.0, 10000.0, 6);
        assert_eq!(points.len(), 6);
        assert_eq!(points[0], 1.0);
        assert_eq!(points[5], 10000.0);
        assert!(linear_points(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn refinement_targets_steep_section() {
        let planner = BisectionPlanner {
            points_per_pass: 1,
            probe_beyond_max: false,
            ..BisectionPlanner::default()
        };
        // Flat start, steep drop at the end.
        let curve = samples(&[(0.0, 1.0), (1000.0, 0.95), (2000.0, 0.9), (3000.0, 0.3)]);
        assert_eq!(planner.refinement_points(&curve), vec![2500.0]);
    }

    #[test]
    fn refinement_without_response_bisects_widest_gap() {
        let planner = BisectionPlanner {
            points_per_pass: 1,
            probe_beyond_max: false,
            ..BisectionPlanner::default()
        };
        let curve: Vec<CurveSample> = [0.0, 100.0, 1000.0]
            .iter()
            .map(|&i| CurveSample {
                current_density: i,
                response: None,
            })
            .collect();
        assert_eq!(planner.refinement_points(&curve), vec![550.0]);
    }

    #[test]
    fn probe_lies_beyond_last_point() {
        let planner = BisectionPlanner {
            points_per_pass: 0,
            ..BisectionPlanner::default()
        };
        let curve = samples(&[(0.0, 1.0), (1000.0, 0.9)]);
        assert_eq!(planner.refinement_points(&curve), vec![1500.0]);
    }

    #[test]
    fn too_few_samples_give_nothing() {
        let planner = BisectionPlanner::default();
        assert!(planner.refinement_points(&[]).is_empty());
        assert!(planner.refinement_points(&samples(&[(5.0, 1.0)])).is_empty());
    }
}
