//! Candidate-assignment generation for the three search methods.
//!
//! Grid enumeration is deterministic in parameter-declaration order; random
//! and Bayesian proposals share the uniform sampler. The Bayesian surrogate
//! is an inverse-distance-weighted Gaussian estimate over normalized
//! parameter coordinates with an expected-improvement acquisition.

use crate::domain::optimization::{Assignment, ParameterDomain, ParameterSpace, ParameterValue};
use rand::Rng;
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use std::collections::HashSet;

/// How many random candidates the Bayesian proposer scores per trial
const CANDIDATE_POOL: usize = 32;

/// Uniform-exploration trials before the surrogate takes over
const EXPLORATION_TRIALS: usize = 3;

/// Floor added to the surrogate standard deviation so the acquisition never
/// divides by zero on an exactly-known point
const SIGMA_FLOOR: f64 = 1e-3;

/// Enumerates the full Cartesian product of the space's grid points in
/// declaration order; the last declared parameter varies fastest. Truncating
/// this list is therefore a deterministic prefix.
pub fn grid_assignments(space: &ParameterSpace, range_steps: usize) -> Vec<Assignment> {
    let axes: Vec<(&str, Vec<ParameterValue>)> = space
        .params()
        .iter()
        .map(|(name, domain)| (name.as_str(), domain.grid_points(range_steps)))
        .collect();

    let total: usize = axes.iter().map(|(_, points)| points.len()).product();
    let mut assignments = Vec::with_capacity(total);
    let mut cursor = vec![0usize; axes.len()];

    for _ in 0..total {
        let values = axes
            .iter()
            .zip(&cursor)
            .map(|((name, points), &i)| (name.to_string(), points[i]))
            .collect();
        assignments.push(Assignment { values });

        // Odometer increment, last axis fastest
        for axis in (0..axes.len()).rev() {
            cursor[axis] += 1;
            if cursor[axis] < axes[axis].1.len() {
                break;
            }
            cursor[axis] = 0;
        }
    }

    assignments
}

/// Draws one independent uniform sample from the space
pub fn random_assignment(space: &ParameterSpace, rng: &mut impl Rng) -> Assignment {
    let values = space
        .params()
        .iter()
        .map(|(name, domain)| {
            let value = match domain {
                ParameterDomain::Discrete(candidates) => {
                    candidates[rng.random_range(0..candidates.len())]
                }
                ParameterDomain::Range { lo, hi } => {
                    ParameterValue::Float(rng.random_range(*lo..=*hi))
                }
            };
            (name.clone(), value)
        })
        .collect();
    Assignment { values }
}

/// Proposes the next Bayesian trial point.
pub struct BayesianProposer {
    space: ParameterSpace,
}

impl BayesianProposer {
    pub fn new(space: ParameterSpace) -> Self {
        Self { space }
    }

    /// Returns the next assignment to evaluate, or `None` when a fully
    /// discrete space has been exhausted.
    ///
    /// The first few proposals explore uniformly; afterwards a pool of fresh
    /// random candidates is scored by expected improvement against the
    /// observed trials and the best one wins. Exact assignments already
    /// tried are never re-proposed while an untried one exists.
    pub fn propose(
        &self,
        observed: &[(Assignment, f64)],
        tried: &HashSet<String>,
        rng: &mut impl Rng,
    ) -> Option<Assignment> {
        if let Some(cardinality) = self.space.discrete_cardinality() {
            if tried.len() >= cardinality {
                return None;
            }
        }

        if observed.len() < EXPLORATION_TRIALS {
            return self.fresh_candidate(tried, rng);
        }

        let best = observed
            .iter()
            .map(|(_, y)| *y)
            .fold(f64::NEG_INFINITY, f64::max);

        let mut pool = Vec::with_capacity(CANDIDATE_POOL);
        // Two sampling rounds before falling back to whatever is untried,
        // so dense already-tried regions cannot starve the proposer.
        for _ in 0..2 {
            for _ in 0..CANDIDATE_POOL {
                let candidate = random_assignment(&self.space, rng);
                if !tried.contains(&candidate.key()) {
                    pool.push(candidate);
                }
            }
            if !pool.is_empty() {
                break;
            }
        }
        if pool.is_empty() {
            return self.fresh_candidate(tried, rng);
        }

        let normal = Normal::new(0.0, 1.0).ok()?;
        pool.into_iter()
            .map(|candidate| {
                let ei = self.expected_improvement(&candidate, observed, best, &normal);
                (candidate, ei)
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(candidate, _)| candidate)
    }

    /// Expected improvement of a candidate under the surrogate estimate
    fn expected_improvement(
        &self,
        candidate: &Assignment,
        observed: &[(Assignment, f64)],
        best: f64,
        normal: &Normal,
    ) -> f64 {
        let x = self.coords(candidate);

        let mut weight_sum = 0.0;
        let mut weighted_mean = 0.0;
        let mut nearest = f64::INFINITY;
        let weights: Vec<(f64, f64)> = observed
            .iter()
            .map(|(assignment, y)| {
                let d2 = self
                    .coords(assignment)
                    .iter()
                    .zip(&x)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>();
                nearest = nearest.min(d2.sqrt());
                let w = 1.0 / (d2 + 1e-6);
                weight_sum += w;
                weighted_mean += w * y;
                (w, *y)
            })
            .collect();
        let mu = weighted_mean / weight_sum;

        let variance = weights
            .iter()
            .map(|(w, y)| w * (y - mu) * (y - mu))
            .sum::<f64>()
            / weight_sum;
        // Distance from the nearest observation feeds exploration: far
        // candidates keep a wide posterior.
        let sigma = (variance.sqrt() + nearest).max(SIGMA_FLOOR);

        let z = (mu - best) / sigma;
        (mu - best) * normal.cdf(z) + sigma * normal.pdf(z)
    }

    fn coords(&self, assignment: &Assignment) -> Vec<f64> {
        self.space
            .params()
            .iter()
            .zip(&assignment.values)
            .map(|((_, domain), (_, value))| domain.normalized(value))
            .collect()
    }

    fn fresh_candidate(
        &self,
        tried: &HashSet<String>,
        rng: &mut impl Rng,
    ) -> Option<Assignment> {
        // Bounded rejection sampling; on a continuous space a collision is
        // effectively impossible, on a discrete one exhaustion was already
        // ruled out above.
        for _ in 0..256 {
            let candidate = random_assignment(&self.space, rng);
            if !tried.contains(&candidate.key()) {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::optimization::ParameterDomain;

    fn space_3x4() -> ParameterSpace {
        ParameterSpace::new(vec![
            (
                "fast".to_string(),
                ParameterDomain::Discrete(vec![
                    ParameterValue::Int(5),
                    ParameterValue::Int(10),
                    ParameterValue::Int(20),
                ]),
            ),
            (
                "slow".to_string(),
                ParameterDomain::Discrete(vec![
                    ParameterValue::Int(50),
                    ParameterValue::Int(100),
                    ParameterValue::Int(150),
                    ParameterValue::Int(200),
                ]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_grid_is_full_product() {
        let assignments = grid_assignments(&space_3x4(), 5);
        assert_eq!(assignments.len(), 12);

        // Every assignment is distinct
        let keys: HashSet<String> = assignments.iter().map(|a| a.key()).collect();
        assert_eq!(keys.len(), 12);
    }

    #[test]
    fn test_grid_order_last_axis_fastest() {
        let assignments = grid_assignments(&space_3x4(), 5);
        assert_eq!(*assignments[0].get("fast").unwrap(), ParameterValue::Int(5));
        assert_eq!(*assignments[0].get("slow").unwrap(), ParameterValue::Int(50));
        assert_eq!(*assignments[1].get("fast").unwrap(), ParameterValue::Int(5));
        assert_eq!(
            *assignments[1].get("slow").unwrap(),
            ParameterValue::Int(100)
        );
        // First axis rolls over after the second exhausts
        assert_eq!(
            *assignments[4].get("fast").unwrap(),
            ParameterValue::Int(10)
        );
    }

    #[test]
    fn test_random_assignment_stays_in_domain() {
        let space = ParameterSpace::new(vec![
            (
                "period".to_string(),
                ParameterDomain::Discrete(vec![ParameterValue::Int(5), ParameterValue::Int(10)]),
            ),
            (
                "threshold".to_string(),
                ParameterDomain::Range { lo: 0.1, hi: 0.9 },
            ),
        ])
        .unwrap();

        let mut rng = rand::rng();
        for _ in 0..100 {
            let assignment = random_assignment(&space, &mut rng);
            let period = assignment.get("period").unwrap().as_f64();
            assert!(period == 5.0 || period == 10.0);
            let threshold = assignment.get("threshold").unwrap().as_f64();
            assert!((0.1..=0.9).contains(&threshold));
        }
    }

    #[test]
    fn test_proposer_never_repeats_exact_assignment() {
        let space = space_3x4();
        let proposer = BayesianProposer::new(space.clone());
        let mut rng = rand::rng();
        let mut tried = HashSet::new();
        let mut observed = Vec::new();

        for i in 0..12 {
            let assignment = proposer
                .propose(&observed, &tried, &mut rng)
                .unwrap_or_else(|| panic!("space not exhausted at trial {}", i));
            assert!(tried.insert(assignment.key()), "duplicate proposal");
            observed.push((assignment, i as f64 * 0.1));
        }

        // All 12 cells visited; the 13th proposal must report exhaustion
        assert!(proposer.propose(&observed, &tried, &mut rng).is_none());
    }

    #[test]
    fn test_proposer_favors_high_region() {
        // Objective rises with 'slow'; after warmup the proposer should pick
        // candidates whose surrogate mean is pulled toward high 'slow'.
        let space = space_3x4();
        let proposer = BayesianProposer::new(space.clone());
        let mut rng = rand::rng();
        let mut tried = HashSet::new();
        let mut observed = Vec::new();

        let mut best = f64::NEG_INFINITY;
        for _ in 0..8 {
            let Some(assignment) = proposer.propose(&observed, &tried, &mut rng) else {
                break;
            };
            tried.insert(assignment.key());
            let objective = assignment.get("slow").unwrap().as_f64() / 200.0;
            best = best.max(objective);
            observed.push((assignment, objective));
        }

        // The best observed objective must be meaningfully above the global
        // minimum cell (slow=50 → 0.25).
        assert!(best > 0.25);
    }
}
