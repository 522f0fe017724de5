use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::Period;
use crate::learning::q_table::ValueTables;

pub trait Policy {
    fn select_action<R: Rng + ?Sized>(
        &self,
        tables: &ValueTables,
        agent: usize,
        state: usize,
        t: Period,
        rng: &mut R,
    ) -> usize;
}

/// Epsilon-greedy with `epsilon = exp(-beta * t)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayingExploration {
    pub beta: f64,
}

impl DecayingExploration {
    pub fn new(beta: f64) -> Self {
        DecayingExploration { beta }
    }

    /// Probability of a random action in period `t`.
    pub fn exploration_probability(&self, t: Period) -> f64 {
        (-self.beta * t as f64).exp()
    }
}

impl Policy for DecayingExploration {
    fn select_action<R: Rng + ?Sized>(
        &self,
        tables: &ValueTables,
        agent: usize,
        state: usize,
        t: Period,
        rng: &mut R,
    ) -> usize {
        if rng.random::<f64>() < self.exploration_probability(t) {
            rng.random_range(0..tables.space.n_actions)
        } else {
            tables.greedy_action(agent, state)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::state_space::StateSpace;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_exploration_probability_decays() {
        let policy = DecayingExploration::new(1e-3);
        assert_eq!(policy.exploration_probability(0), 1.0);
        let mut last = 1.0;
        for t in [1, 10, 100, 1_000, 10_000] {
            let p = policy.exploration_probability(t);
            assert!(p < last && p > 0.0);
            last = p;
        }
    }

    #[test]
    fn test_larger_beta_decays_faster() {
        let slow = DecayingExploration::new(1e-6);
        let fast = DecayingExploration::new(1e-3);
        assert!(fast.exploration_probability(500) < slow.exploration_probability(500));
    }

    #[test]
    fn test_no_exploration_is_greedy() {
        let space = StateSpace::new(2, 5).unwrap();
        let mut tables = ValueTables::filled(space, 0.0).unwrap();
        tables.update(0, 7, 3, 1.0, 0, 1.0, 0.0);
        // exp(-inf) == 0 so every draw exploits.
        let policy = DecayingExploration::new(f64::INFINITY);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(policy.select_action(&tables, 0, 7, 1, &mut rng), 3);
        }
    }

    #[test]
    fn test_full_exploration_covers_grid() {
        let space = StateSpace::new(2, 5).unwrap();
        let tables = ValueTables::filled(space, 0.0).unwrap();
        let policy = DecayingExploration::new(0.0);
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = [false; 5];
        for _ in 0..500 {
            let action = policy.select_action(&tables, 1, 0, 1_000, &mut rng);
            assert!(action < 5);
            seen[action] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
