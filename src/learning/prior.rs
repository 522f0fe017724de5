use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use crate::environment::Environment;

/// Initial Q values for one agent, one per own action. The same row is
/// used for every joint state.
#[enum_dispatch]
pub trait Initializer {
    fn action_values(&self, env: &Environment, agent: usize) -> Vec<f64>;
}

/// Present value of the profit earned by each own action when rivals
/// randomise uniformly, held forever: `mean_{a_-i} pi_i(a_i, a_-i) / (1 - delta)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationaryProfit;

impl Initializer for StationaryProfit {
    fn action_values(&self, env: &Environment, agent: usize) -> Vec<f64> {
        let space = env.space();
        let profits = env.profits();
        let mut sums = vec![0.0; space.n_actions];
        for joint in 0..space.size() {
            sums[space.coordinate(joint, agent)] += profits.get(joint)[agent];
        }
        // Every own action is paired with k^(n-1) rival profiles.
        let rivals = (space.size() / space.n_actions) as f64;
        let delta = env.config().delta;
        sums.into_iter()
            .map(|sum| sum / rivals / (1.0 - delta))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zero;

impl Initializer for Zero {
    fn action_values(&self, env: &Environment, _agent: usize) -> Vec<f64> {
        vec![0.0; env.space().n_actions]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[enum_dispatch(Initializer)]
pub enum Prior {
    StationaryProfit(StationaryProfit),
    Zero(Zero),
}

impl Default for Prior {
    fn default() -> Self {
        Prior::StationaryProfit(StationaryProfit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn env(n: usize) -> Environment {
        Environment::new(Config {
            n,
            k: 4,
            ..Config::default()
        })
        .unwrap()
    }

    #[test]
    fn test_zero_prior() {
        let env = env(2);
        assert_eq!(Prior::Zero(Zero).action_values(&env, 1), vec![0.0; 4]);
    }

    #[test]
    fn test_stationary_prior_averages_over_rivals() {
        let env = env(2);
        let values = Prior::default().action_values(&env, 0);
        let space = env.space();
        for own in 0..4 {
            let mean = (0..4)
                .map(|rival| env.profits().get(space.encode(&[own, rival]))[0])
                .sum::<f64>()
                / 4.0;
            assert!((values[own] - mean / (1.0 - 0.95)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_stationary_prior_is_computed_per_agent() {
        // In a symmetric triopoly every firm sees the same averaged profits,
        // but each must be averaged over its own rivals' axes.
        let env = env(3);
        let prior = Prior::default();
        let first = prior.action_values(&env, 0);
        for agent in 1..3 {
            let other = prior.action_values(&env, agent);
            for (a, b) in first.iter().zip(&other) {
                assert!((a - b).abs() < 1e-9);
            }
        }
        // Dearer own prices earn more against a uniformly random field
        // only up to a point; the prior must not be flat.
        assert!(first.iter().any(|v| (v - first[0]).abs() > 1e-6));
    }
}
