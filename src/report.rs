use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::learning::q_table::{GreedyPolicy, ValueTables};
use crate::learning::state_space::JointAction;
use crate::simulation::Phase;
use crate::{Config, Period, Price};

/// Terminal state of a run, as handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub phase: Phase,
    /// Periods played before termination.
    pub periods: Period,
    /// Consecutive periods of unchanged greedy policy at termination.
    pub stable_periods: Period,
    pub final_state: JointAction,
    pub value_tables: ValueTables,
    pub greedy_policy: GreedyPolicy,
    /// Configuration the environment was built from.
    pub config: Config,
    pub learning_rate: f64,
    pub seed: u64,
}

impl SimulationResult {
    pub fn converged(&self) -> bool {
        self.phase == Phase::Converged
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)
            .map_err(|e| Error::io(format!("write result {}", path.display()), e))
    }

    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("read result {}", path.display()), e))?;
        Self::from_json(&s)
    }

    /// Follow the greedy policy from the final state until it cycles.
    pub fn limit_path(&self, env: &Environment) -> LimitPath {
        LimitPath::trace(env, &self.greedy_policy, env.space().encode(&self.final_state))
    }
}

/// Number of results ending in each phase, in declaration order.
///
/// Every phase is listed, including those no run ended in.
pub fn phase_counts(results: &[SimulationResult]) -> Vec<(Phase, usize)> {
    Phase::iter()
        .map(|phase| (phase, results.iter().filter(|r| r.phase == phase).count()))
        .collect()
}

/// The cycle reached when every agent plays greedily forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitPath {
    /// Periods before the cycle is entered.
    pub transient: usize,
    /// Joint actions of the cycle, in order of play.
    pub cycle: Vec<JointAction>,
    pub prices: Vec<Vec<Price>>,
    /// Per-agent profit averaged over the cycle.
    pub mean_profits: Vec<f64>,
    /// Per-agent `(profit - competitive) / (monopoly - competitive)`.
    pub profit_gain: Vec<f64>,
}

impl LimitPath {
    pub fn trace(env: &Environment, policy: &GreedyPolicy, start: usize) -> Self {
        let mut visited: HashMap<usize, usize> = HashMap::new();
        let mut path = vec![];
        let mut state = start;
        // A deterministic map on a finite set must revisit a state.
        let first = loop {
            if let Some(&at) = visited.get(&state) {
                break at;
            }
            visited.insert(state, path.len());
            path.push(state);
            state = env.space().encode(&policy.joint_action(state));
        };

        let cycle: Vec<JointAction> = path[first..]
            .iter()
            .map(|&s| env.space().decode(s))
            .collect();
        let prices = cycle.iter().map(|joint| env.prices(joint)).collect();

        let n = env.config().n;
        let mut mean_profits = vec![0.0; n];
        for &s in &path[first..] {
            for (total, pi) in mean_profits.iter_mut().zip(env.profits().get(s)) {
                *total += pi;
            }
        }
        let len = cycle.len() as f64;
        mean_profits.iter_mut().for_each(|total| *total /= len);

        let profit_gain = mean_profits
            .iter()
            .zip(env.competitive_profits())
            .zip(env.monopoly_profits())
            .map(|((pi, nash), monopoly)| (pi - nash) / (monopoly - nash))
            .collect();

        LimitPath {
            transient: first,
            cycle,
            prices,
            mean_profits,
            profit_gain,
        }
    }

    /// Profit gain averaged over agents.
    pub fn mean_profit_gain(&self) -> f64 {
        self.profit_gain.iter().sum::<f64>() / self.profit_gain.len() as f64
    }
}
