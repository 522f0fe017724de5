use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::Period;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::learning::policy::{DecayingExploration, Policy};
use crate::learning::prior::Prior;
use crate::learning::q_table::{GreedyPolicy, ValueTables};
use crate::report::SimulationResult;

/// Periods between progress log lines.
const PROGRESS_INTERVAL: Period = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, Display)]
pub enum Phase {
    Running,
    Converged,
    TimedOut,
    /// Stopped on request before converging or timing out.
    Aborted,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Phase::Running)
    }
}

/// Optional overrides for a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    /// Defaults to the config's `alpha`.
    pub learning_rate: Option<f64>,
    /// Drawn from the OS when absent; the seed used is always reported.
    pub seed: Option<u64>,
    pub prior: Prior,
}

impl RunParams {
    pub fn with_seed(&self, seed: u64) -> Self {
        RunParams {
            seed: Some(seed),
            ..self.clone()
        }
    }
}

/// Everything a run mutates.
#[derive(Debug, Clone)]
pub struct LearningState {
    pub tables: ValueTables,
    pub policy: GreedyPolicy,
    /// Joint action of the previous period, as a dense index.
    pub state: usize,
    /// Periods played so far.
    pub time: Period,
    /// Consecutive periods without any greedy action changing.
    pub stable_periods: Period,
    pub phase: Phase,
}

impl LearningState {
    pub fn new(env: &Environment, prior: &Prior) -> Result<Self> {
        let tables = ValueTables::initialize(env, prior)?;
        let policy = GreedyPolicy::from_tables(&tables);
        Ok(LearningState {
            tables,
            policy,
            state: 0,
            time: 0,
            stable_periods: 0,
            phase: Phase::Running,
        })
    }
}

pub struct Simulation<'a> {
    env: &'a Environment,
    exploration: DecayingExploration,
    learning_rate: f64,
    seed: u64,
    rng: StdRng,
    actions: Vec<usize>,
    pub learning: LearningState,
}

impl<'a> Simulation<'a> {
    pub fn new(env: &'a Environment, params: &RunParams) -> Result<Self> {
        let learning_rate = params.learning_rate.unwrap_or(env.config().alpha);
        if !(0.0..=1.0).contains(&learning_rate) {
            return Err(Error::InvalidLearningRate {
                value: learning_rate,
            });
        }
        let seed = params
            .seed
            .unwrap_or_else(|| StdRng::from_os_rng().random());
        Ok(Simulation {
            env,
            exploration: DecayingExploration::new(env.config().beta),
            learning_rate,
            seed,
            rng: StdRng::seed_from_u64(seed),
            actions: vec![0; env.config().n],
            learning: LearningState::new(env, &params.prior)?,
        })
    }

    pub fn phase(&self) -> Phase {
        self.learning.phase
    }

    /// Play one period and update every agent's table.
    pub fn step_forward(&mut self) -> Phase {
        if self.learning.phase.is_terminal() {
            return self.learning.phase;
        }
        let env = self.env;
        let config = env.config();
        let learning = &mut self.learning;
        if learning.time >= config.tmax {
            learning.phase = Phase::TimedOut;
            return learning.phase;
        }

        // Each agent picks a price given last period's joint price.
        let state = learning.state;
        for (agent, action) in self.actions.iter_mut().enumerate() {
            *action = self.exploration.select_action(
                &learning.tables,
                agent,
                state,
                learning.time,
                &mut self.rng,
            );
        }

        // Today's joint action is tomorrow's state.
        let next_state = env.space().encode(&self.actions);
        let rewards = env.profits().get(next_state);

        let mut changed = false;
        for (agent, (&action, &reward)) in self.actions.iter().zip(rewards).enumerate() {
            learning.tables.update(
                agent,
                state,
                action,
                reward,
                next_state,
                self.learning_rate,
                config.delta,
            );
            // Only this row moved, so only its arg-max can have changed.
            let greedy = learning.tables.greedy_action(agent, state);
            changed |= learning.policy.refresh(agent, state, greedy);
        }

        learning.stable_periods = if changed {
            0
        } else {
            learning.stable_periods + 1
        };
        learning.state = next_state;
        learning.time += 1;

        if learning.time % PROGRESS_INTERVAL == 0 {
            debug!(
                "Time: {} | Stable: {} | Explore: {:.3e} | Prices: {:.3?}",
                learning.time,
                learning.stable_periods,
                self.exploration.exploration_probability(learning.time),
                env.prices(&self.actions),
            );
        }

        if learning.stable_periods >= config.tstable {
            learning.phase = Phase::Converged;
        } else if learning.time >= config.tmax {
            learning.phase = Phase::TimedOut;
        }
        learning.phase
    }

    /// Play until the run converges or times out.
    pub fn run(self) -> SimulationResult {
        self.run_until(&AtomicBool::new(false))
    }

    /// Like `run`, but stops at the next period boundary once `cancel` is set.
    /// A period that has started is always completed.
    pub fn run_until(mut self, cancel: &AtomicBool) -> SimulationResult {
        while !self.learning.phase.is_terminal() {
            if cancel.load(Ordering::Relaxed) {
                self.learning.phase = Phase::Aborted;
                break;
            }
            self.step_forward();
        }
        match self.learning.phase {
            Phase::TimedOut => warn!(
                "Seed {} timed out after {} periods (stable for {})",
                self.seed, self.learning.time, self.learning.stable_periods
            ),
            phase => info!(
                "Seed {} finished as {} after {} periods",
                self.seed, phase, self.learning.time
            ),
        }
        self.into_result()
    }

    /// Freeze the current learning state into a result bundle.
    pub fn into_result(self) -> SimulationResult {
        let space = self.env.space();
        SimulationResult {
            phase: self.learning.phase,
            periods: self.learning.time,
            stable_periods: self.learning.stable_periods,
            final_state: space.decode(self.learning.state),
            value_tables: self.learning.tables,
            greedy_policy: self.learning.policy,
            config: self.env.config().clone(),
            learning_rate: self.learning_rate,
            seed: self.seed,
        }
    }
}

/// Run one simulation to completion.
pub fn simulate(env: &Environment, params: &RunParams) -> Result<SimulationResult> {
    Ok(Simulation::new(env, params)?.run())
}

/// Independent runs, one per seed, in parallel. The environment is shared
/// read-only; every run owns its tables and random stream.
pub fn simulate_batch(
    env: &Environment,
    params: &RunParams,
    seeds: &[u64],
) -> Result<Vec<SimulationResult>> {
    seeds
        .par_iter()
        .map(|&seed| simulate(env, &params.with_seed(seed)))
        .collect()
}
