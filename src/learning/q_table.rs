use serde::{Deserialize, Serialize};

use crate::environment::Environment;
use crate::error::Result;
use crate::learning::prior::{Initializer, Prior};
use crate::learning::state_space::{JointAction, StateSpace};

/// One dense Q table per agent, laid out `[agent][state][own action]`.
///
/// Viewed per agent, a table is indexed by the joint-state coordinates
/// followed by the agent's own action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueTables {
    pub space: StateSpace,
    values: Vec<f64>,
}

impl ValueTables {
    /// Tables filled with a constant value.
    pub fn filled(space: StateSpace, value: f64) -> Result<Self> {
        let mut values = space.buffer(space.table_cells())?;
        values.resize(space.table_cells(), value);
        Ok(ValueTables { space, values })
    }

    /// Seed every state of each agent with that agent's prior action values.
    pub fn initialize(env: &Environment, prior: &Prior) -> Result<Self> {
        let space = *env.space();
        let mut tables = ValueTables::filled(space, 0.0)?;
        for agent in 0..space.n_agents {
            let seed = prior.action_values(env, agent);
            debug_assert_eq!(seed.len(), space.n_actions);
            for row in tables.table_mut(agent).chunks_exact_mut(space.n_actions) {
                row.copy_from_slice(&seed);
            }
        }
        Ok(tables)
    }

    fn offset(&self, agent: usize, state: usize) -> usize {
        (agent * self.space.size() + state) * self.space.n_actions
    }

    /// Dense table of one agent.
    pub fn table(&self, agent: usize) -> &[f64] {
        let len = self.space.size() * self.space.n_actions;
        &self.values[agent * len..(agent + 1) * len]
    }

    fn table_mut(&mut self, agent: usize) -> &mut [f64] {
        let len = self.space.size() * self.space.n_actions;
        &mut self.values[agent * len..(agent + 1) * len]
    }

    /// Dimensions of one agent's table: `k` per agent, then `k` own actions.
    pub fn shape(&self) -> Vec<usize> {
        vec![self.space.n_actions; self.space.n_agents + 1]
    }

    pub fn row(&self, agent: usize, state: usize) -> &[f64] {
        let start = self.offset(agent, state);
        &self.values[start..start + self.space.n_actions]
    }

    pub fn get(&self, agent: usize, state: usize, action: usize) -> f64 {
        self.values[self.offset(agent, state) + action]
    }

    pub fn max_value(&self, agent: usize, state: usize) -> f64 {
        self.row(agent, state)
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Arg-max of the row; ties go to the lowest action index.
    pub fn greedy_action(&self, agent: usize, state: usize) -> usize {
        let row = self.row(agent, state);
        let mut best = 0;
        for (action, value) in row.iter().enumerate().skip(1) {
            if *value > row[best] {
                best = action;
            }
        }
        best
    }

    /// One-step Q-learning update of `Q[agent][state][action]`.
    ///
    /// Both rates must lie in [0, 1].
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        agent: usize,
        state: usize,
        action: usize,
        reward: f64,
        next_state: usize,
        learning_rate: f64,
        discount_factor: f64,
    ) {
        debug_assert!((0.0..=1.0).contains(&learning_rate));
        debug_assert!((0.0..=1.0).contains(&discount_factor));
        let continuation = self.max_value(agent, next_state);
        let index = self.offset(agent, state) + action;
        let q = &mut self.values[index];
        *q = (1.0 - learning_rate) * *q + learning_rate * (reward + discount_factor * continuation);
    }
}

/// Snapshot of every agent's greedy action in every joint state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreedyPolicy {
    pub space: StateSpace,
    actions: Vec<usize>,
}

impl GreedyPolicy {
    pub fn from_tables(tables: &ValueTables) -> Self {
        let space = tables.space;
        let actions = (0..space.n_agents)
            .flat_map(|agent| (0..space.size()).map(move |state| (agent, state)))
            .map(|(agent, state)| tables.greedy_action(agent, state))
            .collect();
        GreedyPolicy { space, actions }
    }

    pub fn action(&self, agent: usize, state: usize) -> usize {
        self.actions[agent * self.space.size() + state]
    }

    /// Record a freshly computed greedy action. Returns true if it changed.
    pub fn refresh(&mut self, agent: usize, state: usize, action: usize) -> bool {
        let slot = &mut self.actions[agent * self.space.size() + state];
        let changed = *slot != action;
        *slot = action;
        changed
    }

    /// Joint action played when every agent is greedy in `state`.
    pub fn joint_action(&self, state: usize) -> JointAction {
        (0..self.space.n_agents)
            .map(|agent| self.action(agent, state))
            .collect()
    }
}
