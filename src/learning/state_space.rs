use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on the entries of all value tables together (8 GiB of `f64`).
pub const MAX_TABLE_CELLS: usize = 1 << 30;

/// Joint action (or lagged joint state) as one grid index per agent.
pub type JointAction = Vec<usize>;

/// Dense row-major indexing of the `k^n` joint actions. Agent 0 is the most
/// significant coordinate, so the last agent's index varies fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateSpace {
    pub n_agents: usize,
    pub n_actions: usize,
    size: usize,
}

impl StateSpace {
    pub fn new(n_agents: usize, n_actions: usize) -> Result<Self> {
        let too_large = || Error::StateSpaceTooLarge {
            agents: n_agents,
            actions: n_actions,
        };
        let size = u32::try_from(n_agents)
            .ok()
            .and_then(|n| n_actions.checked_pow(n))
            .ok_or_else(too_large)?;
        // Value tables hold n * size * k entries.
        size.checked_mul(n_actions)
            .and_then(|cells| cells.checked_mul(n_agents))
            .filter(|cells| *cells <= MAX_TABLE_CELLS)
            .ok_or_else(too_large)?;
        Ok(StateSpace {
            n_agents,
            n_actions,
            size,
        })
    }

    /// Number of joint states, `k^n`.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn encode(&self, joint: &[usize]) -> usize {
        debug_assert_eq!(joint.len(), self.n_agents);
        joint.iter().fold(0, |index, a| {
            debug_assert!(*a < self.n_actions);
            index * self.n_actions + a
        })
    }

    pub fn decode(&self, mut index: usize) -> JointAction {
        let mut joint = vec![0; self.n_agents];
        for slot in joint.iter_mut().rev() {
            *slot = index % self.n_actions;
            index /= self.n_actions;
        }
        joint
    }

    /// Entries of all agents' value tables together.
    pub fn table_cells(&self) -> usize {
        self.n_agents * self.size * self.n_actions
    }

    /// An empty buffer with room for `len` values, or an error if the
    /// allocator refuses it.
    pub(crate) fn buffer(&self, len: usize) -> Result<Vec<f64>> {
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| Error::StateSpaceTooLarge {
                agents: self.n_agents,
                actions: self.n_actions,
            })?;
        Ok(data)
    }

    /// The grid index chosen by `agent` in the joint action `index`.
    pub fn coordinate(&self, index: usize, agent: usize) -> usize {
        let stride = self.n_actions.pow((self.n_agents - 1 - agent) as u32);
        (index / stride) % self.n_actions
    }

    /// Iterate over all joint actions in index order.
    pub fn iter(&self) -> impl Iterator<Item = JointAction> {
        vec![0..self.n_actions; self.n_agents]
            .into_iter()
            .multi_cartesian_product()
    }
}
