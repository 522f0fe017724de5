use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Equilibrium, Error, Result};
use crate::learning::state_space::StateSpace;
use crate::market::Market;
use crate::solver::Newton;
use crate::{Config, Price};

/// Root-finding starts every firm at this multiple of marginal cost.
const INITIAL_MARKUP: f64 = 3.0;

/// Competitive (Bertrand-Nash) and fully collusive price vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePrices {
    pub competitive: Vec<Price>,
    pub monopoly: Vec<Price>,
}

/// Per-firm profit for every joint action, `k^n` rows of `n` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitTensor {
    n_agents: usize,
    data: Vec<f64>,
}

impl ProfitTensor {
    pub fn build(market: &Market, grid: &[Price], space: &StateSpace) -> Result<Self> {
        let mut data = space.buffer(space.size() * space.n_agents)?;
        for joint in space.iter() {
            let prices: Vec<Price> = joint.iter().map(|&i| grid[i]).collect();
            data.extend(market.profit(&prices));
        }
        Ok(ProfitTensor {
            n_agents: space.n_agents,
            data,
        })
    }

    /// Number of joint actions covered.
    pub fn len(&self) -> usize {
        self.data.len() / self.n_agents
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Profit vector of the joint action with dense index `joint`.
    pub fn get(&self, joint: usize) -> &[f64] {
        &self.data[joint * self.n_agents..(joint + 1) * self.n_agents]
    }
}

/// Solve both first-order condition systems from the same starting point.
/// A solver failure is fatal: there is no fallback price.
pub fn solve_reference_prices(market: &Market) -> Result<ReferencePrices> {
    let newton = Newton::default();
    let x0 = vec![INITIAL_MARKUP * market.cost; market.n_firms()];
    let competitive = newton
        .solve(|p| market.competitive_foc(p), &x0)
        .map_err(|source| Error::RootFinding {
            equilibrium: Equilibrium::Competitive,
            source,
        })?;
    let monopoly = newton
        .solve(|p| market.monopoly_foc(p), &x0)
        .map_err(|source| Error::RootFinding {
            equilibrium: Equilibrium::Monopoly,
            source,
        })?;
    Ok(ReferencePrices {
        competitive,
        monopoly,
    })
}

/// `k` evenly spaced prices from one step below `low` to one step above `high`.
///
/// The step is the spacing of `k - 2` points spanning `[low, high]`; with
/// `k = 3` that inner grid is a single point and the step is `high - low`.
pub fn build_action_grid(low: Price, high: Price, k: usize) -> Result<Vec<Price>> {
    if k < 3 {
        return Err(Error::config("k", format!("must be at least 3, got {k}")));
    }
    if !(low.is_finite() && high.is_finite()) || high <= low {
        return Err(Error::DegenerateGrid { low, high });
    }
    let step = (high - low) / (k - 3).max(1) as f64;
    Ok(linspace(low - step, high + step, k))
}

fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    let step = (end - start) / (num - 1) as f64;
    (0..num)
        .map(|i| {
            if i == num - 1 {
                end
            } else {
                start + i as f64 * step
            }
        })
        .collect()
}

/// The discretised pricing game. Immutable once built and safe to share
/// read-only across concurrent runs.
#[derive(Debug, Clone)]
pub struct Environment {
    config: Config,
    market: Market,
    reference: ReferencePrices,
    competitive_profits: Vec<f64>,
    monopoly_profits: Vec<f64>,
    grid: Vec<Price>,
    space: StateSpace,
    profits: ProfitTensor,
}

impl Environment {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let market = Market::from_config(&config);
        let reference = solve_reference_prices(&market)?;
        info!(
            "Reference prices: competitive {:.4?}, monopoly {:.4?}",
            reference.competitive, reference.monopoly
        );

        let low = reference
            .competitive
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let high = reference
            .monopoly
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let grid = build_action_grid(low, high, config.k)?;
        let space = StateSpace::new(config.n, config.k)?;
        let profits = ProfitTensor::build(&market, &grid, &space)?;
        info!(
            "Action grid of {} prices in [{:.4}, {:.4}], {} joint states",
            grid.len(),
            grid[0],
            grid[grid.len() - 1],
            space.size()
        );

        Ok(Environment {
            competitive_profits: market.profit(&reference.competitive),
            monopoly_profits: market.profit(&reference.monopoly),
            config,
            market,
            reference,
            grid,
            space,
            profits,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn reference_prices(&self) -> &ReferencePrices {
        &self.reference
    }

    /// Per-firm profit at the competitive reference prices.
    pub fn competitive_profits(&self) -> &[f64] {
        &self.competitive_profits
    }

    /// Per-firm profit at the monopoly reference prices.
    pub fn monopoly_profits(&self) -> &[f64] {
        &self.monopoly_profits
    }

    pub fn grid(&self) -> &[Price] {
        &self.grid
    }

    pub fn space(&self) -> &StateSpace {
        &self.space
    }

    pub fn profits(&self) -> &ProfitTensor {
        &self.profits
    }

    /// Grid prices of a joint action.
    pub fn prices(&self, joint: &[usize]) -> Vec<Price> {
        joint.iter().map(|&i| self.grid[i]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duopoly(k: usize) -> Config {
        Config {
            n: 2,
            k,
            ..Config::default()
        }
    }

    #[test]
    fn test_duopoly_reference_prices() {
        let market = Market::from_config(&duopoly(15));
        let reference = solve_reference_prices(&market).unwrap();
        for p in &reference.competitive {
            assert!((p - 1.473).abs() < 1e-3, "competitive price {p}");
        }
        for p in &reference.monopoly {
            assert!((p - 1.925).abs() < 1e-3, "monopoly price {p}");
        }
    }

    #[test]
    fn test_reference_prices_solve_their_focs() {
        let market = Market::from_config(&Config::default());
        let reference = solve_reference_prices(&market).unwrap();
        assert_eq!(reference.competitive.len(), 3);
        assert!(market.competitive_foc(&reference.competitive).iter().all(|r| r.abs() < 1e-8));
        assert!(market.monopoly_foc(&reference.monopoly).iter().all(|r| r.abs() < 1e-8));
        assert!(reference.monopoly[0] > reference.competitive[0]);
    }

    #[test]
    fn test_action_grid_is_strictly_increasing() {
        for k in [3, 4, 5, 15, 50] {
            let grid = build_action_grid(1.47, 1.93, k).unwrap();
            assert_eq!(grid.len(), k);
            assert!(grid.windows(2).all(|w| w[0] < w[1]));
            assert!(grid[0] < 1.47 && grid[k - 1] > 1.93);
        }
    }

    #[test]
    fn test_action_grid_pads_one_step() {
        let grid = build_action_grid(1.0, 2.0, 6).unwrap();
        // Inner grid has 4 points, spacing 1/3.
        let step = 1.0 / 3.0;
        assert!((grid[0] - (1.0 - step)).abs() < 1e-12);
        assert!((grid[1] - 1.0).abs() < 1e-12);
        assert!((grid[4] - 2.0).abs() < 1e-12);
        assert!((grid[5] - (2.0 + step)).abs() < 1e-12);
    }

    #[test]
    fn test_action_grid_rejects_bad_input() {
        assert!(build_action_grid(1.0, 2.0, 2).is_err());
        assert!(matches!(
            build_action_grid(2.0, 2.0, 5),
            Err(Error::DegenerateGrid { .. })
        ));
    }

    #[test]
    fn test_profit_tensor_size_and_reproducibility() {
        let first = Environment::new(duopoly(5)).unwrap();
        let second = Environment::new(duopoly(5)).unwrap();
        assert_eq!(first.profits().len(), 25);
        assert_eq!(first.profits().get(24).len(), 2);
        for joint in 0..25 {
            let a = first.profits().get(joint);
            let b = second.profits().get(joint);
            assert!(a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits()));
        }
    }

    #[test]
    fn test_profit_tensor_matches_market() {
        let env = Environment::new(Config {
            n: 3,
            k: 4,
            ..Config::default()
        })
        .unwrap();
        assert_eq!(env.profits().len(), 64);
        let joint = [3, 0, 2];
        let expected = env.market().profit(&env.prices(&joint));
        assert_eq!(env.profits().get(env.space().encode(&joint)), expected.as_slice());
    }

    #[test]
    fn test_rejects_oversized_state_space() {
        let config = Config {
            n: 7,
            k: 15,
            ..Config::default()
        };
        assert!(matches!(
            Environment::new(config),
            Err(Error::StateSpaceTooLarge {
                agents: 7,
                actions: 15
            })
        ));
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(matches!(
            Environment::new(duopoly(2)),
            Err(Error::InvalidConfig { field: "k", .. })
        ));
    }
}
