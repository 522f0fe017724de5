use serde::{Deserialize, Serialize};

use crate::{Config, Price};

/// Multinomial-logit demand with a common marginal cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    /// Product quality of each firm.
    pub quality: Vec<f64>,
    /// Value of the outside option.
    pub outside: f64,
    /// Horizontal differentiation.
    pub mu: f64,
    /// Marginal cost.
    pub cost: f64,
}

impl Market {
    pub fn new(quality: Vec<f64>, outside: f64, mu: f64, cost: f64) -> Self {
        Market {
            quality,
            outside,
            mu,
            cost,
        }
    }

    /// Symmetric market: every firm sells a product of quality `a`.
    pub fn from_config(config: &Config) -> Self {
        Market::new(vec![config.a; config.n], config.a0, config.mu, config.c)
    }

    pub fn n_firms(&self) -> usize {
        self.quality.len()
    }

    /// Market share of each firm. The remaining mass goes to the outside option.
    pub fn demand(&self, prices: &[Price]) -> Vec<f64> {
        let utility: Vec<f64> = prices
            .iter()
            .zip(&self.quality)
            .map(|(p, a)| ((a - p) / self.mu).exp())
            .collect();
        let denominator = utility.iter().sum::<f64>() + (self.outside / self.mu).exp();
        utility.into_iter().map(|u| u / denominator).collect()
    }

    /// Per-firm profit `(p_i - c) * d_i`.
    pub fn profit(&self, prices: &[Price]) -> Vec<f64> {
        self.demand(prices)
            .into_iter()
            .zip(prices)
            .map(|(d, p)| (p - self.cost) * d)
            .collect()
    }

    /// First-order conditions of the Bertrand-Nash equilibrium, one per firm.
    /// Each firm optimises its own profit taking rivals' prices as given.
    pub fn competitive_foc(&self, prices: &[Price]) -> Vec<f64> {
        self.demand(prices)
            .into_iter()
            .zip(prices)
            .map(|(d, p)| 1.0 - (p - self.cost) * (1.0 - d) / self.mu)
            .collect()
    }

    /// First-order conditions of a monopolist owning every product.
    ///
    /// Raising `p_i` diverts demand to the rival products, which the
    /// monopolist internalises through the cross terms.
    pub fn monopoly_foc(&self, prices: &[Price]) -> Vec<f64> {
        let demand = self.demand(prices);
        let margins: Vec<f64> = prices
            .iter()
            .zip(&demand)
            .map(|(p, d)| (p - self.cost) * d)
            .collect();
        let total: f64 = margins.iter().sum();
        prices
            .iter()
            .zip(&demand)
            .zip(&margins)
            .map(|((p, d), own)| {
                let rivals = total - own;
                1.0 - (p - self.cost) * (1.0 - d) / self.mu + rivals / self.mu
            })
            .collect()
    }
}
