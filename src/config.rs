use std::fmt;
use std::path::Path;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::Period;
use crate::error::{Error, Result};

/// Parameters of the oligopoly game and of the learning run.
///
/// Field names follow the economics literature this model replicates.
/// Missing keys in a TOML document take the default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of firms.
    pub n: usize,
    /// Learning rate of the Q update.
    pub alpha: f64,
    /// Decay rate of the exploration probability.
    pub beta: f64,
    /// Discount factor.
    pub delta: f64,
    /// Marginal cost.
    pub c: f64,
    /// Product quality, shared by every firm.
    pub a: f64,
    /// Value of the outside option.
    pub a0: f64,
    /// Horizontal differentiation.
    pub mu: f64,
    /// Number of prices on the action grid.
    pub k: usize,
    /// Periods of unchanged greedy policy required to declare convergence.
    /// Accepts whole-number floats such as `1e5`.
    #[serde(deserialize_with = "whole_periods")]
    pub tstable: Period,
    /// Hard limit on the number of periods. Accepts whole-number floats
    /// such as `1e7`.
    #[serde(deserialize_with = "whole_periods")]
    pub tmax: Period,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            n: 3,
            alpha: 0.15,
            beta: 4e-6,
            delta: 0.95,
            c: 1.0,
            a: 2.0,
            a0: 0.0,
            mu: 0.25,
            k: 15,
            tstable: 100_000,
            tmax: 10_000_000,
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("read config {}", path.display()), e))?;
        Self::from_toml_str(&s)
    }

    /// Reject out-of-range parameters. Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        if self.n < 2 {
            return Err(Error::config("n", format!("must be at least 2, got {}", self.n)));
        }
        if self.k < 3 {
            return Err(Error::config("k", format!("must be at least 3, got {}", self.k)));
        }
        if !(0.0..1.0).contains(&self.delta) {
            return Err(Error::config(
                "delta",
                format!("must lie in [0, 1), got {}", self.delta),
            ));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::config(
                "alpha",
                format!("must lie in [0, 1], got {}", self.alpha),
            ));
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(Error::config(
                "beta",
                format!("must be finite and non-negative, got {}", self.beta),
            ));
        }
        if !self.mu.is_finite() || self.mu <= 0.0 {
            return Err(Error::config(
                "mu",
                format!("must be finite and positive, got {}", self.mu),
            ));
        }
        for (field, value) in [("a", self.a), ("a0", self.a0), ("c", self.c)] {
            if !value.is_finite() {
                return Err(Error::config(field, format!("must be finite, got {value}")));
            }
        }
        if self.tstable == 0 {
            return Err(Error::config("tstable", "must be positive"));
        }
        if self.tmax == 0 {
            return Err(Error::config("tmax", "must be positive"));
        }
        Ok(())
    }
}

/// A period count written either as an integer or as a float with no
/// fractional part.
fn whole_periods<'de, D>(deserializer: D) -> std::result::Result<Period, D::Error>
where
    D: Deserializer<'de>,
{
    struct PeriodVisitor;

    impl Visitor<'_> for PeriodVisitor {
        type Value = Period;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative whole number of periods")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Period, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Period, E> {
            Period::try_from(value)
                .map_err(|_| E::custom(format!("negative period count {value}")))
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Period, E> {
            let whole = value.is_finite() && value >= 0.0 && value.fract() == 0.0;
            if whole && value < Period::MAX as f64 {
                Ok(value as Period)
            } else {
                Err(E::custom(format!("{value} is not a whole number of periods")))
            }
        }
    }

    deserializer.deserialize_any(PeriodVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization_toml() {
        let config = Config {
            n: 2,
            k: 5,
            ..Config::default()
        };
        let serialized = toml::to_string(&config).unwrap();
        assert!(serialized.starts_with("n = 2\n"));

        let deserialized = Config::from_toml_str(&serialized).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let config = Config::from_toml_str("n = 2\nbeta = 1e-5\n").unwrap();
        assert_eq!(config.n, 2);
        assert_eq!(config.beta, 1e-5);
        assert_eq!(config.k, 15);
        assert_eq!(config.tmax, 10_000_000);
    }

    #[test]
    fn test_read_from_file() {
        let config = Config::from_file("./oligopoly.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_rejects_small_grid_and_market() {
        for toml in ["k = 2", "n = 1", "n = 0"] {
            assert!(matches!(
                Config::from_toml_str(toml),
                Err(Error::InvalidConfig { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_degenerate_discount() {
        for delta in [1.0, 1.5, -0.1, f64::NAN] {
            let config = Config {
                delta,
                ..Config::default()
            };
            assert!(matches!(
                config.validate(),
                Err(Error::InvalidConfig { field: "delta", .. })
            ));
        }
    }

    #[test]
    fn test_periods_accept_whole_floats() {
        let config = Config::from_toml_str("tstable = 1e5\ntmax = 1e7\n").unwrap();
        assert_eq!(config.tstable, 100_000);
        assert_eq!(config.tmax, 10_000_000);
        let config = Config::from_toml_str("tmax = 2_000_000.0").unwrap();
        assert_eq!(config.tmax, 2_000_000);
    }

    #[test]
    fn test_periods_reject_fractions() {
        let invalid = [
            "tmax = 2.5",
            "tstable = 1e-3",
            "tmax = -1e3",
            "tstable = -5",
            "tmax = nan",
        ];
        for toml in invalid {
            assert!(
                matches!(Config::from_toml_str(toml), Err(Error::Toml(_))),
                "{toml} should not parse"
            );
        }
    }

    #[test]
    fn test_rejects_negative_counts() {
        assert!(matches!(
            Config::from_toml_str("k = -4"),
            Err(Error::Toml(_))
        ));
        assert!(matches!(
            Config::from_toml_str("n = -2"),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn test_rejects_nonpositive_differentiation() {
        let config = Config {
            mu: 0.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
