//! Independent Q-learning firms pricing in a repeated logit oligopoly.
//!
//! Build an [`Environment`] from a [`Config`], then [`simulate`] one run or
//! [`simulate_batch`] many seeds against it.

pub use crate::{
    config::Config,
    environment::Environment,
    error::{Error, Result},
    report::{LimitPath, SimulationResult, phase_counts},
    simulation::{Phase, RunParams, Simulation, simulate, simulate_batch},
};

pub mod config;
pub mod environment;
pub mod error;
pub mod learning;
pub mod market;
pub mod report;
pub mod simulation;
pub mod solver;

pub type Period = u64;
pub type Price = f64;
