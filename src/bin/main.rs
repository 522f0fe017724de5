//! Usage: `collude [config.toml] [output.json | -] [runs]`
//!
//! With more than one run only the phase tally and mean profit gain are
//! logged; the output file applies to single runs.

use collusion::{Config, Environment, Error, RunParams, phase_counts, simulate, simulate_batch};
use log::info;

const DEFAULT_CONFIG: &str = "oligopoly.toml";

fn main() -> Result<(), Error> {
    env_logger::init();
    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    // "-" skips the JSON output, so a run count can still be given.
    let output_path = args.next().filter(|path| path != "-");
    let runs = match args.next() {
        Some(runs) => runs
            .parse::<u64>()
            .map_err(|e| Error::InvalidConfig {
                field: "runs",
                message: format!("{runs:?} is not a run count: {e}"),
            })?,
        None => 1,
    };

    let config = Config::from_file(&config_path)?;
    info!("Loaded {config_path}: {config:?}");
    let env = Environment::new(config)?;

    if runs > 1 {
        let seeds: Vec<u64> = (0..runs).collect();
        let results = simulate_batch(&env, &RunParams::default(), &seeds)?;
        for (phase, count) in phase_counts(&results) {
            info!("{count} of {runs} runs ended as {phase}");
        }
        let gains: Vec<f64> = results
            .iter()
            .map(|result| result.limit_path(&env).mean_profit_gain())
            .collect();
        info!(
            "Mean profit gain over seeds 0..{runs}: {:.3}",
            gains.iter().sum::<f64>() / gains.len() as f64
        );
        return Ok(());
    }

    let result = simulate(&env, &RunParams::default())?;
    info!(
        "Seed {} ended as {} after {} periods",
        result.seed, result.phase, result.periods
    );

    let path = result.limit_path(&env);
    info!(
        "Limit cycle of length {} after {} periods: prices {:.3?}",
        path.cycle.len(),
        path.transient,
        path.prices
    );
    info!(
        "Mean profits {:.4?}, profit gain {:.3?} (mean {:.3})",
        path.mean_profits,
        path.profit_gain,
        path.mean_profit_gain()
    );
    info!(
        "Q values of agent 0 in the initial state: {:.3?}",
        result.value_tables.row(0, 0)
    );

    // Write result to disk
    if let Some(output_path) = output_path {
        result.write_json(&output_path)?;
        info!("Wrote {output_path}");
    }
    Ok(())
}
