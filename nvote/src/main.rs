use std::env;

use tracing::info;
use tracing_subscriber::{EnvFilter, prelude::*};

use common::error::Error;
use nvote::{Election, ElectionConfig, rotating_choices};

fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match env::args().nth(1) {
        Some(path) => ElectionConfig::load(path)?,
        None => ElectionConfig::default(),
    };
    info!(
        committee = config.committee_size,
        threshold = config.threshold,
        voters = config.voters(),
        "starting election"
    );

    let votes = rotating_choices(config.voters());
    let mut election = Election::in_memory(config)?;
    let mut rng = rand::rng();

    println!("Waiting for tally ...");
    let totals = election.run(&mut rng, &votes)?;

    println!("vote totals:");
    println!("{totals}");
    Ok(())
}
