//! Replayer binary
//!
//! Rebuilds the post-state root of a state transition from a witness of
//! branch proofs, without the full state.

mod config;
mod witness;

use std::env;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use xlayer_smt::{Keccak256Hasher, Sha256Hasher};

use crate::{
    config::{Config, HasherKind},
    witness::{replay, Witness},
};

fn main() -> Result<()> {
    // Setup logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load config from environment, the first argument overrides the witness path
    let mut config = Config::from_env();
    if let Some(path) = env::args().nth(1) {
        config.witness_path = path.into();
    }

    info!("Configuration:");
    info!("  Witness:  {}", config.witness_path.display());
    info!("  Hasher:   {:?}", config.hasher);

    let witness = Witness::load(&config.witness_path)?;
    let root = match config.hasher {
        HasherKind::Keccak256 => replay(&witness, Keccak256Hasher)?,
        HasherKind::Sha256 => replay(&witness, Sha256Hasher)?,
    };

    println!("{}", hex::encode(root));
    Ok(())
}
