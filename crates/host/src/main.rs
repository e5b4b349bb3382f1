//! Tile host binary.
//!
//! Loads the host configuration, seeds the in-memory settings store, starts a
//! [`TileHost`], and prints the reconciled tiles one per line as
//! `spec<TAB>label`. With `--switch-to` the host then switches principal and
//! prints the new set after a blank line.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tilehost_registry::{HostConfig, HostParts, PrincipalId, SettingsStore, TileHost, load_config};
use tracing::{info, warn};

/// Tile host command line arguments.
#[derive(Parser, Debug)]
#[command(name = "tilehost")]
#[command(about = "Resolve and reconcile quick-settings tiles for a principal")]
struct Args {
	/// Host configuration file (TOML)
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Principal whose tiles are loaded first
	#[arg(short, long, value_name = "N", default_value_t = 0)]
	principal: u32,

	/// Spec list stored for the initial principal, e.g. "wifi,default,intent(com.example.PING)"
	#[arg(short, long, value_name = "LIST")]
	tiles: Option<String>,

	/// Principal to switch to after the initial reconciliation
	#[arg(short, long, value_name = "N")]
	switch_to: Option<u32>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	let config = match &args.config {
		Some(path) => {
			info!(path = %path.display(), "loading host config");
			load_config(path)?
		}
		None => HostConfig::default(),
	};

	let principal = PrincipalId(args.principal);
	let store = Arc::new(SettingsStore::new());
	if let Some(tiles) = args.tiles {
		store.put(principal, tiles);
	}

	let host = TileHost::start(HostParts::new(config, principal, store));
	host.flush().await?;
	print_tiles(&host);

	if let Some(next) = args.switch_to {
		host.switch_principal(PrincipalId(next)).await?;
		host.flush().await?;
		println!();
		print_tiles(&host);
	}

	let report = host.shutdown().await;
	if let Some(exit) = report.exit()
		&& exit.is_failure()
	{
		warn!(exit = ?exit, "worker exited abnormally");
	}

	Ok(())
}

fn print_tiles(host: &TileHost) {
	let snapshot = host.snapshot();
	info!(principal = %host.principal(), generation = snapshot.generation(), tiles = snapshot.len(), "resolved tiles");
	for (spec, tile) in snapshot.iter() {
		println!("{spec}\t{}", tile.label());
	}
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_env("TILEHOST_LOG")
		.or_else(|_| EnvFilter::try_from_default_env())
		.unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("tilehost=debug,tilehost_registry=debug,tilehost_worker=debug,info")
			} else {
				EnvFilter::new("warn")
			}
		});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(true)
		.init();
}
