use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(version)]
pub struct CliOpts {
	/// Path to the toml configuration file
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<String>,
	/// Log level
	#[arg(long)]
	pub verbosity: Option<Level>,
	/// Set logs format to JSON
	#[arg(long)]
	pub logs_json: bool,
	/// Snapshot file to use instead of the configured ones (JSON or generated lookup.ts)
	#[arg(short, long, value_name = "FILE", global = true)]
	pub snapshot: Option<PathBuf>,
	/// Runtime whose configured snapshots are used
	#[arg(short, long, global = true)]
	pub runtime: Option<String>,
	/// Spec version used to pick among the runtime's snapshots
	#[arg(long, global = true)]
	pub spec_version: Option<u32>,
	/// Number of threads used for batch decoding
	#[arg(long)]
	pub decode_threads: Option<usize>,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
	/// Decode hex encoded values of the given type and print them as JSON
	Decode {
		/// Type expression, e.g. `FrameSystemAccountInfo` or `Vec<Compact<u128>>`
		ty: String,
		/// Hex encoded input, with or without `0x` prefix
		#[arg(required = true)]
		input: Vec<String>,
		/// Accept input with bytes left after the value
		#[arg(long)]
		allow_trailing: bool,
	},
	/// Encode a JSON value of the given type and print it as hex
	Encode {
		/// Type expression
		ty: String,
		/// Value in JSON, e.g. `{"nonce": 1, "data": {...}}`
		value: String,
	},
	/// Print what a type name reduces to after following aliases
	Resolve { ty: String },
	/// Check that every type in the snapshot resolves
	Check,
	/// Convert a generated lookup.ts table into a JSON snapshot
	Convert {
		#[arg(value_name = "FILE")]
		input: PathBuf,
		/// Output file (default: stdout)
		#[arg(short, long, value_name = "FILE")]
		out: Option<PathBuf>,
	},
}
