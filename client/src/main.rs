#![doc = include_str!("../README.md")]

use crate::{
	cli::{CliOpts, Command},
	config::RuntimeConfig,
};
use clap::Parser;
use color_eyre::{
	eyre::{eyre, WrapErr},
	Result,
};
use scale_lookup_core::{
	codec,
	registry::{Registry, Resolution, Snapshot},
	types::RuntimeName,
	utils::{default_subscriber, install_panic_hooks, json_subscriber, parse_hex},
	Bundle, Error, Value,
};
use std::{fs, path::Path, sync::Arc};
use tracing::{debug, error, info, warn};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod cli;
mod config;

pub fn load_runtime_config(opts: &CliOpts) -> Result<RuntimeConfig> {
	let mut cfg = if let Some(config_path) = &opts.config {
		fs::metadata(config_path).map_err(|_| eyre!("Provided config file doesn't exist."))?;
		confy::load_path(config_path)
			.wrap_err(format!("Failed to load configuration from {}", config_path))?
	} else {
		RuntimeConfig::default()
	};

	cfg.log_format_json = opts.logs_json || cfg.log_format_json;
	cfg.log_level = opts.verbosity.unwrap_or(cfg.log_level);

	if let Some(decode_threads) = opts.decode_threads {
		cfg.decode_threads = decode_threads;
	}
	if cfg.decode_threads == 0 {
		return Err(eyre!("Decode threads must be greater than zero"));
	}

	Ok(cfg)
}

fn runtime_name(opts: &CliOpts) -> Result<Option<RuntimeName>> {
	opts.runtime
		.as_deref()
		.map(RuntimeName::try_from)
		.transpose()
		.map_err(|reason| eyre!(reason.trim()))
}

/// Picks the snapshot named on the command line. Nothing is picked implicitly.
fn load_registry(opts: &CliOpts, cfg: &RuntimeConfig) -> Result<Arc<Registry>> {
	if let Some(path) = &opts.snapshot {
		let registry = Registry::from_path(path)
			.wrap_err(format!("Failed to load snapshot {}", path.display()))?;
		return Ok(Arc::new(registry));
	}

	let Some(runtime) = runtime_name(opts)? else {
		return Err(eyre!(
			"No snapshot selected, pass --snapshot FILE or --runtime NAME"
		));
	};

	let bundle = Bundle::from_configs(&cfg.snapshots).wrap_err("Failed to load configured snapshots")?;
	let registry = bundle.select(&runtime.0, opts.spec_version).wrap_err(format!(
		"Configured ranges for {runtime}: [{}]",
		bundle
			.ranges(&runtime.0)
			.map(|range| range.to_string())
			.collect::<Vec<_>>()
			.join(", ")
	))?;
	Ok(registry)
}

/// Decodes every input as `ty`, in parallel. Results keep the order of `inputs`.
fn decode(
	registry: Arc<Registry>,
	ty: &str,
	inputs: &[String],
	allow_trailing: bool,
	threads: usize,
) -> Result<Vec<Result<Value, Error>>> {
	let buffers = inputs
		.iter()
		.map(|input| parse_hex(input).wrap_err(format!("Invalid hex input {input:?}")))
		.collect::<Result<Vec<_>>>()?;
	let lengths = buffers.iter().map(Vec::len).collect::<Vec<_>>();

	let results = codec::decode_batch(registry, ty, buffers, threads)?;

	Ok(results
		.into_iter()
		.zip(lengths)
		.map(|(result, len)| {
			let (value, consumed) = result?;
			if !allow_trailing && consumed < len {
				return Err(Error::TrailingBytes {
					remaining: len - consumed,
				});
			}
			Ok(value)
		})
		.collect())
}

fn encode(registry: &Registry, ty: &str, value: &str) -> Result<String> {
	let value: Value = serde_json::from_str(value).wrap_err("Value is not valid JSON")?;
	let bytes = codec::encode(registry, ty, &value)?;
	Ok(format!("0x{}", hex::encode(bytes)))
}

fn resolve(registry: &Registry, ty: &str) -> Result<String> {
	match registry.resolve(ty)? {
		Resolution::Expr(expr) => Ok(format!("{ty} => {expr}")),
		Resolution::Descriptor { name, descriptor } => {
			let origin = registry
				.doc(&name)
				.map(|doc| format!(" (Lookup{}: {})", doc.index, doc.path))
				.unwrap_or_default();
			let definition = serde_json::to_string_pretty(&descriptor.to_json())?;
			Ok(format!("{ty} => {name}{origin}\n{definition}"))
		},
	}
}

fn check(registry: &Registry) -> Result<()> {
	let failures = registry.validate();
	for (name, error) in &failures {
		println!("{name}: {error}");
	}
	if !failures.is_empty() {
		return Err(eyre!(
			"{} reference(s) out of {} types do not resolve",
			failures.len(),
			registry.len()
		));
	}
	info!(types = registry.len(), "All types resolve");
	Ok(())
}

fn convert(input: &Path, runtime: Option<RuntimeName>) -> Result<String> {
	let mut snapshot =
		Snapshot::from_path(input).wrap_err(format!("Failed to read {}", input.display()))?;
	if let Some(runtime) = runtime {
		snapshot.runtime = Some(runtime.0);
	}
	Ok(serde_json::to_string_pretty(&snapshot.to_json())?)
}

fn run(opts: &CliOpts, cfg: &RuntimeConfig) -> Result<()> {
	match &opts.command {
		Command::Decode {
			ty,
			input,
			allow_trailing,
		} => {
			let registry = load_registry(opts, cfg)?;
			let results = decode(registry, ty, input, *allow_trailing, cfg.decode_threads)?;

			let mut failed = 0;
			for (index, result) in results.iter().enumerate() {
				match result {
					Ok(value) => println!("{}", serde_json::to_string(value)?),
					Err(error) => {
						failed += 1;
						error!(index, kind = %error.kind(), "Cannot decode input: {error}");
						println!("null");
					},
				}
			}
			if failed > 0 {
				return Err(eyre!("{failed} of {} input(s) failed to decode", results.len()));
			}
		},
		Command::Encode { ty, value } => {
			let registry = load_registry(opts, cfg)?;
			println!("{}", encode(&registry, ty, value)?);
		},
		Command::Resolve { ty } => {
			let registry = load_registry(opts, cfg)?;
			println!("{}", resolve(&registry, ty)?);
		},
		Command::Check => {
			let registry = load_registry(opts, cfg)?;
			check(&registry)?;
		},
		Command::Convert { input, out } => {
			let json = convert(input, runtime_name(opts)?)?;
			match out {
				Some(out) => {
					fs::write(out, json).wrap_err(format!("Failed to write {}", out.display()))?;
					info!(path = %out.display(), "Snapshot written");
				},
				None => println!("{json}"),
			}
		},
	}
	Ok(())
}

pub fn main() -> Result<()> {
	let opts = CliOpts::parse();
	let cfg = load_runtime_config(&opts)?;

	if cfg.log_format_json {
		tracing::subscriber::set_global_default(json_subscriber(cfg.log_level))?;
	} else {
		tracing::subscriber::set_global_default(default_subscriber(cfg.log_level))?;
	};

	// install custom panic hooks
	install_panic_hooks()?;

	let version = clap::crate_version!();
	debug!("Running scale-lookup version: {version}.");
	debug!("Using config: {cfg:?}");
	if opts.snapshot.is_some() && opts.runtime.is_some() {
		warn!("Both --snapshot and --runtime given, using the snapshot file");
	}

	run(&opts, &cfg)
}
