use scale_lookup_core::types::{tracing_level_format, SnapshotConfig};
use serde::{Deserialize, Serialize};
use tracing::Level;

/// Representation of a configuration used by this project.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
	/// Log level, default is `INFO`. See `<https://docs.rs/log/0.4.14/log/enum.LevelFilter.html>` for possible log level values. (default: `INFO`).
	#[serde(with = "tracing_level_format")]
	pub log_level: Level,
	/// If set to true, logs are displayed in JSON format, which is used for structured logging. Otherwise, plain text format is used (default: false).
	pub log_format_json: bool,
	/// Number of threads decoding inputs in parallel (default: 4).
	pub decode_threads: usize,
	/// Snapshot files, each bound to a runtime and a range of spec versions (default: none).
	/// When ranges of one runtime overlap, the snapshot listed last wins.
	pub snapshots: Vec<SnapshotConfig>,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		RuntimeConfig {
			log_level: Level::INFO,
			log_format_json: false,
			decode_threads: 4,
			snapshots: vec![],
		}
	}
}
