//! Snapshots of several runtimes, each valid for a range of spec versions.
//!
//! Which snapshot applies to a given block is never guessed: callers name the runtime and the
//! spec version the bytes were produced under, and selection fails when nothing covers them.

use crate::{error::Error, registry::Registry, types::SnapshotConfig};
use indexmap::IndexMap;
use std::{fmt, path::Path, sync::Arc};
use tracing::{debug, info};

/// Inclusive range of runtime spec versions; `max` of `None` leaves the range open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SpecRange {
	pub min: u32,
	pub max: Option<u32>,
}

impl SpecRange {
	pub fn new(min: u32, max: Option<u32>) -> Self {
		SpecRange { min, max }
	}

	/// Every version from `min` onwards.
	pub fn from_version(min: u32) -> Self {
		SpecRange { min, max: None }
	}

	pub fn contains(&self, spec_version: u32) -> bool {
		spec_version >= self.min && self.max.map_or(true, |max| spec_version <= max)
	}
}

impl fmt::Display for SpecRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.max {
			Some(max) => write!(f, "[{}, {max}]", self.min),
			None => write!(f, "[{}, ..)", self.min),
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct Bundle {
	runtimes: IndexMap<String, Vec<(SpecRange, Arc<Registry>)>>,
}

impl Bundle {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_snapshot(mut self, runtime: impl Into<String>, range: SpecRange, registry: Registry) -> Self {
		self.insert(runtime, range, registry);
		self
	}

	/// Adds a snapshot. On overlapping ranges the snapshot inserted last wins.
	pub fn insert(&mut self, runtime: impl Into<String>, range: SpecRange, registry: Registry) {
		let runtime = runtime.into();
		debug!(%runtime, %range, types = registry.len(), "Adding snapshot to bundle");
		self.runtimes
			.entry(runtime)
			.or_default()
			.push((range, Arc::new(registry)));
	}

	/// Reads a snapshot file and adds it for `runtime`.
	pub fn load(mut self, runtime: &str, range: SpecRange, path: impl AsRef<Path>) -> Result<Self, Error> {
		let path = path.as_ref();
		let registry = Registry::from_path(path)?;
		info!(runtime, %range, path = %path.display(), "Loaded snapshot");
		self.insert(runtime, range, registry);
		Ok(self)
	}

	/// Loads every configured snapshot, in configuration order.
	pub fn from_configs(configs: &[SnapshotConfig]) -> Result<Self, Error> {
		configs.iter().try_fold(Bundle::new(), |bundle, config| {
			bundle.load(&config.runtime.0, config.range(), &config.path)
		})
	}

	pub fn runtimes(&self) -> impl Iterator<Item = &str> {
		self.runtimes.keys().map(String::as_str)
	}

	/// Spec version ranges registered for `runtime`, in insertion order.
	pub fn ranges<'a>(&'a self, runtime: &str) -> impl Iterator<Item = SpecRange> + 'a {
		self.runtimes
			.get(runtime)
			.into_iter()
			.flatten()
			.map(|(range, _)| *range)
	}

	/// Picks the snapshot for `runtime` at `spec_version`.
	///
	/// Without a spec version, selection only succeeds when the runtime has a single snapshot.
	pub fn select(&self, runtime: &str, spec_version: Option<u32>) -> Result<Arc<Registry>, Error> {
		let no_snapshot = || Error::NoSnapshot {
			runtime: runtime.to_string(),
			spec_version,
		};
		let snapshots = self.runtimes.get(runtime).ok_or_else(no_snapshot)?;

		let (range, registry) = match spec_version {
			Some(spec_version) => snapshots
				.iter()
				.rev()
				.find(|(range, _)| range.contains(spec_version))
				.ok_or_else(no_snapshot)?,
			None => match snapshots.as_slice() {
				[single] => single,
				_ => return Err(no_snapshot()),
			},
		};
		debug!(runtime, ?spec_version, %range, "Selected snapshot");
		Ok(registry.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{error::ErrorKind, registry::Snapshot};
	use test_case::test_case;

	fn registry(tag: &str) -> Registry {
		let mut types = serde_json::Map::new();
		types.insert(tag.to_string(), "u8".into());
		Registry::register(Snapshot::from_json(&types.into()).unwrap())
	}

	fn moonbase() -> Bundle {
		Bundle::new()
			.with_snapshot("moonbase", SpecRange::new(0, Some(4)), registry("V0"))
			.with_snapshot("moonbase", SpecRange::new(6, Some(19)), registry("V6"))
			.with_snapshot("moonbase", SpecRange::new(19, Some(35)), registry("V19"))
			.with_snapshot("moonbase", SpecRange::from_version(37), registry("V37"))
			.with_snapshot("moonriver", SpecRange::from_version(0), registry("R0"))
	}

	#[test_case(0 => Some("V0"))]
	#[test_case(4 => Some("V0"))]
	#[test_case(5 => None; "gap between ranges")]
	#[test_case(18 => Some("V6"))]
	#[test_case(19 => Some("V19"); "shared edge goes to the later snapshot")]
	#[test_case(36 => None)]
	#[test_case(2400 => Some("V37"); "open range")]
	fn selects_by_spec_version(spec_version: u32) -> Option<&'static str> {
		let selected = moonbase().select("moonbase", Some(spec_version));
		match selected {
			Ok(registry) => ["V0", "V6", "V19", "V37"]
				.into_iter()
				.find(|tag| registry.get(tag).is_some()),
			Err(error) => {
				assert_eq!(error.kind(), ErrorKind::NoSnapshot);
				None
			},
		}
	}

	#[test]
	fn never_falls_back_to_a_default() {
		let bundle = moonbase();
		assert_eq!(
			bundle.select("moonbeam", Some(1)).unwrap_err().kind(),
			ErrorKind::NoSnapshot
		);
		assert_eq!(
			bundle.select("moonbase", None).unwrap_err().kind(),
			ErrorKind::NoSnapshot
		);
		assert!(bundle.select("moonriver", None).unwrap().get("R0").is_some());
	}

	#[test]
	fn loads_configured_snapshot_files() {
		let assets = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/test_assets");
		let configs: Vec<SnapshotConfig> = serde_json::from_value(serde_json::json!([
			{ "runtime": "moonbase", "path": assets.join("moonbase.json"), "max_spec_version": 99 },
			{ "runtime": "moonbeam", "path": assets.join("lookup_excerpt.ts"), "min_spec_version": 100 },
		]))
		.unwrap();

		let bundle = Bundle::from_configs(&configs).unwrap();
		assert_eq!(bundle.runtimes().collect::<Vec<_>>(), vec!["moonbase", "moonbeam"]);
		let moonbeam = bundle.select("moonbeam", Some(2400)).unwrap();
		assert!(moonbeam.get("FrameSystemAccountInfo").is_some());
		assert!(bundle.select("moonbase", Some(100)).is_err());

		let missing = [SnapshotConfig {
			path: assets.join("missing.json"),
			..configs[0].clone()
		}];
		assert_eq!(
			Bundle::from_configs(&missing).unwrap_err().kind(),
			ErrorKind::Snapshot
		);
	}

	#[test]
	fn lists_runtimes_and_ranges() {
		let bundle = moonbase();
		assert_eq!(bundle.runtimes().collect::<Vec<_>>(), vec!["moonbase", "moonriver"]);
		assert_eq!(
			bundle.ranges("moonbase").map(|range| range.to_string()).collect::<Vec<_>>(),
			vec!["[0, 4]", "[6, 19]", "[19, 35]", "[37, ..)"]
		);
		assert_eq!(bundle.ranges("unknown").count(), 0);
	}
}
