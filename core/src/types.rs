use crate::bundle::SpecRange;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of a runtime the snapshots were generated for, e.g. `moonbase`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, derive_more::Display, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct RuntimeName(pub String);

impl TryFrom<String> for RuntimeName {
	type Error = &'static str;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		let name = value.trim().to_lowercase();
		if !name.is_empty()
			&& name
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
		{
			Ok(RuntimeName(name))
		} else {
			Err(INVALID_RUNTIME_NAME)
		}
	}
}

impl TryFrom<&str> for RuntimeName {
	type Error = &'static str;

	fn try_from(value: &str) -> Result<Self, Self::Error> {
		RuntimeName::try_from(value.to_string())
	}
}

const INVALID_RUNTIME_NAME: &str = r#"
Runtime name must only contain alphanumeric characters, dashes and underscores.
"#;

/// One snapshot file and the spec versions it applies to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
	/// Runtime the snapshot belongs to.
	pub runtime: RuntimeName,
	/// Snapshot file, either JSON or a generated `lookup.ts`.
	pub path: PathBuf,
	/// First spec version the snapshot applies to (default: 0).
	#[serde(default)]
	pub min_spec_version: u32,
	/// Last spec version the snapshot applies to, unbounded when missing.
	#[serde(default)]
	pub max_spec_version: Option<u32>,
}

impl SnapshotConfig {
	pub fn range(&self) -> SpecRange {
		SpecRange::new(self.min_spec_version, self.max_spec_version)
	}
}

pub mod tracing_level_format {
	use serde::{self, Deserialize, Deserializer, Serializer};
	use std::str::FromStr;
	use tracing::Level;

	pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&level.to_string())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = String::deserialize(deserializer)?;
		Level::from_str(&value).map_err(serde::de::Error::custom)
	}
}
