//! Registry snapshots and name resolution.
//!
//! A [`Snapshot`] is the parsed form of one generated lookup table. [`Registry::register`] turns
//! it into the immutable, shareable namespace the codec resolves type names against. Names are
//! resolved lazily, so definitions may reference each other in any order and recursive types
//! (calls embedding calls) need no special handling.

use crate::error::{Error, SnapshotError};
use indexmap::IndexMap;
use serde_json::{Map, Value as Json};
use std::{fs, path::Path};
use tracing::{debug, info};

pub mod builtins;
mod descriptor;
pub mod expr;
pub mod lookup_ts;

pub use builtins::Primitive;
pub use descriptor::{
	BitFlagsDef, EnumDef, Field, LookupDoc, StructDef, TypeDescriptor, Variant, VariantPayload,
};
pub use expr::TypeExpr;

/// Upper bound for alias chains and value nesting.
pub const MAX_DEPTH: usize = 128;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
	pub descriptor: TypeDescriptor,
	pub doc: Option<LookupDoc>,
}

/// One generated lookup table, parsed but not yet registered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
	/// Runtime the table was generated for, e.g. `moonbeam`.
	pub runtime: Option<String>,
	/// Definitions in table order.
	pub entries: IndexMap<String, Entry>,
}

impl Snapshot {
	/// Reads either a bare `{ name: definition }` object or the
	/// `{ "runtime", "types", "docs" }` envelope.
	pub fn from_json(json: &Json) -> Result<Self, Error> {
		let Json::Object(root) = json else {
			return Err(SnapshotError::NotAnObject.into());
		};

		let is_envelope = matches!(root.get("types"), Some(Json::Object(_)))
			&& root
				.keys()
				.all(|key| matches!(key.as_str(), "runtime" | "types" | "docs"));

		if !is_envelope {
			return Self::from_parts(None, root, None);
		}

		let runtime = root.get("runtime").and_then(Json::as_str).map(str::to_string);
		let types = root["types"].as_object().ok_or(SnapshotError::NotAnObject)?;
		let docs = root.get("docs").and_then(Json::as_object);
		Self::from_parts(runtime, types, docs)
	}

	fn from_parts(
		runtime: Option<String>,
		types: &Map<String, Json>,
		docs: Option<&Map<String, Json>>,
	) -> Result<Self, Error> {
		let entries = types
			.iter()
			.map(|(name, definition)| {
				let descriptor = TypeDescriptor::from_json(name, definition)?;
				let doc = docs.and_then(|docs| docs.get(name)).and_then(|doc| {
					Some(LookupDoc {
						index: u32::try_from(doc.get("lookup")?.as_u64()?).ok()?,
						path: doc.get("path")?.as_str()?.to_string(),
					})
				});
				Ok((name.clone(), Entry { descriptor, doc }))
			})
			.collect::<Result<IndexMap<_, _>, Error>>()?;

		Ok(Snapshot { runtime, entries })
	}

	pub fn from_json_str(source: &str) -> Result<Self, Error> {
		let json: Json = serde_json::from_str(source).map_err(SnapshotError::Json)?;
		Self::from_json(&json)
	}

	/// Reads the `export default { ... }` table emitted by the type generator.
	pub fn from_lookup_ts(source: &str) -> Result<Self, Error> {
		Self::from_json(&lookup_ts::parse(source)?)
	}

	/// Reads a snapshot file; `.ts` files are parsed as generated lookup tables, anything else
	/// as JSON.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
		let path = path.as_ref();
		let source = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
			path: path.display().to_string(),
			source,
		})?;

		let mut snapshot = match path.extension().and_then(|extension| extension.to_str()) {
			Some("ts") => Self::from_lookup_ts(&source)?,
			_ => Self::from_json_str(&source)?,
		};
		if snapshot.runtime.is_none() {
			snapshot.runtime = runtime_from_path(path);
		}
		Ok(snapshot)
	}

	/// Writes the envelope form.
	pub fn to_json(&self) -> Json {
		let types = self
			.entries
			.iter()
			.map(|(name, entry)| (name.clone(), entry.descriptor.to_json()))
			.collect::<Map<_, _>>();

		let docs = self
			.entries
			.iter()
			.filter_map(|(name, entry)| {
				let doc = entry.doc.as_ref()?;
				let mut object = Map::new();
				object.insert("lookup".into(), doc.index.into());
				object.insert("path".into(), doc.path.clone().into());
				Some((name.clone(), Json::Object(object)))
			})
			.collect::<Map<_, _>>();

		let mut root = Map::new();
		if let Some(runtime) = &self.runtime {
			root.insert("runtime".into(), runtime.clone().into());
		}
		root.insert("types".into(), Json::Object(types));
		if !docs.is_empty() {
			root.insert("docs".into(), Json::Object(docs));
		}
		Json::Object(root)
	}
}

/// Generated tables live under `<runtime>/interfaces/lookup.ts`.
fn runtime_from_path(path: &Path) -> Option<String> {
	let mut components = path.components().rev().skip(1);
	let parent = components.next()?.as_os_str().to_str()?;
	if parent != "interfaces" {
		return None;
	}
	components
		.next()
		.and_then(|runtime| runtime.as_os_str().to_str())
		.map(str::to_string)
}

/// A type expression reduced to the codec strategy that handles it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolved<'a> {
	Primitive(Primitive),
	/// Compact encoding of the given unsigned integer.
	Compact(Primitive),
	Struct(&'a str, &'a StructDef),
	Enum(&'a str, &'a EnumDef),
	BitFlags(&'a str, &'a BitFlagsDef),
	Vec(&'a TypeExpr),
	Option(&'a TypeExpr),
	Result(&'a TypeExpr, &'a TypeExpr),
	Map(&'a TypeExpr, &'a TypeExpr),
	Set(&'a TypeExpr),
	Array(&'a TypeExpr, usize),
	Tuple(&'a [TypeExpr]),
}

/// Owned outcome of resolving a name through its alias chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
	/// The name reduces to a builtin or container expression.
	Expr(TypeExpr),
	/// The name reduces to a registered struct, enum or bitflags definition.
	Descriptor {
		name: String,
		descriptor: TypeDescriptor,
	},
}

impl From<Resolved<'_>> for Resolution {
	fn from(resolved: Resolved<'_>) -> Self {
		let boxed = |expr: &TypeExpr| Box::new(expr.clone());
		let descriptor = |name: &str, descriptor: TypeDescriptor| Resolution::Descriptor {
			name: name.to_string(),
			descriptor,
		};
		Resolution::Expr(match resolved {
			Resolved::Primitive(primitive) => TypeExpr::named(primitive.to_string()),
			Resolved::Compact(primitive) => {
				TypeExpr::Compact(Box::new(TypeExpr::named(primitive.to_string())))
			},
			Resolved::Struct(name, def) => return descriptor(name, TypeDescriptor::Struct(def.clone())),
			Resolved::Enum(name, def) => return descriptor(name, TypeDescriptor::Enum(def.clone())),
			Resolved::BitFlags(name, def) => {
				return descriptor(name, TypeDescriptor::BitFlags(def.clone()))
			},
			Resolved::Vec(inner) => TypeExpr::Vec(boxed(inner)),
			Resolved::Option(inner) => TypeExpr::Option(boxed(inner)),
			Resolved::Result(ok, err) => TypeExpr::Result(boxed(ok), boxed(err)),
			Resolved::Map(key, value) => TypeExpr::BTreeMap(boxed(key), boxed(value)),
			Resolved::Set(inner) => TypeExpr::BTreeSet(boxed(inner)),
			Resolved::Array(inner, len) => TypeExpr::Array(boxed(inner), len),
			Resolved::Tuple(items) => TypeExpr::Tuple(items.to_vec()),
		})
	}
}

/// Immutable namespace of one snapshot. Share it behind an `Arc` for concurrent decoding.
#[derive(Debug)]
pub struct Registry {
	runtime: Option<String>,
	entries: IndexMap<String, Entry>,
}

impl Registry {
	/// Takes ownership of a whole snapshot; there is no incremental registration.
	pub fn register(snapshot: Snapshot) -> Self {
		let Snapshot { runtime, entries } = snapshot;
		info!(
			runtime = runtime.as_deref().unwrap_or("unnamed"),
			types = entries.len(),
			"Registered type snapshot"
		);
		Registry { runtime, entries }
	}

	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
		Snapshot::from_path(path).map(Self::register)
	}

	pub fn runtime(&self) -> Option<&str> {
		self.runtime.as_deref()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
		self.entries.get(name).map(|entry| &entry.descriptor)
	}

	pub fn doc(&self, name: &str) -> Option<&LookupDoc> {
		self.entries.get(name).and_then(|entry| entry.doc.as_ref())
	}

	/// Resolves a type name or container expression through its alias chain.
	pub fn resolve(&self, name: &str) -> Result<Resolution, Error> {
		let expr = TypeExpr::parse(name)?;
		let resolution = self.resolve_expr(&expr).map(Resolution::from)?;
		debug!(name, ?resolution, "Resolved type");
		Ok(resolution)
	}

	/// Reduces an expression to its codec strategy, following aliases and well-known names.
	pub fn resolve_expr<'a>(&'a self, expr: &'a TypeExpr) -> Result<Resolved<'a>, Error> {
		let mut expr = expr;
		for _ in 0..MAX_DEPTH {
			expr = match expr {
				TypeExpr::Named(name) => match self.entries.get_key_value(name.as_str()) {
					Some((name, entry)) => match &entry.descriptor {
						TypeDescriptor::Alias(target) => target,
						TypeDescriptor::Struct(def) => return Ok(Resolved::Struct(name, def)),
						TypeDescriptor::Enum(def) => return Ok(Resolved::Enum(name, def)),
						TypeDescriptor::BitFlags(def) => return Ok(Resolved::BitFlags(name, def)),
					},
					None => {
						if let Ok(primitive) = name.parse::<Primitive>() {
							return Ok(Resolved::Primitive(primitive));
						}
						builtins::well_known(name).ok_or_else(|| Error::UnknownType(name.clone()))?
					},
				},
				TypeExpr::Compact(inner) => return self.compact_target(inner).map(Resolved::Compact),
				TypeExpr::Vec(inner) => return Ok(Resolved::Vec(inner)),
				TypeExpr::Option(inner) => return Ok(Resolved::Option(inner)),
				TypeExpr::Result(ok, err) => return Ok(Resolved::Result(ok, err)),
				TypeExpr::BTreeMap(key, value) => return Ok(Resolved::Map(key, value)),
				TypeExpr::BTreeSet(inner) => return Ok(Resolved::Set(inner)),
				TypeExpr::Array(inner, len) => return Ok(Resolved::Array(inner, *len)),
				TypeExpr::Tuple(items) => return Ok(Resolved::Tuple(items)),
				TypeExpr::Generic(name, args) => match (name.as_str(), args.as_slice()) {
					("Box", [inner]) => inner,
					("HashMap", [key, value]) => return Ok(Resolved::Map(key, value)),
					_ => return Err(Error::UnknownType(expr.to_string())),
				},
			};
		}
		Err(Error::RecursionLimit(MAX_DEPTH))
	}

	fn compact_target(&self, inner: &TypeExpr) -> Result<Primitive, Error> {
		match self.resolve_expr(inner)? {
			Resolved::Primitive(primitive) if primitive.is_unsigned() => Ok(primitive),
			_ => Err(Error::malformed(
				format!("Compact<{inner}>"),
				format!("`{inner}` is not an unsigned integer"),
			)),
		}
	}

	/// Checks that every definition only references resolvable types. Returns every failing
	/// reference instead of stopping at the first one.
	pub fn validate(&self) -> Vec<(String, Error)> {
		let mut failures = Vec::new();
		for (name, entry) in &self.entries {
			entry.descriptor.for_each_expr(|expr| {
				if let Err(error) = self.check_expr(expr) {
					failures.push((name.clone(), error));
				}
			});
		}
		debug!(types = self.entries.len(), failures = failures.len(), "Validated registry");
		failures
	}

	fn check_expr(&self, expr: &TypeExpr) -> Result<(), Error> {
		self.resolve_expr(expr)?;
		match expr {
			TypeExpr::Named(_) | TypeExpr::Compact(_) => Ok(()),
			TypeExpr::Vec(inner)
			| TypeExpr::Option(inner)
			| TypeExpr::BTreeSet(inner)
			| TypeExpr::Array(inner, _) => self.check_expr(inner),
			TypeExpr::Result(left, right) | TypeExpr::BTreeMap(left, right) => {
				self.check_expr(left)?;
				self.check_expr(right)
			},
			TypeExpr::Tuple(items) | TypeExpr::Generic(_, items) => {
				items.iter().try_for_each(|item| self.check_expr(item))
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;
	use serde_json::json;

	fn registry(types: Json) -> Registry {
		Registry::register(Snapshot::from_json(&types).unwrap())
	}

	#[test]
	fn aliases_resolve_like_their_target() {
		let registry = registry(json!({
			"AccountInfo": "FrameSystemAccountInfo",
			"FrameSystemAccountInfo": { "nonce": "u32", "data": "PalletBalancesAccountData" },
			"PalletBalancesAccountData": { "free": "u128" },
			"Balance": "u128",
			"Amount": "Balance",
			"Hashes": "Vec<H256>",
		}));

		assert_eq!(
			registry.resolve("AccountInfo").unwrap(),
			registry.resolve("FrameSystemAccountInfo").unwrap()
		);
		assert_eq!(
			registry.resolve("Amount").unwrap(),
			Resolution::Expr(TypeExpr::named("u128"))
		);
		assert_eq!(
			registry.resolve("Hashes").unwrap(),
			registry.resolve("Vec<H256>").unwrap()
		);
		assert_eq!(
			registry.resolve("H256").unwrap(),
			registry.resolve("[u8;32]").unwrap()
		);
	}

	#[test]
	fn registry_entries_shadow_builtins() {
		let registry = registry(json!({ "H256": "[u8;20]" }));
		assert_eq!(
			registry.resolve("H256").unwrap(),
			Resolution::Expr(TypeExpr::Array(Box::new(TypeExpr::named("u8")), 20))
		);
	}

	#[test]
	fn forward_and_recursive_references_resolve_lazily() {
		let registry = registry(json!({
			"Call": { "_enum": { "Batch": { "calls": "Vec<Call>" }, "Remark": "Bytes" } },
		}));
		assert!(registry.validate().is_empty());
		assert!(matches!(
			registry.resolve_expr(&TypeExpr::named("Call")).unwrap(),
			Resolved::Enum("Call", _)
		));
	}

	#[test]
	fn unknown_names_fail() {
		let registry = registry(json!({ "A": "Missing" }));
		assert_eq!(registry.resolve("A").unwrap_err().kind(), ErrorKind::UnknownType);
		assert_eq!(registry.resolve("Nope").unwrap_err().kind(), ErrorKind::UnknownType);
		assert_eq!(
			registry.resolve("Rc<u8>").unwrap_err().kind(),
			ErrorKind::UnknownType
		);
	}

	#[test]
	fn alias_cycles_hit_the_depth_limit() {
		let registry = registry(json!({ "A": "B", "B": "A" }));
		assert_eq!(registry.resolve("A").unwrap_err().kind(), ErrorKind::RecursionLimit);
	}

	#[test]
	fn compact_requires_an_unsigned_integer() {
		let registry = registry(json!({ "Balance": "u128", "Flag": "bool" }));
		assert_eq!(
			registry.resolve("Compact<Balance>").unwrap(),
			Resolution::Expr(TypeExpr::Compact(Box::new(TypeExpr::named("u128"))))
		);
		assert_eq!(
			registry.resolve("Compact<Perbill>").unwrap(),
			Resolution::Expr(TypeExpr::Compact(Box::new(TypeExpr::named("u32"))))
		);
		assert_eq!(
			registry.resolve("Compact<Flag>").unwrap_err().kind(),
			ErrorKind::MalformedContainerSyntax
		);
	}

	#[test]
	fn validation_reports_every_broken_reference() {
		let registry = registry(json!({
			"Good": { "a": "u8", "b": "Vec<H160>" },
			"Bad": { "a": "Vec<Missing>", "b": "Option<AlsoMissing>", "c": "Compact<bool>" },
			"Loop": "Loop",
		}));

		let failures = registry.validate();
		let kinds = failures
			.iter()
			.map(|(name, error)| (name.as_str(), error.kind()))
			.collect::<Vec<_>>();
		assert_eq!(
			kinds,
			vec![
				("Bad", ErrorKind::UnknownType),
				("Bad", ErrorKind::UnknownType),
				("Bad", ErrorKind::MalformedContainerSyntax),
				("Loop", ErrorKind::RecursionLimit),
			]
		);
	}

	#[test]
	fn envelope_keeps_runtime_and_docs() {
		let snapshot = Snapshot::from_json(&json!({
			"runtime": "moonbeam",
			"types": { "FrameSupportWeightsPays": { "_enum": ["Yes", "No"] } },
			"docs": { "FrameSupportWeightsPays": { "lookup": 22, "path": "frame_support::weights::Pays" } },
		}))
		.unwrap();
		assert_eq!(Snapshot::from_json(&snapshot.to_json()).unwrap(), snapshot);

		let registry = Registry::register(snapshot);
		assert_eq!(registry.runtime(), Some("moonbeam"));
		assert_eq!(
			registry.doc("FrameSupportWeightsPays").map(ToString::to_string),
			Some("Lookup22: frame_support::weights::Pays".to_string())
		);
	}

	#[test]
	fn bare_tables_keep_definition_order() {
		let registry = registry(json!({ "Z": "u8", "A": "u16", "M": "u32" }));
		assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Z", "A", "M"]);
	}

	#[test]
	fn bundled_fixtures_are_closed_over_their_names() {
		let assets = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/test_assets");
		for fixture in ["moonbase.json", "lookup_excerpt.ts"] {
			let registry = Registry::from_path(assets.join(fixture)).unwrap();
			assert!(!registry.is_empty());
			assert!(registry.validate().is_empty(), "{fixture} has dangling references");
		}
		let moonbase = Registry::from_path(assets.join("moonbase.json")).unwrap();
		assert_eq!(moonbase.runtime(), Some("moonbase"));
	}

	#[test]
	fn loads_a_complete_generated_table() {
		let assets = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/test_assets");
		let registry = Registry::from_path(assets.join("moonbeam_lookup.ts")).unwrap();
		assert_eq!(registry.len(), 177);
		assert_eq!(registry.names().next(), Some("FrameSystemAccountInfo"));
		assert_eq!(
			registry.doc("MoonbeamRuntimeRuntime").map(ToString::to_string),
			Some("Lookup348: moonbeam_runtime::Runtime".to_string())
		);
		assert!(matches!(
			registry.get("PalletIdentityBitFlags"),
			Some(TypeDescriptor::BitFlags(flags)) if flags.bit_length == 64
		));

		// runtime level types are supplied by the runtime definition, not the table
		let mut dangling = registry
			.validate()
			.into_iter()
			.map(|(_, error)| match error {
				Error::UnknownType(name) => name,
				other => panic!("unexpected validation failure: {other}"),
			})
			.collect::<Vec<_>>();
		dangling.sort();
		dangling.dedup();
		assert_eq!(dangling, vec!["Call", "Data", "Event", "Vote"]);

		let mut account = vec![0u8; 80];
		account[0] = 7;
		account[16..18].copy_from_slice(&1000u16.to_le_bytes());
		let value = crate::codec::decode_all(&registry, "FrameSystemAccountInfo", &account).unwrap();
		assert_eq!(value.field("nonce"), Some(&crate::Value::Unsigned(7)));
		assert_eq!(
			value.field("data").and_then(|data| data.field("free")),
			Some(&crate::Value::Unsigned(1000))
		);
	}

	#[test]
	fn runtime_name_is_taken_from_the_generated_layout() {
		assert_eq!(
			runtime_from_path(Path::new("src/moonriver/interfaces/lookup.ts")),
			Some("moonriver".to_string())
		);
		assert_eq!(runtime_from_path(Path::new("snapshots/lookup.json")), None);
	}
}
