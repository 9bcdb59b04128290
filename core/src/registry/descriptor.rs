use super::expr::TypeExpr;
use crate::error::Error;
use derive_more::Display;
use serde_json::{Map, Value as Json};

const ENUM_KEY: &str = "_enum";
const ALIAS_KEY: &str = "_alias";
const BIT_LENGTH_KEY: &str = "_bitLength";
const PLACEHOLDER_PREFIX: &str = "__Unused";

/// Wire shape bound to a type name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDescriptor {
	/// The name stands for another type expression.
	Alias(TypeExpr),
	Struct(StructDef),
	Enum(EnumDef),
	BitFlags(BitFlagsDef),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructDef {
	/// Fields in wire order.
	pub fields: Vec<Field>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
	/// Key used for the field in decoded records.
	pub name: String,
	/// Original metadata name, when `_alias` renamed the field.
	pub alias: Option<String>,
	pub ty: TypeExpr,
}

impl Field {
	/// Whether a record key addresses this field.
	pub fn matches(&self, key: &str) -> bool {
		self.name == key || self.alias.as_deref() == Some(key)
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumDef {
	/// Variants in discriminant order.
	pub variants: Vec<Variant>,
}

impl EnumDef {
	/// Discriminant and definition of a variant that may appear on the wire.
	pub fn variant(&self, name: &str) -> Option<(u8, &Variant)> {
		self.variants
			.iter()
			.enumerate()
			.find(|(_, variant)| variant.name == name && !variant.is_placeholder())
			.map(|(index, variant)| (index as u8, variant))
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variant {
	pub name: String,
	pub payload: VariantPayload,
}

impl Variant {
	/// Placeholders reserve a discriminant for a variant that no longer exists.
	pub fn is_placeholder(&self) -> bool {
		self.name.starts_with(PLACEHOLDER_PREFIX)
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VariantPayload {
	/// Bare tag, including variants declared with a `Null` payload.
	None,
	Type(TypeExpr),
	Fields(Vec<Field>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitFlagsDef {
	pub bit_length: u32,
	/// Flag names and their bit values, in declaration order.
	pub flags: Vec<(String, u128)>,
}

/// Position of a definition in the runtime metadata it was generated from.
#[derive(Clone, Debug, PartialEq, Eq, Display)]
#[display("Lookup{index}: {path}")]
pub struct LookupDoc {
	pub index: u32,
	pub path: String,
}

fn invalid(name: &str, reason: impl Into<String>) -> Error {
	Error::InvalidDescriptor {
		name: name.to_string(),
		reason: reason.into(),
	}
}

fn type_expr(name: &str, json: &Json) -> Result<TypeExpr, Error> {
	match json {
		Json::String(expr) => TypeExpr::parse(expr),
		other => Err(invalid(name, format!("expected a type string, found {other}"))),
	}
}

fn fields(name: &str, object: &Map<String, Json>) -> Result<Vec<Field>, Error> {
	let aliases = match object.get(ALIAS_KEY) {
		None => Map::new(),
		Some(Json::Object(aliases)) => aliases.clone(),
		Some(other) => return Err(invalid(name, format!("`_alias` must be an object, found {other}"))),
	};

	let fields = object
		.iter()
		.filter(|(key, _)| key.as_str() != ALIAS_KEY)
		.map(|(key, ty)| {
			let alias = match aliases.get(key) {
				None => None,
				Some(Json::String(alias)) => Some(alias.clone()),
				Some(other) => {
					return Err(invalid(name, format!("alias of `{key}` must be a string, found {other}")))
				},
			};
			Ok(Field {
				name: key.clone(),
				alias,
				ty: type_expr(name, ty)?,
			})
		})
		.collect::<Result<Vec<_>, Error>>()?;

	if let Some(orphan) = aliases.keys().find(|key| !object.contains_key(key.as_str())) {
		return Err(invalid(name, format!("`_alias` names unknown field `{orphan}`")));
	}
	Ok(fields)
}

fn variants(name: &str, json: &Json) -> Result<Vec<Variant>, Error> {
	let variants = match json {
		Json::Array(names) => names
			.iter()
			.map(|variant| match variant {
				Json::String(variant) => Ok(Variant {
					name: variant.clone(),
					payload: VariantPayload::None,
				}),
				other => Err(invalid(name, format!("variant name must be a string, found {other}"))),
			})
			.collect::<Result<Vec<_>, Error>>()?,
		Json::Object(object) => object
			.iter()
			.map(|(variant, payload)| {
				let payload = match payload {
					Json::Null => VariantPayload::None,
					Json::String(expr) if expr == "Null" => VariantPayload::None,
					Json::String(_) => VariantPayload::Type(type_expr(name, payload)?),
					Json::Object(object) => VariantPayload::Fields(fields(name, object)?),
					other => {
						return Err(invalid(name, format!("payload of `{variant}` is {other}")))
					},
				};
				Ok(Variant {
					name: variant.clone(),
					payload,
				})
			})
			.collect::<Result<Vec<_>, Error>>()?,
		other => return Err(invalid(name, format!("`_enum` must be an array or object, found {other}"))),
	};

	if variants.len() > 256 {
		return Err(invalid(name, "more than 256 variants do not fit a one byte discriminant"));
	}
	Ok(variants)
}

fn bit_flags(name: &str, object: &Map<String, Json>) -> Result<BitFlagsDef, Error> {
	let bit_length = object
		.get(BIT_LENGTH_KEY)
		.and_then(Json::as_u64)
		.filter(|bits| matches!(bits, 8 | 16 | 32 | 64 | 128))
		.ok_or_else(|| invalid(name, "`_bitLength` must be one of 8, 16, 32, 64 or 128"))? as u32;

	let flags = object
		.iter()
		.filter(|(key, _)| key.as_str() != BIT_LENGTH_KEY)
		.map(|(flag, bits)| {
			let bits = bits
				.as_u64()
				.map(u128::from)
				.or_else(|| bits.as_str().and_then(|bits| bits.parse().ok()))
				.ok_or_else(|| invalid(name, format!("flag `{flag}` has no integer value")))?;
			if bit_length < 128 && bits >> bit_length != 0 {
				return Err(invalid(name, format!("flag `{flag}` exceeds {bit_length} bits")));
			}
			Ok((flag.clone(), bits))
		})
		.collect::<Result<Vec<_>, Error>>()?;

	Ok(BitFlagsDef { bit_length, flags })
}

impl TypeDescriptor {
	/// Reads one snapshot entry in the generated table format.
	pub fn from_json(name: &str, json: &Json) -> Result<Self, Error> {
		match json {
			Json::String(_) => type_expr(name, json).map(TypeDescriptor::Alias),
			Json::Object(object) if object.contains_key(ENUM_KEY) => {
				if let Some(extra) = object.keys().find(|key| key.as_str() != ENUM_KEY) {
					return Err(invalid(name, format!("unexpected key `{extra}` next to `_enum`")));
				}
				variants(name, &object[ENUM_KEY]).map(|variants| TypeDescriptor::Enum(EnumDef { variants }))
			},
			Json::Object(object) if object.contains_key(BIT_LENGTH_KEY) => {
				bit_flags(name, object).map(TypeDescriptor::BitFlags)
			},
			Json::Object(object) => {
				fields(name, object).map(|fields| TypeDescriptor::Struct(StructDef { fields }))
			},
			other => Err(invalid(name, format!("unsupported definition {other}"))),
		}
	}

	/// Writes the entry back in the generated table format.
	pub fn to_json(&self) -> Json {
		fn fields_json(fields: &[Field]) -> Json {
			let mut object = Map::new();
			let aliases = fields
				.iter()
				.filter_map(|field| Some((field.name.clone(), Json::String(field.alias.clone()?))))
				.collect::<Map<_, _>>();
			if !aliases.is_empty() {
				object.insert(ALIAS_KEY.into(), Json::Object(aliases));
			}
			for field in fields {
				object.insert(field.name.clone(), Json::String(field.ty.to_string()));
			}
			Json::Object(object)
		}

		match self {
			TypeDescriptor::Alias(expr) => Json::String(expr.to_string()),
			TypeDescriptor::Struct(def) => fields_json(&def.fields),
			TypeDescriptor::Enum(def) => {
				let unit_only = def
					.variants
					.iter()
					.all(|variant| variant.payload == VariantPayload::None);
				let variants = if unit_only {
					Json::Array(
						def.variants
							.iter()
							.map(|variant| Json::String(variant.name.clone()))
							.collect(),
					)
				} else {
					Json::Object(
						def.variants
							.iter()
							.map(|variant| {
								let payload = match &variant.payload {
									VariantPayload::None => Json::String("Null".into()),
									VariantPayload::Type(expr) => Json::String(expr.to_string()),
									VariantPayload::Fields(fields) => fields_json(fields),
								};
								(variant.name.clone(), payload)
							})
							.collect(),
					)
				};
				let mut object = Map::new();
				object.insert(ENUM_KEY.into(), variants);
				Json::Object(object)
			},
			TypeDescriptor::BitFlags(def) => {
				let mut object = Map::new();
				object.insert(BIT_LENGTH_KEY.into(), def.bit_length.into());
				for (flag, bits) in &def.flags {
					let bits = u64::try_from(*bits)
						.map(Json::from)
						.unwrap_or_else(|_| Json::String(bits.to_string()));
					object.insert(flag.clone(), bits);
				}
				Json::Object(object)
			},
		}
	}

	/// Calls `visit` for every type expression the definition references.
	pub fn for_each_expr<'a>(&'a self, mut visit: impl FnMut(&'a TypeExpr)) {
		match self {
			TypeDescriptor::Alias(expr) => visit(expr),
			TypeDescriptor::Struct(def) => def.fields.iter().for_each(|field| visit(&field.ty)),
			TypeDescriptor::Enum(def) => {
				for variant in &def.variants {
					match &variant.payload {
						VariantPayload::None => {},
						VariantPayload::Type(expr) => visit(expr),
						VariantPayload::Fields(fields) => {
							fields.iter().for_each(|field| visit(&field.ty))
						},
					}
				}
			},
			TypeDescriptor::BitFlags(_) => {},
		}
	}
}
