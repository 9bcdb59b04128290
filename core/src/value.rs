//! Dynamic values produced by decoding and consumed by encoding.
//!
//! Decoding always yields the canonical form listed on each variant. Encoding is more lenient
//! and accepts the shapes that come out of plain JSON (see [`Value`]'s `Deserialize`), so a
//! value parsed from user input can be encoded without knowing its type up front.

use derive_more::From;
use primitive_types::U256;
use serde::{
	de::{self, MapAccess, SeqAccess, Visitor},
	ser::{SerializeMap, SerializeSeq},
	Deserialize, Deserializer, Serialize, Serializer,
};
use std::{cmp::Ordering, fmt};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
	/// `Null`, `()` and empty tuples.
	Null,
	Bool(bool),
	/// `u8` to `u128` and their `Compact` forms.
	Unsigned(u128),
	/// `i8` to `i128`.
	Signed(i128),
	U256(U256),
	I256(I256),
	/// `Bytes`, `Vec<u8>` and `[u8; N]`.
	Bytes(Vec<u8>),
	Text(String),
	/// Vectors, fixed arrays, tuples and sets.
	Sequence(Vec<Value>),
	/// Struct fields in declaration order.
	Record(Vec<(String, Value)>),
	/// Enum variant name and its payload, if the variant carries one.
	Variant(String, Option<Box<Value>>),
	Map(Vec<(Value, Value)>),
	Option(Option<Box<Value>>),
	/// Names of the bits set in a bitflags value, in declaration order.
	Flags(Vec<String>),
}

impl Value {
	pub fn variant(name: impl Into<String>, payload: Option<Value>) -> Self {
		Value::Variant(name.into(), payload.map(Box::new))
	}

	pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
		Value::Record(
			fields
				.into_iter()
				.map(|(name, value)| (name.into(), value))
				.collect(),
		)
	}

	pub fn some(value: Value) -> Self {
		Value::Option(Some(Box::new(value)))
	}

	/// Looks up a record field by name.
	pub fn field(&self, name: &str) -> Option<&Value> {
		match self {
			Value::Record(fields) => fields
				.iter()
				.find(|(field, _)| field == name)
				.map(|(_, value)| value),
			_ => None,
		}
	}

	pub fn kind_name(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::Unsigned(_) => "unsigned integer",
			Value::Signed(_) => "signed integer",
			Value::U256(_) => "u256",
			Value::I256(_) => "i256",
			Value::Bytes(_) => "bytes",
			Value::Text(_) => "text",
			Value::Sequence(_) => "sequence",
			Value::Record(_) => "record",
			Value::Variant(..) => "variant",
			Value::Map(_) => "map",
			Value::Option(_) => "option",
			Value::Flags(_) => "flags",
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<u128> for Value {
	fn from(value: u128) -> Self {
		Value::Unsigned(value)
	}
}

impl From<i128> for Value {
	fn from(value: i128) -> Self {
		Value::Signed(value)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Text(value.to_string())
	}
}

impl From<Vec<u8>> for Value {
	fn from(value: Vec<u8>) -> Self {
		Value::Bytes(value)
	}
}

/// Signed 256-bit integer kept as little-endian two's complement bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, From)]
pub struct I256(pub [u8; 32]);

impl I256 {
	pub fn is_negative(&self) -> bool {
		self.0[31] & 0x80 != 0
	}

	/// Narrows to `i128` when the value is within range.
	pub fn to_i128(&self) -> Option<i128> {
		let fill = if self.is_negative() { 0xff } else { 0x00 };
		if self.0[16..].iter().any(|byte| *byte != fill) {
			return None;
		}
		let narrow = i128::from_le_bytes(self.0[..16].try_into().ok()?);
		// sign of the low half must agree with the dropped high half
		(narrow.is_negative() == self.is_negative()).then_some(narrow)
	}

	/// Big-endian hex of the two's complement bytes.
	pub fn to_hex(&self) -> String {
		let mut be = self.0;
		be.reverse();
		format!("0x{}", hex::encode(be))
	}
}

impl From<i128> for I256 {
	fn from(value: i128) -> Self {
		let fill = if value < 0 { 0xff } else { 0x00 };
		let mut bytes = [fill; 32];
		bytes[..16].copy_from_slice(&value.to_le_bytes());
		I256(bytes)
	}
}

impl Ord for I256 {
	fn cmp(&self, other: &Self) -> Ordering {
		match (self.is_negative(), other.is_negative()) {
			(true, false) => Ordering::Less,
			(false, true) => Ordering::Greater,
			// same sign: two's complement orders like the unsigned magnitude
			_ => self.0.iter().rev().cmp(other.0.iter().rev()),
		}
	}
}

impl PartialOrd for I256 {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl fmt::Debug for I256 {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.to_i128() {
			Some(value) => write!(f, "I256({value})"),
			None => write!(f, "I256({})", self.to_hex()),
		}
	}
}

/// Integers beyond the 53-bit safe range of JSON consumers are written as decimal strings.
const JSON_SAFE_INTEGER: u128 = (1 << 53) - 1;

impl Serialize for Value {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match self {
			Value::Null => serializer.serialize_unit(),
			Value::Bool(value) => serializer.serialize_bool(*value),
			Value::Unsigned(value) if *value <= JSON_SAFE_INTEGER => {
				serializer.serialize_u64(*value as u64)
			},
			Value::Unsigned(value) => serializer.serialize_str(&value.to_string()),
			Value::Signed(value) if value.unsigned_abs() <= JSON_SAFE_INTEGER => {
				serializer.serialize_i64(*value as i64)
			},
			Value::Signed(value) => serializer.serialize_str(&value.to_string()),
			Value::U256(value) => serializer.serialize_str(&value.to_string()),
			Value::I256(value) => match value.to_i128() {
				Some(narrow) => serializer.serialize_str(&narrow.to_string()),
				None => serializer.serialize_str(&value.to_hex()),
			},
			Value::Bytes(bytes) => serializer.serialize_str(&format!("0x{}", hex::encode(bytes))),
			Value::Text(text) => serializer.serialize_str(text),
			Value::Sequence(items) => {
				let mut seq = serializer.serialize_seq(Some(items.len()))?;
				for item in items {
					seq.serialize_element(item)?;
				}
				seq.end()
			},
			Value::Record(fields) => {
				let mut map = serializer.serialize_map(Some(fields.len()))?;
				for (name, value) in fields {
					map.serialize_entry(name, value)?;
				}
				map.end()
			},
			Value::Variant(name, None) => serializer.serialize_str(name),
			Value::Variant(name, Some(payload)) => {
				let mut map = serializer.serialize_map(Some(1))?;
				map.serialize_entry(name, payload)?;
				map.end()
			},
			Value::Map(entries) => {
				let mut seq = serializer.serialize_seq(Some(entries.len()))?;
				for (key, value) in entries {
					seq.serialize_element(&(key, value))?;
				}
				seq.end()
			},
			Value::Option(None) => serializer.serialize_unit(),
			Value::Option(Some(value)) => value.serialize(serializer),
			Value::Flags(names) => names.serialize(serializer),
		}
	}
}

impl<'de> Deserialize<'de> for Value {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		deserializer.deserialize_any(ValueVisitor)
	}
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
	type Value = Value;

	fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
		formatter.write_str("any JSON value")
	}

	fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
		Ok(Value::Null)
	}

	fn visit_none<E: de::Error>(self) -> Result<Value, E> {
		Ok(Value::Null)
	}

	fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
	where
		D: Deserializer<'de>,
	{
		Deserialize::deserialize(deserializer)
	}

	fn visit_bool<E: de::Error>(self, value: bool) -> Result<Value, E> {
		Ok(Value::Bool(value))
	}

	fn visit_u64<E: de::Error>(self, value: u64) -> Result<Value, E> {
		Ok(Value::Unsigned(value.into()))
	}

	fn visit_u128<E: de::Error>(self, value: u128) -> Result<Value, E> {
		Ok(Value::Unsigned(value))
	}

	fn visit_i64<E: de::Error>(self, value: i64) -> Result<Value, E> {
		if value >= 0 {
			return Ok(Value::Unsigned(value as u128));
		}
		Ok(Value::Signed(value.into()))
	}

	fn visit_i128<E: de::Error>(self, value: i128) -> Result<Value, E> {
		Ok(Value::Signed(value))
	}

	fn visit_f64<E: de::Error>(self, value: f64) -> Result<Value, E> {
		Err(E::custom(format!("non-integer number {value} has no SCALE encoding")))
	}

	fn visit_str<E: de::Error>(self, value: &str) -> Result<Value, E> {
		Ok(Value::Text(value.to_string()))
	}

	fn visit_string<E: de::Error>(self, value: String) -> Result<Value, E> {
		Ok(Value::Text(value))
	}

	fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
	where
		A: SeqAccess<'de>,
	{
		let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
		while let Some(item) = seq.next_element()? {
			items.push(item);
		}
		Ok(Value::Sequence(items))
	}

	fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
	where
		A: MapAccess<'de>,
	{
		let mut fields = Vec::with_capacity(map.size_hint().unwrap_or(0));
		while let Some((name, value)) = map.next_entry::<String, Value>()? {
			fields.push((name, value));
		}
		Ok(Value::Record(fields))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use test_case::test_case;

	#[test]
	fn serializes_canonical_values_to_json() {
		let value = Value::record([
			("nonce", Value::Unsigned(7)),
			("free", Value::Unsigned(u128::MAX)),
			("hash", Value::Bytes(vec![0xde, 0xad])),
			("phase", Value::variant("ApplyExtrinsic", Some(Value::Unsigned(1)))),
			("class", Value::variant("Normal", None)),
			("tip", Value::Option(None)),
		]);

		let json = serde_json::to_string(&value).unwrap();
		assert_eq!(
			json,
			r#"{"nonce":7,"free":"340282366920938463463374607431768211455","hash":"0xdead","phase":{"ApplyExtrinsic":1},"class":"Normal","tip":null}"#
		);
	}

	#[test]
	fn deserializes_plain_json_shapes() {
		let value: Value = serde_json::from_str(r#"{"x": 1, "y": [-2, "a", null, true]}"#).unwrap();
		assert_eq!(
			value,
			Value::record([
				("x", Value::Unsigned(1)),
				(
					"y",
					Value::Sequence(vec![
						Value::Signed(-2),
						Value::Text("a".into()),
						Value::Null,
						Value::Bool(true),
					])
				),
			])
		);
	}

	#[test]
	fn rejects_fractional_numbers() {
		assert!(serde_json::from_str::<Value>("1.5").is_err());
	}

	#[test_case(0 => Some(0))]
	#[test_case(-1 => Some(-1))]
	#[test_case(i128::MIN => Some(i128::MIN))]
	#[test_case(i128::MAX => Some(i128::MAX))]
	fn i256_narrows_back_to_i128(value: i128) -> Option<i128> {
		I256::from(value).to_i128()
	}

	#[test]
	fn i256_orders_by_sign_then_magnitude() {
		let mut values = vec![I256::from(5), I256::from(-3), I256::from(0), I256::from(-100)];
		values.sort();
		assert_eq!(
			values,
			vec![I256::from(-100), I256::from(-3), I256::from(0), I256::from(5)]
		);
	}

	#[test]
	fn wide_i256_does_not_narrow() {
		let mut bytes = [0u8; 32];
		bytes[20] = 1;
		assert_eq!(I256(bytes).to_i128(), None);
		assert_eq!(
			I256(bytes).to_hex(),
			"0x0000000000000000000000010000000000000000000000000000000000000000"
		);
	}
}
