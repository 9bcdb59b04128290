use super::{Decoder, Encoder};
use crate::{
	error::Error,
	registry::Primitive,
	value::{Value, I256},
};
use primitive_types::U256;
use tracing::warn;

impl Decoder<'_, '_> {
	pub(super) fn primitive(&mut self, primitive: Primitive) -> Result<Value, Error> {
		let offset = self.cursor.offset();
		Ok(match primitive {
			Primitive::Null => Value::Null,
			Primitive::Bool => match self.cursor.byte()? {
				0 => Value::Bool(false),
				1 => Value::Bool(true),
				byte => {
					warn!(offset, byte, "Decoding non-canonical bool byte as true");
					Value::Bool(true)
				},
			},
			Primitive::U8 | Primitive::U16 | Primitive::U32 | Primitive::U64 | Primitive::U128 => {
				let bytes = self.cursor.take(width(primitive))?;
				let mut wide = [0u8; 16];
				wide[..bytes.len()].copy_from_slice(bytes);
				Value::Unsigned(u128::from_le_bytes(wide))
			},
			Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64 | Primitive::I128 => {
				let bytes = self.cursor.take(width(primitive))?;
				let fill = if bytes[bytes.len() - 1] & 0x80 != 0 { 0xff } else { 0x00 };
				let mut wide = [fill; 16];
				wide[..bytes.len()].copy_from_slice(bytes);
				Value::Signed(i128::from_le_bytes(wide))
			},
			Primitive::U256 => Value::U256(U256::from_little_endian(self.cursor.take(32)?)),
			Primitive::I256 => {
				let mut bytes = [0u8; 32];
				bytes.copy_from_slice(self.cursor.take(32)?);
				Value::I256(I256(bytes))
			},
			Primitive::Bytes => {
				let len = self.length()?;
				Value::Bytes(self.cursor.take(len)?.to_vec())
			},
			Primitive::Text => {
				let len = self.length()?;
				let offset = self.cursor.offset();
				let text = std::str::from_utf8(self.cursor.take(len)?)
					.map_err(|_| Error::InvalidUtf8 { offset })?;
				Value::Text(text.to_string())
			},
		})
	}
}

impl Encoder<'_> {
	pub(super) fn primitive(&mut self, primitive: Primitive, value: &Value) -> Result<(), Error> {
		match primitive {
			Primitive::Null => match value {
				Value::Null | Value::Option(None) => {},
				Value::Sequence(items) if items.is_empty() => {},
				Value::Record(fields) if fields.is_empty() => {},
				other => return Err(Error::mismatch("Null", other)),
			},
			Primitive::Bool => self.out.push(boolean(value)? as u8),
			Primitive::U8 | Primitive::U16 | Primitive::U32 | Primitive::U64 | Primitive::U128 => {
				let value = unsigned(primitive, value)?.low_u128();
				self.out.extend_from_slice(&value.to_le_bytes()[..width(primitive)]);
			},
			Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64 | Primitive::I128 => {
				let value = signed(primitive, value)?;
				self.out.extend_from_slice(&value.to_le_bytes()[..width(primitive)]);
			},
			Primitive::U256 => {
				let mut bytes = [0u8; 32];
				unsigned(primitive, value)?.to_little_endian(&mut bytes);
				self.out.extend_from_slice(&bytes);
			},
			Primitive::I256 => self.out.extend_from_slice(&signed_wide(value)?.0),
			Primitive::Bytes => {
				let bytes = bytes(value)?;
				self.length(bytes.len());
				self.out.extend_from_slice(&bytes);
			},
			Primitive::Text => {
				let text = text(value)?;
				self.length(text.len());
				self.out.extend_from_slice(text.as_bytes());
			},
		}
		Ok(())
	}
}

fn width(primitive: Primitive) -> usize {
	primitive.width().unwrap_or_default()
}

fn overflow(primitive: Primitive, value: impl ToString) -> Error {
	Error::IntegerOverflow {
		ty: primitive.to_string(),
		value: value.to_string(),
	}
}

/// Largest value an unsigned primitive holds.
pub(super) fn max_unsigned(primitive: Primitive) -> U256 {
	match width(primitive) {
		32 => U256::MAX,
		16 => U256::from(u128::MAX),
		width => U256::from((1u128 << (8 * width)) - 1),
	}
}

fn parse_u256(text: &str) -> Option<U256> {
	match text.strip_prefix("0x") {
		Some(hex) => U256::from_str_radix(hex, 16).ok(),
		None => U256::from_dec_str(text).ok(),
	}
}

/// Unsigned integer from any numeric shape, checked against the width of `primitive`.
pub(super) fn unsigned(primitive: Primitive, value: &Value) -> Result<U256, Error> {
	let wide = match value {
		Value::Unsigned(value) => U256::from(*value),
		Value::Signed(value) if *value >= 0 => U256::from(*value as u128),
		Value::U256(value) => *value,
		Value::I256(value) if !value.is_negative() => U256::from_little_endian(&value.0),
		Value::Signed(value) => return Err(overflow(primitive, value)),
		Value::I256(value) => return Err(overflow(primitive, format!("{value:?}"))),
		Value::Text(text) => parse_u256(text).ok_or_else(|| Error::mismatch(primitive, value))?,
		other => return Err(Error::mismatch(primitive, other)),
	};
	if wide > max_unsigned(primitive) {
		return Err(overflow(primitive, wide));
	}
	Ok(wide)
}

fn signed(primitive: Primitive, value: &Value) -> Result<i128, Error> {
	let narrow = match value {
		Value::Signed(value) => *value,
		Value::Unsigned(value) => i128::try_from(*value).map_err(|_| overflow(primitive, value))?,
		Value::U256(_) | Value::I256(_) => signed_wide(value)?
			.to_i128()
			.ok_or_else(|| overflow(primitive, format!("{value:?}")))?,
		Value::Text(text) => text
			.parse::<i128>()
			.map_err(|_| Error::mismatch(primitive, value))?,
		other => return Err(Error::mismatch(primitive, other)),
	};

	let bits = 8 * width(primitive) as u32;
	if bits < 128 {
		let max = (1i128 << (bits - 1)) - 1;
		if narrow > max || narrow < -max - 1 {
			return Err(overflow(primitive, narrow));
		}
	}
	Ok(narrow)
}

/// Two's complement of a sign and magnitude, if it fits 256 bits.
fn from_magnitude(negative: bool, magnitude: U256) -> Option<I256> {
	let sign_bit = U256::one() << 255;
	let value = match negative {
		false if magnitude >= sign_bit => return None,
		true if magnitude > sign_bit => return None,
		false => magnitude,
		true => (!magnitude).overflowing_add(U256::one()).0,
	};
	let mut bytes = [0u8; 32];
	value.to_little_endian(&mut bytes);
	Some(I256(bytes))
}

fn signed_wide(value: &Value) -> Result<I256, Error> {
	let wide = match value {
		Value::I256(value) => Some(*value),
		Value::Signed(value) => Some(I256::from(*value)),
		Value::Unsigned(value) => from_magnitude(false, U256::from(*value)),
		Value::U256(value) => from_magnitude(false, *value),
		// big-endian two's complement, as written by `I256::to_hex`
		Value::Text(text) if text.starts_with("0x") => parse_u256(text).map(|raw| {
			let mut bytes = [0u8; 32];
			raw.to_little_endian(&mut bytes);
			I256(bytes)
		}),
		Value::Text(text) => {
			let (negative, digits) = match text.strip_prefix('-') {
				Some(digits) => (true, digits),
				None => (false, text.as_str()),
			};
			let magnitude =
				U256::from_dec_str(digits).map_err(|_| Error::mismatch(Primitive::I256, value))?;
			from_magnitude(negative, magnitude)
		},
		other => return Err(Error::mismatch(Primitive::I256, other)),
	};
	wide.ok_or_else(|| overflow(Primitive::I256, format!("{value:?}")))
}

fn boolean(value: &Value) -> Result<bool, Error> {
	match value {
		Value::Bool(value) => Ok(*value),
		Value::Unsigned(0) => Ok(false),
		Value::Unsigned(1) => Ok(true),
		Value::Text(text) if text == "true" => Ok(true),
		Value::Text(text) if text == "false" => Ok(false),
		other => Err(Error::mismatch(Primitive::Bool, other)),
	}
}

/// Raw bytes from a byte value, `0x` hex text, plain text or a sequence of small integers.
pub(super) fn bytes(value: &Value) -> Result<Vec<u8>, Error> {
	match value {
		Value::Bytes(bytes) => Ok(bytes.clone()),
		Value::Text(text) => match text.strip_prefix("0x") {
			Some(hex) => hex::decode(hex).map_err(|error| Error::TypeMismatch {
				expected: "hex encoded bytes".to_string(),
				found: format!("{text:?} ({error})"),
			}),
			None => Ok(text.as_bytes().to_vec()),
		},
		Value::Sequence(items) => items
			.iter()
			.map(|item| match item {
				Value::Unsigned(byte) => u8::try_from(*byte).map_err(|_| overflow(Primitive::U8, byte)),
				other => Err(Error::mismatch(Primitive::U8, other)),
			})
			.collect(),
		other => Err(Error::mismatch(Primitive::Bytes, other)),
	}
}

fn text(value: &Value) -> Result<String, Error> {
	match value {
		Value::Text(text) => Ok(text.clone()),
		Value::Bytes(bytes) => {
			String::from_utf8(bytes.clone()).map_err(|error| Error::InvalidUtf8 {
				offset: error.utf8_error().valid_up_to(),
			})
		},
		other => Err(Error::mismatch(Primitive::Text, other)),
	}
}

#[cfg(test)]
mod tests {
	use crate::{
		codec::{decode_all, encode, test_registry},
		error::ErrorKind,
		value::{Value, I256},
	};
	use hex_literal::hex;
	use primitive_types::U256;
	use serde_json::json;
	use test_case::test_case;

	#[test_case("u8", &hex!("2a") => Value::Unsigned(42))]
	#[test_case("u16", &hex!("3412") => Value::Unsigned(0x1234))]
	#[test_case("u32", &hex!("78563412") => Value::Unsigned(0x1234_5678))]
	#[test_case("u64", &hex!("ffffffffffffffff") => Value::Unsigned(u64::MAX.into()))]
	#[test_case("i8", &hex!("ff") => Value::Signed(-1))]
	#[test_case("i16", &hex!("0080") => Value::Signed(i16::MIN.into()))]
	#[test_case("i64", &hex!("feffffffffffffff") => Value::Signed(-2))]
	#[test_case("bool", &hex!("01") => Value::Bool(true))]
	#[test_case("bool", &hex!("00") => Value::Bool(false))]
	#[test_case("Null", &[] => Value::Null)]
	#[test_case("()", &[] => Value::Null)]
	#[test_case("Bytes", &hex!("0c010203") => Value::Bytes(vec![1, 2, 3]))]
	#[test_case("Text", &hex!("106d6f6f6e") => Value::Text("moon".into()))]
	#[test_case("String", &hex!("00") => Value::Text(String::new()))]
	#[test_case("H160", &[0xab; 20] => Value::Bytes(vec![0xab; 20]))]
	#[test_case("Perbill", &hex!("00ca9a3b") => Value::Unsigned(1_000_000_000))]
	fn decodes_primitives(ty: &str, bytes: &[u8]) -> Value {
		decode_all(&test_registry(json!({})), ty, bytes).unwrap()
	}

	#[test]
	fn non_canonical_bool_decodes_as_true() {
		let registry = test_registry(json!({}));
		assert_eq!(decode_all(&registry, "bool", &hex!("07")).unwrap(), Value::Bool(true));
		assert_eq!(encode(&registry, "bool", &Value::Bool(true)).unwrap(), hex!("01"));
	}

	#[test]
	fn wide_integers_keep_all_bytes() {
		let registry = test_registry(json!({}));
		let mut bytes = [0u8; 32];
		bytes[31] = 0x80;
		assert_eq!(
			decode_all(&registry, "u256", &bytes).unwrap(),
			Value::U256(U256::one() << 255)
		);
		assert_eq!(
			decode_all(&registry, "i256", &[0xff; 32]).unwrap(),
			Value::I256(I256::from(-1))
		);
		assert_eq!(
			encode(&registry, "I256", &Value::Text("-1".into())).unwrap(),
			[0xff; 32]
		);
		assert_eq!(
			encode(&registry, "U256", &Value::Text("0x80".into())).unwrap()[..2],
			hex!("8000")
		);
	}

	#[test]
	fn invalid_utf8_is_reported() {
		let registry = test_registry(json!({}));
		let error = decode_all(&registry, "Text", &hex!("08c328")).unwrap_err();
		assert_eq!(error.kind(), ErrorKind::InvalidUtf8);
	}

	#[test_case("u8", Value::Unsigned(256) => ErrorKind::IntegerOverflow)]
	#[test_case("u32", Value::Signed(-1) => ErrorKind::IntegerOverflow)]
	#[test_case("i8", Value::Signed(128) => ErrorKind::IntegerOverflow)]
	#[test_case("i8", Value::Signed(-129) => ErrorKind::IntegerOverflow)]
	#[test_case("u64", Value::Text("lots".into()) => ErrorKind::TypeMismatch)]
	#[test_case("bool", Value::Unsigned(2) => ErrorKind::TypeMismatch)]
	#[test_case("Bytes", Value::Text("0xabc".into()) => ErrorKind::TypeMismatch)]
	#[test_case("Null", Value::Unsigned(0) => ErrorKind::TypeMismatch)]
	fn rejects_values_that_do_not_fit(ty: &str, value: Value) -> ErrorKind {
		encode(&test_registry(json!({})), ty, &value).unwrap_err().kind()
	}

	#[test]
	fn accepts_json_shaped_integers_and_bytes() {
		let registry = test_registry(json!({}));
		assert_eq!(
			encode(&registry, "u128", &Value::Text(u128::MAX.to_string())).unwrap(),
			[0xff; 16]
		);
		assert_eq!(encode(&registry, "i16", &Value::Unsigned(2)).unwrap(), hex!("0200"));
		assert_eq!(
			encode(&registry, "Bytes", &Value::Text("0xdead".into())).unwrap(),
			hex!("08dead")
		);
		assert_eq!(
			encode(&registry, "Bytes", &Value::Text("hi".into())).unwrap(),
			hex!("086869")
		);
	}
}
