use super::{ordering, primitive, Decoder, Encoder};
use crate::{
	error::Error,
	registry::{Primitive, Resolved, TypeExpr},
	value::Value,
};
use std::cmp::Ordering;

const OK: &str = "Ok";
const ERR: &str = "Err";

impl<'r> Decoder<'r, '_> {
	pub(super) fn vec(&mut self, inner: &'r TypeExpr) -> Result<Value, Error> {
		let len = self.length()?;
		if self.is_byte(inner)? {
			return Ok(Value::Bytes(self.cursor.take(len)?.to_vec()));
		}
		self.items(inner, len).map(Value::Sequence)
	}

	pub(super) fn set(&mut self, inner: &'r TypeExpr) -> Result<Value, Error> {
		let len = self.length()?;
		self.items(inner, len).map(Value::Sequence)
	}

	/// Entries in wire order; sortedness is not verified.
	pub(super) fn map(&mut self, key: &'r TypeExpr, value: &'r TypeExpr) -> Result<Value, Error> {
		let len = self.length()?;
		self.repeat(len, |decoder| Ok((decoder.decode(key)?, decoder.decode(value)?)))
			.map(Value::Map)
	}

	pub(super) fn items(&mut self, inner: &'r TypeExpr, len: usize) -> Result<Vec<Value>, Error> {
		self.repeat(len, |decoder| decoder.decode(inner))
	}

	/// Decodes `len` elements in a row.
	///
	/// Every element takes at least one byte except zero-width ones (`()`, empty structs), so
	/// once an element consumed nothing the elements still to come may not outnumber the bytes
	/// left in the input.
	fn repeat<T>(
		&mut self,
		len: usize,
		mut element: impl FnMut(&mut Self) -> Result<T, Error>,
	) -> Result<Vec<T>, Error> {
		let mut items = Vec::with_capacity(len.min(self.cursor.remaining()));
		for index in 0..len {
			let start = self.cursor.offset();
			items.push(element(self)?);
			let left = len - index - 1;
			if self.cursor.offset() == start && left > self.cursor.remaining() {
				return Err(Error::UnexpectedEof {
					offset: self.cursor.offset(),
					needed: left - self.cursor.remaining(),
				});
			}
		}
		Ok(items)
	}

	pub(super) fn option(&mut self, inner: &'r TypeExpr) -> Result<Value, Error> {
		let offset = self.cursor.offset();
		let tag = self.cursor.byte()?;
		if matches!(self.registry.resolve_expr(inner)?, Resolved::Primitive(Primitive::Bool)) {
			return match tag {
				0 => Ok(Value::Option(None)),
				1 => Ok(Value::some(Value::Bool(true))),
				2 => Ok(Value::some(Value::Bool(false))),
				_ => Err(unknown_tag("Option<bool>", tag, offset)),
			};
		}
		match tag {
			0 => Ok(Value::Option(None)),
			1 => Ok(Value::some(self.decode(inner)?)),
			_ => Err(unknown_tag(format!("Option<{inner}>"), tag, offset)),
		}
	}

	pub(super) fn result(&mut self, ok: &'r TypeExpr, err: &'r TypeExpr) -> Result<Value, Error> {
		let offset = self.cursor.offset();
		match self.cursor.byte()? {
			0 => Ok(Value::variant(OK, Some(self.decode(ok)?))),
			1 => Ok(Value::variant(ERR, Some(self.decode(err)?))),
			tag => Err(unknown_tag(format!("Result<{ok},{err}>"), tag, offset)),
		}
	}
}

fn unknown_tag(ty: impl Into<String>, tag: u8, offset: usize) -> Error {
	Error::UnknownVariant {
		ty: ty.into(),
		variant: format!("{tag} at offset {offset}"),
	}
}

/// Key and value pairs from a map, a sequence of `[key, value]` pairs or a record.
fn entries(value: &Value) -> Result<Vec<(Value, &Value)>, Error> {
	match value {
		Value::Map(entries) => Ok(entries.iter().map(|(key, value)| (key.clone(), value)).collect()),
		Value::Record(fields) => Ok(fields
			.iter()
			.map(|(key, value)| (Value::Text(key.clone()), value))
			.collect()),
		Value::Sequence(items) => items
			.iter()
			.map(|item| match item {
				Value::Sequence(pair) if pair.len() == 2 => Ok((pair[0].clone(), &pair[1])),
				other => Err(Error::mismatch("[key, value] pair", other)),
			})
			.collect(),
		other => Err(Error::mismatch("map", other)),
	}
}

impl<'r> Encoder<'r> {
	pub(super) fn vec(&mut self, inner: &'r TypeExpr, value: &Value) -> Result<(), Error> {
		if self.is_byte(inner)? {
			let bytes = primitive::bytes(value)?;
			self.length(bytes.len());
			self.out.extend_from_slice(&bytes);
			return Ok(());
		}
		match value {
			Value::Sequence(items) => {
				self.length(items.len());
				items.iter().try_for_each(|item| self.encode(inner, item))
			},
			other => Err(Error::mismatch(format!("Vec<{inner}>"), other)),
		}
	}

	/// Elements in ascending order, duplicates collapsed.
	pub(super) fn set(&mut self, inner: &'r TypeExpr, value: &Value) -> Result<(), Error> {
		let Value::Sequence(items) = value else {
			return Err(Error::mismatch(format!("BTreeSet<{inner}>"), value));
		};
		let sorted = self.sorted_keys(inner, items.iter().map(|item| (item, ())))?;
		self.length(sorted.len());
		for (bytes, ()) in sorted {
			self.out.extend_from_slice(&bytes);
		}
		Ok(())
	}

	/// Entries in ascending key order; of several equal keys the last one wins.
	pub(super) fn map(&mut self, key: &'r TypeExpr, value_ty: &'r TypeExpr, value: &Value) -> Result<(), Error> {
		let entries = entries(value)?;
		let sorted = self.sorted_keys(key, entries.iter().map(|(key, value)| (key, *value)))?;
		self.length(sorted.len());
		for (bytes, value) in sorted {
			self.out.extend_from_slice(&bytes);
			self.encode(value_ty, value)?;
		}
		Ok(())
	}

	/// Encodes keys, orders them by their decoded canonical form and drops all but the last of
	/// equal keys.
	fn sorted_keys<'v, T>(
		&self,
		key: &'r TypeExpr,
		entries: impl Iterator<Item = (&'v Value, T)>,
	) -> Result<Vec<(Vec<u8>, T)>, Error> {
		let mut keyed = entries
			.map(|(key_value, payload)| {
				let bytes = self.detached(key, key_value)?;
				let canonical = self.canonical(key, &bytes)?;
				Ok((canonical, bytes, payload))
			})
			.collect::<Result<Vec<_>, Error>>()?;

		keyed.sort_by(|(a, ..), (b, ..)| ordering::compare(self.registry, key, a, b));

		let mut unique: Vec<(Value, Vec<u8>, T)> = Vec::with_capacity(keyed.len());
		for entry in keyed {
			match unique.last_mut() {
				Some(last) if ordering::compare(self.registry, key, &last.0, &entry.0) == Ordering::Equal => {
					*last = entry
				},
				_ => unique.push(entry),
			}
		}
		Ok(unique.into_iter().map(|(_, bytes, payload)| (bytes, payload)).collect())
	}

	fn canonical(&self, expr: &'r TypeExpr, bytes: &[u8]) -> Result<Value, Error> {
		let mut decoder = Decoder::new(self.registry, bytes);
		decoder.depth = self.depth;
		decoder.decode(expr)
	}

	pub(super) fn option(&mut self, inner: &'r TypeExpr, value: &Value) -> Result<(), Error> {
		let some = match value {
			Value::Option(None) | Value::Null => None,
			Value::Option(Some(value)) => Some(value.as_ref()),
			value => Some(value),
		};
		if matches!(self.registry.resolve_expr(inner)?, Resolved::Primitive(Primitive::Bool)) {
			let tag = match some {
				None => 0,
				Some(value) => match value {
					Value::Bool(true) => 1,
					Value::Bool(false) => 2,
					other => return Err(Error::mismatch(Primitive::Bool, other)),
				},
			};
			self.out.push(tag);
			return Ok(());
		}
		match some {
			None => self.out.push(0),
			Some(value) => {
				self.out.push(1);
				self.encode(inner, value)?;
			},
		}
		Ok(())
	}

	pub(super) fn result(&mut self, ok: &'r TypeExpr, err: &'r TypeExpr, value: &Value) -> Result<(), Error> {
		let (name, payload) = match value {
			Value::Variant(name, payload) => (name.as_str(), payload.as_deref()),
			Value::Record(fields) if fields.len() == 1 => (fields[0].0.as_str(), Some(&fields[0].1)),
			other => return Err(Error::mismatch(format!("Result<{ok},{err}>"), other)),
		};
		let payload = payload.unwrap_or(&Value::Null);
		match name {
			OK => {
				self.out.push(0);
				self.encode(ok, payload)
			},
			ERR => {
				self.out.push(1);
				self.encode(err, payload)
			},
			other => Err(Error::UnknownVariant {
				ty: format!("Result<{ok},{err}>"),
				variant: other.to_string(),
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::{
		codec::{decode, decode_all, encode, test_registry},
		error::ErrorKind,
		registry::Registry,
		value::Value,
	};
	use hex_literal::hex;
	use serde_json::json;
	use test_case::test_case;

	fn registry() -> Registry {
		test_registry(json!({
			"Pays": { "_enum": ["Yes", "No"] },
			"Fees": "BTreeMap<Pays,u8>",
			"Candidates": "BTreeSet<i16>",
			"Outcome": "Result<(),u8>",
		}))
	}

	#[test_case(Value::Option(None) => hex!("00").to_vec())]
	#[test_case(Value::some(Value::Unsigned(1)) => hex!("0101000000").to_vec())]
	#[test_case(Value::Null => hex!("00").to_vec(); "null is none")]
	#[test_case(Value::Unsigned(1) => hex!("0101000000").to_vec(); "bare value is some")]
	fn option_u32(value: Value) -> Vec<u8> {
		encode(&registry(), "Option<u32>", &value).unwrap()
	}

	#[test]
	fn option_round_trips() {
		let registry = registry();
		assert_eq!(
			decode_all(&registry, "Option<u32>", &hex!("00")).unwrap(),
			Value::Option(None)
		);
		assert_eq!(
			decode_all(&registry, "Option<u32>", &hex!("0101000000")).unwrap(),
			Value::some(Value::Unsigned(1))
		);
		assert_eq!(
			decode_all(&registry, "Option<u32>", &hex!("02")).unwrap_err().kind(),
			ErrorKind::UnknownVariant
		);
	}

	#[test_case(Value::Option(None) => hex!("00").to_vec())]
	#[test_case(Value::some(Value::Bool(true)) => hex!("01").to_vec())]
	#[test_case(Value::some(Value::Bool(false)) => hex!("02").to_vec())]
	fn option_bool_uses_a_single_byte(value: Value) -> Vec<u8> {
		let registry = registry();
		let bytes = encode(&registry, "Option<bool>", &value).unwrap();
		assert_eq!(decode_all(&registry, "Option<bool>", &bytes).unwrap(), value);
		bytes
	}

	#[test]
	fn vectors_are_length_prefixed() {
		let registry = registry();
		let values = Value::Sequence(vec![Value::Unsigned(1), Value::Unsigned(2)]);
		assert_eq!(encode(&registry, "Vec<u16>", &values).unwrap(), hex!("0801000200"));
		assert_eq!(decode_all(&registry, "Vec<u16>", &hex!("0801000200")).unwrap(), values);
		assert_eq!(
			decode_all(&registry, "Vec<u8>", &hex!("08dead")).unwrap(),
			Value::Bytes(vec![0xde, 0xad])
		);
		assert_eq!(
			decode_all(&registry, "Vec<u16>", &hex!("0c0100")).unwrap_err().kind(),
			ErrorKind::UnexpectedEof
		);
	}

	#[test]
	fn maps_are_written_in_key_order() {
		let registry = registry();
		// `No` is declared after `Yes`, so it sorts last even though it is alphabetically first
		let fees = Value::Map(vec![
			(Value::variant("No", None), Value::Unsigned(2)),
			(Value::variant("Yes", None), Value::Unsigned(1)),
		]);
		let bytes = encode(&registry, "Fees", &fees).unwrap();
		assert_eq!(bytes, hex!("08 00 01 01 02"));

		// decoding keeps wire order and does not insist on it being sorted
		assert_eq!(
			decode_all(&registry, "Fees", &hex!("08 01 02 00 01")).unwrap(),
			fees
		);
	}

	#[test]
	fn duplicate_keys_keep_the_last_value() {
		let registry = registry();
		let fees = Value::Sequence(vec![
			Value::Sequence(vec![Value::Text("Yes".into()), Value::Unsigned(1)]),
			Value::Sequence(vec![Value::Text("Yes".into()), Value::Unsigned(9)]),
		]);
		assert_eq!(encode(&registry, "Fees", &fees).unwrap(), hex!("04 00 09"));
	}

	#[test]
	fn record_values_encode_as_text_keyed_maps() {
		let registry = registry();
		let map = Value::record([("b", Value::Unsigned(2)), ("a", Value::Unsigned(1))]);
		assert_eq!(
			encode(&registry, "BTreeMap<Text,u8>", &map).unwrap(),
			hex!("08 0461 01 0462 02")
		);
		assert_eq!(
			encode(&registry, "HashMap<Text,u8>", &map).unwrap(),
			hex!("08 0461 01 0462 02")
		);
	}

	#[test]
	fn sets_sort_signed_elements_numerically() {
		let registry = registry();
		let candidates = Value::Sequence(vec![
			Value::Signed(5),
			Value::Signed(-3),
			Value::Unsigned(5),
			Value::Signed(0),
		]);
		let bytes = encode(&registry, "Candidates", &candidates).unwrap();
		assert_eq!(bytes, hex!("0c fdff 0000 0500"));
		assert_eq!(
			decode_all(&registry, "Candidates", &bytes).unwrap(),
			Value::Sequence(vec![Value::Signed(-3), Value::Signed(0), Value::Signed(5)])
		);
	}

	#[test]
	fn results_are_two_variant_unions() {
		let registry = registry();
		let ok = Value::variant("Ok", Some(Value::Null));
		let err = Value::variant("Err", Some(Value::Unsigned(7)));
		assert_eq!(encode(&registry, "Outcome", &ok).unwrap(), hex!("00"));
		assert_eq!(encode(&registry, "Outcome", &err).unwrap(), hex!("0107"));
		assert_eq!(decode_all(&registry, "Outcome", &hex!("00")).unwrap(), ok);
		assert_eq!(decode_all(&registry, "Outcome", &hex!("0107")).unwrap(), err);
		assert_eq!(
			encode(&registry, "Outcome", &Value::variant("Ok", None)).unwrap(),
			hex!("00")
		);
		assert_eq!(
			decode_all(&registry, "Outcome", &hex!("02")).unwrap_err().kind(),
			ErrorKind::UnknownVariant
		);
	}

	#[test_case("Vec<()>", &hex!("02000004"); "four byte length")]
	#[test_case("Vec<()>", &hex!("03ffffffff"); "u32 max length")]
	#[test_case("BTreeSet<()>", &hex!("03ffffffff"); "set")]
	#[test_case("BTreeMap<(),()>", &hex!("03ffffffff"); "map")]
	#[test_case("[();4294967295]", &[]; "array")]
	fn zero_width_elements_cannot_outnumber_the_input(ty: &str, bytes: &[u8]) {
		let error = decode(&registry(), ty, bytes).unwrap_err();
		assert_eq!(error.kind(), ErrorKind::UnexpectedEof);
	}

	#[test]
	fn short_zero_width_sequences_decode() {
		let registry = registry();
		assert_eq!(
			decode_all(&registry, "Vec<()>", &hex!("04")).unwrap(),
			Value::Sequence(vec![Value::Null])
		);
		let (units, consumed) = decode(&registry, "Vec<()>", &hex!("08 0000")).unwrap();
		assert_eq!(units, Value::Sequence(vec![Value::Null, Value::Null]));
		assert_eq!(consumed, 1);
	}
}
