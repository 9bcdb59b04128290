use super::{primitive, Decoder, Encoder};
use crate::{
	error::Error,
	registry::{Field, TypeExpr},
	value::Value,
};

impl<'r> Decoder<'r, '_> {
	/// Fields in declaration order, keyed by their declared names.
	pub(super) fn fields(&mut self, fields: &'r [Field]) -> Result<Value, Error> {
		let mut record = Vec::with_capacity(fields.len());
		for field in fields {
			record.push((field.name.clone(), self.decode(&field.ty)?));
		}
		Ok(Value::Record(record))
	}

	pub(super) fn tuple(&mut self, items: &'r [TypeExpr]) -> Result<Value, Error> {
		if items.is_empty() {
			return Ok(Value::Null);
		}
		let mut values = Vec::with_capacity(items.len());
		for item in items {
			values.push(self.decode(item)?);
		}
		Ok(Value::Sequence(values))
	}

	pub(super) fn array(&mut self, inner: &'r TypeExpr, len: usize) -> Result<Value, Error> {
		if self.is_byte(inner)? {
			return Ok(Value::Bytes(self.cursor.take(len)?.to_vec()));
		}
		self.items(inner, len).map(Value::Sequence)
	}
}

impl<'r> Encoder<'r> {
	/// Writes fields in declaration order whatever the order of the record's keys. A field is
	/// addressed by its declared name or by its `_alias` wire name.
	pub(super) fn fields(&mut self, ty: &str, fields: &'r [Field], value: &Value) -> Result<(), Error> {
		match value {
			Value::Record(entries) => {
				if let Some((key, _)) = entries
					.iter()
					.find(|(key, _)| !fields.iter().any(|field| field.matches(key)))
				{
					return Err(Error::TypeMismatch {
						expected: format!("a field of {ty}"),
						found: format!("field {key}"),
					});
				}
				for field in fields {
					let value = entries
						.iter()
						.rev()
						.find(|(key, _)| field.matches(key))
						.map(|(_, value)| value)
						.ok_or_else(|| Error::MissingField {
							ty: ty.to_string(),
							field: field.name.clone(),
						})?;
					self.encode(&field.ty, value)?;
				}
				Ok(())
			},
			// positional form
			Value::Sequence(items) if items.len() == fields.len() => {
				for (field, value) in fields.iter().zip(items) {
					self.encode(&field.ty, value)?;
				}
				Ok(())
			},
			Value::Null if fields.is_empty() => Ok(()),
			other => Err(Error::mismatch(ty, other)),
		}
	}

	pub(super) fn tuple(&mut self, items: &'r [TypeExpr], value: &Value) -> Result<(), Error> {
		match value {
			Value::Null if items.is_empty() => Ok(()),
			Value::Sequence(values) if values.len() == items.len() => {
				for (item, value) in items.iter().zip(values) {
					self.encode(item, value)?;
				}
				Ok(())
			},
			other => Err(Error::mismatch(TypeExpr::Tuple(items.to_vec()), other)),
		}
	}

	pub(super) fn array(&mut self, inner: &'r TypeExpr, len: usize, value: &Value) -> Result<(), Error> {
		if self.is_byte(inner)? {
			let bytes = primitive::bytes(value)?;
			if bytes.len() != len {
				return Err(Error::TypeMismatch {
					expected: format!("[u8;{len}]"),
					found: format!("{} bytes", bytes.len()),
				});
			}
			self.out.extend_from_slice(&bytes);
			return Ok(());
		}

		match value {
			Value::Sequence(values) if values.len() == len => {
				for value in values {
					self.encode(inner, value)?;
				}
				Ok(())
			},
			other => Err(Error::mismatch(format!("[{inner};{len}]"), other)),
		}
	}
}
