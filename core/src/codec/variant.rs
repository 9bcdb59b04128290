use super::{primitive, Decoder, Encoder};
use crate::{
	error::Error,
	registry::{BitFlagsDef, EnumDef, Primitive, VariantPayload},
	value::Value,
};
use tracing::trace;

impl<'r> Decoder<'r, '_> {
	pub(super) fn enumeration(&mut self, ty: &'r str, def: &'r EnumDef) -> Result<Value, Error> {
		let offset = self.cursor.offset();
		let index = self.cursor.byte()?;
		let variant = def
			.variants
			.get(usize::from(index))
			.filter(|variant| !variant.is_placeholder())
			.ok_or_else(|| Error::UnknownVariant {
				ty: ty.to_string(),
				variant: format!("#{index} at offset {offset}"),
			})?;
		trace!(ty, variant = %variant.name, index, offset, "Decoding variant");

		let payload = match &variant.payload {
			VariantPayload::None => None,
			VariantPayload::Type(expr) => Some(self.decode(expr)?),
			VariantPayload::Fields(fields) => Some(self.fields(fields)?),
		};
		Ok(Value::variant(
			variant.name.clone(),
			payload.filter(|payload| *payload != Value::Null),
		))
	}

	pub(super) fn bit_flags(&mut self, ty: &'r str, def: &'r BitFlagsDef) -> Result<Value, Error> {
		let bytes = self.cursor.take(def.bit_length as usize / 8)?;
		let mut wide = [0u8; 16];
		wide[..bytes.len()].copy_from_slice(bytes);
		let bits = u128::from_le_bytes(wide);

		let declared = def.flags.iter().fold(0, |mask, (_, flag)| mask | flag);
		if bits & !declared != 0 {
			return Err(Error::UnknownFlagBits {
				ty: ty.to_string(),
				bits: bits & !declared,
			});
		}
		Ok(Value::Flags(
			def.flags
				.iter()
				.filter(|(_, flag)| *flag != 0 && bits & flag == *flag)
				.map(|(name, _)| name.clone())
				.collect(),
		))
	}
}

impl<'r> Encoder<'r> {
	/// Accepts a variant value, a bare variant name or a single-entry `{ name: payload }` record.
	pub(super) fn enumeration(&mut self, ty: &'r str, def: &'r EnumDef, value: &Value) -> Result<(), Error> {
		let (name, payload) = match value {
			Value::Variant(name, payload) => (name.as_str(), payload.as_deref()),
			Value::Text(name) => (name.as_str(), None),
			Value::Record(fields) if fields.len() == 1 => (fields[0].0.as_str(), Some(&fields[0].1)),
			other => return Err(Error::mismatch(format!("variant of {ty}"), other)),
		};
		let (index, variant) = def.variant(name).ok_or_else(|| Error::UnknownVariant {
			ty: ty.to_string(),
			variant: name.to_string(),
		})?;
		self.out.push(index);

		match (&variant.payload, payload) {
			(VariantPayload::None, None | Some(Value::Null)) => Ok(()),
			(VariantPayload::None, Some(other)) => {
				Err(Error::mismatch(format!("{ty}::{name} without payload"), other))
			},
			(VariantPayload::Type(expr), payload) => self.encode(expr, payload.unwrap_or(&Value::Null)),
			(VariantPayload::Fields(fields), payload) => {
				self.fields(ty, fields, payload.unwrap_or(&Value::Null))
			},
		}
	}

	/// Accepts flag names or the raw bits.
	pub(super) fn bit_flags(&mut self, ty: &'r str, def: &'r BitFlagsDef, value: &Value) -> Result<(), Error> {
		let flag = |name: &str| {
			def.flags
				.iter()
				.find(|(flag, _)| flag == name)
				.map(|(_, bits)| *bits)
				.ok_or_else(|| Error::UnknownFlag {
					ty: ty.to_string(),
					flag: name.to_string(),
				})
		};

		let bits = match value {
			Value::Flags(names) => names
				.iter()
				.try_fold(0, |bits, name| Ok::<_, Error>(bits | flag(name.as_str())?))?,
			Value::Sequence(items) => items.iter().try_fold(0, |bits, item| match item {
				Value::Text(name) => Ok(bits | flag(name.as_str())?),
				other => Err(Error::mismatch(format!("flag of {ty}"), other)),
			})?,
			Value::Text(name) => flag(name.as_str())?,
			Value::Null => 0,
			raw => {
				let width = match def.bit_length {
					8 => Primitive::U8,
					16 => Primitive::U16,
					32 => Primitive::U32,
					64 => Primitive::U64,
					_ => Primitive::U128,
				};
				let bits = primitive::unsigned(width, raw)?.low_u128();
				let declared = def.flags.iter().fold(0, |mask, (_, flag)| mask | flag);
				if bits & !declared != 0 {
					return Err(Error::UnknownFlagBits {
						ty: ty.to_string(),
						bits: bits & !declared,
					});
				}
				bits
			},
		};
		self.out
			.extend_from_slice(&bits.to_le_bytes()[..def.bit_length as usize / 8]);
		Ok(())
	}
}
