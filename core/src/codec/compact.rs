//! Compact integers: two low bits of the first byte select one of four length modes.
//!
//! Writing always picks the shortest mode. Reading accepts any well-formed mode, logging
//! a warning for non-canonical input, and only fails when the value cannot fit the target.

use super::{primitive, Cursor, Decoder, Encoder};
use crate::{error::Error, registry::Primitive, value::Value};
use codec::{Compact, Encode};
use primitive_types::U256;
use tracing::warn;

const SINGLE_BYTE_LIMIT: u32 = 1 << 6;
const TWO_BYTE_LIMIT: u32 = 1 << 14;
const FOUR_BYTE_LIMIT: u32 = 1 << 30;

fn overflow(offset: usize, target: Primitive) -> Error {
	Error::CompactOverflow {
		offset,
		target: target.to_string(),
	}
}

/// Reads a compact integer that must fit into `target`.
pub(super) fn read(cursor: &mut Cursor, target: Primitive) -> Result<U256, Error> {
	let offset = cursor.offset();
	let first = cursor.byte()?;

	let (value, canonical) = match first & 0b11 {
		0b00 => (U256::from(first >> 2), true),
		0b01 => {
			let value = u16::from_le_bytes([first, cursor.byte()?]) >> 2;
			(U256::from(value), u32::from(value) >= SINGLE_BYTE_LIMIT)
		},
		0b10 => {
			let rest = cursor.take(3)?;
			let value = u32::from_le_bytes([first, rest[0], rest[1], rest[2]]) >> 2;
			(U256::from(value), value >= TWO_BYTE_LIMIT)
		},
		_ => {
			let len = usize::from(first >> 2) + 4;
			if len > target.width().unwrap_or(32) {
				return Err(overflow(offset, target));
			}
			let value = U256::from_little_endian(cursor.take(len)?);
			let minimal = ((value.bits() + 7) / 8).max(4);
			(value, value >= U256::from(FOUR_BYTE_LIMIT) && minimal == len)
		},
	};

	if value > primitive::max_unsigned(target) {
		return Err(overflow(offset, target));
	}
	if !canonical {
		warn!(offset, %value, "Accepted non-canonical compact encoding");
	}
	Ok(value)
}

/// Appends the shortest encoding of `value`.
pub(super) fn write(out: &mut Vec<u8>, value: U256) {
	if value <= U256::from(u128::MAX) {
		Compact(value.low_u128()).encode_to(out);
		return;
	}
	let len = (value.bits() + 7) / 8;
	let mut bytes = [0u8; 32];
	value.to_little_endian(&mut bytes);
	out.push((((len - 4) as u8) << 2) | 0b11);
	out.extend_from_slice(&bytes[..len]);
}

impl Decoder<'_, '_> {
	pub(super) fn compact(&mut self, target: Primitive) -> Result<Value, Error> {
		let value = read(&mut self.cursor, target)?;
		Ok(match target {
			Primitive::U256 => Value::U256(value),
			_ => Value::Unsigned(value.low_u128()),
		})
	}

	/// Element count or byte length prefix.
	pub(super) fn length(&mut self) -> Result<usize, Error> {
		read(&mut self.cursor, Primitive::U32).map(|len| len.low_u64() as usize)
	}
}

impl Encoder<'_> {
	pub(super) fn compact(&mut self, target: Primitive, value: &Value) -> Result<(), Error> {
		let value = primitive::unsigned(target, value)?;
		write(&mut self.out, value);
		Ok(())
	}

	pub(super) fn length(&mut self, len: usize) {
		write(&mut self.out, U256::from(len));
	}
}
