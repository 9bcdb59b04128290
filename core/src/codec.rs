//! SCALE decoding and encoding driven by a [`Registry`].
//!
//! Every call resolves the requested type expression against one registry and walks the buffer
//! strictly in order; each nested value starts where the previous one ended. The first failure
//! aborts the whole call, since any skipped byte would shift every following offset.

use crate::{
	error::Error,
	registry::{Primitive, Registry, Resolved, TypeExpr, MAX_DEPTH},
	value::Value,
};
use std::sync::{mpsc::channel, Arc};
use tracing::{debug, error, trace};

mod compact;
mod composite;
mod container;
mod ordering;
mod primitive;
mod variant;

/// Read position over one input buffer.
pub(crate) struct Cursor<'b> {
	bytes: &'b [u8],
	offset: usize,
}

impl<'b> Cursor<'b> {
	pub(crate) fn new(bytes: &'b [u8]) -> Self {
		Cursor { bytes, offset: 0 }
	}

	pub(crate) fn offset(&self) -> usize {
		self.offset
	}

	pub(crate) fn remaining(&self) -> usize {
		self.bytes.len() - self.offset
	}

	pub(crate) fn take(&mut self, len: usize) -> Result<&'b [u8], Error> {
		if self.remaining() < len {
			return Err(Error::UnexpectedEof {
				offset: self.offset,
				needed: len - self.remaining(),
			});
		}
		let slice = &self.bytes[self.offset..self.offset + len];
		self.offset += len;
		Ok(slice)
	}

	pub(crate) fn byte(&mut self) -> Result<u8, Error> {
		self.take(1).map(|bytes| bytes[0])
	}
}

struct Decoder<'r, 'b> {
	registry: &'r Registry,
	cursor: Cursor<'b>,
	depth: usize,
}

impl<'r, 'b> Decoder<'r, 'b> {
	fn new(registry: &'r Registry, bytes: &'b [u8]) -> Self {
		Decoder {
			registry,
			cursor: Cursor::new(bytes),
			depth: 0,
		}
	}

	fn decode(&mut self, expr: &'r TypeExpr) -> Result<Value, Error> {
		if self.depth >= MAX_DEPTH {
			return Err(Error::RecursionLimit(MAX_DEPTH));
		}
		self.depth += 1;
		let value = match self.registry.resolve_expr(expr)? {
			Resolved::Primitive(primitive) => self.primitive(primitive),
			Resolved::Compact(target) => self.compact(target),
			Resolved::Struct(_, def) => self.fields(&def.fields),
			Resolved::Enum(name, def) => self.enumeration(name, def),
			Resolved::BitFlags(name, def) => self.bit_flags(name, def),
			Resolved::Vec(inner) => self.vec(inner),
			Resolved::Option(inner) => self.option(inner),
			Resolved::Result(ok, err) => self.result(ok, err),
			Resolved::Map(key, value) => self.map(key, value),
			Resolved::Set(inner) => self.set(inner),
			Resolved::Array(inner, len) => self.array(inner, len),
			Resolved::Tuple(items) => self.tuple(items),
		};
		self.depth -= 1;
		value
	}

	fn is_byte(&self, expr: &TypeExpr) -> Result<bool, Error> {
		is_byte(self.registry, expr)
	}
}

struct Encoder<'r> {
	registry: &'r Registry,
	out: Vec<u8>,
	depth: usize,
}

impl<'r> Encoder<'r> {
	fn new(registry: &'r Registry) -> Self {
		Encoder {
			registry,
			out: Vec::new(),
			depth: 0,
		}
	}

	fn encode(&mut self, expr: &'r TypeExpr, value: &Value) -> Result<(), Error> {
		if self.depth >= MAX_DEPTH {
			return Err(Error::RecursionLimit(MAX_DEPTH));
		}
		self.depth += 1;
		let result = match self.registry.resolve_expr(expr)? {
			Resolved::Primitive(primitive) => self.primitive(primitive, value),
			Resolved::Compact(target) => self.compact(target, value),
			Resolved::Struct(name, def) => self.fields(name, &def.fields, value),
			Resolved::Enum(name, def) => self.enumeration(name, def, value),
			Resolved::BitFlags(name, def) => self.bit_flags(name, def, value),
			Resolved::Vec(inner) => self.vec(inner, value),
			Resolved::Option(inner) => self.option(inner, value),
			Resolved::Result(ok, err) => self.result(ok, err, value),
			Resolved::Map(key, value_ty) => self.map(key, value_ty, value),
			Resolved::Set(inner) => self.set(inner, value),
			Resolved::Array(inner, len) => self.array(inner, len, value),
			Resolved::Tuple(items) => self.tuple(items, value),
		};
		self.depth -= 1;
		result
	}

	/// Encodes into a separate buffer at the current nesting depth.
	fn detached(&self, expr: &'r TypeExpr, value: &Value) -> Result<Vec<u8>, Error> {
		let mut encoder = Encoder {
			registry: self.registry,
			out: Vec::new(),
			depth: self.depth,
		};
		encoder.encode(expr, value)?;
		Ok(encoder.out)
	}

	fn is_byte(&self, expr: &TypeExpr) -> Result<bool, Error> {
		is_byte(self.registry, expr)
	}
}

/// `Vec<u8>` and `[u8; N]` travel as raw bytes.
fn is_byte(registry: &Registry, expr: &TypeExpr) -> Result<bool, Error> {
	Ok(matches!(
		registry.resolve_expr(expr)?,
		Resolved::Primitive(Primitive::U8)
	))
}

/// Decodes one value of type `ty` from the front of `bytes`.
///
/// Returns the value and the number of bytes it occupied. Trailing input is left alone, use
/// [`decode_all`] when the buffer must hold exactly one value.
pub fn decode(registry: &Registry, ty: &str, bytes: &[u8]) -> Result<(Value, usize), Error> {
	let expr = TypeExpr::parse(ty)?;
	let mut decoder = Decoder::new(registry, bytes);
	let value = decoder.decode(&expr)?;
	let consumed = decoder.cursor.offset();
	trace!(ty, consumed, "Decoded value");
	Ok((value, consumed))
}

/// Decodes a buffer that must contain exactly one value of type `ty`.
pub fn decode_all(registry: &Registry, ty: &str, bytes: &[u8]) -> Result<Value, Error> {
	let (value, consumed) = decode(registry, ty, bytes)?;
	if consumed < bytes.len() {
		return Err(Error::TrailingBytes {
			remaining: bytes.len() - consumed,
		});
	}
	Ok(value)
}

/// Encodes `value` as type `ty`. Struct fields are always written in declaration order.
pub fn encode(registry: &Registry, ty: &str, value: &Value) -> Result<Vec<u8>, Error> {
	let expr = TypeExpr::parse(ty)?;
	let mut encoder = Encoder::new(registry);
	encoder.encode(&expr, value)?;
	trace!(ty, len = encoder.out.len(), "Encoded value");
	Ok(encoder.out)
}

/// Decodes independent buffers in parallel, returning one result per input in input order.
///
/// The outer error covers failures shared by every input (an unparsable `ty`) and lost jobs.
pub fn decode_batch(
	registry: Arc<Registry>,
	ty: &str,
	inputs: Vec<Vec<u8>>,
	threads: usize,
) -> Result<Vec<Result<(Value, usize), Error>>, Error> {
	TypeExpr::parse(ty)?;

	let jobs = inputs.len();
	let pool = threadpool::ThreadPool::new(threads.max(1));
	let (tx, rx) = channel::<(usize, Result<(Value, usize), Error>)>();
	debug!(ty, jobs, threads = pool.max_count(), "Starting batch decode");

	for (index, input) in inputs.into_iter().enumerate() {
		let tx = tx.clone();
		let registry = registry.clone();
		let ty = ty.to_string();

		pool.execute(move || {
			let result = decode(&registry, &ty, &input);
			if let Err(error) = tx.send((index, result)) {
				error!("Failed to send decoded value {index}: {error}");
			};
		});
	}
	drop(tx);

	let mut results = rx.iter().take(jobs).collect::<Vec<_>>();
	if results.len() < jobs {
		let missing = (0..jobs)
			.find(|index| !results.iter().any(|(done, _)| done == index))
			.unwrap_or(results.len());
		return Err(Error::WorkerFailed(missing));
	}
	results.sort_by_key(|(index, _)| *index);
	Ok(results.into_iter().map(|(_, result)| result).collect())
}

#[cfg(test)]
pub(crate) fn test_registry(types: serde_json::Value) -> Registry {
	Registry::register(crate::registry::Snapshot::from_json(&types).unwrap())
}
