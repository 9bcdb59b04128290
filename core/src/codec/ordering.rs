//! Ordering of decoded values the way the runtime's derived `Ord` orders the typed originals.
//!
//! Sorted containers must be written in ascending key order. Keys are compared in their
//! canonical decoded form and by their declared type: enums by discriminant, structs field by
//! field, integers numerically.

use crate::{
	registry::{Field, Registry, Resolved, TypeExpr, VariantPayload},
	value::Value,
};
use std::cmp::Ordering;

/// Compares two values of type `expr`. Values that do not have the shape of `expr` compare equal.
pub(super) fn compare(registry: &Registry, expr: &TypeExpr, a: &Value, b: &Value) -> Ordering {
	let Ok(resolved) = registry.resolve_expr(expr) else {
		return Ordering::Equal;
	};

	match (resolved, a, b) {
		(Resolved::Struct(_, def), Value::Record(a), Value::Record(b)) => fields(registry, &def.fields, a, b),
		(Resolved::Enum(_, def), Value::Variant(a_name, a_payload), Value::Variant(b_name, b_payload)) => {
			let a_index = def.variant(a_name).map(|(index, _)| index);
			let b_index = def.variant(b_name).map(|(index, _)| index);
			let variant = def.variant(a_name).map(|(_, variant)| variant);
			a_index.cmp(&b_index).then_with(|| match (variant, a_payload, b_payload) {
				(Some(variant), Some(a), Some(b)) => match (&variant.payload, a.as_ref(), b.as_ref()) {
					(VariantPayload::Type(expr), a, b) => compare(registry, expr, a, b),
					(VariantPayload::Fields(declared), Value::Record(a), Value::Record(b)) => {
						fields(registry, declared, a, b)
					},
					_ => Ordering::Equal,
				},
				_ => a_payload.is_some().cmp(&b_payload.is_some()),
			})
		},
		(Resolved::BitFlags(_, def), Value::Flags(a), Value::Flags(b)) => {
			let bits = |names: &[String]| {
				def.flags
					.iter()
					.filter(|(name, _)| names.contains(name))
					.fold(0u128, |bits, (_, flag)| bits | flag)
			};
			bits(a).cmp(&bits(b))
		},
		(
			Resolved::Vec(inner) | Resolved::Set(inner) | Resolved::Array(inner, _),
			Value::Sequence(a),
			Value::Sequence(b),
		) => lexicographic(a.iter().zip(b).map(|(a, b)| compare(registry, inner, a, b)), a.len(), b.len()),
		(Resolved::Tuple(items), Value::Sequence(a), Value::Sequence(b)) => lexicographic(
			items
				.iter()
				.zip(a.iter().zip(b))
				.map(|(item, (a, b))| compare(registry, item, a, b)),
			a.len(),
			b.len(),
		),
		(Resolved::Option(inner), Value::Option(a), Value::Option(b)) => match (a, b) {
			(Some(a), Some(b)) => compare(registry, inner, a, b),
			_ => a.is_some().cmp(&b.is_some()),
		},
		(Resolved::Result(ok, err), Value::Variant(a_name, a), Value::Variant(b_name, b)) => {
			// `Ok` sorts before `Err`
			let is_err = |name: &str| name != "Ok";
			is_err(a_name).cmp(&is_err(b_name)).then_with(|| match (a, b) {
				(Some(a), Some(b)) => {
					let expr = if is_err(a_name) { err } else { ok };
					compare(registry, expr, a, b)
				},
				_ => Ordering::Equal,
			})
		},
		(Resolved::Map(key, value), Value::Map(a), Value::Map(b)) => lexicographic(
			a.iter().zip(b).map(|((a_key, a_value), (b_key, b_value))| {
				compare(registry, key, a_key, b_key)
					.then_with(|| compare(registry, value, a_value, b_value))
			}),
			a.len(),
			b.len(),
		),
		(_, a, b) => scalar(a, b),
	}
}

fn fields(registry: &Registry, declared: &[Field], a: &[(String, Value)], b: &[(String, Value)]) -> Ordering {
	let orderings = declared
		.iter()
		.zip(a.iter().zip(b))
		.map(|(field, ((_, a), (_, b)))| compare(registry, &field.ty, a, b));
	lexicographic(orderings, a.len(), b.len())
}

fn lexicographic(mut orderings: impl Iterator<Item = Ordering>, a_len: usize, b_len: usize) -> Ordering {
	orderings
		.find(|ordering| ordering.is_ne())
		.unwrap_or_else(|| a_len.cmp(&b_len))
}

fn scalar(a: &Value, b: &Value) -> Ordering {
	match (a, b) {
		(Value::Bool(a), Value::Bool(b)) => a.cmp(b),
		(Value::Unsigned(a), Value::Unsigned(b)) => a.cmp(b),
		(Value::Signed(a), Value::Signed(b)) => a.cmp(b),
		(Value::U256(a), Value::U256(b)) => a.cmp(b),
		(Value::I256(a), Value::I256(b)) => a.cmp(b),
		(Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
		(Value::Text(a), Value::Text(b)) => a.cmp(b),
		_ => Ordering::Equal,
	}
}
