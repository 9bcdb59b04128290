use super::expr::TypeExpr;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use strum::{Display, EnumString};

/// Types with a fixed wire format that every snapshot may reference without defining.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Primitive {
	#[strum(serialize = "bool")]
	Bool,
	#[strum(serialize = "u8")]
	U8,
	#[strum(serialize = "u16")]
	U16,
	#[strum(serialize = "u32")]
	U32,
	#[strum(serialize = "u64")]
	U64,
	#[strum(serialize = "u128")]
	U128,
	#[strum(to_string = "u256", serialize = "U256")]
	U256,
	#[strum(serialize = "i8")]
	I8,
	#[strum(serialize = "i16")]
	I16,
	#[strum(serialize = "i32")]
	I32,
	#[strum(serialize = "i64")]
	I64,
	#[strum(serialize = "i128")]
	I128,
	#[strum(to_string = "i256", serialize = "I256")]
	I256,
	#[strum(serialize = "Bytes")]
	Bytes,
	#[strum(to_string = "Text", serialize = "Str", serialize = "String")]
	Text,
	#[strum(serialize = "Null")]
	Null,
}

impl Primitive {
	/// Encoded width of fixed-size primitives.
	pub fn width(self) -> Option<usize> {
		Some(match self {
			Primitive::Null => 0,
			Primitive::Bool | Primitive::U8 | Primitive::I8 => 1,
			Primitive::U16 | Primitive::I16 => 2,
			Primitive::U32 | Primitive::I32 => 4,
			Primitive::U64 | Primitive::I64 => 8,
			Primitive::U128 | Primitive::I128 => 16,
			Primitive::U256 | Primitive::I256 => 32,
			Primitive::Bytes | Primitive::Text => return None,
		})
	}

	pub fn is_unsigned(self) -> bool {
		matches!(
			self,
			Primitive::U8
				| Primitive::U16
				| Primitive::U32
				| Primitive::U64
				| Primitive::U128
				| Primitive::U256
		)
	}
}

/// Well-known names the generated tables use without defining them.
const WELL_KNOWN: &[(&str, &str)] = &[
	("H64", "[u8;8]"),
	("H128", "[u8;16]"),
	("H160", "[u8;20]"),
	("H256", "[u8;32]"),
	("H512", "[u8;64]"),
	("AccountId20", "[u8;20]"),
	("AccountId32", "[u8;32]"),
	("Percent", "u8"),
	("Permill", "u32"),
	("Perbill", "u32"),
	("Perquintill", "u64"),
];

static WELL_KNOWN_EXPRS: Lazy<HashMap<&'static str, TypeExpr>> = Lazy::new(|| {
	WELL_KNOWN
		.iter()
		.map(|(name, expr)| {
			let expr = TypeExpr::parse(expr).expect("well-known expressions are valid");
			(*name, expr)
		})
		.collect()
});

/// Expression a well-known name stands for, if it is one.
pub fn well_known(name: &str) -> Option<&'static TypeExpr> {
	WELL_KNOWN_EXPRS.get(name)
}
