//! Grammar for the type strings used throughout a snapshot.
//!
//! ```text
//! expr  := word [ '<' expr { ',' expr } '>' ]
//!        | '(' [ expr { ',' expr } [ ',' ] ] ')'
//!        | '[' expr ';' number ']'
//! ```
//!
//! Angle brackets, parentheses, brackets, commas and semicolons are structural. A word is a run
//! of identifier characters and `::` path separators.

use super::MAX_DEPTH;
use crate::error::Error;
use itertools::Itertools;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeExpr {
	/// Registry entry or builtin primitive, e.g. `FrameSystemAccountInfo` or `u32`.
	Named(String),
	Vec(Box<TypeExpr>),
	Option(Box<TypeExpr>),
	Compact(Box<TypeExpr>),
	Result(Box<TypeExpr>, Box<TypeExpr>),
	BTreeMap(Box<TypeExpr>, Box<TypeExpr>),
	BTreeSet(Box<TypeExpr>),
	/// Fixed-length array, `[T;N]`.
	Array(Box<TypeExpr>, usize),
	/// Tuple, `(A,B)`; the empty tuple `()` is the unit type.
	Tuple(Vec<TypeExpr>),
	/// Any other generic wrapper, left for the resolver to interpret.
	Generic(String, Vec<TypeExpr>),
}

impl TypeExpr {
	pub fn named(name: impl Into<String>) -> Self {
		TypeExpr::Named(name.into())
	}

	pub fn parse(input: &str) -> Result<Self, Error> {
		let tokens = tokenize(input)?;
		let mut parser = Parser {
			input,
			tokens,
			position: 0,
			depth: 0,
		};
		let expr = parser.expr()?;
		if let Some(token) = parser.peek() {
			return Err(parser.error(format!("unexpected trailing {token}")));
		}
		Ok(expr)
	}
}

impl fmt::Display for TypeExpr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TypeExpr::Named(name) => f.write_str(name),
			TypeExpr::Vec(inner) => write!(f, "Vec<{inner}>"),
			TypeExpr::Option(inner) => write!(f, "Option<{inner}>"),
			TypeExpr::Compact(inner) => write!(f, "Compact<{inner}>"),
			TypeExpr::Result(ok, err) => write!(f, "Result<{ok},{err}>"),
			TypeExpr::BTreeMap(key, value) => write!(f, "BTreeMap<{key},{value}>"),
			TypeExpr::BTreeSet(inner) => write!(f, "BTreeSet<{inner}>"),
			TypeExpr::Array(inner, len) => write!(f, "[{inner};{len}]"),
			TypeExpr::Tuple(items) => write!(f, "({})", items.iter().join(",")),
			TypeExpr::Generic(name, args) => write!(f, "{name}<{}>", args.iter().join(",")),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token<'a> {
	Word(&'a str),
	Open(char),
	Close(char),
	Comma,
	Semicolon,
}

impl fmt::Display for Token<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Token::Word(word) => write!(f, "`{word}`"),
			Token::Open(c) | Token::Close(c) => write!(f, "`{c}`"),
			Token::Comma => f.write_str("`,`"),
			Token::Semicolon => f.write_str("`;`"),
		}
	}
}

fn is_word_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

fn tokenize(input: &str) -> Result<Vec<Token<'_>>, Error> {
	let mut tokens = Vec::new();
	let mut chars = input.char_indices().peekable();
	while let Some((start, c)) = chars.next() {
		let token = match c {
			c if c.is_whitespace() => continue,
			'<' | '(' | '[' => Token::Open(c),
			'>' | ')' | ']' => Token::Close(c),
			',' => Token::Comma,
			';' => Token::Semicolon,
			c if is_word_char(c) => {
				let mut end = start + c.len_utf8();
				while let Some((index, next)) = chars.peek().copied() {
					if !is_word_char(next) {
						break;
					}
					end = index + next.len_utf8();
					chars.next();
				}
				Token::Word(&input[start..end])
			},
			other => {
				return Err(Error::malformed(
					input,
					format!("unexpected character {other:?} at {start}"),
				))
			},
		};
		tokens.push(token);
	}
	Ok(tokens)
}

struct Parser<'a> {
	input: &'a str,
	tokens: Vec<Token<'a>>,
	position: usize,
	depth: usize,
}

impl<'a> Parser<'a> {
	fn error(&self, reason: impl Into<String>) -> Error {
		Error::malformed(self.input, reason)
	}

	fn peek(&self) -> Option<Token<'a>> {
		self.tokens.get(self.position).copied()
	}

	fn next(&mut self) -> Result<Token<'a>, Error> {
		let token = self
			.peek()
			.ok_or_else(|| self.error("unexpected end of expression"))?;
		self.position += 1;
		Ok(token)
	}

	fn expect(&mut self, expected: Token<'a>) -> Result<(), Error> {
		match self.next()? {
			token if token == expected => Ok(()),
			token => Err(self.error(format!("expected {expected}, found {token}"))),
		}
	}

	fn expr(&mut self) -> Result<TypeExpr, Error> {
		if self.depth == MAX_DEPTH {
			return Err(self.error(format!("nested deeper than {MAX_DEPTH} levels")));
		}
		self.depth += 1;
		let expr = self.term();
		self.depth -= 1;
		expr
	}

	fn term(&mut self) -> Result<TypeExpr, Error> {
		match self.next()? {
			Token::Open('(') => self.tuple(),
			Token::Open('[') => self.array(),
			Token::Word(word) => {
				if self.peek() != Some(Token::Open('<')) {
					return Ok(TypeExpr::Named(word.to_string()));
				}
				self.position += 1;
				let args = self.list(Token::Close('>'))?;
				if args.is_empty() {
					return Err(self.error(format!("`{word}<>` has no type arguments")));
				}
				self.generic(word, args)
			},
			token => Err(self.error(format!("unexpected {token}"))),
		}
	}

	/// Comma separated expressions up to and including `close`; a trailing comma is allowed.
	fn list(&mut self, close: Token<'a>) -> Result<Vec<TypeExpr>, Error> {
		let mut items = Vec::new();
		loop {
			if self.peek() == Some(close) {
				self.position += 1;
				return Ok(items);
			}
			items.push(self.expr()?);
			match self.next()? {
				Token::Comma => continue,
				token if token == close => return Ok(items),
				token => return Err(self.error(format!("expected `,` or {close}, found {token}"))),
			}
		}
	}

	fn tuple(&mut self) -> Result<TypeExpr, Error> {
		self.list(Token::Close(')')).map(TypeExpr::Tuple)
	}

	fn array(&mut self) -> Result<TypeExpr, Error> {
		let inner = self.expr()?;
		self.expect(Token::Semicolon)?;
		let len = match self.next()? {
			Token::Word(word) => word
				.parse::<usize>()
				.map_err(|_| self.error(format!("array length `{word}` is not a number")))?,
			token => return Err(self.error(format!("expected array length, found {token}"))),
		};
		self.expect(Token::Close(']'))?;
		Ok(TypeExpr::Array(Box::new(inner), len))
	}

	fn generic(&self, name: &str, mut args: Vec<TypeExpr>) -> Result<TypeExpr, Error> {
		let arity = match name {
			"Vec" | "Option" | "Compact" | "BTreeSet" => 1,
			"Result" | "BTreeMap" => 2,
			_ => return Ok(TypeExpr::Generic(name.to_string(), args)),
		};
		if args.len() != arity {
			return Err(self.error(format!(
				"`{name}` takes {arity} type argument(s), found {}",
				args.len()
			)));
		}
		let first = Box::new(args.remove(0));
		Ok(match name {
			"Vec" => TypeExpr::Vec(first),
			"Option" => TypeExpr::Option(first),
			"Compact" => TypeExpr::Compact(first),
			"BTreeSet" => TypeExpr::BTreeSet(first),
			"Result" => TypeExpr::Result(first, Box::new(args.remove(0))),
			_ => TypeExpr::BTreeMap(first, Box::new(args.remove(0))),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::TypeExpr::{self, *};
	use super::MAX_DEPTH;
	use crate::error::ErrorKind;
	use test_case::test_case;

	fn named(name: &str) -> Box<TypeExpr> {
		Box::new(TypeExpr::named(name))
	}

	#[test]
	fn parses_plain_names() {
		assert_eq!(
			TypeExpr::parse("FrameSystemAccountInfo").unwrap(),
			TypeExpr::named("FrameSystemAccountInfo")
		);
		assert_eq!(
			TypeExpr::parse(" sp_core::H256 ").unwrap(),
			TypeExpr::named("sp_core::H256")
		);
	}

	#[test]
	fn parses_nested_containers() {
		assert_eq!(
			TypeExpr::parse("Vec<(AccountId20,Option<Compact<u128>>)>").unwrap(),
			Vec(Box::new(Tuple(vec![
				TypeExpr::named("AccountId20"),
				Option(Box::new(Compact(named("u128")))),
			])))
		);
		assert_eq!(
			TypeExpr::parse("Result<Null, SpRuntimeDispatchError>").unwrap(),
			Result(named("Null"), named("SpRuntimeDispatchError"))
		);
		assert_eq!(
			TypeExpr::parse("BTreeMap<u32,BTreeSet<H160>>").unwrap(),
			BTreeMap(named("u32"), Box::new(BTreeSet(named("H160"))))
		);
	}

	#[test]
	fn parses_arrays_and_tuples() {
		assert_eq!(TypeExpr::parse("[u8;32]").unwrap(), Array(named("u8"), 32));
		assert_eq!(
			TypeExpr::parse("([u8;4],Bytes)").unwrap(),
			Tuple(vec![Array(named("u8"), 4), TypeExpr::named("Bytes")])
		);
		assert_eq!(TypeExpr::parse("()").unwrap(), Tuple(vec![]));
		assert_eq!(
			TypeExpr::parse("(u32,)").unwrap(),
			Tuple(vec![TypeExpr::named("u32")])
		);
	}

	#[test]
	fn keeps_unknown_wrappers_generic() {
		assert_eq!(
			TypeExpr::parse("HashMap<H160,Box<Call>>").unwrap(),
			Generic(
				"HashMap".into(),
				vec![
					TypeExpr::named("H160"),
					Generic("Box".into(), vec![TypeExpr::named("Call")])
				]
			)
		);
	}

	#[test_case("(u32,u32)")]
	#[test_case("[u8;32]")]
	#[test_case("Vec<(H256,Option<Compact<u64>>)>")]
	#[test_case("BTreeMap<u32,Result<(),Bytes>>")]
	#[test_case("HashMap<H160,Vec<u8>>")]
	fn display_reproduces_the_canonical_spelling(input: &str) {
		assert_eq!(TypeExpr::parse(input).unwrap().to_string(), input);
	}

	#[test_case("" ; "empty")]
	#[test_case("Vec<u8" ; "unclosed angle")]
	#[test_case("Vec<u8>>" ; "extra close")]
	#[test_case("Vec<>" ; "no arguments")]
	#[test_case("Option<u8,u16>" ; "wrong arity")]
	#[test_case("[u8;x]" ; "non numeric length")]
	#[test_case("[u8]" ; "missing length")]
	#[test_case("(u8 u16)" ; "missing comma")]
	#[test_case("&[u8]" ; "unsupported character")]
	fn rejects_malformed_expressions(input: &str) {
		let error = TypeExpr::parse(input).unwrap_err();
		assert_eq!(error.kind(), ErrorKind::MalformedContainerSyntax);
	}

	#[test]
	fn bounds_nesting_depth() {
		let nested = |depth: usize| format!("{}u8{}", "Vec<".repeat(depth), ">".repeat(depth));
		assert!(TypeExpr::parse(&nested(MAX_DEPTH - 1)).is_ok());

		let error = TypeExpr::parse(&nested(MAX_DEPTH)).unwrap_err();
		assert_eq!(error.kind(), ErrorKind::MalformedContainerSyntax);
		let error = TypeExpr::parse(&nested(200_000)).unwrap_err();
		assert_eq!(error.kind(), ErrorKind::MalformedContainerSyntax);
		let error = TypeExpr::parse(&format!("{}u8", "(".repeat(200_000))).unwrap_err();
		assert_eq!(error.kind(), ErrorKind::MalformedContainerSyntax);
	}
}
