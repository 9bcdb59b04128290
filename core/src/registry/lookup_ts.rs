//! Reader for the `lookup.ts` tables emitted by the type generator.
//!
//! The generator writes a single `export default { ... }` object literal with one key per type
//! and a `/** LookupN: path */` comment above each key. This module turns it into the JSON
//! envelope understood by [`Snapshot::from_json`](super::Snapshot::from_json).

use super::MAX_DEPTH;
use crate::error::{Error, SnapshotError};
use logos::Logos;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value as Json};
use std::ops::Range;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
enum Token {
	#[token("/*", block_comment)]
	BlockComment,
	#[token("{")]
	LBrace,
	#[token("}")]
	RBrace,
	#[token("[")]
	LBracket,
	#[token("]")]
	RBracket,
	#[token(":")]
	Colon,
	#[token(",")]
	Comma,
	#[token(";")]
	Semicolon,
	#[regex(r#""([^"\\\n]|\\.)*""#)]
	DoubleQuoted,
	#[regex(r"'([^'\\\n]|\\.)*'")]
	SingleQuoted,
	#[regex(r"-?[0-9]+")]
	Number,
	#[regex(r"[A-Za-z_$][A-Za-z0-9_$]*")]
	Ident,
}

/// Consumes the rest of a `/* ... */` comment; an unterminated comment is a lexing error.
fn block_comment(lex: &mut logos::Lexer<Token>) -> bool {
	match lex.remainder().find("*/") {
		Some(end) => {
			lex.bump(end + 2);
			true
		},
		None => false,
	}
}

static LOOKUP_DOC: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"Lookup(\d+):([^\n]*)").expect("lookup doc pattern is valid"));

fn syntax(offset: usize, reason: impl Into<String>) -> Error {
	SnapshotError::Syntax {
		offset,
		reason: reason.into(),
	}
	.into()
}

fn lex(source: &str) -> Result<Vec<(Token, Range<usize>)>, Error> {
	let mut lexer = Token::lexer(source);
	let mut tokens = Vec::new();
	while let Some(token) = lexer.next() {
		match token {
			Ok(token) => tokens.push((token, lexer.span())),
			Err(()) => {
				return Err(syntax(
					lexer.span().start,
					format!("unexpected {:?}", lexer.slice()),
				))
			},
		}
	}
	Ok(tokens)
}

fn unquote(quoted: &str) -> String {
	let inner = &quoted[1..quoted.len() - 1];
	let mut unquoted = String::with_capacity(inner.len());
	let mut chars = inner.chars();
	while let Some(c) = chars.next() {
		if c != '\\' {
			unquoted.push(c);
			continue;
		}
		match chars.next() {
			Some('n') => unquoted.push('\n'),
			Some('t') => unquoted.push('\t'),
			Some('r') => unquoted.push('\r'),
			Some('u') => {
				let code = chars.by_ref().take(4).collect::<String>();
				match u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
					Some(c) => unquoted.push(c),
					None => {
						unquoted.push_str("\\u");
						unquoted.push_str(&code);
					},
				}
			},
			Some(other) => unquoted.push(other),
			None => unquoted.push('\\'),
		}
	}
	unquoted
}

/// Extracts `(index, path)` from a `/** LookupN: path */` comment.
fn lookup_doc(comment: &str) -> Option<(u32, String)> {
	let captures = LOOKUP_DOC.captures(comment)?;
	let index = captures[1].parse().ok()?;
	let path = captures[2].trim().trim_end_matches("*/").trim().to_string();
	Some((index, path))
}

struct Parser<'a> {
	source: &'a str,
	tokens: Vec<(Token, Range<usize>)>,
	position: usize,
	depth: usize,
}

impl<'a> Parser<'a> {
	fn offset(&self) -> usize {
		self.tokens
			.get(self.position)
			.map(|(_, span)| span.start)
			.unwrap_or(self.source.len())
	}

	fn raw_peek(&self) -> Option<Token> {
		self.tokens.get(self.position).map(|(token, _)| *token)
	}

	fn skip_comments(&mut self) {
		while self.raw_peek() == Some(Token::BlockComment) {
			self.position += 1;
		}
	}

	fn peek(&mut self) -> Option<Token> {
		self.skip_comments();
		self.raw_peek()
	}

	fn next(&mut self) -> Result<(Token, &'a str), Error> {
		self.skip_comments();
		let (token, span) = self
			.tokens
			.get(self.position)
			.cloned()
			.ok_or_else(|| syntax(self.source.len(), "unexpected end of input"))?;
		self.position += 1;
		Ok((token, &self.source[span]))
	}

	fn expect(&mut self, expected: Token) -> Result<(), Error> {
		let offset = self.offset();
		match self.next()? {
			(token, _) if token == expected => Ok(()),
			(_, slice) => Err(syntax(offset, format!("expected {expected:?}, found {slice:?}"))),
		}
	}

	/// Skips `export default` in front of the table.
	fn preamble(&mut self) -> Result<(), Error> {
		for keyword in ["export", "default"] {
			let offset = self.offset();
			match self.next()? {
				(Token::Ident, slice) if slice == keyword => {},
				(Token::LBrace, _) if keyword == "export" => {
					// bare object literal
					self.position -= 1;
					return Ok(());
				},
				(_, slice) => return Err(syntax(offset, format!("expected `{keyword}`, found {slice:?}"))),
			}
		}
		Ok(())
	}

	fn key(&mut self) -> Result<String, Error> {
		let offset = self.offset();
		match self.next()? {
			(Token::Ident | Token::Number, slice) => Ok(slice.to_string()),
			(Token::DoubleQuoted | Token::SingleQuoted, slice) => Ok(unquote(slice)),
			(_, slice) => Err(syntax(offset, format!("expected a key, found {slice:?}"))),
		}
	}

	/// The top level table; records the doc comment preceding each key.
	fn table(&mut self) -> Result<(Map<String, Json>, Map<String, Json>), Error> {
		self.expect(Token::LBrace)?;
		let mut types = Map::new();
		let mut docs = Map::new();
		loop {
			let mut doc = None;
			while self.raw_peek() == Some(Token::BlockComment) {
				let span = self.tokens[self.position].1.clone();
				doc = lookup_doc(&self.source[span]).or(doc);
				self.position += 1;
			}

			if self.peek() == Some(Token::RBrace) {
				self.position += 1;
				return Ok((types, docs));
			}

			let name = self.key()?;
			self.expect(Token::Colon)?;
			let definition = self.value()?;
			if let Some((index, path)) = doc {
				let mut object = Map::new();
				object.insert("lookup".into(), index.into());
				object.insert("path".into(), path.into());
				docs.insert(name.clone(), Json::Object(object));
			}
			types.insert(name, definition);

			let offset = self.offset();
			match self.next()? {
				(Token::Comma, _) => continue,
				(Token::RBrace, _) => return Ok((types, docs)),
				(_, slice) => return Err(syntax(offset, format!("expected `,` or `}}`, found {slice:?}"))),
			}
		}
	}

	fn value(&mut self) -> Result<Json, Error> {
		let offset = self.offset();
		match self.next()? {
			(Token::LBrace, _) => self.nested(offset, Self::object),
			(Token::LBracket, _) => self.nested(offset, Self::array),
			(Token::DoubleQuoted | Token::SingleQuoted, slice) => Ok(Json::String(unquote(slice))),
			(Token::Number, slice) => Ok(slice
				.parse::<i64>()
				.map(Json::from)
				.unwrap_or_else(|_| Json::String(slice.to_string()))),
			(Token::Ident, "true") => Ok(Json::Bool(true)),
			(Token::Ident, "false") => Ok(Json::Bool(false)),
			(Token::Ident, "null") => Ok(Json::Null),
			(_, slice) => Err(syntax(offset, format!("expected a value, found {slice:?}"))),
		}
	}

	fn nested(
		&mut self,
		offset: usize,
		parse: fn(&mut Self) -> Result<Json, Error>,
	) -> Result<Json, Error> {
		if self.depth == MAX_DEPTH {
			return Err(syntax(offset, format!("nested deeper than {MAX_DEPTH} levels")));
		}
		self.depth += 1;
		let value = parse(self);
		self.depth -= 1;
		value
	}

	fn object(&mut self) -> Result<Json, Error> {
		let mut object = Map::new();
		loop {
			if self.peek() == Some(Token::RBrace) {
				self.position += 1;
				return Ok(Json::Object(object));
			}
			let key = self.key()?;
			self.expect(Token::Colon)?;
			object.insert(key, self.value()?);

			let offset = self.offset();
			match self.next()? {
				(Token::Comma, _) => continue,
				(Token::RBrace, _) => return Ok(Json::Object(object)),
				(_, slice) => return Err(syntax(offset, format!("expected `,` or `}}`, found {slice:?}"))),
			}
		}
	}

	fn array(&mut self) -> Result<Json, Error> {
		let mut items = Vec::new();
		loop {
			if self.peek() == Some(Token::RBracket) {
				self.position += 1;
				return Ok(Json::Array(items));
			}
			items.push(self.value()?);

			let offset = self.offset();
			match self.next()? {
				(Token::Comma, _) => continue,
				(Token::RBracket, _) => return Ok(Json::Array(items)),
				(_, slice) => return Err(syntax(offset, format!("expected `,` or `]`, found {slice:?}"))),
			}
		}
	}
}

/// Parses a generated table into the `{ "types", "docs" }` snapshot envelope.
pub fn parse(source: &str) -> Result<Json, Error> {
	let mut parser = Parser {
		source,
		tokens: lex(source)?,
		position: 0,
		depth: 0,
	};
	parser.preamble()?;
	let (types, docs) = parser.table()?;
	if parser.peek() == Some(Token::Semicolon) {
		parser.position += 1;
	}
	if parser.peek().is_some() {
		return Err(syntax(parser.offset(), "unexpected content after the table"));
	}

	let mut envelope = Map::new();
	envelope.insert("types".into(), Json::Object(types));
	envelope.insert("docs".into(), Json::Object(docs));
	Ok(Json::Object(envelope))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		error::ErrorKind,
		registry::{Snapshot, TypeDescriptor},
	};
	use serde_json::json;

	const EXCERPT: &str = include_str!("../test_assets/lookup_excerpt.ts");

	#[test]
	fn reads_generated_tables() {
		let envelope = parse(EXCERPT).unwrap();
		let types = envelope["types"].as_object().unwrap();
		assert_eq!(
			types.keys().take(3).collect::<Vec<_>>(),
			vec!["FrameSystemAccountInfo", "PalletBalancesAccountData", "SpRuntimeDigest"]
		);
		assert_eq!(
			types["FrameSystemAccountInfo"],
			json!({
				"nonce": "u32",
				"consumers": "u32",
				"providers": "u32",
				"sufficients": "u32",
				"data": "PalletBalancesAccountData",
			})
		);
		assert_eq!(types["FrameSupportWeightsPays"], json!({ "_enum": ["Yes", "No"] }));
		assert_eq!(
			types["FrameSystemEvent"]["_enum"]["Remarked"],
			json!({ "_alias": { "hash_": "hash" }, "sender": "AccountId20", "hash_": "H256" })
		);
		assert_eq!(types["PalletIdentityBitFlags"]["_bitLength"], json!(64));
	}

	#[test]
	fn recovers_lookup_docs() {
		let envelope = parse(EXCERPT).unwrap();
		assert_eq!(
			envelope["docs"]["FrameSystemAccountInfo"],
			json!({
				"lookup": 3,
				"path": "frame_system::AccountInfo<Index, pallet_balances::AccountData<Balance>>"
			})
		);
	}

	#[test]
	fn excerpt_registers_as_a_snapshot() {
		let snapshot = Snapshot::from_lookup_ts(EXCERPT).unwrap();
		assert!(matches!(
			snapshot.entries["SpRuntimeDigestDigestItem"].descriptor,
			TypeDescriptor::Enum(_)
		));
		assert_eq!(
			snapshot.entries["FrameSupportWeightsPays"]
				.doc
				.as_ref()
				.map(|doc| doc.index),
			Some(22)
		);
	}

	#[test]
	fn accepts_bare_literals_and_quoted_keys() {
		let envelope = parse(
			"{ 'A': \"u8\", \"B\": { _enum: ['X', 'Y',], }, // trailing\n C: \"Vec<u8>\" };",
		)
		.unwrap();
		assert_eq!(
			envelope["types"],
			json!({ "A": "u8", "B": { "_enum": ["X", "Y"] }, "C": "Vec<u8>" })
		);
	}

	#[test]
	fn single_line_doc_comments() {
		assert_eq!(
			lookup_doc("/** Lookup12: sp_runtime::generic::digest::Digest */"),
			Some((12, "sp_runtime::generic::digest::Digest".to_string()))
		);
		assert_eq!(lookup_doc("/* eslint-disable */"), None);
	}

	#[test]
	fn reports_syntax_errors_with_offsets() {
		let error = parse("export default { A: \"u8\" B: \"u16\" }").unwrap_err();
		assert_eq!(error.kind(), ErrorKind::Snapshot);
		assert!(matches!(
			error,
			Error::Snapshot(SnapshotError::Syntax { offset: 25, .. })
		));

		assert!(parse("export default { A: #").is_err());
		assert!(parse("export default { A: \"u8\" } extra").is_err());
	}

	#[test]
	fn bounds_nesting_depth() {
		let nested = format!(
			"export default {{ A: {}'u8'{} }}",
			"[".repeat(200_000),
			"]".repeat(200_000)
		);
		let error = parse(&nested).unwrap_err();
		assert!(matches!(error, Error::Snapshot(SnapshotError::Syntax { .. })));

		let shallow = format!("{{ A: {}'u8'{} }}", "[".repeat(8), "]".repeat(8));
		assert!(parse(&shallow).is_ok());
	}

	#[test]
	fn unquotes_escapes() {
		assert_eq!(unquote(r#""a\"b\\cA""#), "a\"b\\cA");
	}
}
