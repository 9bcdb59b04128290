use strum::{Display, IntoStaticStr};
use thiserror::Error;

/// Coarse classification of [`Error`], stable across payload changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ErrorKind {
	UnexpectedEof,
	InvalidUtf8,
	CompactOverflow,
	UnknownVariant,
	UnknownType,
	MalformedContainerSyntax,
	TypeMismatch,
	MissingField,
	IntegerOverflow,
	UnknownFlag,
	InvalidDescriptor,
	TrailingBytes,
	RecursionLimit,
	NoSnapshot,
	WorkerFailed,
	Snapshot,
}

#[derive(Error, Debug)]
pub enum Error {
	#[error("Unexpected end of input at offset {offset}: needed {needed} more byte(s)")]
	UnexpectedEof { offset: usize, needed: usize },
	#[error("Invalid UTF-8 in text at offset {offset}")]
	InvalidUtf8 { offset: usize },
	#[error("Compact value at offset {offset} does not fit into {target}")]
	CompactOverflow { offset: usize, target: String },
	#[error("Type {ty} has no variant {variant}")]
	UnknownVariant { ty: String, variant: String },
	#[error("Type {0} is neither registered nor a builtin")]
	UnknownType(String),
	#[error("Malformed type expression {expr:?}: {reason}")]
	MalformedContainerSyntax { expr: String, reason: String },
	#[error("Expected {expected}, found {found}")]
	TypeMismatch { expected: String, found: String },
	#[error("Value for {ty} is missing field {field}")]
	MissingField { ty: String, field: String },
	#[error("Value {value} does not fit into {ty}")]
	IntegerOverflow { ty: String, value: String },
	#[error("Flag {flag} is not declared by {ty}")]
	UnknownFlag { ty: String, flag: String },
	#[error("Bits {bits:#x} are not declared by {ty}")]
	UnknownFlagBits { ty: String, bits: u128 },
	#[error("Invalid definition of {name}: {reason}")]
	InvalidDescriptor { name: String, reason: String },
	#[error("{remaining} byte(s) left after decoding")]
	TrailingBytes { remaining: usize },
	#[error("Nesting limit of {0} reached while resolving or decoding")]
	RecursionLimit(usize),
	#[error("No snapshot registered for runtime {runtime} at spec version {spec_version:?}")]
	NoSnapshot {
		runtime: String,
		spec_version: Option<u32>,
	},
	#[error("Batch decode job {0} did not complete")]
	WorkerFailed(usize),
	#[error(transparent)]
	Snapshot(#[from] SnapshotError),
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::UnexpectedEof { .. } => ErrorKind::UnexpectedEof,
			Error::InvalidUtf8 { .. } => ErrorKind::InvalidUtf8,
			Error::CompactOverflow { .. } => ErrorKind::CompactOverflow,
			Error::UnknownVariant { .. } => ErrorKind::UnknownVariant,
			Error::UnknownType(_) => ErrorKind::UnknownType,
			Error::MalformedContainerSyntax { .. } => ErrorKind::MalformedContainerSyntax,
			Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
			Error::MissingField { .. } => ErrorKind::MissingField,
			Error::IntegerOverflow { .. } => ErrorKind::IntegerOverflow,
			Error::UnknownFlag { .. } | Error::UnknownFlagBits { .. } => ErrorKind::UnknownFlag,
			Error::InvalidDescriptor { .. } => ErrorKind::InvalidDescriptor,
			Error::TrailingBytes { .. } => ErrorKind::TrailingBytes,
			Error::RecursionLimit(_) => ErrorKind::RecursionLimit,
			Error::NoSnapshot { .. } => ErrorKind::NoSnapshot,
			Error::WorkerFailed(_) => ErrorKind::WorkerFailed,
			Error::Snapshot(_) => ErrorKind::Snapshot,
		}
	}

	pub(crate) fn mismatch(expected: impl ToString, found: &crate::value::Value) -> Self {
		Error::TypeMismatch {
			expected: expected.to_string(),
			found: found.kind_name().to_string(),
		}
	}

	pub(crate) fn malformed(expr: impl Into<String>, reason: impl Into<String>) -> Self {
		Error::MalformedContainerSyntax {
			expr: expr.into(),
			reason: reason.into(),
		}
	}
}

/// Failures while reading a snapshot file into memory.
#[derive(Error, Debug)]
pub enum SnapshotError {
	#[error("Cannot read snapshot {path}: {source}")]
	Io {
		path: String,
		source: std::io::Error,
	},
	#[error("Snapshot is not valid JSON: {0}")]
	Json(#[from] serde_json::Error),
	#[error("Syntax error in lookup table at byte {offset}: {reason}")]
	Syntax { offset: usize, reason: String },
	#[error("Snapshot root must be an object of type definitions")]
	NotAnObject,
}
