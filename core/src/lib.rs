//! Dynamic SCALE codec driven by generated type lookup snapshots.
//!
//! A snapshot binds type names to wire shapes. [`Registry::register`] loads one snapshot,
//! [`codec::decode`] and [`codec::encode`] walk bytes and [`Value`]s against it, and a
//! [`Bundle`] picks the right registry for a runtime and spec version.

pub mod bundle;
pub mod codec;
pub mod error;
pub mod registry;
pub mod types;
pub mod utils;
pub mod value;

pub use bundle::{Bundle, SpecRange};
pub use crate::codec::{decode, decode_all, decode_batch, encode};
pub use error::{Error, ErrorKind, SnapshotError};
pub use registry::{Registry, Resolution, Snapshot, TypeDescriptor, TypeExpr};
pub use value::Value;
