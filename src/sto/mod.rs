//! The ledger's self-describing binary object format ("STObject").
//!
//! - [`field`]: type/field codes and header encoding
//! - [`parser`]: allocation-free length decoding
//! - [`ops`]: locate, emplace, erase and validate over raw buffers
//! - [`writer`]: canonical serializer used for templates and fixtures
//! - [`view`]: typed lookups over a parsed object's top-level fields

pub mod field;
pub mod ops;
pub mod parser;
pub mod view;
pub mod writer;

pub use field::{sf, sti, FieldCode};
pub use parser::{field_length, FieldScanner, FieldSpan, ParseError};
pub use view::ObjectView;
pub use writer::ObjectBuilder;
