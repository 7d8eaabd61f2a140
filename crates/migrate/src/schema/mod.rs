//! Declarative schema validation.
//!
//! [`parse_schema`] and [`diff_schemas`] are pure and usable without a
//! database; [`SchemaValidator`] ties them to files on disk and a live pool.

pub mod diff;
pub mod introspect;
pub mod model;
pub mod parser;
pub mod report;
pub mod validator;

pub use diff::{diff_schemas, SchemaDiff};
pub use introspect::introspect;
pub use model::{ActualSchema, ExpectedSchema, IndexDef, TableDef};
pub use parser::{parse_schema, SchemaParseError};
pub use report::{generate_report, ValidationResult};
pub use validator::{parse_schema_file, SchemaValidator};
