pub mod migrate;
pub mod validate;
