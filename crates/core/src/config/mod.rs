pub mod environment;
pub mod migration;
pub mod project;
pub mod validation;

pub use environment::*;
pub use migration::*;
pub use project::*;
pub use validation::*;
