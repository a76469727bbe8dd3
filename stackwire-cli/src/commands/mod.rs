//! CLI command implementations

pub mod deploy;
pub mod plan;
pub mod registry;
pub mod routes;

pub use deploy::deploy;
pub use plan::plan;
pub use routes::routes;
