pub mod config;
pub mod errors;
pub mod metadata;
pub mod model;

pub use config::*;
pub use errors::*;
pub use metadata::*;
pub use model::*;
