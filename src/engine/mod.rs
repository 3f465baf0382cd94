// Storage Engine Module
// Repository contract, backends and the registry holding the active one

pub mod drivers;
pub mod error;
pub mod registry;
pub mod schema;
pub mod statement;
pub mod traits;
pub mod types;

pub use error::{EngineError, EngineResult};
pub use registry::{RepositoryGuard, RepositoryRegistry};
pub use traits::CredentialRepository;
pub use types::*;
