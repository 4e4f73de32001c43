//! External identity resolution and linking

mod error;
mod resolver;
mod types;

pub use error::{IdentityError, IdentityResult};
pub use resolver::IdentityResolver;
pub use types::{CacheStatus, IdentityMapping, UserId};
