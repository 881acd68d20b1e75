mod error;

pub use error::{LocatorError, LocatorResult};
