pub mod config;
pub mod error;
pub mod types;

pub use config::LecternConfig;
pub use error::{LecternError, Result};
pub use types::*;
