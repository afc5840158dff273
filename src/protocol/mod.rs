pub mod types;

pub use types::{Command, RespValue};
