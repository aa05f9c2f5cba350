#![forbid(unsafe_code)]
#![doc = "Common error and alert types for the ferrum TLS stack."]

pub mod alert;
pub mod error;

pub use alert::*;
pub use error::*;
