pub mod domain;
pub mod error;
pub mod parameters;
pub mod protocol;
