pub mod error;
pub mod outcome;
pub mod request;
pub mod types;
