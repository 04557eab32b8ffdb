pub mod auth;
pub mod error;
pub mod time;

pub use time::Timestamp;
