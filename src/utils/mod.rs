pub mod error;
pub mod logger;
pub mod serde_ext;
pub mod validation;
