use thiserror::Error;

/// Failures while assembling the runtime (config validation, logging setup).
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required host capability was not injected and no desktop default
    /// exists for it.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
