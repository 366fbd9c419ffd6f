use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model deserialization error: {0}")]
    Deserialization(#[from] bincode::Error),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("No landmark model loaded")]
    ModelNotLoaded,

    #[error("Unsupported pixel format code: {0}")]
    UnsupportedFormat(i32),

    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("Frame buffer too small: expected at least {expected} bytes, got {actual}")]
    FrameTooSmall { expected: usize, actual: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Model catalog error: {0}")]
    Catalog(#[from] serde_json::Error),

    #[error("Download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
