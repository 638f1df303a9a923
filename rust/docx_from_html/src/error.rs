use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("empty html")]
    EmptyInput,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML write error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("package entry already exists: {0}")]
    DuplicateEntry(String),

    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
