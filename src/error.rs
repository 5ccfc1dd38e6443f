use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Package archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Completion service error: {0}")]
    Llm(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Timed out waiting for upload")]
    UploadTimeout,

    #[error("Style application error: {0}")]
    Style(String),

    #[error("Malformed document: {0}")]
    Document(String),

    #[error("Shape nesting deeper than {0} levels")]
    ShapeDepthExceeded(usize),

    #[error("Document conversion error: {0}")]
    Conversion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Tool error: {0}")]
    Tool(String),
}

pub type Result<T> = std::result::Result<T, DeckError>;
