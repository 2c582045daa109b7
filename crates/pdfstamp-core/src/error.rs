use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfStampError {
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Failed to render overlay: {0}")]
    RenderError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Archive error: {0}")]
    ArchiveError(String),
}
