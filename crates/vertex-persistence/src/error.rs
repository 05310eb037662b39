use vertex_core::{ErrorKind, VertexError};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("engine version mismatch: record is major v{record}, store expects major v{expected}")]
    EngineVersionMismatch { record: u32, expected: u32 },

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StoreError> for VertexError {
    fn from(err: StoreError) -> Self {
        let kind = match err {
            StoreError::EngineVersionMismatch { .. } => ErrorKind::Validation,
            StoreError::NotFound(..) => ErrorKind::Transient,
        };
        VertexError::new(kind, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
