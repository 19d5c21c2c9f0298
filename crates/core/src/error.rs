use std::path::PathBuf;

/// Coarse classification of a [`LisError`], used by API layers to pick a status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The referenced entity does not exist.
    NotFound,
    /// The request was malformed or violates a field-level rule.
    Validation,
    /// The request clashes with existing state (duplicate key, illegal status move).
    Conflict,
    /// Storage or serialisation failure.
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum LisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("duplicate {index}: {value}")]
    Conflict { index: &'static str, value: String },
    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },
    #[error("{0}")]
    StateConflict(String),

    #[error("identifier error: {0}")]
    Uuid(#[from] lis_uuid::UuidError),
    #[error("text error: {0}")]
    Text(#[from] lis_types::TextError),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write document: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read document: {0}")]
    FileRead(std::io::Error),
    #[error("failed to remove document: {0}")]
    FileRemove(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error(
        "document schema mismatch in {path} at {field}: {message}",
        path = path.display()
    )]
    Deserialization {
        path: PathBuf,
        field: String,
        message: String,
    },
    #[error("failed to serialize cache entry: {0}")]
    CacheSerialization(serde_json::Error),
}

impl LisError {
    /// Shorthand for a [`LisError::NotFound`] keyed by any displayable id.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        LisError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classifies this error for API status mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LisError::NotFound { .. } => ErrorKind::NotFound,
            LisError::InvalidInput(_) | LisError::Uuid(_) | LisError::Text(_) => {
                ErrorKind::Validation
            }
            LisError::Conflict { .. }
            | LisError::InvalidTransition { .. }
            | LisError::StateConflict(_) => ErrorKind::Conflict,
            LisError::StorageDirCreation(_)
            | LisError::FileWrite(_)
            | LisError::FileRead(_)
            | LisError::FileRemove(_)
            | LisError::YamlSerialization(_)
            | LisError::Deserialization { .. }
            | LisError::CacheSerialization(_) => ErrorKind::Internal,
        }
    }
}

pub type LisResult<T> = std::result::Result<T, LisError>;
