use thiserror::Error;

#[derive(Debug, Error)]
pub enum SegmenterError {
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SegmenterError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AlreadyExists(_) => 409,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
