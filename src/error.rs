//! Error handling

use thiserror::Error;
use uuid::Uuid;

use crate::logic::store::StoreError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Login refused by location verification
    #[error("Login blocked for {employee_id}: {reason}")]
    LoginBlocked {
        employee_id: String,
        reason: String,
        threat_id: Option<Uuid>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }
}
