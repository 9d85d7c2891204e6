#![allow(dead_code)]

use promise_chain::{Error, Fault};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad input #{0}")]
    BadInput(u32),
    #[error(transparent)]
    Engine(#[from] Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppKind {
    NotFound,
    BadInput,
    Engine,
}

impl Fault for AppError {
    type Kind = AppKind;

    fn kind(&self) -> AppKind {
        match self {
            AppError::NotFound(_) => AppKind::NotFound,
            AppError::BadInput(_) => AppKind::BadInput,
            AppError::Engine(_) => AppKind::Engine,
        }
    }

    fn is_cancellation(&self) -> bool {
        matches!(self, AppError::Engine(Error::Cancelled))
    }
}
