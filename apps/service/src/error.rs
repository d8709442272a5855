use std::io::Error as IoError;

use thiserror::Error;

use crate::config;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}
