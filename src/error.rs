#![warn(missing_docs)]
//! NanoMi optics specific error structures
use std::{error::Error, fmt::Display};

/// Crate specific Result type
pub type NmResult<T> = std::result::Result<T, NanomiError>;

/// Errors that can be returned by the optics engine and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NanomiError {
    /// a computation left the domain of thin-lens paraxial optics (zero focal length, object in the front focal plane, ...)
    Domain(String),
    /// an optical chain or column was set up inconsistently (mismatched inputs, no active lens, invalid bounds)
    Configuration(String),
    /// errors while writing results (CSV tables, ray diagrams)
    Export(String),
    /// errors console io
    Console(String),
    /// errors not falling in one of the categories above
    Other(String),
}

impl Display for NanomiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Domain(m) => {
                write!(f, "Domain:{m}")
            }
            Self::Configuration(m) => {
                write!(f, "Configuration:{m}")
            }
            Self::Export(m) => {
                write!(f, "Export:{m}")
            }
            Self::Console(m) => {
                write!(f, "Console:{m}")
            }
            Self::Other(m) => write!(f, "NanoMi Error:Other:{m}"),
        }
    }
}
impl Error for NanomiError {}

impl std::convert::From<String> for NanomiError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}
impl From<argmin::core::Error> for NanomiError {
    /// Recovers a [`NanomiError`] raised inside a cost function, all other solver errors become `Other`.
    fn from(e: argmin::core::Error) -> Self {
        e.downcast::<Self>()
            .unwrap_or_else(|e| Self::Other(format!("solver:{e}")))
    }
}
