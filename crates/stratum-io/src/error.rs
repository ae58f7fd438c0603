use std::io;

use stratum_core::GeometryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Unknown geometry object type \"{0}\"")]
    NoSuchGeometryObjectType(String),

    #[error("\"{tag}\": missing attribute \"{attr}\"")]
    MissingAttribute { tag: String, attr: String },

    #[error("\"{tag}\": bad value of attribute \"{attr}\": {message}")]
    BadAttribute {
        tag: String,
        attr: String,
        message: String,
    },

    #[error("\"{tag}\": expected {expected} children, found {actual}")]
    UnexpectedChildren {
        tag: String,
        expected: usize,
        actual: usize,
    },
}

impl ReaderError {
    pub(crate) fn bad_attribute(tag: &str, attr: &str, message: impl ToString) -> Self {
        ReaderError::BadAttribute {
            tag: tag.to_string(),
            attr: attr.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReaderError>;
