use thiserror::Error;

/// Errors raised by geometry construction and queries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Adding the object would create a cycle in the geometry graph")]
    CyclicReference,

    #[error("Required child of {0} is not set")]
    NoChild(String),

    #[error("Object has {actual} dimensions, expected {expected}")]
    WrongDimension { expected: usize, actual: usize },

    #[error("Unexpected object type: expected {expected}, got {actual}")]
    UnexpectedType { expected: String, actual: String },

    #[error("Name \"{0}\" is already in use")]
    NamesConflict(String),

    #[error("{what}: index {index} is out of bounds (length {len})")]
    OutOfBounds {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("No geometry object named \"{0}\"")]
    NoSuchGeometryObject(String),

    #[error("No path named \"{0}\"")]
    NoSuchPath(String),

    #[error("No material named \"{0}\"")]
    NoSuchMaterial(String),

    #[error("Bad input in {context}: {message}")]
    BadInput { context: String, message: String },
}

impl GeometryError {
    pub fn bad_input(context: &str, message: impl Into<String>) -> Self {
        GeometryError::BadInput {
            context: context.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn ensure_index(what: &'static str, index: usize, len: usize) -> Result<()> {
        if index < len {
            Ok(())
        } else {
            Err(GeometryError::OutOfBounds { what, index, len })
        }
    }
}

pub type Result<T> = std::result::Result<T, GeometryError>;
