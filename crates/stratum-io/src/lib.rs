//! # Stratum I/O
//!
//! Declarative geometry reader. A JSON document lists top-level geometries,
//! each a tree of tagged object nodes; every tag is handled by a reader
//! function looked up in an [`ObjectReaders`] registry, so new object kinds
//! can be plugged in without touching the reading session.

pub mod error;
pub mod node;
pub mod reader;
mod readers;

use std::fs;
use std::path::Path;

use stratum_core::{Manager, MaterialsDb};

pub use error::{ReaderError, Result};
pub use node::{ChildNode, GeometryDocument, GeometryKind, GeometryNode, ObjectNode, ReaderSettings};
pub use reader::{GeometryReader, ObjectReadFn, ObjectReaders};

/// Read every geometry of `document` into a new manager.
///
/// Outside draft mode the geometries are validated once read.
pub fn read_document(
    document: &GeometryDocument,
    materials: &dyn MaterialsDb,
    readers: &ObjectReaders,
) -> Result<Manager> {
    let mut manager = Manager::new();
    {
        let mut reader = GeometryReader::new(&mut manager, materials, readers, document.settings);
        for geometry in &document.geometries {
            reader.read_geometry(geometry)?;
        }
    }
    if !document.settings.draft {
        manager.validate_all()?;
    }
    log::info!(
        "Read {} geometries, {} named objects, {} paths",
        manager.roots().len(),
        manager.object_names().count(),
        manager.path_names().count()
    );
    Ok(manager)
}

/// Parse and read a JSON geometry document using the built-in readers.
pub fn load_from_str(json: &str, materials: &dyn MaterialsDb) -> Result<Manager> {
    let document: GeometryDocument = serde_json::from_str(json)?;
    read_document(&document, materials, &ObjectReaders::with_defaults())
}

pub fn load_from_path(path: impl AsRef<Path>, materials: &dyn MaterialsDb) -> Result<Manager> {
    let path = path.as_ref();
    log::info!("Loading geometry from {}", path.display());
    let json = fs::read_to_string(path)?;
    load_from_str(&json, materials)
}
