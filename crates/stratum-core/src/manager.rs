//! Registry of named objects and named paths of one geometry document.

use std::collections::BTreeMap;

use crate::error::{GeometryError, Result};
use crate::object::AnyGeometry;
use crate::path::PathHints;

/// What a name used in a query refers to.
#[derive(Debug)]
pub enum Reference<'a> {
    Path(&'a PathHints),
    Object(AnyGeometry),
}

/// Named objects, named path hints and the top-level geometries read so far.
#[derive(Debug, Default)]
pub struct Manager {
    objects: BTreeMap<String, AnyGeometry>,
    path_hints: BTreeMap<String, PathHints>,
    roots: Vec<AnyGeometry>,
}

/// Names start with a letter or `_` and contain letters, digits, `_` and `-`.
pub fn check_name(kind: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        Ok(())
    } else {
        Err(GeometryError::bad_input(
            kind,
            format!("\"{name}\" is not a valid name"),
        ))
    }
}

impl Manager {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Objects ──

    /// Make `object` reachable as `name`. The object takes the name if it
    /// has none yet.
    pub fn register_object_name(&mut self, name: &str, object: AnyGeometry) -> Result<()> {
        check_name("geometry object", name)?;
        if self.objects.contains_key(name) {
            return Err(GeometryError::NamesConflict(name.to_string()));
        }
        if object.object().name().is_none() {
            object.object().set_name(Some(name));
        }
        log::debug!("Registered geometry object \"{name}\" ({})", object.object().type_name());
        self.objects.insert(name.to_string(), object);
        Ok(())
    }

    pub fn get_object(&self, name: &str) -> Option<AnyGeometry> {
        self.objects.get(name).cloned()
    }

    pub fn require_object_with_name(&self, name: &str) -> Result<AnyGeometry> {
        self.get_object(name)
            .ok_or_else(|| GeometryError::NoSuchGeometryObject(name.to_string()))
    }

    pub fn object_names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    // ── Paths ──

    /// Hints registered as `name`, created empty on first use.
    pub fn path_hints_mut(&mut self, name: &str) -> Result<&mut PathHints> {
        if !self.path_hints.contains_key(name) {
            check_name("path", name)?;
        }
        Ok(self.path_hints.entry(name.to_string()).or_default())
    }

    pub fn get_path_hints(&self, name: &str) -> Option<&PathHints> {
        self.path_hints.get(name)
    }

    pub fn require_path_hints(&self, name: &str) -> Result<&PathHints> {
        self.get_path_hints(name)
            .ok_or_else(|| GeometryError::NoSuchPath(name.to_string()))
    }

    pub fn path_names(&self) -> impl Iterator<Item = &str> {
        self.path_hints.keys().map(String::as_str)
    }

    /// Path hints named `name` if there are any, otherwise the object named `name`.
    pub fn resolve_reference(&self, name: &str) -> Result<Reference<'_>> {
        if let Some(hints) = self.path_hints.get(name) {
            return Ok(Reference::Path(hints));
        }
        self.require_object_with_name(name).map(Reference::Object)
    }

    // ── Roots ──

    pub fn add_root(&mut self, root: AnyGeometry) {
        self.roots.push(root);
    }

    /// Top-level geometries in the order they were added.
    pub fn roots(&self) -> &[AnyGeometry] {
        &self.roots
    }

    /// Validate the object named `name`.
    pub fn validate(&self, name: &str) -> Result<()> {
        self.require_object_with_name(name)?.object().validate()
    }

    /// Validate every top-level geometry.
    pub fn validate_all(&self) -> Result<()> {
        for root in &self.roots {
            root.object().validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::Rectangle;
    use crate::material::NamedMaterial;
    use crate::primitives::vec2;
    use crate::transform::Translation;

    fn block() -> AnyGeometry {
        AnyGeometry::d2(Rectangle::new(vec2(1.0, 1.0), NamedMaterial::shared("A")))
    }

    #[test]
    fn test_names() {
        assert!(check_name("object", "active-region_2").is_ok());
        assert!(check_name("object", "2nd").is_err());
        assert!(check_name("object", "").is_err());
        assert!(check_name("object", "a b").is_err());
    }

    #[test]
    fn test_register_and_conflict() {
        let mut manager = Manager::new();
        let b = block();
        manager.register_object_name("core", b.clone()).unwrap();
        assert_eq!(b.object().name().as_deref(), Some("core"));
        assert!(manager.require_object_with_name("core").unwrap().ptr_eq(&b));
        assert_eq!(
            manager.register_object_name("core", block()).unwrap_err(),
            GeometryError::NamesConflict("core".into())
        );
        assert_eq!(
            manager.require_object_with_name("clad").unwrap_err(),
            GeometryError::NoSuchGeometryObject("clad".into())
        );
    }

    #[test]
    fn test_paths_before_objects() {
        let mut manager = Manager::new();
        manager.register_object_name("x", block()).unwrap();
        assert!(matches!(
            manager.resolve_reference("x").unwrap(),
            Reference::Object(_)
        ));
        manager.path_hints_mut("x").unwrap();
        assert!(matches!(
            manager.resolve_reference("x").unwrap(),
            Reference::Path(_)
        ));
        assert!(manager.require_path_hints("y").is_err());
        assert!(manager.resolve_reference("y").is_err());
    }

    #[test]
    fn test_validate() {
        let mut manager = Manager::new();
        let empty = Translation::<2>::new(None, vec2(0.0, 0.0));
        manager
            .register_object_name("empty", AnyGeometry::d2(empty.clone()))
            .unwrap();
        manager.add_root(AnyGeometry::d2(empty));
        assert!(matches!(
            manager.validate("empty"),
            Err(GeometryError::NoChild(_))
        ));
        assert!(manager.validate_all().is_err());
        assert!(manager.validate("missing").is_err());
    }
}
