//! Reading session: turns object nodes into geometry objects, keeping the
//! named objects and paths in a [`Manager`].

use std::collections::HashMap;

use stratum_core::{
    restore, AnyGeometry, Dim, DummyMaterial, Extrusion, GeometryError, Hint, Manager,
    MaterialProvider, MaterialRef, MaterialsDb, ObjectRef, Revolution, SupportedDim,
};

use crate::error::{ReaderError, Result};
use crate::node::{ChildNode, GeometryKind, GeometryNode, ObjectNode, ReaderSettings};
use crate::readers;

/// Builds an object from its node.
pub type ObjectReadFn = fn(&mut GeometryReader<'_>, &ObjectNode) -> Result<AnyGeometry>;

/// Object readers keyed by tag.
#[derive(Clone, Default)]
pub struct ObjectReaders {
    readers: HashMap<String, ObjectReadFn>,
}

impl ObjectReaders {
    /// Registry without any reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with readers for every built-in object kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        readers::register_defaults(&mut registry);
        registry
    }

    /// Register `reader` for `tag`, replacing a previous one.
    pub fn register_object_reader(&mut self, tag: &str, reader: ObjectReadFn) {
        self.readers.insert(tag.to_string(), reader);
    }

    pub fn get(&self, tag: &str) -> Option<ObjectReadFn> {
        self.readers.get(tag).copied()
    }

    /// Reader for `tag`, or for `tag` with the dimension suffix appended.
    pub fn find(&self, tag: &str, suffix: Option<&str>) -> Option<ObjectReadFn> {
        self.get(tag)
            .or_else(|| suffix.and_then(|s| self.get(&format!("{tag}{s}"))))
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.readers.keys().map(String::as_str)
    }
}

fn suffix_for(dimensions: usize) -> &'static str {
    if dimensions == 2 {
        "2d"
    } else {
        "3d"
    }
}

pub struct GeometryReader<'a> {
    manager: &'a mut Manager,
    materials: &'a dyn MaterialsDb,
    readers: &'a ObjectReaders,
    settings: ReaderSettings,
    expected_suffix: Option<&'static str>,
    /// Objects named with a leading `#`, visible only while reading.
    auto_named: HashMap<String, AnyGeometry>,
}

impl<'a> GeometryReader<'a> {
    pub fn new(
        manager: &'a mut Manager,
        materials: &'a dyn MaterialsDb,
        readers: &'a ObjectReaders,
        settings: ReaderSettings,
    ) -> Self {
        Self {
            manager,
            materials,
            readers,
            settings,
            expected_suffix: None,
            auto_named: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    pub fn manager(&self) -> &Manager {
        self.manager
    }

    // ── Objects ──

    /// Build the object described by `node`, applying its roles and registering its name.
    pub fn read_object(&mut self, node: &ObjectNode) -> Result<AnyGeometry> {
        if node.tag == "again" {
            let name: String = node.require_attr("ref")?;
            return self.require_object_with_name(&name);
        }
        let reader = self
            .readers
            .find(&node.tag, self.expected_suffix)
            .ok_or_else(|| ReaderError::NoSuchGeometryObjectType(node.tag.clone()))?;
        let object = reader(self, node)?;
        for role in node.roles() {
            object.object().add_role(role);
        }
        if let Some(name) = &node.name {
            self.register_object_name(name, object.clone())?;
        }
        Ok(object)
    }

    /// Run `f` with tags without a suffix resolved in `dimensions` dimensions.
    pub fn with_dimensions<T>(
        &mut self,
        dimensions: usize,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = self.expected_suffix.replace(suffix_for(dimensions));
        let result = f(self);
        self.expected_suffix = previous;
        result
    }

    pub fn read_object_as<const DIM: usize>(&mut self, node: &ObjectNode) -> Result<ObjectRef<DIM>>
    where
        Dim<DIM>: SupportedDim<DIM>,
    {
        let object = self.with_dimensions(DIM, |r| r.read_object(node))?;
        Ok(restore::<DIM>(&object)?)
    }

    /// The only child of `node`, which must have exactly one.
    pub fn read_exactly_one_child<const DIM: usize>(&mut self, node: &ObjectNode) -> Result<ObjectRef<DIM>>
    where
        Dim<DIM>: SupportedDim<DIM>,
    {
        match node.children.as_slice() {
            [child] => self.read_object_as(&child.object),
            children => Err(ReaderError::UnexpectedChildren {
                tag: node.tag.clone(),
                expected: 1,
                actual: children.len(),
            }),
        }
    }

    /// Call `f` for every child of `node`. The hint it returns is added to
    /// the path named by the child's `path` attribute.
    pub fn read_children<F>(&mut self, node: &ObjectNode, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Self, &ChildNode) -> Result<Option<Hint>>,
    {
        for child in &node.children {
            let hint = f(self, child)?;
            if let (Some(path), Some(hint)) = (&child.path, hint) {
                self.manager.path_hints_mut(path)?.add_hint(hint);
            }
        }
        Ok(())
    }

    // ── Names ──

    pub fn register_object_name(&mut self, name: &str, object: AnyGeometry) -> Result<()> {
        if name.starts_with('#') {
            if self.auto_named.contains_key(name) {
                return Err(GeometryError::NamesConflict(name.to_string()).into());
            }
            self.auto_named.insert(name.to_string(), object);
            return Ok(());
        }
        Ok(self.manager.register_object_name(name, object)?)
    }

    pub fn require_object_with_name(&self, name: &str) -> Result<AnyGeometry> {
        if name.starts_with('#') {
            return self
                .auto_named
                .get(name)
                .cloned()
                .ok_or_else(|| GeometryError::NoSuchGeometryObject(name.to_string()).into());
        }
        Ok(self.manager.require_object_with_name(name)?)
    }

    // ── Materials ──

    pub fn get_material(&self, name: &str) -> Result<MaterialRef> {
        match self.materials.get(name) {
            Err(GeometryError::NoSuchMaterial(_)) if self.settings.draft => {
                log::warn!("Unknown material \"{name}\", using a dummy one");
                Ok(DummyMaterial::shared(name))
            }
            other => Ok(other?),
        }
    }

    /// Material of a leaf: `material`, or `material_bottom` with `material_top`
    /// for a mixed composition. Leaves may lack a material only in draft mode.
    pub fn read_material(&self, node: &ObjectNode) -> Result<Option<MaterialProvider>> {
        if let Some(name) = node.attr::<String>("material")? {
            return Ok(Some(MaterialProvider::Solid(self.get_material(&name)?)));
        }
        let bottom = node.attr::<String>("material_bottom")?;
        let top = node.attr::<String>("material_top")?;
        let missing = |attr: &str| ReaderError::MissingAttribute {
            tag: node.tag.clone(),
            attr: attr.to_string(),
        };
        match (bottom, top) {
            (Some(bottom), Some(top)) => match self.materials.mixed_composition(&bottom, &top) {
                Ok(factory) => Ok(Some(MaterialProvider::MixedComposition(factory))),
                Err(GeometryError::NoSuchMaterial(name)) if self.settings.draft => {
                    log::warn!("Unknown material \"{name}\", using a dummy one");
                    Ok(Some(MaterialProvider::Solid(DummyMaterial::shared(&bottom))))
                }
                Err(e) => Err(e.into()),
            },
            (Some(_), None) => Err(missing("material_top")),
            (None, Some(_)) => Err(missing("material_bottom")),
            (None, None) if self.settings.draft => Ok(None),
            (None, None) => Err(missing("material")),
        }
    }

    // ── Geometries ──

    /// Read a top-level geometry and add it to the manager's roots.
    pub fn read_geometry(&mut self, geometry: &GeometryNode) -> Result<AnyGeometry> {
        log::info!(
            "Reading {:?} geometry{}",
            geometry.kind,
            geometry
                .name
                .as_deref()
                .map(|n| format!(" \"{n}\""))
                .unwrap_or_default()
        );
        let root = match geometry.kind {
            GeometryKind::Cartesian2d => {
                let object = self.with_dimensions(2, |r| r.read_object(&geometry.root))?;
                match object {
                    AnyGeometry::D2(child) => {
                        let length = geometry.length.unwrap_or(f64::INFINITY);
                        AnyGeometry::d3(Extrusion::new(Some(child), length))
                    }
                    other => expect_type(other, "extrusion")?,
                }
            }
            GeometryKind::Cylindrical => {
                let object = self.with_dimensions(2, |r| r.read_object(&geometry.root))?;
                match object {
                    AnyGeometry::D2(child) => AnyGeometry::d3(Revolution::new(Some(child))),
                    other => expect_type(other, "revolution")?,
                }
            }
            GeometryKind::Cartesian3d => {
                AnyGeometry::D3(self.read_object_as::<3>(&geometry.root)?)
            }
        };
        if let Some(name) = &geometry.name {
            self.register_object_name(name, root.clone())?;
        }
        self.manager.add_root(root.clone());
        Ok(root)
    }
}

fn expect_type(object: AnyGeometry, expected: &str) -> Result<AnyGeometry> {
    let actual = object.object().type_name();
    if actual == expected {
        Ok(object)
    } else {
        Err(GeometryError::UnexpectedType {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::{MaterialRegistry, Vec2};

    fn materials() -> MaterialRegistry {
        MaterialRegistry::with_names(["GaAs", "AlAs"])
    }

    fn block(material: &str) -> ObjectNode {
        ObjectNode::new("block")
            .with_attr("size", vec![1.0, 1.0])
            .with_attr("material", material)
    }

    #[test]
    fn test_suffix_lookup() {
        let readers = ObjectReaders::with_defaults();
        assert!(readers.find("block", Some("2d")).is_some());
        assert!(readers.find("block", None).is_none());
        assert!(readers.find("rectangle", Some("3d")).is_some());
        assert!(readers.find("sphere", Some("3d")).is_none());
    }

    #[test]
    fn test_unknown_tag() {
        let db = materials();
        let readers = ObjectReaders::with_defaults();
        let mut manager = Manager::new();
        let mut reader = GeometryReader::new(&mut manager, &db, &readers, ReaderSettings::default());
        let err = reader.read_object(&ObjectNode::new("sphere")).unwrap_err();
        assert!(matches!(err, ReaderError::NoSuchGeometryObjectType(t) if t == "sphere"));
    }

    #[test]
    fn test_dimension_mismatch() {
        let db = materials();
        let readers = ObjectReaders::with_defaults();
        let mut manager = Manager::new();
        let mut reader = GeometryReader::new(&mut manager, &db, &readers, ReaderSettings::default());
        let triangle = ObjectNode::new("triangle")
            .with_attr("p0", vec![1.0, 0.0])
            .with_attr("p1", vec![0.0, 1.0])
            .with_attr("material", "GaAs");
        assert!(matches!(
            reader.read_object_as::<3>(&triangle),
            Err(ReaderError::Geometry(GeometryError::WrongDimension { .. }))
        ));
        assert!(reader.read_object_as::<2>(&triangle).is_ok());
    }

    #[test]
    fn test_names_and_again() {
        let db = materials();
        let readers = ObjectReaders::with_defaults();
        let mut manager = Manager::new();
        {
            let mut reader = GeometryReader::new(&mut manager, &db, &readers, ReaderSettings::default());
            let mut named = block("GaAs");
            named.name = Some("core".into());
            let first = reader.read_object_as::<2>(&named).unwrap();

            let again = ObjectNode::new("again").with_attr("ref", "core");
            let second = reader.read_object_as::<2>(&again).unwrap();
            assert!(AnyGeometry::D2(first).ptr_eq(&AnyGeometry::D2(second)));

            let mut hidden = block("AlAs");
            hidden.name = Some("#tmp".into());
            reader.read_object_as::<2>(&hidden).unwrap();
            assert!(reader.require_object_with_name("#tmp").is_ok());
            assert!(matches!(
                reader.read_object_as::<2>(&named),
                Err(ReaderError::Geometry(GeometryError::NamesConflict(_)))
            ));
        }
        assert!(manager.get_object("core").is_some());
        assert!(manager.get_object("#tmp").is_none());
    }

    #[test]
    fn test_roles() {
        let db = materials();
        let readers = ObjectReaders::with_defaults();
        let mut manager = Manager::new();
        let mut reader = GeometryReader::new(&mut manager, &db, &readers, ReaderSettings::default());
        let mut node = block("GaAs");
        node.role = Some("active,gain".into());
        let object = reader.read_object_as::<2>(&node).unwrap();
        assert!(object.has_role("active"));
        assert!(object.has_role("gain"));
    }

    #[test]
    fn test_materials_in_draft_mode() {
        let db = materials();
        let readers = ObjectReaders::with_defaults();
        let mut manager = Manager::new();

        let strict = GeometryReader::new(&mut manager, &db, &readers, ReaderSettings::default());
        assert!(matches!(
            strict.read_material(&block("InP")),
            Err(ReaderError::Geometry(GeometryError::NoSuchMaterial(_)))
        ));
        assert!(matches!(
            strict.read_material(&ObjectNode::new("block2d")),
            Err(ReaderError::MissingAttribute { .. })
        ));
        drop(strict);

        let draft = ReaderSettings {
            draft: true,
            ..ReaderSettings::default()
        };
        let mut reader = GeometryReader::new(&mut manager, &db, &readers, draft);
        let material = reader.get_material("InP").unwrap();
        assert_eq!(material.name(), "InP");
        assert!(reader.read_material(&ObjectNode::new("block2d")).unwrap().is_none());

        let object = reader.read_object_as::<2>(&block("InP")).unwrap();
        let m = object.material(&Vec2::new([0.5, 0.5])).unwrap();
        assert_eq!(m.name(), "InP");
    }

    #[test]
    fn test_mixed_composition() {
        let db = materials();
        let readers = ObjectReaders::with_defaults();
        let mut manager = Manager::new();
        let reader = GeometryReader::new(&mut manager, &db, &readers, ReaderSettings::default());
        let node = ObjectNode::new("block2d")
            .with_attr("material_bottom", "GaAs")
            .with_attr("material_top", "AlAs");
        assert!(matches!(
            reader.read_material(&node).unwrap(),
            Some(MaterialProvider::MixedComposition(_))
        ));
        let half = ObjectNode::new("block2d").with_attr("material_bottom", "GaAs");
        assert!(matches!(
            reader.read_material(&half),
            Err(ReaderError::MissingAttribute { attr, .. }) if attr == "material_top"
        ));
    }
}
