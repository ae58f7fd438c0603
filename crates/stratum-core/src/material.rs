//! Material capability consumed by leaves.
//!
//! The geometry core never evaluates physical properties. It only hands out
//! material handles supplied by an external database.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{GeometryError, Result};

/// An opaque material handle provided by a material database.
pub trait Material: fmt::Debug + Send + Sync {
    /// Full name of the material, e.g. `GaAs` or `Al(0.3)GaAs`.
    fn name(&self) -> &str;
}

pub type MaterialRef = Arc<dyn Material>;

/// Builds materials for a fraction in `[0, 1]` measured from the bottom of a leaf.
pub trait MixedCompositionFactory: fmt::Debug + Send + Sync {
    fn material_at(&self, fraction: f64) -> MaterialRef;
}

/// A material identified only by its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedMaterial {
    name: String,
}

impl NamedMaterial {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn shared(name: &str) -> MaterialRef {
        Arc::new(Self::new(name))
    }
}

impl Material for NamedMaterial {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Stand-in used in draft mode for materials the database does not know.
#[derive(Debug, Clone)]
pub struct DummyMaterial {
    name: String,
}

impl DummyMaterial {
    pub fn shared(name: &str) -> MaterialRef {
        Arc::new(Self {
            name: name.to_string(),
        })
    }
}

impl Material for DummyMaterial {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Source of materials used by readers and managers.
pub trait MaterialsDb: Send + Sync {
    fn get(&self, name: &str) -> Result<MaterialRef>;

    /// Factory interpolating between `bottom` and `top`.
    fn mixed_composition(
        &self,
        bottom: &str,
        top: &str,
    ) -> Result<Arc<dyn MixedCompositionFactory>>;
}

/// In-memory materials database keyed by name.
#[derive(Debug, Default, Clone)]
pub struct MaterialRegistry {
    materials: HashMap<String, MaterialRef>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut registry = Self::new();
        for name in names {
            registry.add(NamedMaterial::shared(name));
        }
        registry
    }

    pub fn add(&mut self, material: MaterialRef) {
        self.materials.insert(material.name().to_string(), material);
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl MaterialsDb for MaterialRegistry {
    fn get(&self, name: &str) -> Result<MaterialRef> {
        self.materials
            .get(name)
            .cloned()
            .ok_or_else(|| GeometryError::NoSuchMaterial(name.to_string()))
    }

    fn mixed_composition(
        &self,
        bottom: &str,
        top: &str,
    ) -> Result<Arc<dyn MixedCompositionFactory>> {
        Ok(Arc::new(TwoMaterialsFactory {
            bottom: self.get(bottom)?,
            top: self.get(top)?,
        }))
    }
}

/// Mixed composition without real interpolation: the lower half of the leaf
/// gets the bottom material, the upper half the top one.
#[derive(Debug)]
struct TwoMaterialsFactory {
    bottom: MaterialRef,
    top: MaterialRef,
}

impl MixedCompositionFactory for TwoMaterialsFactory {
    fn material_at(&self, fraction: f64) -> MaterialRef {
        if fraction < 0.5 {
            self.bottom.clone()
        } else {
            self.top.clone()
        }
    }
}

/// How a leaf resolves its material.
#[derive(Debug, Clone)]
pub enum MaterialProvider {
    /// The same material everywhere inside the leaf.
    Solid(MaterialRef),
    /// Material depends on the relative vertical position inside the leaf.
    MixedComposition(Arc<dyn MixedCompositionFactory>),
}

impl MaterialProvider {
    /// Material at vertical coordinate `vert` of a leaf spanning `[bottom, bottom + height]`.
    ///
    /// A zero-height leaf is sampled at its middle (fraction 0.5).
    pub fn material_at(&self, vert: f64, bottom: f64, height: f64) -> MaterialRef {
        match self {
            MaterialProvider::Solid(m) => m.clone(),
            MaterialProvider::MixedComposition(factory) => {
                let fraction = if height == 0.0 {
                    0.5
                } else {
                    (vert - bottom) / height
                };
                factory.material_at(fraction)
            }
        }
    }

    /// The material if it does not depend on position.
    pub fn is_solid(&self) -> Option<MaterialRef> {
        match self {
            MaterialProvider::Solid(m) => Some(m.clone()),
            MaterialProvider::MixedComposition(_) => None,
        }
    }

    /// Material in the middle of the leaf.
    pub fn representative(&self) -> MaterialRef {
        match self {
            MaterialProvider::Solid(m) => m.clone(),
            MaterialProvider::MixedComposition(factory) => factory.material_at(0.5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let db = MaterialRegistry::with_names(["GaAs", "AlAs"]);
        assert_eq!(db.len(), 2);
        assert_eq!(db.get("GaAs").unwrap().name(), "GaAs");
        assert_eq!(
            db.get("InP").unwrap_err(),
            GeometryError::NoSuchMaterial("InP".to_string())
        );
    }

    #[test]
    fn test_mixed_provider() {
        let db = MaterialRegistry::with_names(["GaAs", "AlAs"]);
        let provider = MaterialProvider::MixedComposition(db.mixed_composition("GaAs", "AlAs").unwrap());
        assert!(provider.is_solid().is_none());
        assert_eq!(provider.material_at(0.1, 0.0, 1.0).name(), "GaAs");
        assert_eq!(provider.material_at(0.9, 0.0, 1.0).name(), "AlAs");
        assert_eq!(provider.representative().name(), "AlAs");
    }

    #[derive(Debug, Default)]
    struct RecordingFactory {
        seen: parking_lot::Mutex<Vec<f64>>,
    }

    impl MixedCompositionFactory for RecordingFactory {
        fn material_at(&self, fraction: f64) -> MaterialRef {
            self.seen.lock().push(fraction);
            NamedMaterial::shared("mix")
        }
    }

    #[test]
    fn test_flat_mixed_leaf_samples_middle() {
        let factory = Arc::new(RecordingFactory::default());
        let provider = MaterialProvider::MixedComposition(factory.clone());
        provider.material_at(2.0, 2.0, 0.0);
        provider.material_at(1.5, 1.0, 2.0);
        let seen = factory.seen.lock().clone();
        assert_eq!(seen.len(), 2);
        assert!((seen[0] - 0.5).abs() < 1e-10);
        assert!((seen[1] - 0.25).abs() < 1e-10);
    }

    #[test]
    fn test_solid_provider() {
        let provider = MaterialProvider::Solid(NamedMaterial::shared("Si"));
        assert_eq!(provider.is_solid().unwrap().name(), "Si");
        assert_eq!(provider.material_at(123.0, 0.0, 1.0).name(), "Si");
    }
}
