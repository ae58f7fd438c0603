//! Terminal objects: shapes filled with a material.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::error::{GeometryError, Result};
use crate::event::EventFlags;
use crate::material::{MaterialProvider, MaterialRef, MaterialsDb};
use crate::object::{
    dim_name, erase, AnyGeometry, Dim, GeometryObject, GeometryObjectD, ObjectId, ObjectMeta,
    ObjectRef, ObjectType, Subtree, SupportedDim,
};
use crate::path::PathHints;
use crate::primitives::{BBox, DVec, Vec2};

/// Geometry of a leaf, in the leaf's local coordinates.
pub trait Shape<const DIM: usize>: Clone + fmt::Debug + Send + Sync + 'static {
    fn type_name(&self) -> &'static str;

    fn bounding_box(&self) -> BBox<DIM>;

    fn includes(&self, p: &DVec<DIM>) -> bool {
        self.bounding_box().contains(p)
    }
}

/// Axis-aligned box with one corner at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockShape<const DIM: usize> {
    pub size: DVec<DIM>,
}

impl<const DIM: usize> Shape<DIM> for BlockShape<DIM> {
    fn type_name(&self) -> &'static str {
        dim_name::<DIM>("block2d", "block3d")
    }

    fn bounding_box(&self) -> BBox<DIM> {
        BBox::from_corners(DVec::ZERO, self.size)
    }
}

/// Triangle spanned by the origin and two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleShape {
    pub p0: Vec2,
    pub p1: Vec2,
}

fn cross(a: Vec2, b: Vec2) -> f64 {
    a[0] * b[1] - a[1] * b[0]
}

impl Shape<2> for TriangleShape {
    fn type_name(&self) -> &'static str {
        "triangle"
    }

    fn bounding_box(&self) -> BBox<2> {
        let mut bb = BBox::new(DVec::ZERO, DVec::ZERO);
        bb.include_point(&self.p0);
        bb.include_point(&self.p1);
        bb
    }

    fn includes(&self, p: &Vec2) -> bool {
        if !self.bounding_box().contains(p) {
            return false;
        }
        let (a, b) = (self.p0, self.p1);
        let c0 = cross(a, *p);
        let c1 = cross(b - a, *p - a);
        let c2 = cross(-b, *p - b);
        (c0 >= 0.0 && c1 >= 0.0 && c2 >= 0.0) || (c0 <= 0.0 && c1 <= 0.0 && c2 <= 0.0)
    }
}

/// Empty space of a given width along the transverse axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapShape<const DIM: usize> {
    pub size: f64,
}

impl<const DIM: usize> Shape<DIM> for GapShape<DIM> {
    fn type_name(&self) -> &'static str {
        "gap"
    }

    fn bounding_box(&self) -> BBox<DIM> {
        let mut upper = DVec::ZERO;
        upper[DVec::<DIM>::TRAN] = self.size;
        BBox::from_corners(DVec::ZERO, upper)
    }
}

/// A shape filled with a material.
pub struct Leaf<const DIM: usize, S> {
    meta: ObjectMeta,
    this: Weak<Self>,
    shape: RwLock<S>,
    material: RwLock<Option<MaterialProvider>>,
}

pub type Block<const DIM: usize> = Leaf<DIM, BlockShape<DIM>>;
pub type Rectangle = Block<2>;
pub type Cuboid = Block<3>;
pub type Triangle = Leaf<2, TriangleShape>;
pub type Gap = Leaf<2, GapShape<2>>;

impl<const DIM: usize, S: Shape<DIM>> Leaf<DIM, S> {
    pub fn with_shape(shape: S, material: Option<MaterialProvider>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            meta: ObjectMeta::new(),
            this: this.clone(),
            shape: RwLock::new(shape),
            material: RwLock::new(material),
        })
    }

    pub fn shape(&self) -> S {
        self.shape.read().clone()
    }

    /// Replace the shape and inform parents about the resize.
    pub fn set_shape(&self, shape: S) {
        *self.shape.write() = shape;
        self.meta.fire_changed(EventFlags::RESIZE);
    }

    pub fn material_provider(&self) -> Option<MaterialProvider> {
        self.material.read().clone()
    }

    pub fn set_material_provider(&self, provider: MaterialProvider) {
        *self.material.write() = Some(provider);
        self.meta.fire_changed(EventFlags::NONE);
    }

    /// Fill the whole leaf with `material`.
    pub fn set_material(&self, material: MaterialRef) {
        self.set_material_provider(MaterialProvider::Solid(material));
    }

    /// Use a composition varying from `bottom` to `top` along the leaf height.
    pub fn set_material_top_bottom(&self, db: &dyn MaterialsDb, bottom: &str, top: &str) -> Result<()> {
        let factory = db.mixed_composition(bottom, top)?;
        self.set_material_provider(MaterialProvider::MixedComposition(factory));
        Ok(())
    }

    /// The material if it is the same in the whole leaf.
    pub fn is_solid(&self) -> Option<MaterialRef> {
        self.material.read().as_ref()?.is_solid()
    }

    /// Material in the middle of the leaf.
    pub fn representative_material(&self) -> Option<MaterialRef> {
        Some(self.material.read().as_ref()?.representative())
    }

    fn self_ref(&self) -> Option<ObjectRef<DIM>>
    where
        Dim<DIM>: SupportedDim<DIM>,
    {
        let me: ObjectRef<DIM> = self.this.upgrade()?;
        Some(me)
    }
}

impl<const DIM: usize> Block<DIM> {
    pub fn new(size: DVec<DIM>, material: MaterialRef) -> Arc<Self> {
        Self::with_shape(BlockShape { size }, Some(MaterialProvider::Solid(material)))
    }

    pub fn size(&self) -> DVec<DIM> {
        self.shape.read().size
    }

    pub fn set_size(&self, size: DVec<DIM>) {
        self.set_shape(BlockShape { size });
    }
}

impl Triangle {
    pub fn new(p0: Vec2, p1: Vec2, material: MaterialRef) -> Arc<Self> {
        Self::with_shape(TriangleShape { p0, p1 }, Some(MaterialProvider::Solid(material)))
    }

    pub fn set_p0(&self, p0: Vec2) {
        let p1 = self.shape.read().p1;
        self.set_shape(TriangleShape { p0, p1 });
    }

    pub fn set_p1(&self, p1: Vec2) {
        let p0 = self.shape.read().p0;
        self.set_shape(TriangleShape { p0, p1 });
    }
}

impl Gap {
    pub fn new(size: f64) -> Arc<Self> {
        Self::with_shape(GapShape { size }, None)
    }
}

impl<const DIM: usize, S: Shape<DIM>> GeometryObject for Leaf<DIM, S>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::Leaf
    }

    fn type_name(&self) -> &'static str {
        self.shape.read().type_name()
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn as_object(&self) -> &dyn GeometryObject {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn handle(&self) -> Option<AnyGeometry> {
        self.self_ref().map(erase::<DIM>)
    }

    fn children_count(&self) -> usize {
        0
    }

    fn child_object_at(&self, index: usize) -> Result<AnyGeometry> {
        Err(GeometryError::OutOfBounds {
            what: "child",
            index,
            len: 0,
        })
    }

    fn has_in_subtree(&self, id: ObjectId) -> bool {
        self.meta.id() == id
    }
}

impl<const DIM: usize, S: Shape<DIM>> GeometryObjectD<DIM> for Leaf<DIM, S>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn bounding_box(&self) -> BBox<DIM> {
        self.shape.read().bounding_box()
    }

    fn includes(&self, p: &DVec<DIM>) -> bool {
        self.shape.read().includes(p)
    }

    fn material(&self, p: &DVec<DIM>) -> Option<MaterialRef> {
        let shape = self.shape.read();
        if !shape.includes(p) {
            return None;
        }
        let bb = shape.bounding_box();
        let provider = self.material.read();
        Some(provider.as_ref()?.material_at(p.vert(), bb.lower.vert(), bb.height()))
    }

    fn leafs_bounding_boxes(&self, _path: Option<&PathHints>) -> Vec<BBox<DIM>> {
        vec![self.bounding_box()]
    }

    fn paths_at(&self, p: &DVec<DIM>, _all: bool) -> Option<Subtree> {
        if self.includes(p) {
            Some(Subtree::leaf(self.handle()?))
        } else {
            None
        }
    }

    fn paths_to(&self, id: ObjectId, _path: Option<&PathHints>) -> Option<Subtree> {
        if self.meta.id() == id {
            Some(Subtree::leaf(self.handle()?))
        } else {
            None
        }
    }
}

impl<const DIM: usize, S: Shape<DIM>> fmt::Debug for Leaf<DIM, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leaf")
            .field("id", &self.meta.id())
            .field("shape", &*self.shape.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ChangeListener, Event};
    use crate::material::{MaterialRegistry, NamedMaterial};
    use crate::primitives::{vec2, vec3};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Event>>);

    impl ChangeListener for Recorder {
        fn on_child_changed(&self, event: &Event) {
            self.0.lock().push(*event);
        }
    }

    #[test]
    fn test_block_material() {
        let block = Rectangle::new(vec2(2.0, 1.0), NamedMaterial::shared("GaAs"));
        assert_eq!(block.type_name(), "block2d");
        assert!(block.includes(&vec2(1.0, 0.5)));
        assert!(block.includes(&vec2(2.0, 1.0)));
        assert_eq!(block.material(&vec2(1.0, 0.5)).unwrap().name(), "GaAs");
        assert!(block.material(&vec2(3.0, 0.5)).is_none());
        assert_eq!(block.is_solid().unwrap().name(), "GaAs");
    }

    #[test]
    fn test_cuboid_bounding_box() {
        let cuboid = Cuboid::new(vec3(1.0, 2.0, 3.0), NamedMaterial::shared("Si"));
        let bb = cuboid.bounding_box();
        assert_eq!(bb.lower, vec3(0.0, 0.0, 0.0));
        assert_eq!(bb.upper, vec3(1.0, 2.0, 3.0));
        assert_eq!(cuboid.dimensions(), 3);
        assert!(cuboid.is_leaf());
    }

    #[test]
    fn test_mixed_composition_uses_vertical_fraction() {
        let db = MaterialRegistry::with_names(["GaAs", "AlAs"]);
        let block = Rectangle::new(vec2(1.0, 4.0), NamedMaterial::shared("GaAs"));
        block.set_material_top_bottom(&db, "GaAs", "AlAs").unwrap();
        assert!(block.is_solid().is_none());
        assert_eq!(block.material(&vec2(0.5, 1.0)).unwrap().name(), "GaAs");
        assert_eq!(block.material(&vec2(0.5, 3.0)).unwrap().name(), "AlAs");
        assert_eq!(block.representative_material().unwrap().name(), "AlAs");
    }

    #[test]
    fn test_triangle_includes() {
        let tri = Triangle::new(vec2(2.0, 0.0), vec2(0.0, 2.0), NamedMaterial::shared("Si"));
        assert!(tri.includes(&vec2(0.5, 0.5)));
        assert!(tri.includes(&vec2(1.0, 1.0)));
        assert!(!tri.includes(&vec2(1.5, 1.5)));
        assert!(!tri.includes(&vec2(-0.1, 0.5)));
        let bb = tri.bounding_box();
        assert_eq!(bb.upper, vec2(2.0, 2.0));
    }

    #[test]
    fn test_gap_has_no_material() {
        let gap = Gap::new(3.0);
        assert_eq!(gap.type_name(), "gap");
        assert!(gap.includes(&vec2(1.0, 0.0)));
        assert!(gap.material(&vec2(1.0, 0.0)).is_none());
        assert!((gap.bounding_box().size().tran() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_set_size_fires_resize() {
        let block = Rectangle::new(vec2(1.0, 1.0), NamedMaterial::shared("Si"));
        let recorder = Arc::new(Recorder::default());
        let listener: Arc<dyn ChangeListener> = recorder.clone();
        block.meta().changed().connect(uuid::Uuid::new_v4(), Arc::downgrade(&listener));

        block.set_size(vec2(2.0, 3.0));
        block.set_material(NamedMaterial::shared("GaAs"));

        let events = recorder.0.lock();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_resize());
        assert!(!events[1].is_resize());
        assert_eq!(events[0].source, block.id());
        assert!((block.bounding_box().height() - 3.0).abs() < 1e-10);
    }
}
