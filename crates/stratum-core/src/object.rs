//! Base traits of the geometry graph.
//!
//! Every node implements the dimension-independent [`GeometryObject`] trait
//! and exactly one of `GeometryObjectD<2>` / `GeometryObjectD<3>`. Nodes are
//! always owned through `Arc` and may be shared by many parents; the graph is
//! kept acyclic by [`ensure_can_have_as_child`] on every insertion.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{GeometryError, Result};
use crate::event::{ChangeSignal, Event, EventFlags};
use crate::material::MaterialRef;
use crate::path::PathHints;
use crate::primitives::{BBox, DVec};

/// Stable identity of a geometry object.
pub type ObjectId = Uuid;

/// Structural kind of a geometry object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// No children, carries a material.
    Leaf,
    /// Exactly one child in the same space.
    Transform,
    /// Exactly one child in a space with a different number of dimensions.
    SpaceChanger,
    /// Any number of children, each with its own placement.
    Container,
}

/// Identity, name, roles and change signal of one object.
pub struct ObjectMeta {
    id: ObjectId,
    name: RwLock<Option<String>>,
    roles: RwLock<BTreeSet<String>>,
    changed: ChangeSignal,
}

impl ObjectMeta {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: RwLock::new(None),
            roles: RwLock::new(BTreeSet::new()),
            changed: ChangeSignal::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn changed(&self) -> &ChangeSignal {
        &self.changed
    }

    /// Inform parents that this object changed.
    pub fn fire_changed(&self, flags: EventFlags) {
        self.changed.fire(&Event::new(self.id, flags));
    }

    /// Re-fire an event received from a child to the parents of this object.
    pub fn fire_delegated(&self, event: &Event) {
        self.changed.fire(&event.delegated(self.id));
    }
}

impl Default for ObjectMeta {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectMeta")
            .field("id", &self.id)
            .field("name", &*self.name.read())
            .field("roles", &*self.roles.read())
            .finish()
    }
}

/// Predicate over objects used by subtree searches.
pub type ObjectPredicate<'a> = &'a dyn Fn(&dyn GeometryObject) -> bool;

/// Dimension-independent part of every geometry node.
pub trait GeometryObject: Send + Sync {
    fn meta(&self) -> &ObjectMeta;

    fn object_type(&self) -> ObjectType;

    /// Name of the concrete kind, e.g. `block2d` or `stack3d`.
    fn type_name(&self) -> &'static str;

    /// Number of dimensions of the space this object lives in (2 or 3).
    fn dimensions(&self) -> usize;

    fn as_object(&self) -> &dyn GeometryObject;

    fn as_any(&self) -> &dyn Any;

    /// Shared handle to this object, `None` only while the object is being dropped.
    fn handle(&self) -> Option<AnyGeometry>;

    /// Check that the object is complete enough to be used by a solver.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn children_count(&self) -> usize;

    /// Child with the given index, as a dimension-erased handle.
    fn child_object_at(&self, index: usize) -> Result<AnyGeometry>;

    /// `true` if `id` is this object or any of its descendants.
    fn has_in_subtree(&self, id: ObjectId) -> bool;

    /// Push every object of this subtree matching `predicate`. A matching
    /// object is pushed instead of (not in addition to) its descendants.
    fn collect_objects(&self, predicate: ObjectPredicate<'_>, dest: &mut Vec<AnyGeometry>) {
        if predicate(self.as_object()) {
            if let Some(h) = self.handle() {
                dest.push(h);
            }
            return;
        }
        for i in 0..self.children_count() {
            if let Ok(child) = self.child_object_at(i) {
                child.object().collect_objects(predicate, dest);
            }
        }
    }

    fn id(&self) -> ObjectId {
        self.meta().id()
    }

    fn name(&self) -> Option<String> {
        self.meta().name.read().clone()
    }

    fn set_name(&self, name: Option<&str>) {
        *self.meta().name.write() = name.map(str::to_string);
    }

    fn roles(&self) -> BTreeSet<String> {
        self.meta().roles.read().clone()
    }

    fn add_role(&self, role: &str) {
        self.meta().roles.write().insert(role.to_string());
    }

    fn remove_role(&self, role: &str) -> bool {
        self.meta().roles.write().remove(role)
    }

    fn clear_roles(&self) {
        self.meta().roles.write().clear();
    }

    fn has_role(&self, role: &str) -> bool {
        self.meta().roles.read().contains(role)
    }

    fn is_leaf(&self) -> bool {
        self.object_type() == ObjectType::Leaf
    }

    fn is_container(&self) -> bool {
        self.object_type() == ObjectType::Container
    }
}

/// Shared handle to a child in `DIM`-dimensional space.
pub type ObjectRef<const DIM: usize> = Arc<dyn GeometryObjectD<DIM>>;

/// Geometry queries in a space with `DIM` dimensions.
pub trait GeometryObjectD<const DIM: usize>: GeometryObject {
    /// Smallest box containing the whole object.
    fn bounding_box(&self) -> BBox<DIM>;

    /// `true` if the object occupies point `p`.
    fn includes(&self, p: &DVec<DIM>) -> bool;

    /// `true` if the object may occupy some point of `area`.
    fn intersects(&self, area: &BBox<DIM>) -> bool {
        self.bounding_box().intersects(area)
    }

    /// Material at `p`, `None` if the object does not occupy `p`.
    fn material(&self, p: &DVec<DIM>) -> Option<MaterialRef>;

    /// Bounding boxes of all leaves, in this object's coordinates. With
    /// `path`, containers only descend into the hinted child.
    fn leafs_bounding_boxes(&self, path: Option<&PathHints>) -> Vec<BBox<DIM>>;

    /// Paths from this object to the leaves occupying `p`. Only the first
    /// (top-most) match is followed in each container unless `all` is set.
    fn paths_at(&self, p: &DVec<DIM>, all: bool) -> Option<Subtree>;

    /// Paths from this object to every occurrence of object `id`.
    fn paths_to(&self, id: ObjectId, path: Option<&PathHints>) -> Option<Subtree>;

    fn bounding_box_size(&self) -> DVec<DIM> {
        self.bounding_box().size()
    }
}

/// Marker type for a number of dimensions.
pub struct Dim<const N: usize>;

/// Implemented for `Dim<2>` and `Dim<3>`: the spaces geometry objects live in.
pub trait SupportedDim<const DIM: usize> {
    fn wrap(object: ObjectRef<DIM>) -> AnyGeometry;

    fn unwrap(object: &AnyGeometry) -> Result<ObjectRef<DIM>>;
}

impl SupportedDim<2> for Dim<2> {
    fn wrap(object: ObjectRef<2>) -> AnyGeometry {
        AnyGeometry::D2(object)
    }

    fn unwrap(object: &AnyGeometry) -> Result<ObjectRef<2>> {
        object.as_2d()
    }
}

impl SupportedDim<3> for Dim<3> {
    fn wrap(object: ObjectRef<3>) -> AnyGeometry {
        AnyGeometry::D3(object)
    }

    fn unwrap(object: &AnyGeometry) -> Result<ObjectRef<3>> {
        object.as_3d()
    }
}

/// Dimension-erased handle to `object`.
pub fn erase<const DIM: usize>(object: ObjectRef<DIM>) -> AnyGeometry
where
    Dim<DIM>: SupportedDim<DIM>,
{
    <Dim<DIM> as SupportedDim<DIM>>::wrap(object)
}

/// Typed handle to `object`, failing if it lives in another space.
pub fn restore<const DIM: usize>(object: &AnyGeometry) -> Result<ObjectRef<DIM>>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    <Dim<DIM> as SupportedDim<DIM>>::unwrap(object)
}

/// Pick the kind name matching `DIM`.
pub(crate) fn dim_name<const DIM: usize>(name2d: &'static str, name3d: &'static str) -> &'static str {
    if DIM == 2 {
        name2d
    } else {
        name3d
    }
}

/// Fail with [`GeometryError::CyclicReference`] if `parent` lies in the subtree of `child`.
pub fn ensure_can_have_as_child<C>(parent: ObjectId, child: &C) -> Result<()>
where
    C: GeometryObject + ?Sized,
{
    if child.has_in_subtree(parent) {
        Err(GeometryError::CyclicReference)
    } else {
        Ok(())
    }
}

/// Objects of the subtree of `root` tagged with `role`.
pub fn objects_with_role(root: &dyn GeometryObject, role: &str) -> Vec<AnyGeometry> {
    let mut dest = Vec::new();
    root.collect_objects(&|o: &dyn GeometryObject| o.has_role(role), &mut dest);
    dest
}

/// Shared handle to an object of either dimensionality.
#[derive(Clone)]
pub enum AnyGeometry {
    D2(ObjectRef<2>),
    D3(ObjectRef<3>),
}

impl AnyGeometry {
    pub fn d2<T: GeometryObjectD<2> + 'static>(object: Arc<T>) -> Self {
        AnyGeometry::D2(object)
    }

    pub fn d3<T: GeometryObjectD<3> + 'static>(object: Arc<T>) -> Self {
        AnyGeometry::D3(object)
    }

    pub fn object(&self) -> &dyn GeometryObject {
        match self {
            AnyGeometry::D2(o) => o.as_object(),
            AnyGeometry::D3(o) => o.as_object(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.object().id()
    }

    pub fn dimensions(&self) -> usize {
        match self {
            AnyGeometry::D2(_) => 2,
            AnyGeometry::D3(_) => 3,
        }
    }

    pub fn as_2d(&self) -> Result<ObjectRef<2>> {
        match self {
            AnyGeometry::D2(o) => Ok(o.clone()),
            AnyGeometry::D3(_) => Err(GeometryError::WrongDimension {
                expected: 2,
                actual: 3,
            }),
        }
    }

    pub fn as_3d(&self) -> Result<ObjectRef<3>> {
        match self {
            AnyGeometry::D3(o) => Ok(o.clone()),
            AnyGeometry::D2(_) => Err(GeometryError::WrongDimension {
                expected: 3,
                actual: 2,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakGeometry {
        match self {
            AnyGeometry::D2(o) => WeakGeometry::D2(Arc::downgrade(o)),
            AnyGeometry::D3(o) => WeakGeometry::D3(Arc::downgrade(o)),
        }
    }

    pub fn ptr_eq(&self, other: &AnyGeometry) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for AnyGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let obj = self.object();
        f.debug_struct("AnyGeometry")
            .field("type", &obj.type_name())
            .field("id", &obj.id())
            .field("name", &obj.name())
            .finish()
    }
}

impl From<ObjectRef<2>> for AnyGeometry {
    fn from(o: ObjectRef<2>) -> Self {
        AnyGeometry::D2(o)
    }
}

impl From<ObjectRef<3>> for AnyGeometry {
    fn from(o: ObjectRef<3>) -> Self {
        AnyGeometry::D3(o)
    }
}

/// Non-owning counterpart of [`AnyGeometry`].
#[derive(Clone)]
pub enum WeakGeometry {
    D2(Weak<dyn GeometryObjectD<2>>),
    D3(Weak<dyn GeometryObjectD<3>>),
}

impl WeakGeometry {
    pub fn upgrade(&self) -> Option<AnyGeometry> {
        match self {
            WeakGeometry::D2(w) => w.upgrade().map(AnyGeometry::D2),
            WeakGeometry::D3(w) => w.upgrade().map(AnyGeometry::D3),
        }
    }
}

/// Tree of paths through the geometry graph.
///
/// `object` is the node the tree starts at; `children` are subtrees rooted
/// at children of that node. A tree without children ends at `object`.
#[derive(Clone, Debug)]
pub struct Subtree {
    pub object: AnyGeometry,
    pub children: Vec<Subtree>,
}

impl Subtree {
    pub fn leaf(object: AnyGeometry) -> Self {
        Self {
            object,
            children: Vec::new(),
        }
    }

    pub fn with_children(object: AnyGeometry, children: Vec<Subtree>) -> Self {
        Self { object, children }
    }

    /// Prepend `object` to `child` if there is a child.
    pub fn extend_if_some(object: Option<AnyGeometry>, child: Option<Subtree>) -> Option<Subtree> {
        Some(Self::with_children(object?, vec![child?]))
    }

    pub fn has_branches(&self) -> bool {
        self.children.len() > 1 || self.children.iter().any(Subtree::has_branches)
    }

    /// Every root-to-end path of the tree.
    pub fn paths(&self) -> Vec<Vec<AnyGeometry>> {
        if self.children.is_empty() {
            return vec![vec![self.object.clone()]];
        }
        let mut result = Vec::new();
        for child in &self.children {
            for mut tail in child.paths() {
                tail.insert(0, self.object.clone());
                result.push(tail);
            }
        }
        result
    }

    /// Object at the end of the first path.
    pub fn last(&self) -> &AnyGeometry {
        match self.children.first() {
            Some(child) => child.last(),
            None => &self.object,
        }
    }
}
