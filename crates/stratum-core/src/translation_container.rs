//! Container placing every child at its own translation.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::cache::SpatialCache;
use crate::container::{wraps, ContainerCore};
use crate::error::Result;
use crate::event::{ChangeListener, Event, EventFlags};
use crate::material::MaterialRef;
use crate::object::{
    dim_name, erase, AnyGeometry, Dim, GeometryObject, GeometryObjectD, ObjectId, ObjectMeta,
    ObjectRef, ObjectType, Subtree, SupportedDim,
};
use crate::path::{Hint, PathHints};
use crate::primitives::{BBox, DVec};
use crate::transform::Translation;

/// Children placed at arbitrary translations.
///
/// Children may overlap; queries resolve an overlap in favour of the child
/// added last. Point queries go through a spatial index built on first use
/// after every change of the children.
pub struct TranslationContainer<const DIM: usize> {
    this: Weak<Self>,
    core: ContainerCore<DIM>,
    cache: RwLock<OnceCell<Arc<SpatialCache<DIM>>>>,
}

pub type TranslationContainer2 = TranslationContainer<2>;
pub type TranslationContainer3 = TranslationContainer<3>;

impl<const DIM: usize> TranslationContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            core: ContainerCore::new(()),
            cache: RwLock::new(OnceCell::new()),
        })
    }

    fn listener(&self) -> Weak<dyn ChangeListener> {
        self.this.clone()
    }

    /// Add `child` moved by `translation`. Fails with a cyclic reference error
    /// and leaves the container unchanged if the container is inside `child`.
    pub fn add(&self, child: ObjectRef<DIM>, translation: DVec<DIM>) -> Result<Hint> {
        let placement = self.core.make_placement(&self.listener(), child, translation)?;
        Ok(self.push_placement(placement))
    }

    fn push_placement(&self, placement: Arc<Translation<DIM>>) -> Hint {
        let hint = self.core.hint_for(&placement);
        self.core.write().items.push(placement);
        self.invalidate_cache();
        self.core.changed(EventFlags::CHILDREN_INSERT);
        hint
    }

    pub fn child_at(&self, index: usize) -> Result<Arc<Translation<DIM>>> {
        self.core.child_at(index)
    }

    pub fn remove_at(&self, index: usize) -> Result<()> {
        self.core.remove_at_locked(&mut self.core.write(), index)?;
        self.invalidate_cache();
        self.core.changed(EventFlags::CHILDREN_REMOVE);
        Ok(())
    }

    /// Remove every placement matching `predicate`. Returns how many were removed.
    pub fn remove_if(&self, predicate: impl Fn(&Arc<Translation<DIM>>) -> bool) -> usize {
        let removed = self.core.remove_if_locked(&mut self.core.write(), &predicate);
        if !removed.is_empty() {
            self.invalidate_cache();
            self.core.changed(EventFlags::CHILDREN_REMOVE);
        }
        removed.len()
    }

    /// Remove every placement of object `id` (or the placement `id` itself).
    pub fn remove(&self, id: ObjectId) -> usize {
        self.remove_if(wraps(id))
    }

    /// Drop the spatial index. The next point query builds a fresh one.
    pub fn invalidate_cache(&self) {
        *self.cache.write() = OnceCell::new();
    }

    pub fn is_cache_built(&self) -> bool {
        self.cache.read().get().is_some()
    }

    /// Current index, built outside any lock if missing. When threads race,
    /// every one builds but only the first result is kept.
    fn spatial_cache(&self) -> Arc<SpatialCache<DIM>> {
        if let Some(cache) = self.cache.read().get() {
            return cache.clone();
        }
        let built = Arc::new(SpatialCache::build(self.core.children()));
        self.cache.read().get_or_init(|| built).clone()
    }
}

impl<const DIM: usize> ChangeListener for TranslationContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn on_child_changed(&self, event: &Event) {
        if event.is_resize() {
            self.invalidate_cache();
            self.core.invalidate_bbox();
        }
        self.core.meta.fire_delegated(event);
    }
}

impl<const DIM: usize> GeometryObject for TranslationContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn meta(&self) -> &ObjectMeta {
        &self.core.meta
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::Container
    }

    fn type_name(&self) -> &'static str {
        dim_name::<DIM>("container2d", "container3d")
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
        let me: ObjectRef<DIM> = self.this.upgrade()?;
        Some(erase(me))
    }

    fn validate(&self) -> Result<()> {
        self.core.validate()
    }

    fn children_count(&self) -> usize {
        self.core.len()
    }

    fn child_object_at(&self, index: usize) -> Result<AnyGeometry> {
        self.core.child_object_at(index)
    }

    fn has_in_subtree(&self, id: ObjectId) -> bool {
        self.core.has_in_subtree(id)
    }
}

impl<const DIM: usize> GeometryObjectD<DIM> for TranslationContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn bounding_box(&self) -> BBox<DIM> {
        self.core.bounding_box()
    }

    fn includes(&self, p: &DVec<DIM>) -> bool {
        self.spatial_cache().includes(p)
    }

    fn intersects(&self, area: &BBox<DIM>) -> bool {
        self.core.intersects_linear(area)
    }

    fn material(&self, p: &DVec<DIM>) -> Option<MaterialRef> {
        self.spatial_cache().material(p)
    }

    fn leafs_bounding_boxes(&self, path: Option<&PathHints>) -> Vec<BBox<DIM>> {
        self.core.leafs_bounding_boxes(path)
    }

    fn paths_at(&self, p: &DVec<DIM>, all: bool) -> Option<Subtree> {
        self.spatial_cache().paths_at(self.handle(), p, all)
    }

    fn paths_to(&self, id: ObjectId, path: Option<&PathHints>) -> Option<Subtree> {
        self.core.paths_to(self.handle(), id, path)
    }
}

impl<const DIM: usize> fmt::Debug for TranslationContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationContainer")
            .field("id", &self.core.meta.id())
            .field("children", &self.core.read().items.len())
            .finish()
    }
}
