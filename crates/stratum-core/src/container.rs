//! State and algorithms shared by every multi-child container.
//!
//! Each child is stored behind its own [`Translation`] placement, created by
//! the container. The container listens on every placement; a resize event
//! resets the memoized bounding box and is re-fired to the container's parents.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{GeometryError, Result};
use crate::event::{ChangeListener, EventFlags};
use crate::object::{
    ensure_can_have_as_child, erase, AnyGeometry, Dim, GeometryObject, GeometryObjectD, ObjectId,
    ObjectMeta, ObjectRef, Subtree, SupportedDim,
};
use crate::path::{path_allows, Hint, PathHints};
use crate::primitives::{BBox, DVec};
use crate::transform::Translation;

/// Placement wrappers of one container plus container-specific layout data.
pub(crate) struct ChildList<const DIM: usize, S> {
    pub items: Vec<Arc<Translation<DIM>>>,
    pub extra: S,
}

pub(crate) struct ContainerCore<const DIM: usize, S = ()> {
    pub meta: ObjectMeta,
    state: RwLock<ChildList<DIM, S>>,
    bbox: Mutex<Option<BBox<DIM>>>,
}

impl<const DIM: usize, S> ContainerCore<DIM, S>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    pub fn new(extra: S) -> Self {
        Self {
            meta: ObjectMeta::new(),
            state: RwLock::new(ChildList {
                items: Vec::new(),
                extra,
            }),
            bbox: Mutex::new(None),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.meta.id()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ChildList<DIM, S>> {
        self.state.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ChildList<DIM, S>> {
        self.state.write()
    }

    /// Snapshot of the placements.
    pub fn children(&self) -> Vec<Arc<Translation<DIM>>> {
        self.state.read().items.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().items.len()
    }

    pub fn child_at(&self, index: usize) -> Result<Arc<Translation<DIM>>> {
        let state = self.state.read();
        GeometryError::ensure_index("child", index, state.items.len())?;
        Ok(state.items[index].clone())
    }

    pub fn child_object_at(&self, index: usize) -> Result<AnyGeometry> {
        Ok(erase::<DIM>(self.child_at(index)?))
    }

    // ── Mutation helpers ──

    /// Placement of `child` at `translation`, registered with `listener`.
    /// Fails if the container is in the subtree of `child`.
    pub fn make_placement(
        &self,
        listener: &Weak<dyn ChangeListener>,
        child: ObjectRef<DIM>,
        translation: DVec<DIM>,
    ) -> Result<Arc<Translation<DIM>>> {
        ensure_can_have_as_child(self.id(), &*child)?;
        let placement = Translation::new(Some(child), translation);
        placement.meta().changed().connect(self.id(), listener.clone());
        Ok(placement)
    }

    pub fn hint_for(&self, placement: &Arc<Translation<DIM>>) -> Hint {
        Hint::new(self.id(), erase::<DIM>(placement.clone()))
    }

    fn release(&self, placement: &Translation<DIM>) {
        placement.meta().changed().disconnect(self.id());
    }

    /// Remove placement `index` from `state`. The caller fires the event.
    pub fn remove_at_locked(
        &self,
        state: &mut ChildList<DIM, S>,
        index: usize,
    ) -> Result<Arc<Translation<DIM>>> {
        GeometryError::ensure_index("child", index, state.items.len())?;
        let placement = state.items.remove(index);
        self.release(&placement);
        Ok(placement)
    }

    /// Remove every placement matching `predicate`, returning the removed indices.
    pub fn remove_if_locked(
        &self,
        state: &mut ChildList<DIM, S>,
        predicate: &dyn Fn(&Arc<Translation<DIM>>) -> bool,
    ) -> Vec<usize> {
        let mut removed = Vec::new();
        let mut index = 0;
        state.items.retain(|placement| {
            let keep = !predicate(placement);
            if !keep {
                self.release(placement);
                removed.push(index);
            }
            index += 1;
            keep
        });
        removed
    }

    pub fn invalidate_bbox(&self) {
        *self.bbox.lock() = None;
    }

    /// Reset the memoized bounding box and inform parents.
    pub fn changed(&self, flags: EventFlags) {
        self.invalidate_bbox();
        self.meta.fire_changed(flags);
    }

    // ── Queries ──

    /// Union of the children's boxes; a zero box when empty.
    pub fn bounding_box(&self) -> BBox<DIM> {
        if let Some(bb) = *self.bbox.lock() {
            return bb;
        }
        let computed = self
            .children()
            .iter()
            .map(|c| c.bounding_box())
            .reduce(|a, b| a.union(&b))
            .unwrap_or(BBox::ZERO);
        *self.bbox.lock() = Some(computed);
        computed
    }

    pub fn has_in_subtree(&self, id: ObjectId) -> bool {
        self.id() == id || self.state.read().items.iter().any(|c| c.has_in_subtree(id))
    }

    pub fn validate(&self) -> Result<()> {
        for child in self.children() {
            child.validate()?;
        }
        Ok(())
    }

    pub fn intersects_linear(&self, area: &BBox<DIM>) -> bool {
        self.state.read().items.iter().any(|c| c.intersects(area))
    }

    pub fn leafs_bounding_boxes(&self, path: Option<&PathHints>) -> Vec<BBox<DIM>> {
        let id = self.id();
        self.children()
            .iter()
            .filter(|c| path_allows(path, id, c.id()))
            .flat_map(|c| c.leafs_bounding_boxes(path))
            .collect()
    }

    pub fn paths_to(
        &self,
        handle: Option<AnyGeometry>,
        id: ObjectId,
        path: Option<&PathHints>,
    ) -> Option<Subtree> {
        let handle = handle?;
        if self.id() == id {
            return Some(Subtree::leaf(handle));
        }
        let own_id = self.id();
        let found: Vec<Subtree> = self
            .children()
            .iter()
            .filter(|c| path_allows(path, own_id, c.id()))
            .filter_map(|c| c.paths_to(id, path))
            .collect();
        if found.is_empty() {
            None
        } else {
            Some(Subtree::with_children(handle, found))
        }
    }
}

/// Paths through `candidates` (already in priority order) to the leaves at `p`.
pub(crate) fn collect_paths<'a, const DIM: usize, I>(
    handle: Option<AnyGeometry>,
    candidates: I,
    p: &DVec<DIM>,
    all: bool,
) -> Option<Subtree>
where
    I: IntoIterator<Item = &'a Arc<Translation<DIM>>>,
    Dim<DIM>: SupportedDim<DIM>,
{
    let mut found = Vec::new();
    for child in candidates {
        if let Some(sub) = child.paths_at(p, all) {
            found.push(sub);
            if !all {
                break;
            }
        }
    }
    if found.is_empty() {
        None
    } else {
        Some(Subtree::with_children(handle?, found))
    }
}

/// Predicate matching a placement itself or the object it wraps.
pub(crate) fn wraps<const DIM: usize>(id: ObjectId) -> impl Fn(&Arc<Translation<DIM>>) -> bool
where
    Dim<DIM>: SupportedDim<DIM>,
{
    move |placement| placement.id() == id || placement.child().is_some_and(|c| c.id() == id)
}
