//! Container putting 2D children side by side along the transverse axis.

use std::any::Any;
use std::fmt;
use std::iter;
use std::sync::{Arc, Weak};

use crate::container::{collect_paths, wraps, ChildList, ContainerCore};
use crate::error::{GeometryError, Result};
use crate::event::{ChangeListener, Event, EventFlags};
use crate::leaf::Gap;
use crate::material::MaterialRef;
use crate::object::{
    erase, AnyGeometry, GeometryObject, GeometryObjectD, ObjectId, ObjectMeta, ObjectRef,
    ObjectType, Subtree,
};
use crate::path::{Hint, PathHints};
use crate::primitives::{Box2, DVec, Vec2};
use crate::stack::{child_index_for, insertion_index_for, lay_out, shift_all};
use crate::transform::Translation2;

const TRAN: usize = DVec::<2>::TRAN;

/// Children placed left to right with their bottoms at zero.
///
/// Child `i` spans `[boundaries[i], boundaries[i + 1]]` along the transverse
/// axis. [`Gap`] children leave empty space.
pub struct ShelfContainer {
    this: Weak<Self>,
    core: ContainerCore<2, Vec<f64>>,
}

impl ShelfContainer {
    pub fn new(base: f64) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            core: ContainerCore::new(vec![base]),
        })
    }

    fn relayout(state: &mut ChildList<2, Vec<f64>>) {
        let ChildList { items, extra } = state;
        lay_out(items, extra, TRAN, |_, bb| DVec::up(-bb.lower.vert()));
    }

    pub fn add(&self, child: ObjectRef<2>) -> Result<Hint> {
        self.push_back(child)
    }

    pub fn push_back(&self, child: ObjectRef<2>) -> Result<Hint> {
        self.insert(child, self.core.len())
    }

    pub fn push_front(&self, child: ObjectRef<2>) -> Result<Hint> {
        self.insert(child, 0)
    }

    /// Insert `child` before the current child `index`.
    pub fn insert(&self, child: ObjectRef<2>, index: usize) -> Result<Hint> {
        GeometryError::ensure_index("shelf position", index, self.core.len() + 1)?;
        let listener: Weak<dyn ChangeListener> = self.this.clone();
        let placement = self.core.make_placement(&listener, child, DVec::ZERO)?;
        let hint = self.core.hint_for(&placement);
        {
            let mut state = self.core.write();
            state.items.insert(index, placement);
            Self::relayout(&mut state);
        }
        self.core.changed(EventFlags::CHILDREN_INSERT);
        Ok(hint)
    }

    /// Append empty space of width `size`.
    pub fn add_gap(&self, size: f64) -> Result<Hint> {
        self.push_back(Gap::new(size))
    }

    pub fn child_at(&self, index: usize) -> Result<Arc<Translation2>> {
        self.core.child_at(index)
    }

    pub fn remove_at(&self, index: usize) -> Result<()> {
        {
            let mut state = self.core.write();
            self.core.remove_at_locked(&mut state, index)?;
            Self::relayout(&mut state);
        }
        self.core.changed(EventFlags::CHILDREN_REMOVE);
        Ok(())
    }

    pub fn remove(&self, id: ObjectId) -> usize {
        let count = {
            let mut state = self.core.write();
            let removed = self.core.remove_if_locked(&mut state, &wraps::<2>(id));
            Self::relayout(&mut state);
            removed.len()
        };
        if count > 0 {
            self.core.changed(EventFlags::CHILDREN_REMOVE);
        }
        count
    }

    pub fn boundaries(&self) -> Vec<f64> {
        self.core.read().extra.clone()
    }

    pub fn base(&self) -> f64 {
        self.core.read().extra[0]
    }

    pub fn set_base(&self, base: f64) {
        {
            let mut state = self.core.write();
            let delta = base - state.extra[0];
            if delta == 0.0 {
                return;
            }
            let ChildList { items, extra } = &mut *state;
            shift_all(items, extra, TRAN, delta);
        }
        self.core.changed(EventFlags::RESIZE);
    }

    /// Move the shelf so that child `index` starts at zero.
    pub fn set_zero_before(&self, index: usize) -> Result<()> {
        let base = {
            let state = self.core.read();
            GeometryError::ensure_index("shelf position", index, state.extra.len())?;
            state.extra[0] - state.extra[index]
        };
        self.set_base(base);
        Ok(())
    }

    pub fn child_for_tran(&self, tran: f64) -> Option<Arc<Translation2>> {
        let state = self.core.read();
        let index = child_index_for(&state.extra, tran)?;
        Some(state.items[index].clone())
    }

    pub fn insertion_index_for_tran(&self, tran: f64) -> usize {
        insertion_index_for(&self.core.read().extra, tran)
    }

    /// Whether all children other than gaps have the same height.
    pub fn is_flat(&self) -> bool {
        let mut heights = self
            .core
            .children()
            .into_iter()
            .filter_map(|c| c.child())
            .filter(|c| c.type_name() != "gap")
            .map(|c| c.bounding_box().height());
        let Some(first) = heights.next() else {
            return true;
        };
        heights.all(|h| (h - first).abs() <= 1e-12 * first.abs().max(1.0))
    }

    pub fn ensure_flat(&self) -> Result<()> {
        if self.is_flat() {
            Ok(())
        } else {
            Err(GeometryError::bad_input(
                "shelf",
                "not all children have the same height",
            ))
        }
    }
}

impl ChangeListener for ShelfContainer {
    fn on_child_changed(&self, event: &Event) {
        if event.is_resize() {
            Self::relayout(&mut self.core.write());
            self.core.invalidate_bbox();
        }
        self.core.meta.fire_delegated(event);
    }
}

impl GeometryObject for ShelfContainer {
    fn meta(&self) -> &ObjectMeta {
        &self.core.meta
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::Container
    }

    fn type_name(&self) -> &'static str {
        "shelf2d"
    }

    fn dimensions(&self) -> usize {
        2
    }

    fn as_object(&self) -> &dyn GeometryObject {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn handle(&self) -> Option<AnyGeometry> {
        let me: ObjectRef<2> = self.this.upgrade()?;
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

impl GeometryObjectD<2> for ShelfContainer {
    fn bounding_box(&self) -> Box2 {
        self.core.bounding_box()
    }

    fn includes(&self, p: &Vec2) -> bool {
        self.child_for_tran(p.tran()).is_some_and(|c| c.includes(p))
    }

    fn material(&self, p: &Vec2) -> Option<MaterialRef> {
        self.child_for_tran(p.tran())?.material(p)
    }

    fn leafs_bounding_boxes(&self, path: Option<&PathHints>) -> Vec<Box2> {
        self.core.leafs_bounding_boxes(path)
    }

    fn paths_at(&self, p: &Vec2, all: bool) -> Option<Subtree> {
        let child = self.child_for_tran(p.tran())?;
        collect_paths(self.handle(), iter::once(&child), p, all)
    }

    fn paths_to(&self, id: ObjectId, path: Option<&PathHints>) -> Option<Subtree> {
        self.core.paths_to(self.handle(), id, path)
    }
}

impl fmt::Debug for ShelfContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShelfContainer")
            .field("id", &self.core.meta.id())
            .field("boundaries", &self.core.read().extra)
            .finish()
    }
}
