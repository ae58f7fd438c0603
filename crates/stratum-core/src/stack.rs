//! Containers laying out children one on top of another.

use std::any::Any;
use std::fmt;
use std::iter;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::align::Aligner;
use crate::container::{collect_paths, wraps, ChildList, ContainerCore};
use crate::error::{GeometryError, Result};
use crate::event::{ChangeListener, Event, EventFlags};
use crate::material::MaterialRef;
use crate::object::{
    dim_name, erase, AnyGeometry, Dim, GeometryObject, GeometryObjectD, ObjectId, ObjectMeta,
    ObjectRef, ObjectType, Subtree, SupportedDim,
};
use crate::path::{Hint, PathHints};
use crate::primitives::{BBox, DVec};
use crate::transform::Translation;

// ── Sequential layout ──

/// Index of the child whose interval `[b[i], b[i + 1])` holds `x`. The top
/// boundary belongs to the last child.
pub(crate) fn child_index_for(boundaries: &[f64], x: f64) -> Option<usize> {
    let n = boundaries.len().checked_sub(1)?;
    if n == 0 {
        return None;
    }
    let idx = boundaries.partition_point(|b| *b <= x);
    if idx == 0 {
        None
    } else if idx <= n {
        Some(idx - 1)
    } else if x == boundaries[n] {
        Some(n - 1)
    } else {
        None
    }
}

/// Index at which a child starting at `x` would be inserted.
pub(crate) fn insertion_index_for(boundaries: &[f64], x: f64) -> usize {
    let n = boundaries.len().saturating_sub(1);
    boundaries.partition_point(|b| *b < x).min(n)
}

/// Put `items` one after another along `axis`, starting at `boundaries[0]`,
/// and rebuild the boundaries. `cross` gives the translation on the other axes.
pub(crate) fn lay_out<const DIM: usize>(
    items: &[Arc<Translation<DIM>>],
    boundaries: &mut Vec<f64>,
    axis: usize,
    cross: impl Fn(usize, &BBox<DIM>) -> DVec<DIM>,
) where
    Dim<DIM>: SupportedDim<DIM>,
{
    let base = boundaries.first().copied().unwrap_or(0.0);
    boundaries.clear();
    boundaries.push(base);
    let mut top = base;
    for (i, placement) in items.iter().enumerate() {
        let bb = placement
            .child()
            .map(|c| c.bounding_box())
            .unwrap_or(BBox::ZERO);
        let mut t = cross(i, &bb);
        t[axis] = top - bb.lower[axis];
        placement.set_translation_silent(t);
        top += bb.upper[axis] - bb.lower[axis];
        boundaries.push(top);
    }
}

/// Move every placement and boundary by `delta` along `axis`.
pub(crate) fn shift_all<const DIM: usize>(
    items: &[Arc<Translation<DIM>>],
    boundaries: &mut [f64],
    axis: usize,
    delta: f64,
) where
    Dim<DIM>: SupportedDim<DIM>,
{
    for b in boundaries.iter_mut() {
        *b += delta;
    }
    for placement in items {
        let mut t = placement.translation();
        t[axis] += delta;
        placement.set_translation_silent(t);
    }
}

// ── StackContainer ──

/// Vertical boundaries and per-child aligners of a stack.
pub(crate) struct StackLayout {
    heights: Vec<f64>,
    aligners: Vec<Aligner>,
}

type StackState<const DIM: usize> = ChildList<DIM, StackLayout>;

/// Children stacked bottom to top.
///
/// Child `i` occupies heights `[heights[i], heights[i + 1]]`; its position in
/// the other axes is given by its aligner.
pub struct StackContainer<const DIM: usize> {
    owner: Weak<dyn ChangeListener>,
    owner_handle: Weak<dyn GeometryObjectD<DIM>>,
    core: ContainerCore<DIM, StackLayout>,
    default_aligner: RwLock<Aligner>,
}

pub type Stack2 = StackContainer<2>;
pub type Stack3 = StackContainer<3>;

impl<const DIM: usize> StackContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    pub fn new(base_height: f64) -> Arc<Self> {
        Self::with_aligner(base_height, Aligner::default())
    }

    /// Stack using `aligner` for children added without their own aligner.
    pub fn with_aligner(base_height: f64, aligner: Aligner) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let owner: Weak<dyn ChangeListener> = this.clone();
            let owner_handle: Weak<dyn GeometryObjectD<DIM>> = this.clone();
            Self::embedded(owner, owner_handle, base_height, aligner)
        })
    }

    /// Stack state owned by another object, which receives the child events.
    pub(crate) fn embedded(
        owner: Weak<dyn ChangeListener>,
        owner_handle: Weak<dyn GeometryObjectD<DIM>>,
        base_height: f64,
        aligner: Aligner,
    ) -> Self {
        Self {
            owner,
            owner_handle,
            core: ContainerCore::new(StackLayout {
                heights: vec![base_height],
                aligners: Vec::new(),
            }),
            default_aligner: RwLock::new(aligner),
        }
    }

    pub fn default_aligner(&self) -> Aligner {
        *self.default_aligner.read()
    }

    pub fn set_default_aligner(&self, aligner: Aligner) {
        *self.default_aligner.write() = aligner;
    }

    fn relayout(state: &mut StackState<DIM>) {
        let ChildList { items, extra } = state;
        let aligners = &extra.aligners;
        lay_out(items, &mut extra.heights, DVec::<DIM>::VERT, |i, bb| {
            aligners[i].translation(bb)
        });
    }

    // ── Children ──

    /// Put `child` on top of the stack using the default aligner.
    pub fn add(&self, child: ObjectRef<DIM>) -> Result<Hint> {
        self.push_back(child, self.default_aligner())
    }

    pub fn push_back(&self, child: ObjectRef<DIM>, aligner: Aligner) -> Result<Hint> {
        let index = self.core.len();
        self.insert(child, index, aligner)
    }

    pub fn push_front(&self, child: ObjectRef<DIM>, aligner: Aligner) -> Result<Hint> {
        self.insert(child, 0, aligner)
    }

    /// Insert `child` below the current child `index`, moving it and all
    /// children above up by the new child's height.
    pub fn insert(&self, child: ObjectRef<DIM>, index: usize, aligner: Aligner) -> Result<Hint> {
        GeometryError::ensure_index("stack position", index, self.core.len() + 1)?;
        let placement = self.core.make_placement(&self.owner, child, DVec::ZERO)?;
        let hint = self.core.hint_for(&placement);
        {
            let mut state = self.core.write();
            state.items.insert(index, placement);
            state.extra.aligners.insert(index, aligner);
            Self::relayout(&mut state);
        }
        self.core.changed(EventFlags::CHILDREN_INSERT);
        Ok(hint)
    }

    pub fn child_at(&self, index: usize) -> Result<Arc<Translation<DIM>>> {
        self.core.child_at(index)
    }

    pub fn remove_at(&self, index: usize) -> Result<()> {
        {
            let mut state = self.core.write();
            self.core.remove_at_locked(&mut state, index)?;
            state.extra.aligners.remove(index);
            Self::relayout(&mut state);
        }
        self.core.changed(EventFlags::CHILDREN_REMOVE);
        Ok(())
    }

    /// Remove every placement matching `predicate`. Returns how many were removed.
    pub fn remove_if(&self, predicate: impl Fn(&Arc<Translation<DIM>>) -> bool) -> usize {
        let count = {
            let mut state = self.core.write();
            let removed = self.core.remove_if_locked(&mut state, &predicate);
            for index in removed.iter().rev() {
                state.extra.aligners.remove(*index);
            }
            Self::relayout(&mut state);
            removed.len()
        };
        if count > 0 {
            self.core.changed(EventFlags::CHILDREN_REMOVE);
        }
        count
    }

    /// Remove every placement of object `id`.
    pub fn remove(&self, id: ObjectId) -> usize {
        self.remove_if(wraps(id))
    }

    pub fn aligner_at(&self, index: usize) -> Result<Aligner> {
        let state = self.core.read();
        GeometryError::ensure_index("child", index, state.extra.aligners.len())?;
        Ok(state.extra.aligners[index])
    }

    pub fn set_aligner_at(&self, index: usize, aligner: Aligner) -> Result<()> {
        {
            let mut state = self.core.write();
            GeometryError::ensure_index("child", index, state.items.len())?;
            state.extra.aligners[index] = aligner;
            Self::relayout(&mut state);
        }
        self.core.changed(EventFlags::RESIZE);
        Ok(())
    }

    // ── Heights ──

    /// Boundaries between children, from the base to the top.
    pub fn heights(&self) -> Vec<f64> {
        self.core.read().extra.heights.clone()
    }

    pub fn base_height(&self) -> f64 {
        self.core.read().extra.heights[0]
    }

    /// Total height of all children.
    pub fn height(&self) -> f64 {
        let state = self.core.read();
        let heights = &state.extra.heights;
        heights[heights.len() - 1] - heights[0]
    }

    /// Move the whole stack so that its bottom is at `base_height`.
    pub fn set_base_height(&self, base_height: f64) {
        {
            let mut state = self.core.write();
            let delta = base_height - state.extra.heights[0];
            if delta == 0.0 {
                return;
            }
            let ChildList { items, extra } = &mut *state;
            shift_all(items, &mut extra.heights, DVec::<DIM>::VERT, delta);
        }
        self.core.changed(EventFlags::RESIZE);
    }

    /// Move the whole stack so that the bottom of child `index` is at zero.
    /// `index` equal to the number of children puts the top at zero.
    pub fn set_zero_before(&self, index: usize) -> Result<()> {
        let base = {
            let state = self.core.read();
            let heights = &state.extra.heights;
            GeometryError::ensure_index("stack position", index, heights.len())?;
            heights[0] - heights[index]
        };
        self.set_base_height(base);
        Ok(())
    }

    pub fn child_index_for_height(&self, height: f64) -> Option<usize> {
        child_index_for(&self.core.read().extra.heights, height)
    }

    /// Placement occupying `height`, `None` below the base or above the top.
    pub fn child_for_height(&self, height: f64) -> Option<Arc<Translation<DIM>>> {
        let state = self.core.read();
        let index = child_index_for(&state.extra.heights, height)?;
        Some(state.items[index].clone())
    }

    pub fn insertion_index_for_height(&self, height: f64) -> usize {
        insertion_index_for(&self.core.read().extra.heights, height)
    }

    // ── Shared with MultiStackContainer ──

    pub(crate) fn meta_ref(&self) -> &ObjectMeta {
        &self.core.meta
    }

    pub(crate) fn children_len(&self) -> usize {
        self.core.len()
    }

    pub(crate) fn handle_child_event(&self, event: &Event) {
        if event.is_resize() {
            Self::relayout(&mut self.core.write());
            self.core.invalidate_bbox();
        }
        self.core.meta.fire_delegated(event);
    }

    pub(crate) fn fire_changed(&self, flags: EventFlags) {
        self.core.changed(flags);
    }

    pub(crate) fn stack_bounding_box(&self) -> BBox<DIM> {
        self.core.bounding_box()
    }

    pub(crate) fn stack_validate(&self) -> Result<()> {
        self.core.validate()
    }

    pub(crate) fn stack_has_in_subtree(&self, id: ObjectId) -> bool {
        self.core.has_in_subtree(id)
    }

    pub(crate) fn stack_includes(&self, p: &DVec<DIM>) -> bool {
        self.child_for_height(p.vert()).is_some_and(|c| c.includes(p))
    }

    pub(crate) fn stack_material(&self, p: &DVec<DIM>) -> Option<MaterialRef> {
        self.child_for_height(p.vert())?.material(p)
    }

    pub(crate) fn stack_leafs_bounding_boxes(&self, path: Option<&PathHints>) -> Vec<BBox<DIM>> {
        self.core.leafs_bounding_boxes(path)
    }

    pub(crate) fn stack_paths_at(
        &self,
        handle: Option<AnyGeometry>,
        p: &DVec<DIM>,
        all: bool,
    ) -> Option<Subtree> {
        let child = self.child_for_height(p.vert())?;
        collect_paths(handle, iter::once(&child), p, all)
    }

    pub(crate) fn stack_paths_to(
        &self,
        handle: Option<AnyGeometry>,
        id: ObjectId,
        path: Option<&PathHints>,
    ) -> Option<Subtree> {
        self.core.paths_to(handle, id, path)
    }
}

impl<const DIM: usize> ChangeListener for StackContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn on_child_changed(&self, event: &Event) {
        self.handle_child_event(event);
    }
}

impl<const DIM: usize> GeometryObject for StackContainer<DIM>
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
        dim_name::<DIM>("stack2d", "stack3d")
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
        Some(erase(self.owner_handle.upgrade()?))
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

impl<const DIM: usize> GeometryObjectD<DIM> for StackContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn bounding_box(&self) -> BBox<DIM> {
        self.core.bounding_box()
    }

    fn includes(&self, p: &DVec<DIM>) -> bool {
        self.stack_includes(p)
    }

    fn material(&self, p: &DVec<DIM>) -> Option<MaterialRef> {
        self.stack_material(p)
    }

    fn leafs_bounding_boxes(&self, path: Option<&PathHints>) -> Vec<BBox<DIM>> {
        self.core.leafs_bounding_boxes(path)
    }

    fn paths_at(&self, p: &DVec<DIM>, all: bool) -> Option<Subtree> {
        self.stack_paths_at(self.handle(), p, all)
    }

    fn paths_to(&self, id: ObjectId, path: Option<&PathHints>) -> Option<Subtree> {
        self.core.paths_to(self.handle(), id, path)
    }
}

impl<const DIM: usize> fmt::Debug for StackContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.read();
        f.debug_struct("StackContainer")
            .field("id", &self.core.meta.id())
            .field("heights", &state.extra.heights)
            .finish()
    }
}

// ── MultiStackContainer ──

/// A stack whose whole sequence of children is repeated `repeat_count` times.
///
/// Repetitions are virtual: only the children of one period are stored.
/// Stack operations are available through `Deref`.
pub struct MultiStackContainer<const DIM: usize> {
    this: Weak<Self>,
    stack: StackContainer<DIM>,
    repeat_count: RwLock<usize>,
}

pub type MultiStack2 = MultiStackContainer<2>;
pub type MultiStack3 = MultiStackContainer<3>;

impl<const DIM: usize> MultiStackContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    pub fn new(repeat_count: usize, base_height: f64) -> Arc<Self> {
        Self::with_aligner(repeat_count, base_height, Aligner::default())
    }

    pub fn with_aligner(repeat_count: usize, base_height: f64, aligner: Aligner) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let owner: Weak<dyn ChangeListener> = this.clone();
            let owner_handle: Weak<dyn GeometryObjectD<DIM>> = this.clone();
            Self {
                this: this.clone(),
                stack: StackContainer::embedded(owner, owner_handle, base_height, aligner),
                repeat_count: RwLock::new(repeat_count),
            }
        })
    }

    pub fn repeat_count(&self) -> usize {
        *self.repeat_count.read()
    }

    pub fn set_repeat_count(&self, repeat_count: usize) {
        {
            let mut current = self.repeat_count.write();
            if *current == repeat_count {
                return;
            }
            *current = repeat_count;
        }
        self.stack.fire_changed(EventFlags::CHILDREN_GENERIC);
    }

    /// Number of stored children (one period).
    pub fn real_children_count(&self) -> usize {
        self.stack.children_len()
    }

    pub fn real_child_at(&self, index: usize) -> Result<Arc<Translation<DIM>>> {
        self.stack.child_at(index)
    }

    /// `(repetition, real_index)` of virtual child `index`.
    pub fn virtual_index(&self, index: usize) -> Result<(usize, usize)> {
        let real = self.real_children_count();
        GeometryError::ensure_index("child", index, real * self.repeat_count())?;
        Ok((index / real, index % real))
    }

    /// Virtual child `index`: a stored child shifted up by whole periods.
    pub fn child_at(&self, index: usize) -> Result<Arc<Translation<DIM>>> {
        let (repetition, real_index) = self.virtual_index(index)?;
        let placement = self.stack.child_at(real_index)?;
        Ok(placement.shifted(DVec::up(repetition as f64 * self.stack.height())))
    }

    /// Height within the first period equivalent to `height`, `None` outside
    /// all repetitions.
    pub fn reduce_height(&self, height: f64) -> Option<f64> {
        let repeat = self.repeat_count();
        if repeat == 0 {
            return None;
        }
        let base = self.stack.base_height();
        let period = self.stack.height();
        let zero_based = height - base;
        let total = period * repeat as f64;
        if zero_based < 0.0 || zero_based > total {
            return None;
        }
        if period <= 0.0 || zero_based == total {
            return Some(base + period);
        }
        Some(base + zero_based % period)
    }

    fn reduce_point(&self, p: &DVec<DIM>) -> Option<DVec<DIM>> {
        let mut q = *p;
        *q.vert_mut() = self.reduce_height(p.vert())?;
        Some(q)
    }
}

impl<const DIM: usize> Deref for MultiStackContainer<DIM> {
    type Target = StackContainer<DIM>;

    fn deref(&self) -> &StackContainer<DIM> {
        &self.stack
    }
}

impl<const DIM: usize> ChangeListener for MultiStackContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn on_child_changed(&self, event: &Event) {
        self.stack.handle_child_event(event);
    }
}

impl<const DIM: usize> GeometryObject for MultiStackContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn meta(&self) -> &ObjectMeta {
        self.stack.meta_ref()
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::Container
    }

    fn type_name(&self) -> &'static str {
        dim_name::<DIM>("multistack2d", "multistack3d")
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
        self.stack.stack_validate()
    }

    fn children_count(&self) -> usize {
        self.real_children_count() * self.repeat_count()
    }

    fn child_object_at(&self, index: usize) -> Result<AnyGeometry> {
        Ok(erase::<DIM>(self.child_at(index)?))
    }

    fn has_in_subtree(&self, id: ObjectId) -> bool {
        self.stack.stack_has_in_subtree(id)
    }
}

impl<const DIM: usize> GeometryObjectD<DIM> for MultiStackContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn bounding_box(&self) -> BBox<DIM> {
        let repeat = self.repeat_count();
        if repeat == 0 || self.real_children_count() == 0 {
            return BBox::ZERO;
        }
        let mut bb = self.stack.stack_bounding_box();
        *bb.upper.vert_mut() += self.stack.height() * (repeat - 1) as f64;
        bb
    }

    fn includes(&self, p: &DVec<DIM>) -> bool {
        self.reduce_point(p)
            .is_some_and(|q| self.stack.stack_includes(&q))
    }

    fn material(&self, p: &DVec<DIM>) -> Option<MaterialRef> {
        self.stack.stack_material(&self.reduce_point(p)?)
    }

    fn leafs_bounding_boxes(&self, path: Option<&PathHints>) -> Vec<BBox<DIM>> {
        let period = self.stack.height();
        let once = self.stack.stack_leafs_bounding_boxes(path);
        (0..self.repeat_count())
            .flat_map(|r| once.iter().map(move |b| b.translated_up(r as f64 * period)))
            .collect()
    }

    fn paths_at(&self, p: &DVec<DIM>, all: bool) -> Option<Subtree> {
        let q = self.reduce_point(p)?;
        self.stack.stack_paths_at(self.handle(), &q, all)
    }

    fn paths_to(&self, id: ObjectId, path: Option<&PathHints>) -> Option<Subtree> {
        self.stack.stack_paths_to(self.handle(), id, path)
    }
}

impl<const DIM: usize> fmt::Debug for MultiStackContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiStackContainer")
            .field("stack", &self.stack)
            .field("repeat_count", &*self.repeat_count.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::{Cuboid, Rectangle};
    use crate::material::NamedMaterial;
    use crate::primitives::{vec2, vec3};

    fn rect(w: f64, h: f64, material: &str) -> Arc<Rectangle> {
        Rectangle::new(vec2(w, h), NamedMaterial::shared(material))
    }

    #[test]
    fn test_boundary_search() {
        let b = [0.0, 2.0, 5.0];
        assert_eq!(child_index_for(&b, -0.1), None);
        assert_eq!(child_index_for(&b, 0.0), Some(0));
        assert_eq!(child_index_for(&b, 1.0), Some(0));
        assert_eq!(child_index_for(&b, 2.0), Some(1));
        assert_eq!(child_index_for(&b, 5.0), Some(1));
        assert_eq!(child_index_for(&b, 5.1), None);
        assert_eq!(child_index_for(&[3.0], 3.0), None);

        assert_eq!(insertion_index_for(&b, -1.0), 0);
        assert_eq!(insertion_index_for(&b, 2.0), 1);
        assert_eq!(insertion_index_for(&b, 3.0), 2);
        assert_eq!(insertion_index_for(&b, 9.0), 2);
    }

    #[test]
    fn test_stack_heights() {
        let stack = Stack2::new(0.0);
        let a = rect(1.0, 2.0, "A");
        let b = rect(1.0, 3.0, "B");
        stack.add(a.clone()).unwrap();
        stack.add(b.clone()).unwrap();
        assert_eq!(stack.heights(), vec![0.0, 2.0, 5.0]);
        assert!((stack.height() - 5.0).abs() < 1e-10);
        assert_eq!(stack.child_for_height(1.0).unwrap().child().unwrap().id(), a.id());
        assert_eq!(stack.child_for_height(2.5).unwrap().child().unwrap().id(), b.id());
        assert!(stack.child_for_height(10.0).is_none());
        assert_eq!(stack.material(&vec2(0.5, 4.0)).unwrap().name(), "B");
    }

    #[test]
    fn test_insert_and_push_front_shift_children() {
        let stack = Stack2::new(1.0);
        stack.add(rect(1.0, 1.0, "top")).unwrap();
        stack.push_front(rect(1.0, 2.0, "bottom"), Aligner::left()).unwrap();
        stack.insert(rect(1.0, 0.5, "middle"), 1, Aligner::left()).unwrap();
        assert_eq!(stack.heights(), vec![1.0, 3.0, 3.5, 4.5]);
        assert_eq!(stack.material(&vec2(0.5, 3.2)).unwrap().name(), "middle");
        assert_eq!(stack.material(&vec2(0.5, 4.0)).unwrap().name(), "top");
        assert!(stack.insert(rect(1.0, 1.0, "x"), 5, Aligner::left()).is_err());
    }

    #[test]
    fn test_remove_rebuilds_heights() {
        let stack = Stack2::new(0.0);
        stack.add(rect(1.0, 1.0, "A")).unwrap();
        stack.add(rect(1.0, 2.0, "B")).unwrap();
        stack.add(rect(1.0, 3.0, "C")).unwrap();
        stack.remove_at(1).unwrap();
        assert_eq!(stack.heights(), vec![0.0, 1.0, 4.0]);
        assert_eq!(stack.material(&vec2(0.5, 2.0)).unwrap().name(), "C");
        assert_eq!(stack.aligner_at(1).unwrap(), Aligner::left());
    }

    #[test]
    fn test_child_resize_updates_heights() {
        let stack = Stack2::new(0.0);
        let a = rect(1.0, 1.0, "A");
        stack.add(a.clone()).unwrap();
        stack.add(rect(1.0, 1.0, "B")).unwrap();
        a.set_size(vec2(1.0, 3.0));
        assert_eq!(stack.heights(), vec![0.0, 3.0, 4.0]);
        assert!((stack.bounding_box().upper.vert() - 4.0).abs() < 1e-10);
        assert_eq!(stack.material(&vec2(0.5, 3.5)).unwrap().name(), "B");
    }

    #[test]
    fn test_base_height_and_zero_before() {
        let stack = Stack2::new(0.0);
        stack.add(rect(1.0, 1.0, "A")).unwrap();
        stack.add(rect(1.0, 2.0, "B")).unwrap();
        stack.set_zero_before(1).unwrap();
        assert_eq!(stack.heights(), vec![-1.0, 0.0, 2.0]);
        assert_eq!(stack.material(&vec2(0.5, -0.5)).unwrap().name(), "A");
        stack.set_base_height(10.0);
        assert_eq!(stack.heights(), vec![10.0, 11.0, 13.0]);
        assert!(stack.set_zero_before(3).is_err());
    }

    #[test]
    fn test_aligners() {
        let stack = Stack2::with_aligner(0.0, Aligner::center());
        stack.add(rect(2.0, 1.0, "A")).unwrap();
        stack.push_back(rect(2.0, 1.0, "B"), Aligner::right()).unwrap();
        let bb = stack.bounding_box();
        assert_eq!(bb.lower, vec2(-2.0, 0.0));
        assert_eq!(bb.upper, vec2(1.0, 2.0));
        stack.set_aligner_at(1, Aligner::left()).unwrap();
        assert_eq!(stack.bounding_box().upper, vec2(2.0, 2.0));
    }

    #[test]
    fn test_stack_3d() {
        let stack = Stack3::new(0.0);
        stack
            .add(Cuboid::new(vec3(1.0, 1.0, 2.0), NamedMaterial::shared("A")))
            .unwrap();
        assert_eq!(stack.type_name(), "stack3d");
        assert!(stack.includes(&vec3(0.5, 0.5, 1.0)));
    }

    #[test]
    fn test_multistack_repetition() {
        let multi = MultiStack2::new(3, 0.0);
        let a = rect(1.0, 1.0, "A");
        multi.add(a.clone()).unwrap();
        multi.add(rect(1.0, 2.0, "B")).unwrap();
        assert_eq!(multi.real_children_count(), 2);
        assert_eq!(multi.children_count(), 6);
        assert_eq!(multi.virtual_index(4).unwrap(), (2, 0));
        let shifted = multi.child_at(4).unwrap();
        assert_eq!(shifted.child().unwrap().id(), a.id());
        assert!((shifted.translation().vert() - 6.0).abs() < 1e-10);
        assert!(multi.child_at(6).is_err());

        assert!((multi.bounding_box().upper.vert() - 9.0).abs() < 1e-10);
        assert_eq!(multi.material(&vec2(0.5, 6.5)).unwrap().name(), "A");
        assert_eq!(multi.material(&vec2(0.5, 8.0)).unwrap().name(), "B");
        assert!(multi.material(&vec2(0.5, 9.5)).is_none());
        assert_eq!(multi.reduce_height(4.0), Some(1.0));
        assert_eq!(multi.reduce_height(-1.0), None);

        multi.set_repeat_count(1);
        assert_eq!(multi.children_count(), 2);
        assert!(multi.material(&vec2(0.5, 6.5)).is_none());
        assert_eq!(multi.leafs_bounding_boxes(None).len(), 2);
    }
}
