//! Periodic repetition of a single child.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{GeometryError, Result};
use crate::event::{ChangeListener, Event, EventFlags};
use crate::material::MaterialRef;
use crate::object::{
    dim_name, erase, AnyGeometry, Dim, GeometryObject, GeometryObjectD, ObjectId, ObjectMeta,
    ObjectRef, ObjectType, Subtree, SupportedDim,
};
use crate::path::PathHints;
use crate::primitives::{BBox, Box3, DVec, Vec3};
use crate::transform::{ChildSlot, Translation};
use crate::translation_container::TranslationContainer;

// ── ArrangeContainer ──

#[derive(Debug, Clone, Copy)]
struct ArrangeParams<const DIM: usize> {
    step: DVec<DIM>,
    repeat_count: usize,
}

/// `repeat_count` copies of one child, copy `i` moved by `i * step`.
pub struct ArrangeContainer<const DIM: usize> {
    meta: ObjectMeta,
    this: Weak<Self>,
    slot: ChildSlot<DIM>,
    params: RwLock<ArrangeParams<DIM>>,
    warn_overlapping: bool,
}

pub type Arrange2 = ArrangeContainer<2>;
pub type Arrange3 = ArrangeContainer<3>;

impl<const DIM: usize> ArrangeContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    pub fn new(child: Option<ObjectRef<DIM>>, step: DVec<DIM>, repeat_count: usize) -> Arc<Self> {
        Self::with_overlap_warning(child, step, repeat_count, true)
    }

    /// As [`ArrangeContainer::new`]; with `warn_overlapping` a warning is
    /// logged whenever neighbouring copies overlap.
    pub fn with_overlap_warning(
        child: Option<ObjectRef<DIM>>,
        step: DVec<DIM>,
        repeat_count: usize,
        warn_overlapping: bool,
    ) -> Arc<Self> {
        let arrange = Arc::new_cyclic(|this: &Weak<Self>| {
            let meta = ObjectMeta::new();
            let listener: Weak<dyn ChangeListener> = this.clone();
            let slot = ChildSlot::new(meta.id(), listener, child);
            Self {
                meta,
                this: this.clone(),
                slot,
                params: RwLock::new(ArrangeParams { step, repeat_count }),
                warn_overlapping,
            }
        });
        arrange.check_overlap();
        arrange
    }

    pub fn child(&self) -> Option<ObjectRef<DIM>> {
        self.slot.get()
    }

    pub fn set_child(&self, child: ObjectRef<DIM>) -> Result<()> {
        let listener: Weak<dyn ChangeListener> = self.this.clone();
        self.slot.set(&self.meta, listener, Some(child))?;
        self.check_overlap();
        Ok(())
    }

    pub fn step(&self) -> DVec<DIM> {
        self.params.read().step
    }

    pub fn set_step(&self, step: DVec<DIM>) {
        {
            let mut params = self.params.write();
            if params.step == step {
                return;
            }
            params.step = step;
        }
        self.check_overlap();
        self.meta.fire_changed(EventFlags::CHILDREN_GENERIC);
    }

    pub fn repeat_count(&self) -> usize {
        self.params.read().repeat_count
    }

    pub fn set_repeat_count(&self, repeat_count: usize) {
        {
            let mut params = self.params.write();
            if params.repeat_count == repeat_count {
                return;
            }
            params.repeat_count = repeat_count;
        }
        self.meta.fire_changed(EventFlags::CHILDREN_GENERIC);
    }

    fn check_overlap(&self) {
        if !self.warn_overlapping {
            return;
        }
        let Some(child) = self.child() else {
            return;
        };
        let bb = child.bounding_box();
        let bb = bb.translated(-bb.lower);
        let next = bb.translated(self.step());
        let overlap = (0..DIM).all(|i| bb.lower[i] < next.upper[i] && next.lower[i] < bb.upper[i]);
        if overlap {
            log::warn!("Arrange: item bounding boxes overlap");
        }
    }

    /// Range `[lo, hi]` of copies whose bounding box may contain `p`.
    /// The range is empty (`lo > hi`) when no copy can.
    pub fn bounds(&self, p: &DVec<DIM>) -> (i64, i64) {
        let ArrangeParams { step, repeat_count } = *self.params.read();
        let Some(child) = self.child() else {
            return (1, 0);
        };
        if repeat_count == 0 {
            return (1, 0);
        }
        let bb = child.bounding_box();
        let (mut lo, mut hi) = (0_i64, repeat_count as i64 - 1);
        for i in 0..DIM {
            let t = step[i];
            if t > 0.0 {
                lo = lo.max(1 + ((p[i] - bb.upper[i]) / t).floor() as i64);
                hi = hi.min(((p[i] - bb.lower[i]) / t).floor() as i64);
            } else if t < 0.0 {
                lo = lo.max(1 + ((p[i] - bb.lower[i]) / t).floor() as i64);
                hi = hi.min(((p[i] - bb.upper[i]) / t).floor() as i64);
            } else if p[i] < bb.lower[i] || bb.upper[i] < p[i] {
                return (1, 0);
            }
        }
        (lo, hi)
    }

    /// Candidate copies for `p`, topmost first, paired with `p` in child coordinates.
    fn copies_at(&self, p: &DVec<DIM>) -> impl Iterator<Item = DVec<DIM>> {
        let (lo, hi) = self.bounds(p);
        let step = self.step();
        let p = *p;
        (lo..=hi).rev().map(move |i| p - step * i as f64)
    }
}

impl<const DIM: usize> ChangeListener for ArrangeContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn on_child_changed(&self, event: &Event) {
        self.meta.fire_delegated(event);
    }
}

impl<const DIM: usize> GeometryObject for ArrangeContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::Container
    }

    fn type_name(&self) -> &'static str {
        dim_name::<DIM>("arrange2d", "arrange3d")
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
        self.slot.validate(self.type_name())
    }

    fn children_count(&self) -> usize {
        if self.slot.is_set() {
            self.repeat_count()
        } else {
            0
        }
    }

    /// Copy `index` as a new translation of the child.
    fn child_object_at(&self, index: usize) -> Result<AnyGeometry> {
        GeometryError::ensure_index("child", index, self.children_count())?;
        let placement = Translation::new(self.child(), self.step() * index as f64);
        Ok(erase::<DIM>(placement))
    }

    fn has_in_subtree(&self, id: ObjectId) -> bool {
        self.meta.id() == id || self.slot.has_in_subtree(id)
    }
}

impl<const DIM: usize> GeometryObjectD<DIM> for ArrangeContainer<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn bounding_box(&self) -> BBox<DIM> {
        let ArrangeParams { step, repeat_count } = *self.params.read();
        match self.child() {
            Some(child) if repeat_count > 0 => {
                let bb = child.bounding_box();
                bb.union(&bb.translated(step * (repeat_count - 1) as f64))
            }
            _ => BBox::ZERO,
        }
    }

    fn includes(&self, p: &DVec<DIM>) -> bool {
        let Some(child) = self.child() else {
            return false;
        };
        self.copies_at(p).any(|q| child.includes(&q))
    }

    fn material(&self, p: &DVec<DIM>) -> Option<MaterialRef> {
        let child = self.child()?;
        self.copies_at(p).find_map(|q| child.material(&q))
    }

    fn leafs_bounding_boxes(&self, path: Option<&PathHints>) -> Vec<BBox<DIM>> {
        let Some(child) = self.child() else {
            return Vec::new();
        };
        let ArrangeParams { step, repeat_count } = *self.params.read();
        let once = child.leafs_bounding_boxes(path);
        (0..repeat_count)
            .flat_map(|i| once.iter().map(move |b| b.translated(step * i as f64)))
            .collect()
    }

    fn paths_at(&self, p: &DVec<DIM>, all: bool) -> Option<Subtree> {
        let child = self.child()?;
        let mut found = Vec::new();
        for q in self.copies_at(p) {
            if let Some(sub) = child.paths_at(&q, all) {
                found.push(sub);
                if !all {
                    break;
                }
            }
        }
        if found.is_empty() {
            None
        } else {
            Some(Subtree::with_children(self.handle()?, found))
        }
    }

    fn paths_to(&self, id: ObjectId, path: Option<&PathHints>) -> Option<Subtree> {
        if self.meta.id() == id {
            return Some(Subtree::leaf(self.handle()?));
        }
        Subtree::extend_if_some(self.handle(), self.child()?.paths_to(id, path))
    }
}

impl<const DIM: usize> fmt::Debug for ArrangeContainer<DIM> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self.params.read();
        f.debug_struct("ArrangeContainer")
            .field("id", &self.meta.id())
            .field("step", &params.step)
            .field("repeat_count", &params.repeat_count)
            .finish()
    }
}

// ── Lattice ──

/// Closed polygon with integer vertices in lattice coordinates. The last
/// vertex connects back to the first.
pub type LatticePolygon = Vec<[i32; 2]>;

/// Lattice node selection: XOR of the regions bounded by the polygons.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatticeRegion {
    pub polygons: Vec<LatticePolygon>,
}

impl LatticeRegion {
    pub fn new(polygons: Vec<LatticePolygon>) -> Self {
        Self { polygons }
    }

    /// Inclusive range of lattice coordinates touched by any polygon.
    fn extent(&self) -> Option<([i32; 2], [i32; 2])> {
        let mut vertices = self.polygons.iter().flatten();
        let first = *vertices.next()?;
        Some(vertices.fold((first, first), |(lo, hi), v| {
            (
                [lo[0].min(v[0]), lo[1].min(v[1])],
                [hi[0].max(v[0]), hi[1].max(v[1])],
            )
        }))
    }

    /// Whether node `(i, j)` lies in the region. Nodes on any polygon side count.
    pub fn contains(&self, node: [i32; 2]) -> bool {
        let mut inside = false;
        for polygon in &self.polygons {
            for (a, b) in edges(polygon) {
                if on_segment(a, b, node) {
                    return true;
                }
                if crosses_ray(a, b, node) {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Every node of the region, row by row.
    pub fn nodes(&self) -> Vec<[i32; 2]> {
        let Some((lo, hi)) = self.extent() else {
            return Vec::new();
        };
        (lo[1]..=hi[1])
            .flat_map(|j| (lo[0]..=hi[0]).map(move |i| [i, j]))
            .filter(|node| self.contains(*node))
            .collect()
    }
}

fn edges(polygon: &[[i32; 2]]) -> impl Iterator<Item = ([i32; 2], [i32; 2])> + '_ {
    polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .map(|(a, b)| (*a, *b))
}

fn on_segment(a: [i32; 2], b: [i32; 2], p: [i32; 2]) -> bool {
    let (ax, ay) = (i64::from(a[0]), i64::from(a[1]));
    let (bx, by) = (i64::from(b[0]), i64::from(b[1]));
    let (px, py) = (i64::from(p[0]), i64::from(p[1]));
    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    cross == 0
        && ax.min(bx) <= px
        && px <= ax.max(bx)
        && ay.min(by) <= py
        && py <= ay.max(by)
}

/// Whether side `a`-`b` crosses the ray going from `p` towards positive `i`.
fn crosses_ray(a: [i32; 2], b: [i32; 2], p: [i32; 2]) -> bool {
    if (a[1] > p[1]) == (b[1] > p[1]) {
        return false;
    }
    let (ax, ay) = (f64::from(a[0]), f64::from(a[1]));
    let (bx, by) = (f64::from(b[0]), f64::from(b[1]));
    let x = ax + (f64::from(p[1]) - ay) * (bx - ax) / (by - ay);
    f64::from(p[0]) < x
}

/// One 3D child repeated at the nodes `i * vec0 + j * vec1` of a 2D lattice.
///
/// The nodes are selected by a [`LatticeRegion`]. Copies are materialized in
/// an internal [`TranslationContainer`] which answers every query.
pub struct Lattice {
    meta: ObjectMeta,
    this: Weak<Self>,
    slot: ChildSlot<3>,
    basis: RwLock<(Vec3, Vec3)>,
    region: RwLock<LatticeRegion>,
    container: Arc<TranslationContainer<3>>,
}

impl Lattice {
    pub fn new(child: Option<ObjectRef<3>>, vec0: Vec3, vec1: Vec3) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let meta = ObjectMeta::new();
            let listener: Weak<dyn ChangeListener> = this.clone();
            let slot = ChildSlot::new(meta.id(), listener, child);
            Self {
                meta,
                this: this.clone(),
                slot,
                basis: RwLock::new((vec0, vec1)),
                region: RwLock::new(LatticeRegion::default()),
                container: TranslationContainer::new(),
            }
        })
    }

    pub fn child(&self) -> Option<ObjectRef<3>> {
        self.slot.get()
    }

    pub fn set_child(&self, child: ObjectRef<3>) -> Result<()> {
        let listener: Weak<dyn ChangeListener> = self.this.clone();
        self.slot.set(&self.meta, listener, Some(child))?;
        self.refill_container()
    }

    pub fn vectors(&self) -> (Vec3, Vec3) {
        *self.basis.read()
    }

    pub fn set_vectors(&self, vec0: Vec3, vec1: Vec3) -> Result<()> {
        *self.basis.write() = (vec0, vec1);
        self.refill_container()
    }

    pub fn region(&self) -> LatticeRegion {
        self.region.read().clone()
    }

    pub fn set_segments(&self, polygons: Vec<LatticePolygon>) -> Result<()> {
        *self.region.write() = LatticeRegion::new(polygons);
        self.refill_container()
    }

    /// Rebuild the copies from the current child, basis and region.
    pub fn refill_container(&self) -> Result<()> {
        self.container.remove_if(|_| true);
        if let Some(child) = self.child() {
            let (vec0, vec1) = self.vectors();
            let nodes = self.region.read().nodes();
            for [i, j] in &nodes {
                let at = vec0 * f64::from(*i) + vec1 * f64::from(*j);
                self.container.add(child.clone(), at)?;
            }
            log::debug!("Lattice filled with {} copies", nodes.len());
        }
        self.meta.fire_changed(EventFlags::CHILDREN_GENERIC);
        Ok(())
    }

    /// Re-root a subtree found in the internal container at this lattice.
    fn reroot(&self, found: Option<Subtree>) -> Option<Subtree> {
        Some(Subtree::with_children(self.handle()?, found?.children))
    }
}

impl ChangeListener for Lattice {
    fn on_child_changed(&self, event: &Event) {
        self.meta.fire_delegated(event);
    }
}

impl GeometryObject for Lattice {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::Container
    }

    fn type_name(&self) -> &'static str {
        "lattice"
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn as_object(&self) -> &dyn GeometryObject {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn handle(&self) -> Option<AnyGeometry> {
        let me: ObjectRef<3> = self.this.upgrade()?;
        Some(erase(me))
    }

    fn validate(&self) -> Result<()> {
        self.slot.validate("lattice")
    }

    fn children_count(&self) -> usize {
        self.container.children_count()
    }

    fn child_object_at(&self, index: usize) -> Result<AnyGeometry> {
        self.container.child_object_at(index)
    }

    fn has_in_subtree(&self, id: ObjectId) -> bool {
        self.meta.id() == id || self.slot.has_in_subtree(id)
    }
}

impl GeometryObjectD<3> for Lattice {
    fn bounding_box(&self) -> Box3 {
        self.container.bounding_box()
    }

    fn includes(&self, p: &Vec3) -> bool {
        self.container.includes(p)
    }

    fn material(&self, p: &Vec3) -> Option<MaterialRef> {
        self.container.material(p)
    }

    fn leafs_bounding_boxes(&self, path: Option<&PathHints>) -> Vec<Box3> {
        self.container.leafs_bounding_boxes(path)
    }

    fn paths_at(&self, p: &Vec3, all: bool) -> Option<Subtree> {
        self.reroot(self.container.paths_at(p, all))
    }

    fn paths_to(&self, id: ObjectId, path: Option<&PathHints>) -> Option<Subtree> {
        if self.meta.id() == id {
            return Some(Subtree::leaf(self.handle()?));
        }
        self.reroot(self.container.paths_to(id, path))
    }
}

impl fmt::Debug for Lattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (vec0, vec1) = self.vectors();
        f.debug_struct("Lattice")
            .field("id", &self.meta.id())
            .field("vec0", &vec0)
            .field("vec1", &vec1)
            .field("copies", &self.container.children_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::{Cuboid, Rectangle};
    use crate::material::NamedMaterial;
    use crate::primitives::{vec2, vec3};

    #[test]
    fn test_arrange_bounds() {
        let leaf = Rectangle::new(vec2(1.0, 1.0), NamedMaterial::shared("A"));
        let arrange = Arrange2::new(Some(leaf), vec2(2.0, 0.0), 3);
        assert_eq!(arrange.bounds(&vec2(2.5, 0.5)), (1, 1));
        assert_eq!(arrange.bounds(&vec2(4.0, 0.5)), (2, 2));
        let (lo, hi) = arrange.bounds(&vec2(1.5, 0.5));
        assert!(lo > hi);
        let (lo, hi) = arrange.bounds(&vec2(0.5, 3.0));
        assert!(lo > hi);
        let (lo, hi) = arrange.bounds(&vec2(7.0, 0.5));
        assert!(lo > hi);
    }

    #[test]
    fn test_arrange_queries() {
        let leaf = Rectangle::new(vec2(1.0, 1.0), NamedMaterial::shared("A"));
        let arrange = Arrange2::new(Some(leaf), vec2(2.0, 0.0), 3);
        assert_eq!(arrange.children_count(), 3);
        assert_eq!(arrange.bounding_box().upper, vec2(5.0, 1.0));
        assert!(arrange.includes(&vec2(4.5, 0.5)));
        assert!(!arrange.includes(&vec2(3.5, 0.5)));
        assert_eq!(arrange.material(&vec2(2.5, 0.5)).unwrap().name(), "A");
        assert_eq!(arrange.leafs_bounding_boxes(None).len(), 3);

        arrange.set_repeat_count(0);
        assert_eq!(arrange.children_count(), 0);
        assert_eq!(arrange.bounding_box(), BBox::ZERO);
        assert!(!arrange.includes(&vec2(0.5, 0.5)));
    }

    #[test]
    fn test_arrange_negative_step() {
        let leaf = Rectangle::new(vec2(1.0, 1.0), NamedMaterial::shared("A"));
        let arrange = Arrange2::new(Some(leaf), vec2(0.0, -2.0), 2);
        assert!(arrange.includes(&vec2(0.5, -1.5)));
        assert!(!arrange.includes(&vec2(0.5, -0.5)));
        assert_eq!(arrange.bounding_box().lower, vec2(0.0, -2.0));
    }

    #[test]
    fn test_arrange_child_copies() {
        let leaf = Rectangle::new(vec2(1.0, 1.0), NamedMaterial::shared("A"));
        let arrange = Arrange2::new(Some(leaf.clone()), vec2(2.0, 0.0), 2);
        let copy = arrange.child_object_at(1).unwrap().as_2d().unwrap();
        assert_eq!(copy.bounding_box().lower, vec2(2.0, 0.0));
        assert!(arrange.child_object_at(2).is_err());
        assert!(arrange.has_in_subtree(leaf.id()));
    }

    #[test]
    fn test_region_xor() {
        let square = vec![[0, 0], [4, 0], [4, 4], [0, 4]];
        let hole = vec![[1, 1], [3, 1], [3, 3], [1, 3]];
        let region = LatticeRegion::new(vec![square.clone()]);
        assert_eq!(region.nodes().len(), 25);
        let region = LatticeRegion::new(vec![square, hole]);
        assert!(region.contains([0, 0]));
        assert!(region.contains([1, 1]));
        assert!(!region.contains([2, 2]));
        assert_eq!(region.nodes().len(), 24);
    }

    #[test]
    fn test_lattice_fill() {
        let cell = Cuboid::new(vec3(1.0, 1.0, 1.0), NamedMaterial::shared("A"));
        let lattice = Lattice::new(Some(cell.clone()), vec3(2.0, 0.0, 0.0), vec3(0.0, 2.0, 0.0));
        assert_eq!(lattice.children_count(), 0);
        lattice
            .set_segments(vec![vec![[0, 0], [1, 0], [1, 1], [0, 1]]])
            .unwrap();
        assert_eq!(lattice.children_count(), 4);
        assert!(lattice.includes(&vec3(2.5, 2.5, 0.5)));
        assert!(!lattice.includes(&vec3(1.5, 0.5, 0.5)));
        assert_eq!(lattice.bounding_box().upper, vec3(3.0, 3.0, 1.0));

        let paths = lattice.paths_at(&vec3(2.5, 0.5, 0.5), false).unwrap();
        assert_eq!(paths.object.id(), lattice.id());
        assert_eq!(paths.last().id(), cell.id());

        lattice
            .set_vectors(vec3(3.0, 0.0, 0.0), vec3(0.0, 3.0, 0.0))
            .unwrap();
        assert!(lattice.includes(&vec3(3.5, 3.5, 0.5)));
        assert!(!lattice.includes(&vec3(2.5, 2.5, 0.5)));
    }
}
