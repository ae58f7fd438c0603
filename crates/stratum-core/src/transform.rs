//! Single-child objects living in the same space as their child.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::error::{GeometryError, Result};
use crate::event::{ChangeListener, Event, EventFlags};
use crate::material::MaterialRef;
use crate::object::{
    dim_name, ensure_can_have_as_child, erase, AnyGeometry, Dim, GeometryObject, GeometryObjectD,
    ObjectId, ObjectMeta, ObjectRef, ObjectType, Subtree, SupportedDim,
};
use crate::path::PathHints;
use crate::primitives::{BBox, DVec};

/// Storage for the only child of a transform or space changer.
///
/// The owner is registered as a weak listener on the child's signal for as
/// long as the child is set.
pub(crate) struct ChildSlot<const DIM: usize> {
    child: RwLock<Option<ObjectRef<DIM>>>,
}

impl<const DIM: usize> ChildSlot<DIM> {
    pub fn new(
        owner: ObjectId,
        listener: Weak<dyn ChangeListener>,
        child: Option<ObjectRef<DIM>>,
    ) -> Self {
        if let Some(c) = &child {
            c.meta().changed().connect(owner, listener);
        }
        Self {
            child: RwLock::new(child),
        }
    }

    pub fn get(&self) -> Option<ObjectRef<DIM>> {
        self.child.read().clone()
    }

    pub fn is_set(&self) -> bool {
        self.child.read().is_some()
    }

    /// The child or [`GeometryError::NoChild`] naming the owner kind.
    pub fn require(&self, owner_type: &str) -> Result<ObjectRef<DIM>> {
        self.get()
            .ok_or_else(|| GeometryError::NoChild(owner_type.to_string()))
    }

    /// Replace the child. Fails without changing anything if `child` contains the owner.
    pub fn set(
        &self,
        owner: &ObjectMeta,
        listener: Weak<dyn ChangeListener>,
        child: Option<ObjectRef<DIM>>,
    ) -> Result<()> {
        if let Some(c) = &child {
            ensure_can_have_as_child(owner.id(), &**c)?;
        }
        if let Some(c) = &child {
            c.meta().changed().connect(owner.id(), listener);
        }
        let old = std::mem::replace(&mut *self.child.write(), child);
        if let Some(old) = old {
            old.meta().changed().disconnect(owner.id());
        }
        owner.fire_changed(EventFlags::CHILDREN_GENERIC);
        Ok(())
    }

    pub fn has_in_subtree(&self, id: ObjectId) -> bool {
        self.get().is_some_and(|c| c.has_in_subtree(id))
    }

    /// Run `validate` on the child, failing if it is not set.
    pub fn validate(&self, owner_type: &str) -> Result<()> {
        self.require(owner_type)?.validate()
    }

    pub fn child_object_at(&self, index: usize) -> Result<AnyGeometry>
    where
        Dim<DIM>: SupportedDim<DIM>,
    {
        match self.get() {
            Some(c) if index == 0 => Ok(erase(c)),
            other => Err(GeometryError::OutOfBounds {
                what: "child",
                index,
                len: usize::from(other.is_some()),
            }),
        }
    }
}

/// Child moved by a constant vector.
///
/// Containers wrap each of their children in a `Translation`; it can also be
/// used on its own.
pub struct Translation<const DIM: usize> {
    meta: ObjectMeta,
    this: Weak<Self>,
    slot: ChildSlot<DIM>,
    translation: RwLock<DVec<DIM>>,
}

pub type Translation2 = Translation<2>;
pub type Translation3 = Translation<3>;

impl<const DIM: usize> Translation<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    pub fn new(child: Option<ObjectRef<DIM>>, translation: DVec<DIM>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let meta = ObjectMeta::new();
            let listener: Weak<dyn ChangeListener> = this.clone();
            let slot = ChildSlot::new(meta.id(), listener, child);
            Self {
                meta,
                this: this.clone(),
                slot,
                translation: RwLock::new(translation),
            }
        })
    }

    pub fn child(&self) -> Option<ObjectRef<DIM>> {
        self.slot.get()
    }

    pub fn has_child(&self) -> bool {
        self.slot.is_set()
    }

    pub fn set_child(&self, child: ObjectRef<DIM>) -> Result<()> {
        let listener: Weak<dyn ChangeListener> = self.this.clone();
        self.slot.set(&self.meta, listener, Some(child))
    }

    pub fn translation(&self) -> DVec<DIM> {
        *self.translation.read()
    }

    pub fn set_translation(&self, translation: DVec<DIM>) {
        self.set_translation_silent(translation);
        self.meta.fire_changed(EventFlags::RESIZE);
    }

    /// Change the translation without informing parents. Used by containers
    /// which lay out their own placements and fire a single event afterwards.
    pub(crate) fn set_translation_silent(&self, translation: DVec<DIM>) {
        *self.translation.write() = translation;
    }

    /// New placement of the same child, moved by `shift`.
    pub fn shifted(&self, shift: DVec<DIM>) -> Arc<Self> {
        Self::new(self.child(), self.translation() + shift)
    }

    /// Merge a directly nested translation into this one.
    pub fn compress(&self) -> Result<()> {
        let Some(child) = self.child() else {
            return Ok(());
        };
        let Some(inner) = child.as_any().downcast_ref::<Translation<DIM>>() else {
            return Ok(());
        };
        let (inner_child, inner_translation) = (inner.child(), inner.translation());
        if let Some(inner_child) = inner_child {
            self.set_translation_silent(self.translation() + inner_translation);
            self.set_child(inner_child)?;
        }
        Ok(())
    }

    /// Bounding box of the child in this object's coordinates.
    pub fn child_bounding_box(&self) -> Option<BBox<DIM>> {
        Some(self.child()?.bounding_box().translated(self.translation()))
    }
}

impl<const DIM: usize> ChangeListener for Translation<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn on_child_changed(&self, event: &Event) {
        self.meta.fire_delegated(event);
    }
}

impl<const DIM: usize> GeometryObject for Translation<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::Transform
    }

    fn type_name(&self) -> &'static str {
        dim_name::<DIM>("translation2d", "translation3d")
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
        usize::from(self.has_child())
    }

    fn child_object_at(&self, index: usize) -> Result<AnyGeometry> {
        self.slot.child_object_at(index)
    }

    fn has_in_subtree(&self, id: ObjectId) -> bool {
        self.meta.id() == id || self.slot.has_in_subtree(id)
    }
}

impl<const DIM: usize> GeometryObjectD<DIM> for Translation<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn bounding_box(&self) -> BBox<DIM> {
        self.child_bounding_box().unwrap_or(BBox::ZERO)
    }

    fn includes(&self, p: &DVec<DIM>) -> bool {
        self.child()
            .is_some_and(|c| c.includes(&(*p - self.translation())))
    }

    fn intersects(&self, area: &BBox<DIM>) -> bool {
        self.child()
            .is_some_and(|c| c.intersects(&area.translated(-self.translation())))
    }

    fn material(&self, p: &DVec<DIM>) -> Option<MaterialRef> {
        self.child()?.material(&(*p - self.translation()))
    }

    fn leafs_bounding_boxes(&self, path: Option<&PathHints>) -> Vec<BBox<DIM>> {
        let Some(child) = self.child() else {
            return Vec::new();
        };
        let t = self.translation();
        child
            .leafs_bounding_boxes(path)
            .into_iter()
            .map(|b| b.translated(t))
            .collect()
    }

    fn paths_at(&self, p: &DVec<DIM>, all: bool) -> Option<Subtree> {
        let child = self.child()?;
        Subtree::extend_if_some(self.handle(), child.paths_at(&(*p - self.translation()), all))
    }

    fn paths_to(&self, id: ObjectId, path: Option<&PathHints>) -> Option<Subtree> {
        if self.meta.id() == id {
            return Some(Subtree::leaf(self.handle()?));
        }
        Subtree::extend_if_some(self.handle(), self.child()?.paths_to(id, path))
    }
}

impl<const DIM: usize> fmt::Debug for Translation<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translation")
            .field("id", &self.meta.id())
            .field("translation", &*self.translation.read())
            .field("has_child", &self.slot.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::Rectangle;
    use crate::material::NamedMaterial;
    use crate::primitives::vec2;

    fn block(w: f64, h: f64, name: &str) -> ObjectRef<2> {
        Rectangle::new(vec2(w, h), NamedMaterial::shared(name))
    }

    #[test]
    fn test_translation_pulls_back_queries() {
        let t = Translation::new(Some(block(1.0, 1.0, "Si")), vec2(10.0, 5.0));
        let bb = t.bounding_box();
        assert_eq!(bb.lower, vec2(10.0, 5.0));
        assert_eq!(bb.upper, vec2(11.0, 6.0));
        assert!(t.includes(&vec2(10.5, 5.5)));
        assert!(!t.includes(&vec2(0.5, 0.5)));
        assert_eq!(t.material(&vec2(10.5, 5.5)).unwrap().name(), "Si");
        assert!(t.intersects(&BBox::new(vec2(9.0, 4.0), vec2(10.2, 5.2))));
    }

    #[test]
    fn test_validate_requires_child() {
        let t = Translation::<2>::new(None, vec2(1.0, 1.0));
        assert_eq!(
            t.validate(),
            Err(GeometryError::NoChild("translation2d".to_string()))
        );
        t.set_child(block(1.0, 1.0, "Si")).unwrap();
        assert!(t.validate().is_ok());
        assert_eq!(t.children_count(), 1);
        assert!(t.child_object_at(1).is_err());
    }

    #[test]
    fn test_set_child_rejects_cycle() {
        let outer = Translation::<2>::new(None, vec2(0.0, 0.0));
        let inner = Translation::<2>::new(Some(outer.clone()), vec2(1.0, 0.0));
        assert_eq!(outer.set_child(inner), Err(GeometryError::CyclicReference));
        assert!(!outer.has_child());
    }

    #[test]
    fn test_compress_merges_nested_translation() {
        let leaf = block(1.0, 1.0, "Si");
        let inner = Translation::new(Some(leaf.clone()), vec2(1.0, 2.0));
        let outer = Translation::new(Some(inner), vec2(3.0, 4.0));
        outer.compress().unwrap();
        assert_eq!(outer.translation(), vec2(4.0, 6.0));
        assert_eq!(outer.child().unwrap().id(), leaf.id());
        assert!(outer.includes(&vec2(4.5, 6.5)));
    }

    #[test]
    fn test_paths_through_translation() {
        let leaf = block(1.0, 1.0, "Si");
        let t = Translation::new(Some(leaf.clone()), vec2(2.0, 0.0));
        let paths = t.paths_at(&vec2(2.5, 0.5), false).unwrap();
        assert_eq!(paths.last().id(), leaf.id());
        assert!(t.paths_at(&vec2(0.5, 0.5), false).is_none());
        let to = t.paths_to(leaf.id(), None).unwrap();
        assert_eq!(to.paths()[0].len(), 2);
    }
}
