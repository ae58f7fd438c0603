//! 3D objects built from a 2D child.
//!
//! A space changer only differs from a transform in how it projects a 3D
//! query point back onto the plane of its child.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::error::Result;
use crate::event::{ChangeListener, Event, EventFlags};
use crate::material::MaterialRef;
use crate::object::{
    erase, AnyGeometry, GeometryObject, GeometryObjectD, ObjectId, ObjectMeta, ObjectRef,
    ObjectType, Subtree,
};
use crate::path::PathHints;
use crate::primitives::{vec2, vec3, BBox, Box2, Box3, Vec2, Vec3};
use crate::transform::ChildSlot;

/// 2D child extruded along the longitudinal axis from 0 to `length`.
pub struct Extrusion {
    meta: ObjectMeta,
    this: Weak<Self>,
    slot: ChildSlot<2>,
    length: RwLock<f64>,
}

impl Extrusion {
    pub fn new(child: Option<ObjectRef<2>>, length: f64) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let meta = ObjectMeta::new();
            let listener: Weak<dyn ChangeListener> = this.clone();
            let slot = ChildSlot::new(meta.id(), listener, child);
            Self {
                meta,
                this: this.clone(),
                slot,
                length: RwLock::new(length),
            }
        })
    }

    pub fn child(&self) -> Option<ObjectRef<2>> {
        self.slot.get()
    }

    pub fn set_child(&self, child: ObjectRef<2>) -> Result<()> {
        let listener: Weak<dyn ChangeListener> = self.this.clone();
        self.slot.set(&self.meta, listener, Some(child))
    }

    pub fn length(&self) -> f64 {
        *self.length.read()
    }

    pub fn set_length(&self, length: f64) {
        *self.length.write() = length;
        self.meta.fire_changed(EventFlags::RESIZE);
    }

    /// Point in the child plane, `None` outside `[0, length]` along `lon`.
    pub fn project(&self, p: &Vec3) -> Option<Vec2> {
        let lon = p.lon();
        if (0.0..=self.length()).contains(&lon) {
            Some(vec2(p.tran(), p.vert()))
        } else {
            None
        }
    }

    fn extrude(&self, b: &Box2) -> Box3 {
        BBox::new(
            vec3(0.0, b.lower.tran(), b.lower.vert()),
            vec3(self.length(), b.upper.tran(), b.upper.vert()),
        )
    }
}

/// 2D child revolved around the vertical axis.
///
/// The child's transverse coordinate is the radius; it must not be negative.
pub struct Revolution {
    meta: ObjectMeta,
    this: Weak<Self>,
    slot: ChildSlot<2>,
}

impl Revolution {
    pub fn new(child: Option<ObjectRef<2>>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let meta = ObjectMeta::new();
            let listener: Weak<dyn ChangeListener> = this.clone();
            let slot = ChildSlot::new(meta.id(), listener, child);
            Self {
                meta,
                this: this.clone(),
                slot,
            }
        })
    }

    pub fn child(&self) -> Option<ObjectRef<2>> {
        self.slot.get()
    }

    pub fn set_child(&self, child: ObjectRef<2>) -> Result<()> {
        let listener: Weak<dyn ChangeListener> = self.this.clone();
        self.slot.set(&self.meta, listener, Some(child))
    }

    /// Point in the child plane: distance from the axis and height.
    pub fn project(&self, p: &Vec3) -> Option<Vec2> {
        Some(vec2(p.lon().hypot(p.tran()), p.vert()))
    }

    fn revolve(b: &Box2) -> Box3 {
        let r = b.upper.tran().max(0.0);
        BBox::new(
            vec3(-r, -r, b.lower.vert()),
            vec3(r, r, b.upper.vert()),
        )
    }
}

// ── Shared implementation ──

macro_rules! space_changer_impl {
    ($ty:ty, $name:literal, $to_3d:expr) => {
        impl ChangeListener for $ty {
            fn on_child_changed(&self, event: &Event) {
                self.meta.fire_delegated(event);
            }
        }

        impl GeometryObject for $ty {
            fn meta(&self) -> &ObjectMeta {
                &self.meta
            }

            fn object_type(&self) -> ObjectType {
                ObjectType::SpaceChanger
            }

            fn type_name(&self) -> &'static str {
                $name
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
                self.check_child()
            }

            fn children_count(&self) -> usize {
                usize::from(self.slot.is_set())
            }

            fn child_object_at(&self, index: usize) -> Result<AnyGeometry> {
                self.slot.child_object_at(index)
            }

            fn has_in_subtree(&self, id: ObjectId) -> bool {
                self.meta.id() == id || self.slot.has_in_subtree(id)
            }
        }

        impl GeometryObjectD<3> for $ty {
            fn bounding_box(&self) -> Box3 {
                let to_3d: fn(&Self, &Box2) -> Box3 = $to_3d;
                match self.child() {
                    Some(c) => to_3d(self, &c.bounding_box()),
                    None => BBox::ZERO,
                }
            }

            fn includes(&self, p: &Vec3) -> bool {
                match (self.child(), self.project(p)) {
                    (Some(c), Some(q)) => c.includes(&q),
                    _ => false,
                }
            }

            fn material(&self, p: &Vec3) -> Option<MaterialRef> {
                self.child()?.material(&self.project(p)?)
            }

            fn leafs_bounding_boxes(&self, path: Option<&PathHints>) -> Vec<Box3> {
                let to_3d: fn(&Self, &Box2) -> Box3 = $to_3d;
                let Some(child) = self.child() else {
                    return Vec::new();
                };
                child
                    .leafs_bounding_boxes(path)
                    .iter()
                    .map(|b| to_3d(self, b))
                    .collect()
            }

            fn paths_at(&self, p: &Vec3, all: bool) -> Option<Subtree> {
                let q = self.project(p)?;
                Subtree::extend_if_some(self.handle(), self.child()?.paths_at(&q, all))
            }

            fn paths_to(&self, id: ObjectId, path: Option<&PathHints>) -> Option<Subtree> {
                if self.meta.id() == id {
                    return Some(Subtree::leaf(self.handle()?));
                }
                Subtree::extend_if_some(self.handle(), self.child()?.paths_to(id, path))
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("id", &self.meta.id())
                    .field("has_child", &self.slot.is_set())
                    .finish()
            }
        }
    };
}

space_changer_impl!(Extrusion, "extrusion", |e: &Extrusion, b: &Box2| e.extrude(b));
space_changer_impl!(Revolution, "revolution", |_: &Revolution, b: &Box2| {
    Revolution::revolve(b)
});

impl Extrusion {
    fn check_child(&self) -> Result<()> {
        self.slot.validate("extrusion")
    }
}

impl Revolution {
    fn check_child(&self) -> Result<()> {
        let child = self.slot.require("revolution")?;
        child.validate()?;
        let lower = child.bounding_box().lower.tran();
        if lower < 0.0 {
            log::warn!("Revolution: child reaches negative radius {lower}");
        }
        Ok(())
    }
}
