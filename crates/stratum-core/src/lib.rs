//! # Stratum Core
//!
//! Geometry object graph for layered device simulation: vectors and boxes,
//! material-filled leaves, transforms, space changers and containers, with
//! point queries (inclusion, material, paths), upward change notification
//! and path hints for objects used at more than one place.
//!
//! Objects are shared through `Arc` and mutated through `&self`; the graph
//! is kept acyclic on every insertion.

pub mod align;
pub mod error;
pub mod event;
pub mod lattice;
pub mod leaf;
pub mod manager;
pub mod material;
pub mod object;
pub mod path;
pub mod primitives;
pub mod shelf;
pub mod space_changer;
pub mod stack;
pub mod transform;
pub mod translation_container;

mod cache;
mod container;

pub use align::{AlignStrategy, Aligner};
pub use error::{GeometryError, Result};
pub use event::{ChangeListener, ChangeSignal, Event, EventFlags};
pub use lattice::{Arrange2, Arrange3, ArrangeContainer, Lattice, LatticePolygon, LatticeRegion};
pub use leaf::{Block, Cuboid, Gap, Leaf, Rectangle, Shape, Triangle};
pub use manager::{Manager, Reference};
pub use material::{
    DummyMaterial, Material, MaterialProvider, MaterialRef, MaterialRegistry, MaterialsDb,
    MixedCompositionFactory, NamedMaterial,
};
pub use object::{
    erase, objects_with_role, restore, AnyGeometry, Dim, GeometryObject, GeometryObjectD,
    ObjectId, ObjectRef, ObjectType, Subtree, SupportedDim, WeakGeometry,
};
pub use path::{Hint, PathHints};
pub use primitives::{vec2, vec3, BBox, Box2, Box3, DVec, Vec2, Vec3};
pub use shelf::ShelfContainer;
pub use space_changer::{Extrusion, Revolution};
pub use stack::{MultiStack2, MultiStack3, MultiStackContainer, Stack2, Stack3, StackContainer};
pub use transform::{Translation, Translation2, Translation3};
pub use translation_container::{TranslationContainer, TranslationContainer2, TranslationContainer3};
