//! Spatial index over the placements of a translation container.
//!
//! A cache is built from a snapshot of the children and never changes
//! afterwards. Containers drop it on mutation and build a new one lazily.

use std::sync::Arc;

use rstar::{RTree, RTreeObject, AABB};

use crate::container::collect_paths;
use crate::material::MaterialRef;
use crate::object::{AnyGeometry, Dim, GeometryObjectD, Subtree, SupportedDim};
use crate::primitives::{BBox, DVec};
use crate::transform::Translation;

/// Containers with at most this many children are scanned linearly.
const LINEAR_SCAN_LIMIT: usize = 4;

/// Relative enlargement of indexed boxes, so that the index never misses a
/// child whose own inclusion test is exact on its boundary.
const ENVELOPE_EPSILON: f64 = 1e-9;

/// An entry in the R-tree, referencing a child by its insertion index.
#[derive(Debug, Clone)]
struct CacheEntry {
    index: usize,
    envelope: AABB<[f64; 3]>,
}

impl RTreeObject for CacheEntry {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// 2D points live in the `z = 0` plane of the index.
fn index_point<const DIM: usize>(v: &DVec<DIM>) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (o, c) in out.iter_mut().zip(v.components()) {
        *o = *c;
    }
    out
}

fn envelope_of<const DIM: usize>(bb: &BBox<DIM>) -> AABB<[f64; 3]> {
    let magnitude = bb
        .lower
        .components()
        .iter()
        .chain(bb.upper.components())
        .fold(1.0_f64, |m, c| m.max(c.abs()));
    let grown = bb.extended(ENVELOPE_EPSILON * magnitude);
    AABB::from_corners(index_point(&grown.lower), index_point(&grown.upper))
}

enum CacheIndex {
    Linear,
    Tree(RTree<CacheEntry>),
}

pub(crate) struct SpatialCache<const DIM: usize> {
    children: Vec<Arc<Translation<DIM>>>,
    index: CacheIndex,
}

impl<const DIM: usize> SpatialCache<DIM>
where
    Dim<DIM>: SupportedDim<DIM>,
{
    pub fn build(children: Vec<Arc<Translation<DIM>>>) -> Self {
        if children.len() <= LINEAR_SCAN_LIMIT {
            return Self {
                children,
                index: CacheIndex::Linear,
            };
        }
        let entries: Vec<CacheEntry> = children
            .iter()
            .enumerate()
            .filter_map(|(index, c)| {
                let bb = c.child_bounding_box()?;
                Some(CacheEntry {
                    index,
                    envelope: envelope_of(&bb),
                })
            })
            .collect();
        log::debug!(
            "Built spatial index over {} of {} children",
            entries.len(),
            children.len()
        );
        Self {
            children,
            index: CacheIndex::Tree(RTree::bulk_load(entries)),
        }
    }

    /// Children whose box may contain `p`, last inserted first.
    fn candidates(&self, p: &DVec<DIM>) -> Vec<&Arc<Translation<DIM>>> {
        match &self.index {
            CacheIndex::Linear => self.children.iter().rev().collect(),
            CacheIndex::Tree(tree) => {
                let at = AABB::from_point(index_point(p));
                let mut found: Vec<usize> = tree
                    .locate_in_envelope_intersecting(&at)
                    .map(|e| e.index)
                    .collect();
                found.sort_unstable_by(|a, b| b.cmp(a));
                found.into_iter().map(|i| &self.children[i]).collect()
            }
        }
    }

    pub fn includes(&self, p: &DVec<DIM>) -> bool {
        self.candidates(p).into_iter().any(|c| c.includes(p))
    }

    pub fn material(&self, p: &DVec<DIM>) -> Option<MaterialRef> {
        self.candidates(p).into_iter().find_map(|c| c.material(p))
    }

    pub fn paths_at(&self, handle: Option<AnyGeometry>, p: &DVec<DIM>, all: bool) -> Option<Subtree> {
        collect_paths(handle, self.candidates(p), p, all)
    }
}
