//! Disambiguation of objects inserted at more than one place.

use std::collections::HashMap;
use std::fmt;
use std::ops::AddAssign;

use crate::object::{AnyGeometry, ObjectId, WeakGeometry};

/// Result of adding a child to a container: which placement was created where.
#[derive(Clone)]
pub struct Hint {
    /// Container the child was added to.
    pub container: ObjectId,
    /// Placement object created by the container for the new child.
    pub child: AnyGeometry,
}

impl Hint {
    pub fn new(container: ObjectId, child: AnyGeometry) -> Self {
        Self { container, child }
    }
}

impl fmt::Debug for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hint")
            .field("container", &self.container)
            .field("child", &self.child.id())
            .finish()
    }
}

/// Chosen child for each container, at most one per container.
///
/// Children are held weakly. A hint whose child was dropped no longer
/// restricts anything.
#[derive(Clone, Default)]
pub struct PathHints {
    hint_for: HashMap<ObjectId, WeakGeometry>,
}

impl PathHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_hint(hint: Hint) -> Self {
        let mut hints = Self::new();
        hints.add_hint(hint);
        hints
    }

    /// Record `hint`, replacing any earlier hint for the same container.
    pub fn add_hint(&mut self, hint: Hint) {
        self.add_hint_for(hint.container, &hint.child);
    }

    pub fn add_hint_for(&mut self, container: ObjectId, child: &AnyGeometry) {
        self.hint_for.insert(container, child.downgrade());
    }

    /// Child chosen for `container`, if any and still alive.
    pub fn get_child(&self, container: ObjectId) -> Option<AnyGeometry> {
        self.hint_for.get(&container)?.upgrade()
    }

    /// `true` if the hints allow descending from `container` into `child`.
    pub fn allows(&self, container: ObjectId, child: ObjectId) -> bool {
        match self.get_child(container) {
            Some(chosen) => chosen.id() == child,
            None => true,
        }
    }

    /// Drop hints whose children no longer exist.
    pub fn clean_deleted(&mut self) {
        self.hint_for.retain(|_, child| child.upgrade().is_some());
    }

    pub fn len(&self) -> usize {
        self.hint_for.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hint_for.is_empty()
    }
}

impl AddAssign<Hint> for PathHints {
    fn add_assign(&mut self, hint: Hint) {
        self.add_hint(hint);
    }
}

impl fmt::Debug for PathHints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathHints")
            .field("hints", &self.hint_for.len())
            .finish()
    }
}

/// `true` if `path` (when given) allows descending from `container` into `child`.
pub(crate) fn path_allows(path: Option<&PathHints>, container: ObjectId, child: ObjectId) -> bool {
    path.map_or(true, |p| p.allows(container, child))
}
