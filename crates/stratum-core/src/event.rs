//! Upward change notification.
//!
//! A child never owns its parents. Parents register a weak listener on the
//! child's [`ChangeSignal`] and the child fires events through it after every
//! mutation. Listeners re-fire to their own parents, so an event reaches every
//! ancestor that is still alive.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::object::ObjectId;

/// Kind of change carried by an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventFlags(u8);

impl EventFlags {
    pub const NONE: EventFlags = EventFlags(0);
    /// Geometry (bounding box or shape) of the source changed.
    pub const RESIZE: EventFlags = EventFlags(1 << 0);
    /// Children were inserted into the source.
    pub const CHILDREN_INSERT: EventFlags = EventFlags(1 << 1);
    /// Children were removed from the source.
    pub const CHILDREN_REMOVE: EventFlags = EventFlags(1 << 2);
    /// Children changed in a way not covered by insert/remove.
    pub const CHILDREN_GENERIC: EventFlags = EventFlags(1 << 3);
    /// The event was re-fired by a parent on behalf of a descendant.
    pub const DELEGATED: EventFlags = EventFlags(1 << 4);

    const CHILDREN: EventFlags = EventFlags(
        Self::CHILDREN_INSERT.0 | Self::CHILDREN_REMOVE.0 | Self::CHILDREN_GENERIC.0,
    );

    pub fn contains(self, other: EventFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: EventFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn union(self, other: EventFlags) -> EventFlags {
        EventFlags(self.0 | other.0)
    }

    pub fn without(self, other: EventFlags) -> EventFlags {
        EventFlags(self.0 & !other.0)
    }
}

impl std::ops::BitOr for EventFlags {
    type Output = EventFlags;

    fn bitor(self, rhs: EventFlags) -> EventFlags {
        self.union(rhs)
    }
}

/// A change that happened to some object in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Object which fired the event (the direct child, for a listener).
    pub source: ObjectId,
    /// Object where the change originally happened.
    pub origin: ObjectId,
    pub flags: EventFlags,
}

impl Event {
    pub fn new(source: ObjectId, flags: EventFlags) -> Self {
        Self {
            source,
            origin: source,
            flags,
        }
    }

    /// A change of geometry: either a resize or any change of the children list.
    pub fn is_resize(&self) -> bool {
        self.flags
            .intersects(EventFlags::RESIZE | EventFlags::CHILDREN)
    }

    pub fn has_children_changes(&self) -> bool {
        self.flags.intersects(EventFlags::CHILDREN)
    }

    pub fn is_delegated(&self) -> bool {
        self.flags.contains(EventFlags::DELEGATED)
    }

    /// Flags a parent should use when re-firing this event. A change of the
    /// child list of a descendant is a resize from the parent's point of view.
    pub fn flags_for_parent(&self) -> EventFlags {
        let mut flags = self.flags.without(EventFlags::CHILDREN) | EventFlags::DELEGATED;
        if self.has_children_changes() {
            flags = flags | EventFlags::RESIZE;
        }
        flags
    }

    /// The event as seen by the parents of `parent`.
    pub fn delegated(&self, parent: ObjectId) -> Event {
        Event {
            source: parent,
            origin: self.origin,
            flags: self.flags_for_parent(),
        }
    }
}

/// Receiver of change events fired by a child.
pub trait ChangeListener: Send + Sync {
    fn on_child_changed(&self, event: &Event);
}

/// List of weak listeners attached to one object.
#[derive(Default)]
pub struct ChangeSignal {
    listeners: Mutex<Vec<(ObjectId, Weak<dyn ChangeListener>)>>,
}

impl ChangeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, id: ObjectId, listener: Weak<dyn ChangeListener>) {
        self.listeners.lock().push((id, listener));
    }

    /// Remove one registration of listener `id`.
    pub fn disconnect(&self, id: ObjectId) {
        let mut listeners = self.listeners.lock();
        if let Some(pos) = listeners.iter().position(|(l, _)| *l == id) {
            listeners.remove(pos);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|(_, l)| l.strong_count() > 0)
            .count()
    }

    /// Deliver `event` to every live listener. Dead listeners are dropped.
    pub fn fire(&self, event: &Event) {
        let live: Vec<Arc<dyn ChangeListener>> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|(_, l)| l.strong_count() > 0);
            listeners.iter().filter_map(|(_, l)| l.upgrade()).collect()
        };
        for listener in live {
            listener.on_child_changed(event);
        }
    }
}

impl std::fmt::Debug for ChangeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSignal")
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}
