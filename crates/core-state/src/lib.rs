//! Document model: segmented line storage, delta log, cursors, resources.
//!
//! The crate carries the append-only delta log over a segmented line
//! buffer, the position arithmetic backing cursors, and the `Resource`
//! type funneling every mutation through the log so that multiple views
//! observe one consistent stream of change records.
//!
//! Resources live in a `Directory` arena and are addressed by id; views
//! and background I/O hold ids rather than references and tolerate the
//! resource having been closed underneath them.

pub mod delta;
pub mod line;
pub mod position;
pub mod resource;
pub mod sequence;

pub use delta::{Log, LogSnapshot, Record, Summary};
pub use line::{EXTENSION_LIMIT, HEADER_CODEPOINTS, Line, LineForm};
pub use position::{CursorPair, Position, Relation};
pub use resource::{ObserverId, Reference, Resource, ResourceStatus, StateError, Storage};
pub use sequence::{Immutable, SEGMENT_SIZE, Segments, Sequence};

/// Key naming a resource in a `Directory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub usize);

/// Arena of process-local resources.
///
/// Ids stay stable across closure; a closed slot reads as absent so
/// observers and completions referencing it degrade to no-ops.
#[derive(Debug, Default)]
pub struct Directory {
    resources: Vec<Option<Resource>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource: Resource) -> ResourceId {
        let id = ResourceId(self.resources.len());
        self.resources.push(Some(resource));
        id
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id.0).and_then(|r| r.as_ref())
    }

    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource> {
        self.resources.get_mut(id.0).and_then(|r| r.as_mut())
    }

    /// Close the resource, detaching all observers. Subsequent access
    /// through the id reads as absent.
    pub fn remove(&mut self, id: ResourceId) -> Option<Resource> {
        self.resources.get_mut(id.0).and_then(|r| r.take())
    }

    /// Find an open resource by path.
    pub fn select_by_path(&self, path: &std::path::Path) -> Option<ResourceId> {
        self.resources.iter().enumerate().find_map(|(i, r)| {
            r.as_ref()
                .filter(|r| r.origin.path == path)
                .map(|_| ResourceId(i))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &Resource)> {
        self.resources
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (ResourceId(i), r)))
    }

    pub fn len(&self) -> usize {
        self.resources.iter().filter(|r| r.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
