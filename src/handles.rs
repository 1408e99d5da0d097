//! Session-only handles to in-memory media, and the manager that keeps at most one
//! of them alive per [`MediaKind`].
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use log::{debug, warn};

use crate::{intake::MediaKind, store::Blob};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media:{}", self.0)
    }
}

/// Counts activations and releases of one asset kind. Asynchronous work records the
/// generation it started under and is dropped if it no longer matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Generation(u64);

impl Generation {
    fn bump(&mut self) {
        self.0 += 1;
    }
}

/// Issues and revokes handles.
pub trait HandleHost {
    fn create(&mut self, blob: Blob) -> HandleId;
    fn revoke(&mut self, id: HandleId);
    fn resolve(&self, id: HandleId) -> Option<Blob>;
}

#[derive(Default)]
struct Registry {
    next: u64,
    live: HashMap<HandleId, Blob>,
}

/// Process-wide table of live handles, shared with the player and the image decoder.
#[derive(Clone, Default)]
pub struct MediaRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl MediaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl HandleHost for MediaRegistry {
    fn create(&mut self, blob: Blob) -> HandleId {
        let mut registry = self.lock();
        registry.next += 1;
        let id = HandleId(registry.next);
        registry.live.insert(id, blob);
        id
    }

    fn revoke(&mut self, id: HandleId) {
        if self.lock().live.remove(&id).is_none() {
            warn!("{id} revoked twice");
        }
    }

    fn resolve(&self, id: HandleId) -> Option<Blob> {
        self.lock().live.get(&id).cloned()
    }
}

#[derive(Default)]
struct Slot {
    handle: Option<HandleId>,
    generation: Generation,
}

/// Owns the active handle of each kind and releases every one of them when dropped.
pub struct HandleManager<H: HandleHost> {
    host: H,
    slots: [Slot; 2],
}

impl<H: HandleHost> HandleManager<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            slots: Default::default(),
        }
    }

    /// Revokes the current handle of `kind`, then creates one for `blob`.
    pub fn activate(&mut self, kind: MediaKind, blob: Blob) -> HandleId {
        self.release(kind);
        let id = self.host.create(blob);
        let slot = &mut self.slots[kind.index()];
        slot.handle = Some(id);
        slot.generation.bump();
        debug!("{kind} handle {id} active");
        id
    }

    pub fn release(&mut self, kind: MediaKind) {
        let slot = &mut self.slots[kind.index()];
        if let Some(id) = slot.handle.take() {
            self.host.revoke(id);
            slot.generation.bump();
            debug!("{kind} handle {id} released");
        }
    }

    pub fn release_all(&mut self) {
        for kind in MediaKind::ALL {
            self.release(kind);
        }
    }

    #[cfg(test)]
    pub fn current(&self, kind: MediaKind) -> Option<HandleId> {
        self.slots[kind.index()].handle
    }

    pub fn generation(&self, kind: MediaKind) -> Generation {
        self.slots[kind.index()].generation
    }

    pub fn resolve(&self, id: HandleId) -> Option<Blob> {
        self.host.resolve(id)
    }
}

impl<H: HandleHost> Drop for HandleManager<H> {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    /// Host that logs every create and revoke into a shared journal.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingHost {
        pub registry: MediaRegistry,
        pub journal: Rc<RefCell<Vec<String>>>,
    }

    impl RecordingHost {
        pub fn entries(&self) -> Vec<String> {
            self.journal.borrow().clone()
        }
    }

    impl HandleHost for RecordingHost {
        fn create(&mut self, blob: Blob) -> HandleId {
            let id = self.registry.create(blob);
            self.journal.borrow_mut().push(format!("create {id}"));
            id
        }

        fn revoke(&mut self, id: HandleId) {
            self.journal.borrow_mut().push(format!("revoke {id}"));
            self.registry.revoke(id);
        }

        fn resolve(&self, id: HandleId) -> Option<Blob> {
            self.registry.resolve(id)
        }
    }

    fn blob(bytes: &[u8]) -> Blob {
        Blob::from(bytes)
    }

    #[test]
    fn activation_revokes_before_creating() {
        let host = RecordingHost::default();
        let mut handles = HandleManager::new(host.clone());

        let first = handles.activate(MediaKind::Audio, blob(b"one"));
        let second = handles.activate(MediaKind::Audio, blob(b"two"));

        assert_eq!(
            host.entries(),
            vec![
                format!("create {first}"),
                format!("revoke {first}"),
                format!("create {second}"),
            ]
        );
        assert_eq!(handles.current(MediaKind::Audio), Some(second));
        assert!(handles.resolve(first).is_none());
        assert_eq!(&handles.resolve(second).unwrap()[..], b"two");
    }

    #[test]
    fn any_intake_sequence_leaves_one_live_handle_and_revokes_the_rest_once() {
        let host = RecordingHost::default();
        let mut handles = HandleManager::new(host.clone());
        let mut created = Vec::new();
        for i in 0..7u8 {
            created.push(handles.activate(MediaKind::Audio, blob(&[i])));
        }
        handles.activate(MediaKind::Image, blob(b"bg"));

        assert_eq!(host.registry.live_count(), 2);
        let journal = host.entries();
        for id in &created[..created.len() - 1] {
            let revokes = journal.iter().filter(|e| **e == format!("revoke {id}")).count();
            assert_eq!(revokes, 1, "{id}");
        }
        let last = created.last().unwrap();
        assert!(!journal.contains(&format!("revoke {last}")));
    }

    #[test]
    fn kinds_do_not_disturb_each_other() {
        let mut handles = HandleManager::new(MediaRegistry::new());
        let audio = handles.activate(MediaKind::Audio, blob(b"a"));
        let before = handles.generation(MediaKind::Audio);
        handles.activate(MediaKind::Image, blob(b"i"));
        handles.release(MediaKind::Image);

        assert_eq!(handles.current(MediaKind::Audio), Some(audio));
        assert_eq!(handles.generation(MediaKind::Audio), before);
        assert_eq!(handles.current(MediaKind::Image), None);
    }

    #[test]
    fn generation_moves_on_activate_and_release() {
        let mut handles = HandleManager::new(MediaRegistry::new());
        let start = handles.generation(MediaKind::Audio);
        handles.activate(MediaKind::Audio, blob(b"a"));
        let active = handles.generation(MediaKind::Audio);
        assert_ne!(start, active);
        handles.release(MediaKind::Audio);
        assert_ne!(active, handles.generation(MediaKind::Audio));
        // releasing an empty slot is a no-op
        let idle = handles.generation(MediaKind::Audio);
        handles.release(MediaKind::Audio);
        assert_eq!(idle, handles.generation(MediaKind::Audio));
    }

    #[test]
    fn dropping_the_manager_releases_everything() {
        let registry = MediaRegistry::new();
        {
            let mut handles = HandleManager::new(registry.clone());
            handles.activate(MediaKind::Audio, blob(b"a"));
            handles.activate(MediaKind::Image, blob(b"i"));
            assert_eq!(registry.live_count(), 2);
        }
        assert_eq!(registry.live_count(), 0);
    }
}
