//! Resettable GPU resources
//!
//! Objects that hold GPU handles register with a [`ResourceRegistry`]. Around
//! a device reset the registry runs two sweeps: [`ResourceRegistry::lose_all`]
//! before the old device is torn down and [`ResourceRegistry::reload_all`]
//! after the new one exists. Both sweeps visit resources by
//! [`ResourceKind`] (vertex buffers, then textures, then fonts) and by
//! registration order within a kind.
//!
//! Registrations are scoped: dropping the [`Registration`] guard removes the
//! entry, and the registry only keeps weak references, so a resource that
//! is dropped without deregistering is simply skipped.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use slotmap::{new_key_type, SlotMap};

use crate::render::device::Device;
use crate::render::error::{DeviceResult, VideoError, VideoResult};

pub use crate::render::device::ResourceKind;

pub mod font_cache;
pub mod texture_cache;
pub mod vertex_buffer;

pub use font_cache::{FontCache, FontSpec};
pub use texture_cache::TextureCache;
pub use vertex_buffer::VertexBuffer;

/// An object whose GPU state can be dropped and rebuilt
///
/// Resources never keep a reference to the device; the device is passed to
/// every hook.
pub trait ResettableResource {
    /// Category, which decides the sweep position
    fn kind(&self) -> ResourceKind;

    /// Forget every GPU handle. The device is about to be destroyed.
    fn lose_resources(&mut self, device: &mut dyn Device);

    /// Recreate GPU state on a freshly constructed device
    fn reload_resources(&mut self, device: &mut dyn Device) -> DeviceResult<()>;
}

new_key_type! {
    /// Key of one registration
    pub struct RegistrationKey;
}

struct Entry {
    kind: ResourceKind,
    sequence: u64,
    resource: Weak<RefCell<dyn ResettableResource>>,
}

#[derive(Default)]
struct RegistryInner {
    entries: RefCell<SlotMap<RegistrationKey, Entry>>,
    next_sequence: Cell<u64>,
    lost: Cell<bool>,
}

/// Shared list of resettable resources
///
/// Cloning gives another handle to the same registry.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    inner: Rc<RegistryInner>,
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("registered", &self.len())
            .field("lost", &self.is_lost())
            .finish()
    }
}

impl ResourceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared resource; it stays registered while the guard lives
    #[must_use = "the resource is deregistered when the guard is dropped"]
    pub fn register<R>(&self, resource: &Rc<RefCell<R>>) -> Registration
    where
        R: ResettableResource + 'static,
    {
        let kind = resource.borrow().kind();
        let shared: Rc<RefCell<dyn ResettableResource>> = resource.clone();
        let sequence = self.inner.next_sequence.get();
        self.inner.next_sequence.set(sequence + 1);

        let key = self.inner.entries.borrow_mut().insert(Entry {
            kind,
            sequence,
            resource: Rc::downgrade(&shared),
        });
        log::trace!("Registered {:?} resource #{}", kind, sequence);

        Registration {
            registry: Rc::downgrade(&self.inner),
            key,
        }
    }

    /// Take ownership of `resource` and register it
    pub fn adopt<R>(&self, resource: R) -> Registered<R>
    where
        R: ResettableResource + 'static,
    {
        let resource = Rc::new(RefCell::new(resource));
        let registration = self.register(&resource);
        Registered {
            resource,
            _registration: registration,
        }
    }

    /// Number of registrations whose resource is still alive
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .borrow()
            .values()
            .filter(|entry| entry.resource.strong_count() > 0)
            .count()
    }

    /// Whether no live resource is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a lose sweep ran without a reload sweep after it
    pub fn is_lost(&self) -> bool {
        self.inner.lost.get()
    }

    /// Live resources in sweep order. Dead entries are pruned.
    fn sweep_order(&self) -> Vec<(ResourceKind, Rc<RefCell<dyn ResettableResource>>)> {
        let mut entries = self.inner.entries.borrow_mut();
        entries.retain(|_, entry| entry.resource.strong_count() > 0);

        let mut live: Vec<_> = entries
            .values()
            .filter_map(|entry| {
                entry
                    .resource
                    .upgrade()
                    .map(|resource| (entry.kind, entry.sequence, resource))
            })
            .collect();
        live.sort_by_key(|(kind, sequence, _)| (*kind, *sequence));
        live.into_iter().map(|(kind, _, resource)| (kind, resource)).collect()
    }

    /// Tell every resource its GPU state is about to disappear
    ///
    /// Returns the number of resources visited. A resource that is borrowed
    /// while the sweep runs cannot be visited; it is logged at `error` and
    /// left out of the count, and the following reload sweep reports it.
    pub fn lose_all(&self, device: &mut dyn Device) -> usize {
        let resources = self.sweep_order();
        let mut visited = 0;
        for (kind, resource) in &resources {
            match resource.try_borrow_mut() {
                Ok(mut resource) => {
                    resource.lose_resources(device);
                    visited += 1;
                }
                Err(_) => log::error!("{:?} resource is borrowed during the lose sweep and keeps its GPU state", kind),
            }
        }
        self.inner.lost.set(true);
        log::debug!("Lost {} resources", visited);
        visited
    }

    /// Rebuild every resource on `device`
    ///
    /// Every resource is visited even if an earlier one fails; the first
    /// failure is returned as [`VideoError::ResourceReload`]. A resource
    /// borrowed while the sweep runs counts as a failure.
    pub fn reload_all(&self, device: &mut dyn Device) -> VideoResult<usize> {
        let resources = self.sweep_order();
        let mut visited = 0;
        let mut first_error = None;

        for (kind, resource) in &resources {
            let result = match resource.try_borrow_mut() {
                Ok(mut resource) => resource.reload_resources(device),
                Err(_) => {
                    log::error!("{:?} resource is borrowed during the reload sweep", kind);
                    first_error.get_or_insert_with(|| format!("{:?}: borrowed during the reload sweep", kind));
                    continue;
                }
            };
            visited += 1;
            if let Err(e) = result {
                log::error!("Failed to reload {:?} resource: {}", kind, e);
                first_error.get_or_insert_with(|| format!("{:?}: {}", kind, e));
            }
        }

        self.inner.lost.set(false);
        log::debug!("Reloaded {} resources", visited);
        match first_error {
            Some(reason) => Err(VideoError::ResourceReload(reason)),
            None => Ok(visited),
        }
    }
}

/// Scoped registration; dropping it deregisters the resource
#[derive(Debug)]
pub struct Registration {
    registry: Weak<RegistryInner>,
    key: RegistrationKey,
}

impl Registration {
    /// Key of this registration
    pub fn key(&self) -> RegistrationKey {
        self.key
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            // A sweep may be running; a pruned entry is as good as a removed one
            if let Ok(mut entries) = registry.entries.try_borrow_mut() {
                entries.remove(self.key);
            }
        }
    }
}

/// A resource owned together with its registration
pub struct Registered<R> {
    resource: Rc<RefCell<R>>,
    _registration: Registration,
}

impl<R> Registered<R> {
    /// Borrow the resource
    pub fn borrow(&self) -> Ref<'_, R> {
        self.resource.borrow()
    }

    /// Mutably borrow the resource
    pub fn borrow_mut(&self) -> RefMut<'_, R> {
        self.resource.borrow_mut()
    }

    /// Shared handle to the resource
    pub fn shared(&self) -> &Rc<RefCell<R>> {
        &self.resource
    }
}

impl<R: fmt::Debug> fmt::Debug for Registered<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Registered").field(&self.resource).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::null::NullDevice;
    use crate::render::error::DeviceError;

    struct Tracked {
        kind: ResourceKind,
        name: &'static str,
        journal: Rc<RefCell<Vec<String>>>,
        fail_reload: bool,
    }

    impl Tracked {
        fn new(kind: ResourceKind, name: &'static str, journal: &Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                kind,
                name,
                journal: Rc::clone(journal),
                fail_reload: false,
            }
        }
    }

    impl ResettableResource for Tracked {
        fn kind(&self) -> ResourceKind {
            self.kind
        }

        fn lose_resources(&mut self, _device: &mut dyn Device) {
            self.journal.borrow_mut().push(format!("lose {}", self.name));
        }

        fn reload_resources(&mut self, _device: &mut dyn Device) -> DeviceResult<()> {
            self.journal.borrow_mut().push(format!("reload {}", self.name));
            if self.fail_reload {
                Err(DeviceError::Allocation(self.name.to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_sweeps_follow_kind_then_registration_order() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let registry = ResourceRegistry::new();
        let _font = registry.adopt(Tracked::new(ResourceKind::Font, "font", &journal));
        let _tex_a = registry.adopt(Tracked::new(ResourceKind::Texture, "tex_a", &journal));
        let _vbo = registry.adopt(Tracked::new(ResourceKind::VertexBuffer, "vbo", &journal));
        let _tex_b = registry.adopt(Tracked::new(ResourceKind::Texture, "tex_b", &journal));

        let mut device = NullDevice::new();
        assert_eq!(registry.lose_all(&mut device), 4);
        assert!(registry.is_lost());
        assert_eq!(registry.reload_all(&mut device).unwrap(), 4);
        assert!(!registry.is_lost());

        assert_eq!(
            *journal.borrow(),
            vec![
                "lose vbo", "lose tex_a", "lose tex_b", "lose font", "reload vbo", "reload tex_a", "reload tex_b",
                "reload font",
            ]
        );
    }

    #[test]
    fn test_dropping_registration_deregisters() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let registry = ResourceRegistry::new();
        let kept = registry.adopt(Tracked::new(ResourceKind::Texture, "kept", &journal));
        let dropped = registry.adopt(Tracked::new(ResourceKind::Texture, "dropped", &journal));
        assert_eq!(registry.len(), 2);

        drop(dropped);
        assert_eq!(registry.len(), 1);

        registry.lose_all(&mut NullDevice::new());
        assert_eq!(*journal.borrow(), vec!["lose kept"]);
        assert_eq!(kept.borrow().name, "kept");
    }

    #[test]
    fn test_dead_resource_is_skipped() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let registry = ResourceRegistry::new();
        let resource = Rc::new(RefCell::new(Tracked::new(ResourceKind::Font, "gone", &journal)));
        let registration = registry.register(&resource);

        drop(resource);
        assert!(registry.is_empty());
        assert_eq!(registry.lose_all(&mut NullDevice::new()), 0);
        drop(registration);
    }

    #[test]
    fn test_reload_visits_all_and_reports_first_failure() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let registry = ResourceRegistry::new();
        let mut broken = Tracked::new(ResourceKind::VertexBuffer, "broken", &journal);
        broken.fail_reload = true;
        let _broken = registry.adopt(broken);
        let _fine = registry.adopt(Tracked::new(ResourceKind::Texture, "fine", &journal));

        let err = registry.reload_all(&mut NullDevice::new()).unwrap_err();
        assert!(matches!(err, VideoError::ResourceReload(ref reason) if reason.contains("broken")));
        assert_eq!(*journal.borrow(), vec!["reload broken", "reload fine"]);
    }

    #[test]
    fn test_borrowed_resource_fails_the_reload_sweep() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let registry = ResourceRegistry::new();
        let held = registry.adopt(Tracked::new(ResourceKind::Texture, "held", &journal));
        let _free = registry.adopt(Tracked::new(ResourceKind::Font, "free", &journal));
        let mut device = NullDevice::new();

        let guard = held.borrow_mut();
        assert_eq!(registry.lose_all(&mut device), 1);
        let err = registry.reload_all(&mut device).unwrap_err();
        drop(guard);

        assert!(matches!(err, VideoError::ResourceReload(ref reason) if reason.contains("borrowed")));
        assert_eq!(*journal.borrow(), vec!["lose free", "reload free"]);
    }
}
