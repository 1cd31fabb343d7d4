//! The resolver cache: shared, reference-counted open resources.
//!
//! Resources are keyed by [`CacheKey`], the pair of resource class and
//! comparable string, so any number of path specification instances that
//! describe the same resource share one open instance. Each successful
//! acquisition hands out a [`Lease`]; dropping the last lease closes the
//! resource and evicts it.
//!
//! Every key has its own construction slot. The slot lock is held while a
//! resource is built, so concurrent resolutions of one key open it once,
//! while resolutions of unrelated keys (including the recursive
//! resolution of parents) proceed independently.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use super::config::ContextConfig;
use crate::Result;
use crate::file_io::SharedFileIo;
use crate::path::PathSpec;
use crate::sync::lock_or_recover;
use crate::vfs::FileSystem;

/// The kind of resource cached under a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    /// An open stream.
    FileObject,
    /// An open file system.
    FileSystem,
}

/// Identity of a cached resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    class: ResourceClass,
    comparable: String,
}

impl CacheKey {
    /// Key of the stream described by a path specification.
    pub fn file_object(path_spec: &PathSpec) -> Self {
        Self {
            class: ResourceClass::FileObject,
            comparable: path_spec.comparable(),
        }
    }

    /// Key of the file system containing a path specification.
    pub fn file_system(path_spec: &PathSpec) -> Self {
        Self {
            class: ResourceClass::FileSystem,
            comparable: path_spec.file_system_comparable(),
        }
    }

    /// Returns the resource class.
    pub fn class(&self) -> ResourceClass {
        self.class
    }

    /// Returns the comparable string.
    pub fn comparable(&self) -> &str {
        &self.comparable
    }
}

impl fmt::Display for CacheKey {
    /// Renders the class and the chain of type indicators, leaving out
    /// attribute values such as keys.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = match self.class {
            ResourceClass::FileObject => "file object",
            ResourceClass::FileSystem => "file system",
        };
        let chain: Vec<&str> = self
            .comparable
            .lines()
            .map(|line| {
                let line = line.strip_prefix("type: ").unwrap_or(line);
                line.split(',').next().unwrap_or(line)
            })
            .collect();
        write!(f, "{} {}", class, chain.join("/"))
    }
}

/// An open resource held by the cache.
#[derive(Clone)]
pub(crate) enum Resource {
    FileIo(SharedFileIo),
    FileSystem(Arc<dyn FileSystem>),
}

impl Resource {
    fn close(&self) -> Result<()> {
        match self {
            Resource::FileIo(io) => lock_or_recover(io).close(),
            Resource::FileSystem(fs) => fs.close(),
        }
    }
}

struct CacheEntry {
    resource: Resource,
    references: usize,
}

#[derive(Default)]
struct Slot {
    entry: Mutex<Option<CacheEntry>>,
}

struct ContextInner {
    config: ContextConfig,
    slots: Mutex<HashMap<CacheKey, Arc<Slot>>>,
}

/// A resolver cache.
///
/// Cloning a context is cheap and yields a handle to the same cache.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.inner.config)
            .field("file_objects", &self.number_of_file_objects())
            .field("file_systems", &self.number_of_file_systems())
            .finish()
    }
}

impl Context {
    /// Creates an empty context with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    /// Creates an empty context with a custom configuration.
    pub fn with_config(config: ContextConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                config,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    /// Returns `true` if both handles refer to the same cache.
    pub fn is_same_context(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn slot(&self, key: &CacheKey) -> Arc<Slot> {
        lock_or_recover(&self.inner.slots)
            .entry(key.clone())
            .or_default()
            .clone()
    }

    fn is_current(&self, key: &CacheKey, slot: &Arc<Slot>) -> bool {
        lock_or_recover(&self.inner.slots)
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// Removes a slot from the table if it is still registered and empty.
    fn discard_slot(&self, key: &CacheKey, slot: &Arc<Slot>) {
        let mut slots = lock_or_recover(&self.inner.slots);
        let vacant = slots.get(key).is_some_and(|current| {
            Arc::ptr_eq(current, slot) && matches!(slot.entry.try_lock(), Ok(ref e) if e.is_none())
        });
        if vacant {
            slots.remove(key);
        }
    }

    fn lease(&self, key: CacheKey, slot: &Arc<Slot>) -> Lease {
        Lease {
            context: Arc::downgrade(&self.inner),
            key,
            slot: Arc::clone(slot),
        }
    }

    /// Returns the cached resource for `key`, building it on a miss.
    ///
    /// Either way the reference count is incremented and a lease for that
    /// reference is returned.
    pub(crate) fn acquire<F>(&self, key: CacheKey, build: F) -> Result<(Resource, Lease)>
    where
        F: FnOnce() -> Result<Resource>,
    {
        loop {
            let slot = self.slot(&key);
            let mut entry = lock_or_recover(&slot.entry);
            if !self.is_current(&key, &slot) {
                // Evicted between lookup and lock.
                continue;
            }

            if let Some(cached) = entry.as_mut() {
                cached.references += 1;
                log::debug!("reusing {} ({} references)", key, cached.references);
                return Ok((cached.resource.clone(), self.lease(key, &slot)));
            }

            return match build() {
                Ok(resource) => {
                    log::debug!("opened {}", key);
                    *entry = Some(CacheEntry {
                        resource: resource.clone(),
                        references: 1,
                    });
                    Ok((resource, self.lease(key, &slot)))
                }
                Err(e) => {
                    drop(entry);
                    self.discard_slot(&key, &slot);
                    Err(e)
                }
            };
        }
    }

    /// Adds a reference to a cached resource, if present.
    pub(crate) fn retain(&self, key: &CacheKey) -> Option<Lease> {
        let slot = lock_or_recover(&self.inner.slots).get(key).cloned()?;
        self.retain_slot(key, &slot)
    }

    fn retain_slot(&self, key: &CacheKey, slot: &Arc<Slot>) -> Option<Lease> {
        let mut entry = lock_or_recover(&slot.entry);
        let cached = entry.as_mut()?;
        cached.references += 1;
        Some(self.lease(key.clone(), slot))
    }

    /// Drops one reference held through `slot`.
    ///
    /// A slot drained by [`empty`](Self::empty) holds no entry, so releasing
    /// a reference taken before the drain leaves any newer entry for the
    /// same key untouched.
    fn release(&self, key: &CacheKey, slot: &Arc<Slot>) {
        let evicted = {
            let mut entry = lock_or_recover(&slot.entry);
            match entry.as_mut() {
                Some(cached) if cached.references > 1 => {
                    cached.references -= 1;
                    None
                }
                Some(_) => entry.take(),
                None => None,
            }
        };

        if let Some(cached) = evicted {
            self.discard_slot(key, slot);
            log::debug!("closing {}", key);
            if let Err(e) = cached.resource.close() {
                log::warn!("failed to close {}: {}", key, e);
            }
        }
    }

    /// Returns the number of references to the resource under `key`.
    pub fn reference_count(&self, key: &CacheKey) -> usize {
        let Some(slot) = lock_or_recover(&self.inner.slots).get(key).cloned() else {
            return 0;
        };
        let entry = lock_or_recover(&slot.entry);
        entry.as_ref().map_or(0, |cached| cached.references)
    }

    /// Returns the number of references to the stream of a path specification.
    pub fn file_object_reference_count(&self, path_spec: &PathSpec) -> usize {
        self.reference_count(&CacheKey::file_object(path_spec))
    }

    /// Returns the number of references to the file system containing a
    /// path specification.
    pub fn file_system_reference_count(&self, path_spec: &PathSpec) -> usize {
        self.reference_count(&CacheKey::file_system(path_spec))
    }

    fn count(&self, class: ResourceClass) -> usize {
        let slots: Vec<Arc<Slot>> = lock_or_recover(&self.inner.slots)
            .iter()
            .filter(|(key, _)| key.class == class)
            .map(|(_, slot)| Arc::clone(slot))
            .collect();
        slots
            .iter()
            .filter(|slot| lock_or_recover(&slot.entry).is_some())
            .count()
    }

    /// Returns the number of cached open streams.
    pub fn number_of_file_objects(&self) -> usize {
        self.count(ResourceClass::FileObject)
    }

    /// Returns the number of cached open file systems.
    pub fn number_of_file_systems(&self) -> usize {
        self.count(ResourceClass::FileSystem)
    }

    /// Closes and evicts every cached resource regardless of references.
    ///
    /// Outstanding handles stay valid objects but report
    /// [`Error::NotOpen`](crate::Error::NotOpen) from then on. Dropping them
    /// later does not affect resources resolved after the call.
    pub fn empty(&self) {
        let slots: Vec<(CacheKey, Arc<Slot>)> =
            lock_or_recover(&self.inner.slots).drain().collect();
        for (key, slot) in slots {
            let taken = lock_or_recover(&slot.entry).take();
            if let Some(cached) = taken {
                log::debug!("closing {} ({} references)", key, cached.references);
                if let Err(e) = cached.resource.close() {
                    log::warn!("failed to close {}: {}", key, e);
                }
            }
        }
    }
}

/// One counted reference to a cached resource.
///
/// Dropping the lease releases the reference. The lease does not keep the
/// context alive; once the context is gone releasing is a no-op.
pub(crate) struct Lease {
    context: Weak<ContextInner>,
    key: CacheKey,
    slot: Arc<Slot>,
}

impl Lease {
    /// Returns the context the lease was taken from, if it still exists.
    pub(crate) fn context(&self) -> Option<Context> {
        self.context.upgrade().map(|inner| Context { inner })
    }

    /// Takes another reference to the same resource.
    pub(crate) fn try_clone(&self) -> Option<Lease> {
        self.context()?.retain_slot(&self.key, &self.slot)
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lease({})", self.key)
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(context) = self.context() {
            context.release(&self.key, &self.slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::file_io::{FileIo, MemoryFile};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(location: &str) -> CacheKey {
        CacheKey::file_object(&PathSpec::os(location).unwrap())
    }

    fn memory_resource(data: &[u8]) -> Resource {
        let io: Box<dyn FileIo> = Box::new(MemoryFile::new(data.to_vec()));
        Resource::FileIo(Arc::new(Mutex::new(io)))
    }

    #[test]
    fn test_acquire_shares_and_counts() {
        let context = Context::new();
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(memory_resource(b"abc"))
        };

        let (first, lease1) = context.acquire(key("/a"), build).unwrap();
        let (second, lease2) = context.acquire(key("/a"), build).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(context.reference_count(&key("/a")), 2);

        match (&first, &second) {
            (Resource::FileIo(a), Resource::FileIo(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected file objects"),
        }

        drop(lease1);
        assert_eq!(context.reference_count(&key("/a")), 1);
        if let Resource::FileIo(io) = &first {
            assert!(lock_or_recover(io).is_open());
        }

        drop(lease2);
        assert_eq!(context.reference_count(&key("/a")), 0);
        assert_eq!(context.number_of_file_objects(), 0);
        if let Resource::FileIo(io) = &first {
            assert!(!lock_or_recover(io).is_open());
        }
    }

    #[test]
    fn test_failed_build_leaves_no_entry() {
        let context = Context::new();
        let result = context.acquire(key("/missing"), || Err(Error::back_end("bad magic")));
        assert!(matches!(result, Err(Error::BackEnd(_))));
        assert_eq!(context.number_of_file_objects(), 0);
        assert_eq!(lock_or_recover(&context.inner.slots).len(), 0);
    }

    #[test]
    fn test_retain() {
        let context = Context::new();
        assert!(context.retain(&key("/a")).is_none());

        let (_, lease) = context
            .acquire(key("/a"), || Ok(memory_resource(b"x")))
            .unwrap();
        let second = lease.try_clone().unwrap();
        assert_eq!(context.reference_count(&key("/a")), 2);
        drop(lease);
        drop(second);
        assert_eq!(context.reference_count(&key("/a")), 0);
    }

    #[test]
    fn test_lease_outliving_context() {
        let context = Context::new();
        let (_, lease) = context
            .acquire(key("/a"), || Ok(memory_resource(b"x")))
            .unwrap();
        drop(context);
        assert!(lease.context().is_none());
        drop(lease);
    }

    #[test]
    fn test_empty_closes_everything() {
        let context = Context::new();
        let (resource, _lease) = context
            .acquire(key("/a"), || Ok(memory_resource(b"x")))
            .unwrap();
        context.empty();
        assert_eq!(context.number_of_file_objects(), 0);
        if let Resource::FileIo(io) = resource {
            assert!(!lock_or_recover(&io).is_open());
        }
    }

    #[test]
    fn test_stale_lease_after_empty_keeps_new_entry() {
        let context = Context::new();
        let (_, stale) = context
            .acquire(key("/a"), || Ok(memory_resource(b"old")))
            .unwrap();
        context.empty();

        let (fresh, lease) = context
            .acquire(key("/a"), || Ok(memory_resource(b"new")))
            .unwrap();
        assert_eq!(context.reference_count(&key("/a")), 1);

        drop(stale);
        assert_eq!(context.reference_count(&key("/a")), 1);
        if let Resource::FileIo(io) = &fresh {
            assert!(lock_or_recover(io).is_open());
        }

        drop(lease);
        assert_eq!(context.number_of_file_objects(), 0);
    }

    #[test]
    fn test_concurrent_acquire_builds_once() {
        let context = Context::new();
        let builds = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let context = context.clone();
                let builds = Arc::clone(&builds);
                std::thread::spawn(move || {
                    let (_, lease) = context
                        .acquire(key("/shared"), || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(5));
                            Ok(memory_resource(b"shared"))
                        })
                        .unwrap();
                    lease
                })
            })
            .collect();
        let leases: Vec<Lease> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(context.reference_count(&key("/shared")), 8);
        drop(leases);
        assert_eq!(context.number_of_file_objects(), 0);
    }

    #[test]
    fn test_cache_key_display_hides_attributes() {
        let spec = PathSpec::tar("/secret", PathSpec::os("/case.tar").unwrap()).unwrap();
        let key = CacheKey::file_object(&spec);
        assert_eq!(key.to_string(), "file object OS/TAR");
        assert_eq!(CacheKey::file_system(&spec).class(), ResourceClass::FileSystem);
    }
}
