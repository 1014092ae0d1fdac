use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use prost::Name;
use tracing::debug;

use super::Handler;
use super::Service;
use super::ServiceHandler;
use crate::TypeTag;

/// Concurrency-safe mapping from [`TypeTag`] to [`Handler`].
///
/// Lookups clone the handler out of the map, so a running handler never
/// holds a shard lock and registration is never blocked by execution.
/// Handlers are only removed by an explicit `unregister`.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<TypeTag, Arc<dyn Handler>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("HandlerRegistry").field("tags", &self.tags()).finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler` for `tag`, replacing any previous one.
    /// Returns true if a handler was replaced.
    pub fn register<H: Handler>(
        &self,
        tag: impl Into<TypeTag>,
        handler: H,
    ) -> bool {
        self.register_arc(tag, Arc::new(handler))
    }

    /// Same as [`register`](Self::register) for an already shared handler,
    /// which lets one handler serve several tags.
    pub fn register_arc(
        &self,
        tag: impl Into<TypeTag>,
        handler: Arc<dyn Handler>,
    ) -> bool {
        let tag = tag.into();
        debug!(%tag, "register handler");
        self.handlers.insert(tag, handler).is_some()
    }

    /// Installs a typed service under `TypeTag::of::<M>()`.
    pub fn register_service<M, S>(
        &self,
        service: S,
    ) -> bool
    where
        M: Name + Default + Send + 'static,
        S: Service<M>,
    {
        self.register(TypeTag::of::<M>(), ServiceHandler::<M, S>::new(service))
    }

    /// Removes the handler for `tag`. Returns true if one was installed.
    pub fn unregister(
        &self,
        tag: impl Into<TypeTag>,
    ) -> bool {
        let tag = tag.into();
        debug!(%tag, "unregister handler");
        self.handlers.remove(&tag).is_some()
    }

    pub fn unregister_service<M: Name>(&self) -> bool {
        self.unregister(TypeTag::of::<M>())
    }

    pub fn resolve(
        &self,
        tag: &TypeTag,
    ) -> Option<Arc<dyn Handler>> {
        self.handlers.get(tag).map(|entry| entry.value().clone())
    }

    /// Every distinct handler whose tag matches `type_url`, paired with the
    /// tag it was found under. A handler registered under several matching
    /// tags is returned once.
    pub fn matching(
        &self,
        type_url: &str,
    ) -> Vec<(TypeTag, Arc<dyn Handler>)> {
        let mut matched: Vec<(TypeTag, Arc<dyn Handler>)> = Vec::new();
        for tag in TypeTag::candidates(type_url) {
            if let Some(handler) = self.resolve(&tag) {
                if !matched.iter().any(|(_, h)| Arc::ptr_eq(h, &handler)) {
                    matched.push((tag, handler));
                }
            }
        }
        matched
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<TypeTag> {
        let mut tags: Vec<TypeTag> = self.handlers.iter().map(|e| e.key().clone()).collect();
        tags.sort();
        tags
    }
}
