//! State and fan-out shared by every adapter family.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, trace, warn};

use crate::identity::{self, IdentityResolver, Unresolved};
use crate::{AdapterState, TagListener};
use tagwire_core::{Error, ListenerSet, ReaderError, Tag, TagBuilder};

/// Name, lifecycle state, listeners and identity resolver of one adapter.
///
/// Shared through an `Arc` between the adapter and its report task.
pub struct AdapterCore {
    name: RwLock<String>,
    state: Mutex<AdapterState>,
    configured: AtomicBool,
    listeners: ListenerSet<dyn TagListener>,
    resolver: RwLock<Arc<dyn IdentityResolver>>,
}

impl AdapterCore {
    pub fn new() -> Self {
        Self {
            name: RwLock::new(String::new()),
            state: Mutex::new(AdapterState::Disconnected),
            configured: AtomicBool::new(false),
            listeners: ListenerSet::new(),
            resolver: RwLock::new(Arc::new(Unresolved)),
        }
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.name.write() = name.to_string();
    }

    pub fn state(&self) -> AdapterState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: AdapterState) {
        let previous = std::mem::replace(&mut *self.state.lock(), state);
        if previous != state {
            debug!(reader = %self.name(), "{} -> {}", previous, state);
        }
    }

    /// Whether the last `initialize` succeeded.
    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    pub fn set_configured(&self, configured: bool) {
        self.configured.store(configured, Ordering::Release);
    }

    /// Log a rejected configuration and mark the adapter unusable.
    pub fn reject_config(&self, error: Error) -> Error {
        error!(reader = %self.name(), "{}", error);
        self.set_configured(false);
        error
    }

    /// Error returned by `connect_reader` on an unconfigured adapter.
    pub fn not_configured(&self) -> Error {
        let error = Error::ConnectionFailed(format!("reader {} is not configured", self.name()));
        self.report_error(ReaderError::from(&error));
        error
    }

    pub fn register(&self, listener: Arc<dyn TagListener>) -> bool {
        self.listeners.register(listener)
    }

    pub fn deregister(&self, listener: &Arc<dyn TagListener>) -> bool {
        self.listeners.deregister(listener)
    }

    pub fn set_resolver(&self, resolver: Arc<dyn IdentityResolver>) {
        *self.resolver.write() = resolver;
    }

    /// Finish a tag: reader name and identity URIs.
    pub fn finish(&self, builder: TagBuilder) -> Tag {
        let resolver = self.resolver.read().clone();
        identity::apply(resolver.as_ref(), builder.reader(self.name())).build()
    }

    /// Deliver a batch to every listener. Empty batches are dropped.
    pub fn emit(&self, tags: Vec<Tag>) {
        if tags.is_empty() {
            return;
        }
        let name = self.name();
        let delivered = self.listeners.notify(|l| l.on_tags(&name, &tags));
        trace!(reader = %name, tags = tags.len(), delivered, "Tags delivered");
    }

    /// Log `error` and deliver it to every listener.
    pub fn report_error(&self, error: ReaderError) {
        let name = self.name();
        warn!(reader = %name, "{}", error);
        self.listeners.notify(|l| l.on_error(&name, &error));
    }
}

impl Default for AdapterCore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AdapterCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterCore")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagwire_core::ReaderErrorKind;

    #[derive(Default)]
    struct Collect {
        tags: Mutex<Vec<Tag>>,
        errors: Mutex<Vec<ReaderError>>,
    }

    impl TagListener for Collect {
        fn on_tags(&self, _reader: &str, tags: &[Tag]) {
            self.tags.lock().extend_from_slice(tags);
        }

        fn on_error(&self, _reader: &str, error: &ReaderError) {
            self.errors.lock().push(error.clone());
        }
    }

    #[test]
    fn test_finish_sets_reader_name() {
        let core = AdapterCore::new();
        core.set_name("Dock-1");

        let tag = core.finish(Tag::builder(vec![0xAB]).origin("Dock-1"));
        assert_eq!(tag.reader(), "Dock-1");
        assert_eq!(tag.hex(), "ab");
    }

    #[test]
    fn test_emit_skips_empty_batches() {
        let core = AdapterCore::new();
        let listener = Arc::new(Collect::default());
        core.register(listener.clone());

        core.emit(Vec::new());
        core.emit(vec![Tag::builder(vec![1]).build()]);

        assert_eq!(listener.tags.lock().len(), 1);
    }

    #[test]
    fn test_not_configured_is_reported() {
        let core = AdapterCore::new();
        core.set_name("Dock-1");
        let listener = Arc::new(Collect::default());
        core.register(listener.clone());

        let error = core.not_configured();

        assert_eq!(error.kind(), ReaderErrorKind::ConnectionFailed);
        assert_eq!(listener.errors.lock()[0].kind, ReaderErrorKind::ConnectionFailed);
    }

    #[test]
    fn test_reject_config_marks_unusable() {
        let core = AdapterCore::new();
        core.set_configured(true);

        let error = core.reject_config(Error::MissingConfig("IP".into()));

        assert!(!core.is_configured());
        assert_eq!(error.kind(), ReaderErrorKind::ConfigurationError);
    }
}
