use crate::hooks::{NoHooks, RecordHooks};
use spine_sync::{SyncConfig, Transport};
use spine_types::Attributes;
use std::fmt;
use std::rc::Rc;

/// Describes a kind of record: its identity attribute, defaults, location
/// and the collaborators it persists through.
///
/// Cloning is cheap apart from the defaults map; every record keeps its own
/// copy of the schema it was built from.
#[derive(Clone)]
pub struct RecordSchema {
    id_attribute: String,
    defaults: Attributes,
    url_root: Option<String>,
    hooks: Rc<dyn RecordHooks>,
    transport: Option<Rc<dyn Transport>>,
    sync_config: SyncConfig,
}

impl RecordSchema {
    pub fn new() -> Self {
        Self {
            id_attribute: "id".to_owned(),
            defaults: Attributes::new(),
            url_root: None,
            hooks: Rc::new(NoHooks),
            transport: None,
            sync_config: SyncConfig::default(),
        }
    }

    #[must_use]
    pub fn with_id_attribute(mut self, name: impl Into<String>) -> Self {
        self.id_attribute = name.into();
        self
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: Attributes) -> Self {
        self.defaults = defaults;
        self
    }

    #[must_use]
    pub fn with_url_root(mut self, url_root: impl Into<String>) -> Self {
        self.url_root = Some(url_root.into());
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: impl RecordHooks + 'static) -> Self {
        self.hooks = Rc::new(hooks);
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Rc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn with_sync_config(mut self, config: SyncConfig) -> Self {
        self.sync_config = config;
        self
    }

    /// Name of the attribute holding the server-assigned identity.
    pub fn id_attribute(&self) -> &str {
        &self.id_attribute
    }

    pub fn defaults(&self) -> &Attributes {
        &self.defaults
    }

    pub fn url_root(&self) -> Option<&str> {
        self.url_root.as_deref()
    }

    pub fn hooks(&self) -> &dyn RecordHooks {
        self.hooks.as_ref()
    }

    pub fn transport(&self) -> Option<&Rc<dyn Transport>> {
        self.transport.as_ref()
    }

    pub fn sync_config(&self) -> SyncConfig {
        self.sync_config
    }
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSchema")
            .field("id_attribute", &self.id_attribute)
            .field("defaults", &self.defaults)
            .field("url_root", &self.url_root)
            .field("transport", &self.transport.is_some())
            .field("sync_config", &self.sync_config)
            .finish()
    }
}
