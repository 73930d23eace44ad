pub mod analyze;
pub mod history;
pub mod init;
pub mod practice;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use examprep_core::traits::{AttemptStore, MasteryTracker};
use examprep_providers::{create_api_client, ExamprepConfig, HttpAttemptStore, LocalAttemptStore};

/// The attempt store and mastery tracker a command talks to.
pub struct Backends {
    pub store: Arc<dyn AttemptStore>,
    pub mastery: Arc<dyn MasteryTracker>,
    pub description: String,
}

impl Backends {
    fn local(store: LocalAttemptStore, description: String) -> Self {
        let store = Arc::new(store);
        Self {
            store: store.clone(),
            mastery: store,
            description,
        }
    }

    pub fn in_memory() -> Self {
        Self::local(LocalAttemptStore::in_memory(), "in-memory store".into())
    }
}

/// `--store` wins over the configured API. `None` when neither is set.
pub fn open_backends(store: Option<&Path>, config: &ExamprepConfig) -> Result<Option<Backends>> {
    if let Some(path) = store {
        let local = LocalAttemptStore::open(path)?;
        return Ok(Some(Backends::local(local, path.display().to_string())));
    }

    let Some(api) = &config.api else {
        return Ok(None);
    };
    let client = create_api_client(api)?;
    let remote = Arc::new(HttpAttemptStore::new(client));
    Ok(Some(Backends {
        store: remote.clone(),
        mastery: remote,
        description: api.base_url.clone(),
    }))
}

/// Like [`open_backends`], but a missing store is an error.
pub fn require_backends(store: Option<&Path>, config: &ExamprepConfig) -> Result<Backends> {
    open_backends(store, config)?.ok_or_else(|| {
        anyhow::anyhow!("no attempt store: pass --store <file> or configure [api] in examprep.toml")
    })
}

/// Format seconds as `m:ss`.
pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
