//! Process-wide table of per-tag default styles.
//!
//! Populated lazily from the host's sandbox (`SourceDocument::default_style`)
//! and shared by every conversion. Entries are keyed by the document's
//! `sandbox_key` as well as the tag, so documents with different defaults
//! never see each other's entries. After each conversion an idle timer is
//! (re)armed; when it fires the table is emptied so a page that stops
//! capturing does not keep the styles alive.

use crate::dom::{ComputedStyle, SourceDocument};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

/// Idle window after the last conversion before the table is cleared.
pub const DEFAULT_IDLE_EVICTION: Duration = Duration::from_secs(20);

static GLOBAL: OnceLock<DefaultStyleTable> = OnceLock::new();

type StyleMap = HashMap<(String, String), Arc<ComputedStyle>>;

pub struct DefaultStyleTable {
    styles: Arc<Mutex<StyleMap>>,
    eviction: Mutex<Option<tokio::task::AbortHandle>>,
    idle: Duration,
}

impl std::fmt::Debug for DefaultStyleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultStyleTable")
            .field("entries", &self.len())
            .field("idle", &self.idle)
            .finish()
    }
}

impl Default for DefaultStyleTable {
    fn default() -> Self {
        Self::with_idle_eviction(DEFAULT_IDLE_EVICTION)
    }
}

impl DefaultStyleTable {
    pub fn with_idle_eviction(idle: Duration) -> Self {
        Self {
            styles: Arc::new(Mutex::new(HashMap::new())),
            eviction: Mutex::new(None),
            idle,
        }
    }

    /// The table shared by all conversions of this process.
    pub fn global() -> &'static DefaultStyleTable {
        GLOBAL.get_or_init(DefaultStyleTable::default)
    }

    /// Default style of `tag` in the sandbox identified by `sandbox`, reading
    /// it from the document on first use. A sandbox that cannot produce the
    /// tag yields an empty style.
    pub fn get<D: SourceDocument + ?Sized>(&self, document: &D, sandbox: &str, tag: &str) -> Arc<ComputedStyle> {
        let tag = tag.to_ascii_lowercase();
        let key = (sandbox.to_string(), tag);
        if let Some(style) = self.lock().get(&key) {
            return style.clone();
        }

        let mut style = document.default_style(&key.1).unwrap_or_default();
        // The computed width/height of a sandboxed instance is a resolved
        // length, while the specified default is always `auto`.
        for dimension in ["width", "height"] {
            let priority = style.priority(dimension).to_string();
            style.set(dimension, "auto", &priority);
        }
        log::debug!("sandbox default style computed for <{}> in {}", key.1, key.0);

        let style = Arc::new(style);
        self.lock().insert(key, style.clone());
        style
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Re-arm the idle timer. Any pending timer is cancelled first so a burst
    /// of conversions keeps reusing the table.
    ///
    /// Outside a `tokio` runtime no timer can run and the table is kept.
    pub fn schedule_eviction(&self) {
        let mut pending = self.eviction.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::debug!("no async runtime; default style table kept until next clear");
            return;
        };
        let styles = Arc::clone(&self.styles);
        let idle = self.idle;
        let task = runtime.spawn(async move {
            tokio::time::sleep(idle).await;
            let mut styles = styles.lock().unwrap_or_else(|e| e.into_inner());
            log::debug!("evicting {} default styles after {:?} idle", styles.len(), idle);
            styles.clear();
        });
        *pending = Some(task.abort_handle());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StyleMap> {
        self.styles.lock().unwrap_or_else(|e| e.into_inner())
    }
}
