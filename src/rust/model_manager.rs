use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use lazy_static::lazy_static;
use log;

use crate::classifier::{LoadError, LoadedModel, ModelLoader};

lazy_static! {
    static ref GLOBAL_CACHE: ModelCache = ModelCache::new();
}

/// Holds at most one loaded model for the lifetime of the process.
///
/// The first successful load wins. Concurrent first callers are serialised
/// so the model is only built once. A failed load leaves the cache empty for
/// the next caller. Asking for the model without a path never loads anything.
pub struct ModelCache<M = LoadedModel> {
    model: OnceLock<Arc<M>>,
    load_lock: Mutex<()>,
}

impl<M> Default for ModelCache<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ModelCache<M> {
    pub fn new() -> Self {
        Self {
            model: OnceLock::new(),
            load_lock: Mutex::new(()),
        }
    }

    pub fn get(&self) -> Option<Arc<M>> {
        self.model.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// Returns the cached model, loading it with `load` if `path` is given and nothing is cached yet.
    pub fn get_or_load_with<F>(&self, path: Option<&Path>, load: F) -> Result<Option<Arc<M>>, LoadError>
    where
        F: FnOnce(&Path) -> Result<M, LoadError>,
    {
        if let Some(model) = self.get() {
            return Ok(Some(model));
        }
        let Some(path) = path else {
            return Ok(None);
        };

        let _guard = self.load_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Another caller may have finished loading while we waited
        if let Some(model) = self.get() {
            return Ok(Some(model));
        }

        log::info!("Loading model from {:?}", path);
        let model = Arc::new(load(path)?);
        Ok(Some(Arc::clone(self.model.get_or_init(|| model))))
    }
}

impl ModelCache<LoadedModel> {
    /// The process-wide cache used by the `predict` command
    pub fn global() -> &'static ModelCache {
        &GLOBAL_CACHE
    }

    pub fn get_or_load(&self, path: Option<&Path>, loader: &ModelLoader) -> Result<Option<Arc<LoadedModel>>, LoadError> {
        self.get_or_load_with(path, |path| loader.load(path))
    }
}
