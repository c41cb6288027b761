//! Process-wide, lazily loaded backend.

use crate::backend::InferenceError;
use once_cell::sync::OnceCell;
use std::fmt;
use tracing::info;

type Loader<B> = Box<dyn Fn() -> Result<B, InferenceError> + Send + Sync>;

/// Owns a backend that is loaded on first use and then shared read-only.
///
/// Concurrent first calls block until one loader run finishes; a failed load
/// leaves the handle empty so a later call can try again.
pub struct ModelHandle<B> {
    cell: OnceCell<B>,
    loader: Loader<B>,
    name: String,
}

impl<B> ModelHandle<B> {
    pub fn new(
        name: impl Into<String>,
        loader: impl Fn() -> Result<B, InferenceError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            cell: OnceCell::new(),
            loader: Box::new(loader),
            name: name.into(),
        }
    }

    /// A handle around an already constructed backend.
    pub fn preloaded(name: impl Into<String>, backend: B) -> Self
    where
        B: Clone + Send + Sync + 'static,
    {
        let handle = Self::new(name, {
            let backend = backend.clone();
            move || Ok(backend.clone())
        });
        let _ = handle.cell.set(backend);
        handle
    }

    /// The backend, loading it if this is the first use.
    pub fn get(&self) -> Result<&B, InferenceError> {
        self.cell.get_or_try_init(|| {
            info!("Loading geometry model '{}'...", self.name);
            let backend = (self.loader)()?;
            info!("Geometry model '{}' loaded", self.name);
            Ok(backend)
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<B> fmt::Debug for ModelHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.name)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
