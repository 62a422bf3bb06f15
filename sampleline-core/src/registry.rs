//! Named processor factories.
//!
//! A host runtime creates processors by name. The registry is an explicit
//! object built once at startup with [`ProcessorRegistry::bootstrap`] and
//! then handed to whichever host adapter needs it.

use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use crate::{
    error::{Result, SamplelineError},
    render::{PlaybackControl, RenderDiagnostics, RenderProcessor, SoundRenderer},
};

/// Registered name of [`SoundRenderer`].
pub const SOUND_RENDERER: &str = "sound-renderer";

/// Construction options passed to every factory.
#[derive(Debug, Clone, Default)]
pub struct ProcessorOptions {
    pub diagnostics: Arc<RenderDiagnostics>,
    pub control: Arc<PlaybackControl>,
}

type Factory = Box<dyn Fn(&ProcessorOptions) -> Box<dyn RenderProcessor> + Send + Sync>;

#[derive(Default)]
pub struct ProcessorRegistry {
    factories: HashMap<String, Factory>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in processors.
    pub fn bootstrap() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(
            SOUND_RENDERER.to_string(),
            Box::new(|options: &ProcessorOptions| {
                Box::new(
                    SoundRenderer::new(Arc::clone(&options.diagnostics))
                        .with_control(Arc::clone(&options.control)),
                ) as Box<dyn RenderProcessor>
            }),
        );
        registry
    }

    /// # Errors
    /// `SamplelineError::DuplicateProcessor` if `name` is taken.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<()>
    where
        F: Fn(&ProcessorOptions) -> Box<dyn RenderProcessor> + Send + Sync + 'static,
    {
        if self.factories.contains_key(name) {
            return Err(SamplelineError::DuplicateProcessor(name.to_string()));
        }
        self.factories.insert(name.to_string(), Box::new(factory));
        debug!(name, "processor registered");
        Ok(())
    }

    /// # Errors
    /// `SamplelineError::UnknownProcessor` if nothing is registered as `name`.
    pub fn create(&self, name: &str, options: &ProcessorOptions) -> Result<Box<dyn RenderProcessor>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SamplelineError::UnknownProcessor(name.to_string()))?;
        Ok(factory(options))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
