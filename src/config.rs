use crate::logging::LoggingConfig;
use crate::params::PassParameters;

/// Renderer settings fixed at startup.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Requested multisample count for the normal and UV targets.
    pub samples: u32,
    /// Exposure applied before Reinhard tone mapping in the primary render.
    pub exposure: f32,
    /// Initial stage parameters.
    pub params: PassParameters,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            samples: 2,
            exposure: 1.5,
            params: PassParameters::default(),
        }
    }
}

impl RendererConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    pub fn exposure(mut self, exposure: f32) -> Self {
        self.exposure = exposure;
        self
    }

    pub fn params(mut self, params: PassParameters) -> Self {
        self.params = params;
        self
    }
}

/// Configuration for the app window.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub renderer: RendererConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "inkpass".to_string(),
            width: 1280,
            height: 720,
            renderer: RendererConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn renderer(mut self, renderer: RendererConfig) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}
