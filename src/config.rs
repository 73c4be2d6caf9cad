use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_TTL;
use crate::error::PrintError;
use crate::paper::PaperConfig;
use crate::retry::RetryPolicy;
use crate::watermark::WatermarkConfig;

pub const DEFAULT_MATH_BASE_SHEET: &str =
    "https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/katex.min.css";
pub const DEFAULT_MATH_OVERRIDE_MARKER: &str = "katex-vscode.css";
pub const DEFAULT_MATH_FONT_MARKER: &str = "KaTeX";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub cache_ttl: Duration,
    pub supersede_grace: Duration,
    pub readiness: RetryPolicy,
    pub settle: RetryPolicy,
    pub library_loaded: RetryPolicy,
    pub library_loaded_tail: Duration,
    pub print_teardown_delay: Duration,
    pub pre_render_debounce: Duration,
    pub pre_render_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL,
            supersede_grace: Duration::from_millis(100),
            readiness: RetryPolicy::new(20, 100),
            settle: RetryPolicy::new(2, 100),
            library_loaded: RetryPolicy::new(20, 50),
            library_loaded_tail: Duration::from_millis(100),
            print_teardown_delay: Duration::from_millis(1000),
            pre_render_debounce: Duration::from_millis(500),
            pre_render_settle: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrintConfig {
    pub paper: PaperConfig,
    pub watermark: WatermarkConfig,
    pub timings: Timings,
    pub math_base_sheet: String,
    pub math_override_marker: String,
    pub math_font_marker: String,
    pub debug_path: Option<PathBuf>,
    pub perf_path: Option<PathBuf>,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            paper: PaperConfig::default(),
            watermark: WatermarkConfig::default(),
            timings: Timings::default(),
            math_base_sheet: DEFAULT_MATH_BASE_SHEET.to_string(),
            math_override_marker: DEFAULT_MATH_OVERRIDE_MARKER.to_string(),
            math_font_marker: DEFAULT_MATH_FONT_MARKER.to_string(),
            debug_path: None,
            perf_path: None,
        }
    }
}

impl PrintConfig {
    pub fn builder() -> PrintConfigBuilder {
        PrintConfigBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PrintConfigBuilder {
    config: PrintConfig,
}

impl PrintConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paper(mut self, paper: PaperConfig) -> Self {
        self.config.paper = paper;
        self
    }

    pub fn paper_size(mut self, paper_size: impl Into<String>) -> Self {
        self.config.paper.paper_size = paper_size.into();
        self
    }

    pub fn paper_width(mut self, paper_width: impl Into<String>) -> Self {
        self.config.paper.paper_width = paper_width.into();
        self
    }

    pub fn watermark(mut self, watermark: WatermarkConfig) -> Self {
        self.config.watermark = watermark;
        self
    }

    pub fn timings(mut self, timings: Timings) -> Self {
        self.config.timings = timings;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.timings.cache_ttl = ttl;
        self
    }

    pub fn readiness_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.timings.readiness = policy;
        self
    }

    pub fn library_loaded_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.timings.library_loaded = policy;
        self
    }

    pub fn print_teardown_delay(mut self, delay: Duration) -> Self {
        self.config.timings.print_teardown_delay = delay;
        self
    }

    pub fn math_base_sheet(mut self, href: impl Into<String>) -> Self {
        self.config.math_base_sheet = href.into();
        self
    }

    pub fn math_override_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.math_override_marker = marker.into();
        self
    }

    pub fn math_font_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.math_font_marker = marker.into();
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.debug_path = Some(path.into());
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<PrintConfig, PrintError> {
        let config = self.config;
        config.paper.validate()?;
        config.watermark.validate()?;
        let timings = &config.timings;
        for (name, policy) in [
            ("readiness", timings.readiness),
            ("settle", timings.settle),
            ("library_loaded", timings.library_loaded),
        ] {
            if policy.max_attempts == 0 {
                return Err(PrintError::InvalidConfiguration(format!(
                    "{name} retry policy needs at least one attempt"
                )));
            }
        }
        if timings.cache_ttl.is_zero() {
            return Err(PrintError::InvalidConfiguration(
                "cache ttl must be positive".to_string(),
            ));
        }
        if config.math_override_marker.trim().is_empty() {
            return Err(PrintError::InvalidConfiguration(
                "math override marker must not be empty".to_string(),
            ));
        }
        Ok(config)
    }
}
