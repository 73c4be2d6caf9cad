use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::mode::PrintMode;
use crate::style::StyleBundle;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub mode: PrintMode,
    pub markup: String,
    pub timestamp: Instant,
}

/// Pre-rendered markup and style bundles per print mode. Markup entries
/// expire after the TTL and are evicted by the read that notices it; style
/// bundles live in a separate map under the same keys.
#[derive(Debug)]
pub struct ModeCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
    styles: HashMap<String, StyleBundle>,
}

impl Default for ModeCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

pub fn cache_key(mode: PrintMode) -> String {
    format!("print-preview-{}", mode.as_str())
}

impl ModeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            styles: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&mut self, mode: PrintMode) -> Option<&CacheEntry> {
        let key = cache_key(mode);
        let expired = self
            .entries
            .get(&key)
            .is_some_and(|entry| entry.timestamp.elapsed() > self.ttl);
        if expired {
            self.entries.remove(&key);
            log::debug!("print cache entry for {mode} expired");
            return None;
        }
        self.entries.get(&key)
    }

    pub fn set(&mut self, mode: PrintMode, markup: impl Into<String>) {
        self.entries.insert(
            cache_key(mode),
            CacheEntry {
                mode,
                markup: markup.into(),
                timestamp: Instant::now(),
            },
        );
    }

    pub fn has(&mut self, mode: PrintMode) -> bool {
        self.get(mode).is_some()
    }

    pub fn clear(&mut self, mode: Option<PrintMode>) {
        match mode {
            Some(mode) => {
                self.entries.remove(&cache_key(mode));
            }
            None => self.entries.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_styles(&mut self, mode: PrintMode, styles: StyleBundle) {
        self.styles.insert(cache_key(mode), styles);
    }

    pub fn get_styles(&self, mode: PrintMode) -> Option<&StyleBundle> {
        self.styles.get(&cache_key(mode))
    }

    pub fn clear_styles(&mut self, mode: Option<PrintMode>) {
        match mode {
            Some(mode) => {
                self.styles.remove(&cache_key(mode));
            }
            None => self.styles.clear(),
        }
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.styles.clear();
    }
}
