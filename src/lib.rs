//! Print-preview generation for documents full of KaTeX math.
//!
//! The live editor is copied into a disposable sandbox surface, damaged math
//! substructures are repaired, the host's styles are layered in a fixed
//! order, and the result is handed to the platform print action. Rendered
//! markup and style bundles are cached per [`PrintMode`] so later prints can
//! skip generation.
//!
//! The platform is reached through [`Host`]. Trees are kuchiki nodes and the
//! whole pipeline is single-threaded; drive it from a `tokio::task::LocalSet`.

mod cache;
mod cancel;
mod cloner;
mod config;
mod coordinator;
mod debug;
pub mod dom;
mod error;
mod host;
mod mode;
mod paper;
mod perf;
mod preview;
mod readiness;
mod repair;
mod retry;
mod sandbox;
mod status;
pub mod style;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
mod types;
mod watermark;

pub use cache::{CacheEntry, DEFAULT_TTL, ModeCache, cache_key};
pub use cancel::CancelToken;
pub use cloner::{ClonedEditor, clone_editor, math_rendered, settle_wait, strip_affordances};
pub use config::{
    DEFAULT_MATH_BASE_SHEET, DEFAULT_MATH_FONT_MARKER, DEFAULT_MATH_OVERRIDE_MARKER, PrintConfig,
    PrintConfigBuilder, Timings,
};
pub use coordinator::{PrintCoordinator, PrintCoordinatorBuilder, PrintOutcome};
pub use error::PrintError;
pub use host::{ComputedStyle, Host, HostStyleSheet, editor_has_content, find_editor_root};
pub use mode::{ModeRef, PrintMode};
pub use paper::{DEFAULT_PAPER_SIZE, DEFAULT_PAPER_WIDTH, PaperConfig, parse_page_size};
pub use preview::PreviewGenerator;
pub use readiness::{await_ready, sections_match};
pub use repair::{
    DEFAULT_STRATEGIES, RepairReport, RepairStrategy, RepairVariant, repair_attached,
    repair_detached, repair_with,
};
pub use retry::{Attempt, RetryPolicy, retry, retry_until};
pub use sandbox::{
    Placement, Positioning, SandboxSurface, SurfaceId, SurfacePurpose, SurfaceRegistry, await_load,
};
pub use status::{IDLE_MESSAGE, PrintStatus, StatusBoard};
pub use style::{StyleBundle, StyleLayer};
pub use types::{Pt, Size};
pub use watermark::{WatermarkConfig, WatermarkImage};
