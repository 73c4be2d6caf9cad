use std::cell::{Cell, RefCell};
use std::rc::Rc;

use kuchiki::NodeRef;
use tokio::time::Instant;

use crate::cache::ModeCache;
use crate::cancel::CancelToken;
use crate::config::PrintConfig;
use crate::debug::{DebugLogger, Field};
use crate::dom;
use crate::error::PrintError;
use crate::host::{self, Host};
use crate::mode::{ModeRef, PrintMode};
use crate::perf::{PerfLogger, SpanTimer};
use crate::preview::{self, PreviewGenerator};
use crate::readiness;
use crate::sandbox::{self, SandboxSurface};
use crate::status::{PrintStatus, StatusBoard};
use crate::style::{self, StyleBundle, sheets};

const WAITING_MESSAGE: &str = "waiting for component update...";
const UPDATING_MESSAGE: &str = "updating component state...";
const CREATING_MESSAGE: &str = "creating print preview...";
const GENERATING_MESSAGE: &str = "generating print content...";
const READY_MESSAGE: &str = "print preview ready";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOutcome {
    /// The host print action ran. `from_cache` tells whether pre-rendered
    /// markup was used.
    Printed { from_cache: bool },
    Cancelled,
    NoContent,
    /// A hard failure, already reported through [`Host::alert`].
    Failed(String),
}

#[derive(Debug)]
struct PrintRequest {
    mode: PrintMode,
    token: CancelToken,
    started_at: Instant,
}

pub struct PrintCoordinator<H: Host + ?Sized> {
    host: Rc<H>,
    config: PrintConfig,
    cache: RefCell<ModeCache>,
    active: RefCell<Option<PrintRequest>>,
    status: StatusBoard,
    pre_render_generation: Cell<u64>,
    debug: Option<DebugLogger>,
    perf: Option<PerfLogger>,
}

pub struct PrintCoordinatorBuilder<H: Host + ?Sized> {
    host: Rc<H>,
    config: PrintConfig,
    cache: Option<ModeCache>,
    status: Option<StatusBoard>,
}

impl<H: Host + ?Sized> PrintCoordinatorBuilder<H> {
    pub fn config(mut self, config: PrintConfig) -> Self {
        self.config = config;
        self
    }

    pub fn cache(mut self, cache: ModeCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn status_board(mut self, status: StatusBoard) -> Self {
        self.status = Some(status);
        self
    }

    pub fn build(self) -> Result<PrintCoordinator<H>, PrintError> {
        let debug = match &self.config.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        let perf = match &self.config.perf_path {
            Some(path) => Some(PerfLogger::new(path)?),
            None => None,
        };
        let cache = self
            .cache
            .unwrap_or_else(|| ModeCache::new(self.config.timings.cache_ttl));
        Ok(PrintCoordinator {
            host: self.host,
            config: self.config,
            cache: RefCell::new(cache),
            active: RefCell::new(None),
            status: self.status.unwrap_or_default(),
            pre_render_generation: Cell::new(0),
            debug,
            perf,
        })
    }
}

impl<H: Host + ?Sized> PrintCoordinator<H> {
    pub fn builder(host: Rc<H>) -> PrintCoordinatorBuilder<H> {
        PrintCoordinatorBuilder {
            host,
            config: PrintConfig::default(),
            cache: None,
            status: None,
        }
    }

    pub fn new(host: Rc<H>, config: PrintConfig) -> Result<Self, PrintError> {
        Self::builder(host).config(config).build()
    }

    pub fn config(&self) -> &PrintConfig {
        &self.config
    }

    pub fn host(&self) -> &Rc<H> {
        &self.host
    }

    pub fn status(&self) -> PrintStatus {
        self.status.snapshot()
    }

    pub fn status_board(&self) -> &StatusBoard {
        &self.status
    }

    pub fn is_preparing(&self) -> bool {
        self.status.snapshot().preparing
    }

    pub fn active_mode(&self) -> Option<PrintMode> {
        self.active.borrow().as_ref().map(|request| request.mode)
    }

    pub fn has_cached(&self, mode: PrintMode) -> bool {
        self.cache.borrow_mut().has(mode)
    }

    pub fn cached_markup(&self, mode: PrintMode) -> Option<String> {
        self.cache
            .borrow_mut()
            .get(mode)
            .map(|entry| entry.markup.clone())
    }

    pub fn cached_styles(&self, mode: PrintMode) -> Option<StyleBundle> {
        self.cache.borrow().get_styles(mode).cloned()
    }

    pub fn clear_pre_render_cache(&self) {
        self.cache.borrow_mut().clear_all();
    }

    pub async fn generate_print_preview(
        &self,
        surface: &SandboxSurface,
        trigger_print: bool,
        paper_size: Option<&str>,
        paper_width: Option<&str>,
    ) -> Result<Option<NodeRef>, PrintError> {
        let paper = self.config.paper.with_overrides(paper_size, paper_width);
        self.generator(None)
            .generate(surface, trigger_print, &paper)
            .await
    }

    fn generator<'a>(&'a self, cancel: Option<&'a CancelToken>) -> PreviewGenerator<'a, H> {
        let generator = PreviewGenerator::new(&*self.host, &self.config)
            .with_diagnostics(self.debug.as_ref(), self.perf.as_ref());
        match cancel {
            Some(token) => generator.with_cancel(token),
            None => generator,
        }
    }

    fn owns_active_slot(&self, token: &CancelToken) -> bool {
        self.active
            .borrow()
            .as_ref()
            .is_some_and(|request| request.token.same_as(token))
    }

    /// Prints the editor in the mode `mode_ref` holds right now.
    ///
    /// Hard failures are reported through [`Host::alert`] and returned as
    /// [`PrintOutcome::Failed`]; they are never propagated.
    ///
    /// # Panics
    ///
    /// A successful print schedules the surface teardown with
    /// `tokio::task::spawn_local`, so this must be polled inside a
    /// `tokio::task::LocalSet`.
    pub async fn print(&self, mode_ref: &ModeRef) -> PrintOutcome {
        let requested = mode_ref.get();
        let span = SpanTimer::start(self.perf.as_ref(), "print.total", Some(requested.as_str()));

        let token = CancelToken::new();
        let previous = self.active.borrow_mut().replace(PrintRequest {
            mode: requested,
            token: token.clone(),
            started_at: Instant::now(),
        });
        let superseded = previous.is_some();
        self.status.begin(WAITING_MESSAGE);
        if let Some(debug) = &self.debug {
            debug.event(
                "print.request",
                &[
                    ("mode", Field::Str(requested.as_str())),
                    ("superseded", Field::Bool(superseded)),
                ],
            );
        }
        if let Some(previous) = previous {
            log::debug!(
                "print for {} superseded by {requested} after {}ms",
                previous.mode,
                previous.started_at.elapsed().as_millis()
            );
            previous.token.cancel();
            tokio::time::sleep(self.config.timings.supersede_grace).await;
        }

        let outcome = if token.is_cancelled() || !self.owns_active_slot(&token) {
            PrintOutcome::Cancelled
        } else {
            self.settle_outcome(mode_ref, requested, &token).await
        };

        if self.owns_active_slot(&token) {
            *self.active.borrow_mut() = None;
            self.status.reset();
        }
        if let Some(debug) = &self.debug {
            debug.emit_summary("print");
            debug.flush();
        }
        span.finish();
        if let Some(perf) = &self.perf {
            perf.flush();
        }
        outcome
    }

    async fn settle_outcome(
        &self,
        mode_ref: &ModeRef,
        requested: PrintMode,
        token: &CancelToken,
    ) -> PrintOutcome {
        match self.run_print(mode_ref, requested, token).await {
            Ok(outcome) => outcome,
            Err(_) if token.is_cancelled() => PrintOutcome::Cancelled,
            Err(err) => {
                log::error!("print preview failed: {err}");
                self.host.alert(&format!("Print preview failed: {err}"));
                PrintOutcome::Failed(err.to_string())
            }
        }
    }

    async fn run_print(
        &self,
        mode_ref: &ModeRef,
        requested: PrintMode,
        token: &CancelToken,
    ) -> Result<PrintOutcome, PrintError> {
        tokio::task::yield_now().await;
        if token.is_cancelled() {
            return Ok(PrintOutcome::Cancelled);
        }
        self.status.progress(UPDATING_MESSAGE);

        let ready = readiness::await_ready(
            &*self.host,
            mode_ref,
            requested,
            token,
            self.config.timings.readiness,
            &self.status,
        )
        .await;
        if token.is_cancelled() {
            return Ok(PrintOutcome::Cancelled);
        }
        if !ready {
            log::warn!("sections for {requested} did not settle; printing anyway");
        }

        let swept = self.host.surfaces().sweep_stray_surfaces();
        if let Some(debug) = &self.debug {
            debug.event("sandbox.sweep", &[("removed", Field::Num(swept as u64))]);
        }
        self.status.progress(CREATING_MESSAGE);

        let cached = {
            let mut cache = self.cache.borrow_mut();
            let markup = cache.get(requested).map(|entry| entry.markup.clone());
            markup
                .filter(|markup| !markup.trim().is_empty())
                .map(|markup| (markup, cache.get_styles(requested).cloned()))
        };
        if let Some(debug) = &self.debug {
            debug.event(
                "print.cache",
                &[
                    ("mode", Field::Str(requested.as_str())),
                    ("hit", Field::Bool(cached.is_some())),
                ],
            );
        }

        let surface = self.host.surfaces().create_print_surface();
        match self.print_on(&surface, cached, token).await {
            Ok(Some(from_cache)) => {
                self.status.progress(READY_MESSAGE);
                surface.schedule_teardown(self.config.timings.print_teardown_delay);
                Ok(PrintOutcome::Printed { from_cache })
            }
            Ok(None) => {
                surface.teardown();
                if token.is_cancelled() {
                    Ok(PrintOutcome::Cancelled)
                } else {
                    Ok(PrintOutcome::NoContent)
                }
            }
            Err(err) => {
                surface.teardown();
                Err(err)
            }
        }
    }

    /// Loads `surface` and prints through the cache or a full generation.
    /// `Some(from_cache)` when the print action ran.
    async fn print_on(
        &self,
        surface: &SandboxSurface,
        cached: Option<(String, Option<StyleBundle>)>,
        token: &CancelToken,
    ) -> Result<Option<bool>, PrintError> {
        sandbox::await_load(surface).await?;
        if token.is_cancelled() {
            return Ok(None);
        }
        self.status.progress(GENERATING_MESSAGE);

        if let Some((markup, styles)) = cached {
            let printed = self
                .print_from_cache(surface, &markup, styles.unwrap_or_default(), token)
                .await?;
            return Ok(printed.then_some(true));
        }

        let container = self
            .generator(Some(token))
            .generate(surface, true, &self.config.paper)
            .await?;
        Ok(container.map(|_| false))
    }

    async fn print_from_cache(
        &self,
        surface: &SandboxSurface,
        markup: &str,
        mut bundle: StyleBundle,
        token: &CancelToken,
    ) -> Result<bool, PrintError> {
        let head = surface.head()?;
        let body = surface.body()?;

        if bundle.print_layer.trim().is_empty() {
            bundle.print_layer = sheets::print_layer_css(&self.config.paper);
            bundle.print_layer.push_str(&self.config.watermark.css());
        }
        if bundle.shared_layer.is_empty() && bundle.math_override_layer.is_empty() {
            log::debug!("cached styles lack host rules; copying host sheets again");
            let copied = style::copy_style_sheets(
                &self.host.style_sheets(),
                &head,
                &self.config.math_base_sheet,
                &self.config.math_override_marker,
            )?;
            bundle.shared_layer = copied.shared_layer();
            bundle.math_override_layer = copied.math_override_layer();
        } else {
            style::link_base_sheet(&head, &self.config.math_base_sheet)?;
        }
        if bundle.computed_override_layer.is_empty() {
            if let Some(editor) = self.host.editor_root() {
                bundle.computed_override_layer =
                    style::extract_computed_overrides(&*self.host, &editor).unwrap_or_default();
            }
        }
        style::inject_bundle(&head, &bundle)?;
        if let Some(debug) = &self.debug {
            debug.event(
                "style.layers",
                &[
                    ("source", Field::Str("cache")),
                    ("fingerprint", Field::Str(&bundle.fingerprint())),
                    ("shared", Field::Bool(!bundle.shared_layer.is_empty())),
                    (
                        "computed",
                        Field::Bool(!bundle.computed_override_layer.is_empty()),
                    ),
                ],
            );
        }

        let container = preview::new_container()?;
        for node in dom::parse_fragment(markup) {
            container.append(node);
        }
        dom::clear_children(&body);
        body.append(container.clone());
        self.host.adopt(&container);
        style::apply_print_overrides(&body);
        self.config.watermark.overlay(&body)?;

        let loaded = preview::library_loaded(&*self.host, surface, &self.config, Some(token)).await;
        if token.is_cancelled() {
            return Ok(false);
        }
        if !loaded {
            log::warn!("math stylesheet not confirmed loaded; continuing");
        }
        tokio::time::sleep(self.config.timings.library_loaded_tail).await;
        if token.is_cancelled() {
            return Ok(false);
        }

        self.host.print(surface)?;
        Ok(true)
    }

    /// Renders the current mode offscreen and caches the result.
    ///
    /// Calls arriving within the debounce window supersede earlier pending
    /// ones; only the last runs. Failures are logged, never returned.
    pub async fn pre_render(&self, mode_ref: &ModeRef) {
        let generation = self.pre_render_generation.get().wrapping_add(1);
        self.pre_render_generation.set(generation);
        tokio::time::sleep(self.config.timings.pre_render_debounce).await;
        if self.pre_render_generation.get() != generation {
            log::debug!("pre-render superseded by a later request");
            return;
        }

        let mode = mode_ref.get();
        if self.has_cached(mode) {
            return;
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(self.config.timings.pre_render_settle).await;

        if !self
            .host
            .editor_root()
            .is_some_and(|editor| host::editor_has_content(&editor))
        {
            return;
        }

        let surface = self.host.surfaces().create_preview_surface();
        let result = self.pre_render_into(&surface, mode).await;
        surface.teardown();
        match result {
            Ok(true) => log::debug!("pre-rendered {mode}"),
            Ok(false) => {}
            Err(err) => log::error!("pre-render for {mode} failed: {err}"),
        }
    }

    async fn pre_render_into(
        &self,
        surface: &SandboxSurface,
        mode: PrintMode,
    ) -> Result<bool, PrintError> {
        sandbox::await_load(surface).await?;
        let Some(container) = self
            .generator(None)
            .generate(surface, false, &self.config.paper)
            .await?
        else {
            return Ok(false);
        };
        let markup = dom::inner_html(&container);
        let bundle = StyleBundle::harvest(&surface.document()?);
        let mut cache = self.cache.borrow_mut();
        cache.set(mode, markup);
        cache.set_styles(mode, bundle);
        Ok(true)
    }
}
