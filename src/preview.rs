use kuchiki::NodeRef;

use crate::cancel::CancelToken;
use crate::cloner;
use crate::config::PrintConfig;
use crate::debug::{DebugLogger, Field};
use crate::dom::{self, markers};
use crate::error::PrintError;
use crate::host::{self, Host};
use crate::paper::PaperConfig;
use crate::perf::{PerfLogger, SpanTimer};
use crate::repair;
use crate::retry::{Attempt, retry_until};
use crate::sandbox::SandboxSurface;
use crate::style::{self, StyleBundle, sheets};

const PROBE_STYLE: &str = "position: absolute; left: -9999px; visibility: hidden;";

pub struct PreviewGenerator<'a, H: Host + ?Sized> {
    host: &'a H,
    config: &'a PrintConfig,
    debug: Option<&'a DebugLogger>,
    perf: Option<&'a PerfLogger>,
    cancel: Option<&'a CancelToken>,
}

impl<'a, H: Host + ?Sized> PreviewGenerator<'a, H> {
    pub fn new(host: &'a H, config: &'a PrintConfig) -> Self {
        Self {
            host,
            config,
            debug: None,
            perf: None,
            cancel: None,
        }
    }

    /// Stops generation at the next checkpoint once `token` is cancelled.
    /// A cancelled generation returns `Ok(None)` and never prints.
    pub fn with_cancel(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }

    pub(crate) fn with_diagnostics(
        mut self,
        debug: Option<&'a DebugLogger>,
        perf: Option<&'a PerfLogger>,
    ) -> Self {
        self.debug = debug;
        self.perf = perf;
        self
    }

    /// Fills `surface` with styles and a repaired copy of the editor.
    ///
    /// Returns the `.print-container` node, or `None` when there is nothing
    /// to print. With `trigger_print` the host print action runs last.
    pub async fn generate(
        &self,
        surface: &SandboxSurface,
        trigger_print: bool,
        paper: &PaperConfig,
    ) -> Result<Option<NodeRef>, PrintError> {
        let span = SpanTimer::start(self.perf, "preview.generate", None);
        let Some(editor) = self
            .host
            .editor_root()
            .filter(|editor| host::editor_has_content(editor))
        else {
            return Ok(None);
        };

        let head = surface.head()?;
        let bundle = self.build_styles(&head, &editor, paper)?;
        style::inject_bundle(&head, &bundle)?;
        if let Some(debug) = self.debug {
            debug.event(
                "style.layers",
                &[
                    ("source", Field::Str("fresh")),
                    ("fingerprint", Field::Str(&bundle.fingerprint())),
                    ("shared", Field::Bool(!bundle.shared_layer.is_empty())),
                    (
                        "computed",
                        Field::Bool(!bundle.computed_override_layer.is_empty()),
                    ),
                ],
            );
        }

        cloner::settle_wait(&editor, self.config.timings.settle).await;
        if self.cancelled() {
            return Ok(None);
        }
        let clone_span = SpanTimer::start(self.perf, "preview.clone", None);
        let Some(cloned) =
            cloner::clone_editor(
                self.host,
                Some(&editor),
                self.config.timings.settle,
                self.perf,
            )
            .await
        else {
            return Ok(None);
        };
        clone_span.finish();
        self.log_repair(repair::RepairVariant::Detached, &cloned.repair);

        let body = surface.body()?;
        let container = new_container()?;
        container.append(cloned.root);
        dom::clear_children(&body);
        body.append(container.clone());
        self.host.adopt(&container);

        let attached_span = SpanTimer::start(self.perf, "repair.attached", None);
        let report = repair::repair_attached(self.host, &editor, &container);
        attached_span.finish();
        self.log_repair(repair::RepairVariant::Attached, &report);

        style::apply_print_overrides(&body);
        self.config.watermark.overlay(&body)?;

        let loaded = library_loaded(self.host, surface, self.config, self.cancel).await;
        if self.cancelled() {
            return Ok(None);
        }
        if !loaded {
            log::warn!("math stylesheet not confirmed loaded; continuing");
        }

        if trigger_print {
            self.host.print(surface)?;
        }
        span.finish();
        Ok(Some(container))
    }

    fn build_styles(
        &self,
        head: &NodeRef,
        editor: &NodeRef,
        paper: &PaperConfig,
    ) -> Result<StyleBundle, PrintError> {
        let copied = style::copy_style_sheets(
            &self.host.style_sheets(),
            head,
            &self.config.math_base_sheet,
            &self.config.math_override_marker,
        )?;
        let mut print_layer = sheets::print_layer_css(paper);
        print_layer.push_str(&self.config.watermark.css());
        Ok(StyleBundle {
            print_layer,
            shared_layer: copied.shared_layer(),
            math_override_layer: copied.math_override_layer(),
            computed_override_layer: style::extract_computed_overrides(self.host, editor)
                .unwrap_or_default(),
        })
    }

    fn log_repair(&self, variant: repair::RepairVariant, report: &repair::RepairReport) {
        if report.skipped > 0 {
            log::warn!(
                "{} repair left {} math nodes unrepaired",
                variant.as_str(),
                report.skipped
            );
        }
        let Some(debug) = self.debug else {
            return;
        };
        debug.event(
            "repair.pass",
            &[
                ("variant", Field::Str(variant.as_str())),
                ("candidates", Field::Num(report.candidates as u64)),
                ("repaired", Field::Num(report.repaired as u64)),
                ("attribute_fixes", Field::Num(report.attribute_fixes as u64)),
                ("reparsed", Field::Num(report.reparsed as u64)),
                ("skipped", Field::Num(report.skipped as u64)),
            ],
        );
        debug.increment("repair.skipped", report.skipped as u64);
    }
}

pub(crate) fn new_container() -> Result<NodeRef, PrintError> {
    dom::create_element(
        "div",
        &[("class", markers::PRINT_CONTAINER), ("style", "background: white;")],
    )
    .ok_or_else(|| PrintError::Platform("could not create print container".to_string()))
}

/// Whether the math stylesheet has reached `surface`, judged by the font
/// family the platform resolves for a math node.
fn font_applied<H: Host + ?Sized>(host: &H, surface: &SandboxSurface, marker: &str) -> bool {
    let Ok(document) = surface.document() else {
        return false;
    };
    let has_marker = |node: &NodeRef| {
        host.computed_style(node)
            .get("font-family")
            .is_some_and(|family| family.contains(marker))
    };
    if let Some(math) = dom::first_descendant_with_class(&document, markers::MATH) {
        return has_marker(&math);
    }
    let Some(body) = dom::select_first(&document, "body") else {
        return false;
    };
    let Some(probe) =
        dom::create_element("span", &[("class", markers::MATH), ("style", PROBE_STYLE)])
    else {
        return false;
    };
    body.append(probe.clone());
    let loaded = has_marker(&probe);
    probe.detach();
    loaded
}

/// Polls until the math stylesheet is in effect on `surface`, the
/// library-loaded policy runs out, or `cancel` fires.
pub(crate) async fn library_loaded<H: Host + ?Sized>(
    host: &H,
    surface: &SandboxSurface,
    config: &PrintConfig,
    cancel: Option<&CancelToken>,
) -> bool {
    retry_until(config.timings.library_loaded, |_| {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Attempt::Abort;
        }
        Attempt::from(font_applied(host, surface, &config.math_font_marker))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::await_load;
    use crate::style::{StyleLayer, injected_layer_order};
    use crate::testing::{CloneFault, FakeHost, fixtures};
    use crate::watermark::{WatermarkConfig, WatermarkImage};
    use std::time::Duration;

    async fn loaded_print_surface(host: &FakeHost) -> SandboxSurface {
        let surface = host.surfaces().create_print_surface();
        await_load(&surface).await.expect("load");
        surface
    }

    #[tokio::test(start_paused = true)]
    async fn generates_layers_container_and_prints() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        let config = PrintConfig::default();
        let surface = loaded_print_surface(&host).await;
        let container = PreviewGenerator::new(&host, &config)
            .generate(&surface, true, &config.paper)
            .await
            .expect("generate")
            .expect("container");

        assert!(dom::has_class(&container, markers::PRINT_CONTAINER));
        let head = surface.head().expect("head");
        let first_link = dom::select_first(&head, "link").expect("link");
        assert_eq!(
            dom::get_attr(&first_link, "href").as_deref(),
            Some(config.math_base_sheet.as_str())
        );
        assert_eq!(
            injected_layer_order(&head),
            vec![
                StyleLayer::Print,
                StyleLayer::Shared,
                StyleLayer::MathOverride,
                StyleLayer::ComputedOverride
            ]
        );
        let printed = host.printed();
        assert_eq!(printed.len(), 1);
        assert_eq!(printed[0].surface, surface.id());
        assert!(printed[0].html.contains("print-container"));
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_to_print_without_content() {
        let host = FakeHost::new(fixtures::EMPTY_EDITOR);
        let config = PrintConfig::default();
        let surface = loaded_print_surface(&host).await;
        let result = PreviewGenerator::new(&host, &config)
            .generate(&surface, true, &config.paper)
            .await
            .expect("generate");
        assert!(result.is_none());
        assert!(host.printed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn repaired_graphics_and_inline_overrides_reach_the_surface() {
        let host = FakeHost::new(fixtures::QUESTION_WITH_SECTIONS);
        host.set_bulk_clone_fault(CloneFault::DropRadicalGraphic);
        let config = PrintConfig::default();
        let surface = loaded_print_surface(&host).await;
        PreviewGenerator::new(&host, &config)
            .generate(&surface, false, &config.paper)
            .await
            .expect("generate")
            .expect("container");

        let body = surface.body().expect("body");
        assert_eq!(dom::select_all(&body, ".sqrt svg").len(), 1);
        let section = dom::select_first(&body, ".answer-section").expect("section");
        assert_eq!(dom::style_property(&section, "background").as_deref(), Some("white"));
        assert!(host.printed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn watermark_overlay_and_css_follow_configuration() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        let config = PrintConfig::builder()
            .watermark(WatermarkConfig::with_image(
                WatermarkImage::Url("/mark.png".to_string()),
                20,
            ))
            .build()
            .expect("config");
        let surface = loaded_print_surface(&host).await;
        let generator = PreviewGenerator::new(&host, &config);
        generator
            .generate(&surface, false, &config.paper)
            .await
            .expect("first");
        generator
            .generate(&surface, false, &config.paper)
            .await
            .expect("second");
        let doc = surface.document().expect("doc");
        assert_eq!(dom::select_all(&doc, ".watermark").len(), 1);
        let bundle = StyleBundle::harvest(&doc);
        assert!(bundle.print_layer.contains("opacity: 0.2;"));
    }

    #[tokio::test(start_paused = true)]
    async fn library_wait_polls_until_font_applies() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        host.set_library_load_delay(3);
        let config = PrintConfig::default();
        let surface = loaded_print_surface(&host).await;
        let started = tokio::time::Instant::now();
        PreviewGenerator::new(&host, &config)
            .generate(&surface, true, &config.paper)
            .await
            .expect("generate");
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert!(host.printed()[0].font_probes_before >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_node_is_removed_after_check() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        let config = PrintConfig::default();
        let surface = loaded_print_surface(&host).await;
        let head = surface.head().expect("head");
        style::link_base_sheet(&head, &config.math_base_sheet).expect("link");
        assert!(library_loaded(&host, &surface, &config, None).await);
        let body = surface.body().expect("body");
        assert!(dom::select_first(&body, ".katex").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_generation_never_prints() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        let config = PrintConfig::default();
        let surface = loaded_print_surface(&host).await;
        let token = CancelToken::new();
        token.cancel();
        let result = PreviewGenerator::new(&host, &config)
            .with_cancel(&token)
            .generate(&surface, true, &config.paper)
            .await
            .expect("generate");
        assert!(result.is_none());
        assert!(host.printed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn paper_overrides_reach_print_layer() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        let config = PrintConfig::default();
        let surface = loaded_print_surface(&host).await;
        let paper = config.paper.with_overrides(Some("Letter"), Some("215.9mm"));
        PreviewGenerator::new(&host, &config)
            .generate(&surface, false, &paper)
            .await
            .expect("generate");
        let bundle = StyleBundle::harvest(&surface.document().expect("doc"));
        assert!(bundle.print_layer.contains("size: Letter;"));
        assert!(bundle.print_layer.contains("max-width: 215.9mm;"));
    }
}
