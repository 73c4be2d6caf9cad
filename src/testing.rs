//! In-memory [`Host`] and KaTeX-shaped fixtures for tests.

use std::cell::{Cell, RefCell};

use kuchiki::NodeRef;

use crate::dom::{self, markers};
use crate::error::PrintError;
use crate::host::{ComputedStyle, Host, HostStyleSheet};
use crate::mode::PrintMode;
use crate::sandbox::{SandboxSurface, SurfaceId, SurfaceRegistry};
use crate::style::{self, StyleBundle, StyleLayer};

const MATH_FONT: &str = "KaTeX_Main, \"Times New Roman\", serif";
const FALLBACK_FONT: &str = "\"Times New Roman\", serif";
const DRIFTED_VIEWBOX: &str = "0 0 100 100";

/// Damage applied to copies of math nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneFault {
    /// Radical graphics do not survive the copy.
    DropRadicalGraphic,
    /// Radical graphics survive with a wrong `viewBox`.
    DriftViewBox,
}

impl CloneFault {
    fn apply(self, root: &NodeRef) {
        for svg in dom::select_all(root, ".sqrt svg") {
            match self {
                CloneFault::DropRadicalGraphic => svg.detach(),
                CloneFault::DriftViewBox => dom::set_attr(&svg, "viewBox", DRIFTED_VIEWBOX),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrintedCapture {
    pub surface: SurfaceId,
    pub html: String,
    pub layer_order: Vec<StyleLayer>,
    pub styles: StyleBundle,
    /// Math font lookups on sandbox documents before the print action.
    pub font_probes_before: usize,
}

pub struct FakeHost {
    document: NodeRef,
    surfaces: SurfaceRegistry,
    sheets: RefCell<Vec<HostStyleSheet>>,
    sheet_reads: Cell<usize>,
    bulk_fault: Cell<Option<CloneFault>>,
    node_fault: Cell<Option<CloneFault>>,
    adopted: Cell<usize>,
    library_load_delay: Cell<usize>,
    font_probes: Cell<usize>,
    print_failure: RefCell<Option<String>>,
    printed: RefCell<Vec<PrintedCapture>>,
    alerts: RefCell<Vec<String>>,
}

impl FakeHost {
    pub fn new(editor_markup: &str) -> Self {
        let document = dom::parse_document(&format!(
            "<!DOCTYPE html><html><head></head><body>{editor_markup}</body></html>"
        ));
        Self {
            document,
            surfaces: SurfaceRegistry::new(),
            sheets: RefCell::new(default_style_sheets()),
            sheet_reads: Cell::new(0),
            bulk_fault: Cell::new(None),
            node_fault: Cell::new(None),
            adopted: Cell::new(0),
            library_load_delay: Cell::new(0),
            font_probes: Cell::new(0),
            print_failure: RefCell::new(None),
            printed: RefCell::new(Vec::new()),
            alerts: RefCell::new(Vec::new()),
        }
    }

    pub fn set_style_sheets(&self, sheets: Vec<HostStyleSheet>) {
        *self.sheets.borrow_mut() = sheets;
    }

    pub fn style_sheet_reads(&self) -> usize {
        self.sheet_reads.get()
    }

    pub fn set_bulk_clone_fault(&self, fault: CloneFault) {
        self.bulk_fault.set(Some(fault));
    }

    pub fn set_node_clone_fault(&self, fault: Option<CloneFault>) {
        self.node_fault.set(fault);
    }

    pub fn adopted_count(&self) -> usize {
        self.adopted.get()
    }

    /// The first `probes` math font lookups on sandbox documents report the
    /// fallback font.
    pub fn set_library_load_delay(&self, probes: usize) {
        self.library_load_delay.set(probes);
    }

    pub fn font_probes(&self) -> usize {
        self.font_probes.get()
    }

    pub fn set_print_failure(&self, message: Option<&str>) {
        *self.print_failure.borrow_mut() = message.map(str::to_string);
    }

    /// Hides or shows answer and solution sections the way the editor does
    /// after a mode switch.
    pub fn show_sections_for(&self, mode: PrintMode) {
        for (class, visible) in [
            (markers::ANSWER_SECTION, mode.shows_answers()),
            (markers::SOLUTION_SECTION, mode.shows_solutions()),
        ] {
            for section in dom::descendants_with_class(&self.document, class) {
                set_displayed(&section, visible);
            }
        }
    }

    pub fn printed(&self) -> Vec<PrintedCapture> {
        self.printed.borrow().clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.borrow().clone()
    }

    fn math_font(&self, node: &NodeRef) -> &'static str {
        let root = dom::root_of(node);
        if root == self.document {
            return MATH_FONT;
        }
        let probes = self.font_probes.get() + 1;
        self.font_probes.set(probes);
        let linked = dom::select_all(&root, "link").iter().any(|link| {
            dom::get_attr(link, "href").is_some_and(|href| href.contains(markers::MATH))
        });
        if linked && probes > self.library_load_delay.get() {
            MATH_FONT
        } else {
            FALLBACK_FONT
        }
    }
}

fn default_style_sheets() -> Vec<HostStyleSheet> {
    vec![
        HostStyleSheet::linked("/assets/app.css"),
        HostStyleSheet::inline(".question-display { margin-bottom: 1rem }"),
        HostStyleSheet::linked_with_rules(
            "/assets/katex-vscode.css",
            ".katex { font-size: 1.1em } .katex .sqrt > .vlist-t { border-left-width: 0.04em }",
        ),
    ]
}

fn set_displayed(node: &NodeRef, visible: bool) {
    let mut declarations = dom::parse_inline_style(&dom::get_attr(node, "style").unwrap_or_default());
    declarations.retain(|decl| decl.name != "display");
    if !visible {
        declarations.push(dom::Declaration {
            name: "display".to_string(),
            value: "none".to_string(),
            important: false,
        });
    }
    if declarations.is_empty() {
        dom::remove_attr(node, "style");
    } else {
        dom::set_attr(node, "style", &dom::serialize_inline_style(&declarations));
    }
}

fn class_defaults(node: &NodeRef, style: &mut ComputedStyle) {
    let table: [(&str, &[(&str, &str)]); 4] = [
        (
            markers::RADICAL,
            &[("display", "inline-block"), ("position", "relative"), ("width", "2.1em")],
        ),
        (
            markers::VLIST_TABLE,
            &[("display", "inline-table"), ("table-layout", "fixed")],
        ),
        (markers::RADICAL_SIGN, &[("position", "relative"), ("width", "0.853em")]),
        (
            markers::EXPONENT,
            &[("display", "inline-block"), ("vertical-align", "0.363em")],
        ),
    ];
    for (class, values) in table {
        if dom::has_class(node, class) {
            for (name, value) in values {
                style.set(name, *value);
            }
        }
    }
}

impl Host for FakeHost {
    fn document(&self) -> NodeRef {
        self.document.clone()
    }

    fn style_sheets(&self) -> Vec<HostStyleSheet> {
        self.sheet_reads.set(self.sheet_reads.get() + 1);
        self.sheets.borrow().clone()
    }

    fn computed_style(&self, node: &NodeRef) -> ComputedStyle {
        let mut style = ComputedStyle::new().with("display", "block");
        class_defaults(node, &mut style);
        let hidden = node.inclusive_ancestors().any(|ancestor| {
            dom::style_property(&ancestor, "display").as_deref() == Some("none")
        });
        if hidden {
            style.set("display", "none");
        }
        if let Some(visibility) = dom::style_property(node, "visibility") {
            style.set("visibility", visibility);
        }
        if node
            .inclusive_ancestors()
            .any(|ancestor| dom::has_class(&ancestor, markers::MATH))
        {
            style.set("font-family", self.math_font(node));
        }
        style
    }

    fn surfaces(&self) -> &SurfaceRegistry {
        &self.surfaces
    }

    fn print(&self, surface: &SandboxSurface) -> Result<(), PrintError> {
        if let Some(message) = self.print_failure.borrow().clone() {
            return Err(PrintError::Platform(message));
        }
        let document = surface.document()?;
        let head = surface.head()?;
        self.printed.borrow_mut().push(PrintedCapture {
            surface: surface.id(),
            html: dom::outer_html(&document),
            layer_order: style::injected_layer_order(&head),
            styles: StyleBundle::harvest(&document),
            font_probes_before: self.font_probes.get(),
        });
        Ok(())
    }

    fn alert(&self, message: &str) {
        self.alerts.borrow_mut().push(message.to_string());
    }

    fn deep_clone(&self, node: &NodeRef) -> NodeRef {
        let copy = dom::deep_clone(node);
        if let Some(fault) = self.bulk_fault.get() {
            fault.apply(&copy);
        }
        copy
    }

    fn clone_node(&self, node: &NodeRef) -> NodeRef {
        let copy = dom::deep_clone(node);
        if let Some(fault) = self.node_fault.get() {
            fault.apply(&copy);
        }
        copy
    }

    fn adopt(&self, _node: &NodeRef) {
        self.adopted.set(self.adopted.get() + 1);
    }
}

pub mod fixtures {
    /// Plain math, a radical with its graphic, and an exponent stack, plus
    /// every editing affordance the cloner strips.
    pub const MIXED_MATH: &str = r##"<div class="continuous-editor" contenteditable="true" data-v-7a1c>
  <div class="question-toolbar"><button>edit</button></div>
  <div class="question-display" data-v-7a1c>
    <p>Let <span class="katex"><span class="katex-html" aria-hidden="true"><span class="base"><span class="mord mathnormal">a</span></span></span></span> be given.</p>
    <p>Compute <span class="katex"><span class="katex-html" aria-hidden="true"><span class="base"><span class="mord sqrt"><span class="vlist-t vlist-t2"><span class="vlist-r"><span class="vlist"><span class="svg-align"><span class="pstrut"></span><span class="mord"><span class="mord mathnormal">x</span></span></span><span><span class="pstrut"></span><span class="hide-tail sqrt-sign"><svg xmlns="http://www.w3.org/2000/svg" width="400em" height="1.08em" viewBox="0 0 400000 1080" preserveAspectRatio="xMinYMin slice"><path d="M95,702 c-2.7,0,-7.17,-2.7,-13.5,-8z"></path></svg></span></span></span></span></span></span></span></span></span> now.</p>
    <p>and <span class="katex"><span class="katex-html" aria-hidden="true"><span class="base"><span class="mord"><span class="mord mathnormal">y</span><span class="msupsub"><span class="vlist-t"><span class="vlist-r"><span class="vlist"><span><span class="pstrut"></span><span class="sizing reset-size6 size3 mtight"><span class="mord mtight">2</span></span></span></span></span></span></span></span></span></span></span>.</p>
  </div>
  <div class="section-toolbar" data-v-7a1c>move</div>
  <p data-authoring-only="true">Drag math here</p>
</div>"##;

    pub const SIMPLE_MATH: &str = r##"<div class="continuous-editor">
  <p>Let <span class="katex"><span class="katex-html" aria-hidden="true"><span class="base"><span class="mord mathnormal">a</span><span class="mbin">+</span><span class="mord mathnormal">b</span></span></span></span>.</p>
</div>"##;

    pub const PLAIN_TEXT: &str = r##"<div class="continuous-editor"><p>No math in this question.</p></div>"##;

    /// Math whose rendered markup has not been produced yet.
    pub const UNRENDERED_MATH: &str = r##"<div class="continuous-editor">
  <p>Pending <span class="katex"><span class="katex-html" aria-hidden="true"></span></span></p>
</div>"##;

    /// A question with one radical, an answer section holding an exponent
    /// stack and a solution section.
    pub const QUESTION_WITH_SECTIONS: &str = r##"<div class="continuous-editor" contenteditable="true">
  <div class="question-display section-block">
    <p>Simplify <span class="katex"><span class="katex-html" aria-hidden="true"><span class="base"><span class="mord sqrt"><span class="vlist-t vlist-t2"><span class="vlist-r"><span class="vlist"><span class="svg-align"><span class="pstrut"></span><span class="mord"><span class="mord">18</span></span></span><span><span class="pstrut"></span><span class="hide-tail sqrt-sign"><svg xmlns="http://www.w3.org/2000/svg" width="400em" height="1.08em" viewBox="0 0 400000 1080" preserveAspectRatio="xMinYMin slice"><path d="M95,702 c-2.7,0,-7.17,-2.7,-13.5,-8z"></path></svg></span></span></span></span></span></span></span></span></span>.</p>
  </div>
  <div class="answer-section" data-v-3f2e>
    <div class="answer-label" data-v-3f2e>Answer</div>
    <div class="answer-content"><span class="katex"><span class="katex-html" aria-hidden="true"><span class="base"><span class="mord">3</span><span class="mord"><span class="mord">2</span><span class="msupsub"><span class="vlist-t"><span class="vlist-r"><span class="vlist"><span><span class="pstrut"></span><span class="sizing reset-size6 size3 mtight"><span class="mord mtight">1/2</span></span></span></span></span></span></span></span></span></span></span></div>
  </div>
  <div class="solution-section">
    <div class="solution-label">Solution</div>
    <div class="solution-content">Factor 18 as 9 times 2.</div>
  </div>
</div>"##;

    pub const EMPTY_EDITOR: &str = r##"<div class="continuous-editor" contenteditable="true">   </div>"##;
}
