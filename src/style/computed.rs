use kuchiki::NodeRef;

use crate::dom::{self, markers};
use crate::host::{ComputedStyle, Host};

fn value<'a>(style: &'a ComputedStyle, name: &str, fallback: &'a str) -> &'a str {
    style.get(name).filter(|v| !v.is_empty()).unwrap_or(fallback)
}

/// Builds the computed override layer from the first radical and the first
/// exponent stack under `editor`. `None` when there is no math, or neither
/// substructure is present.
pub fn extract_computed_overrides<H: Host + ?Sized>(host: &H, editor: &NodeRef) -> Option<String> {
    if dom::select_first(editor, &format!(".{}", markers::MATH)).is_none() {
        return None;
    }
    let mut rules = Vec::new();
    if let Some(radical) = dom::select_first(editor, ".katex .sqrt") {
        if let Some(rule) = radical_rules(host, &radical) {
            rules.push(rule);
        }
    }
    if let Some(stack) = dom::select_first(editor, ".katex .msupsub") {
        if let Some(rule) = exponent_rules(host, &stack) {
            rules.push(rule);
        }
    }
    if rules.is_empty() {
        None
    } else {
        Some(rules.join("\n"))
    }
}

fn radical_rules<H: Host + ?Sized>(host: &H, radical: &NodeRef) -> Option<String> {
    let vlist = dom::first_descendant_with_class(radical, markers::VLIST_TABLE)?;
    let sqrt = host.computed_style(radical);
    let table = host.computed_style(&vlist);
    let sign = dom::first_descendant_with_class(radical, markers::RADICAL_SIGN)
        .map(|node| host.computed_style(&node))
        .unwrap_or_default();

    Some(format!(
        ".katex .sqrt {{
  display: {} !important;
  position: {} !important;
  overflow: {} !important;
  font-size: {} !important;
  line-height: {} !important;
  width: {} !important;
  min-width: {} !important;
  max-width: {} !important;
  box-sizing: {} !important;
}}

.katex .sqrt > .vlist-t {{
  display: {} !important;
  position: {} !important;
  overflow: {} !important;
  border-left-width: {} !important;
  border-left-style: {} !important;
  border-left-color: {} !important;
  table-layout: {} !important;
  width: {} !important;
  min-width: {} !important;
  max-width: {} !important;
  box-sizing: {} !important;
}}

.katex .sqrt .sqrt-sign {{
  position: {} !important;
  display: {} !important;
  width: {} !important;
  max-width: {} !important;
  overflow: {} !important;
}}

.katex .sqrt .sqrt-sign > span {{
  max-width: 100% !important;
  overflow: hidden !important;
}}
",
        value(&sqrt, "display", "inline-block"),
        value(&sqrt, "position", "relative"),
        value(&sqrt, "overflow", "visible"),
        value(&sqrt, "font-size", "1em"),
        value(&sqrt, "line-height", "normal"),
        value(&sqrt, "width", "auto"),
        value(&sqrt, "min-width", "auto"),
        value(&sqrt, "max-width", "none"),
        value(&sqrt, "box-sizing", "content-box"),
        value(&table, "display", "inline-table"),
        value(&table, "position", "relative"),
        value(&table, "overflow", "visible"),
        value(&table, "border-left-width", "0.04em"),
        value(&table, "border-left-style", "solid"),
        value(&table, "border-left-color", "transparent"),
        value(&table, "table-layout", "auto"),
        value(&table, "width", "auto"),
        value(&table, "min-width", "0"),
        value(&table, "max-width", "none"),
        value(&table, "box-sizing", "border-box"),
        value(&sign, "position", "relative"),
        value(&sign, "display", "inline-block"),
        value(&sign, "width", "auto"),
        value(&sign, "max-width", "none"),
        value(&sign, "overflow", "visible"),
    ))
}

fn exponent_rules<H: Host + ?Sized>(host: &H, stack: &NodeRef) -> Option<String> {
    let vlist = dom::first_descendant_with_class(stack, markers::VLIST_TABLE)?;
    let outer = host.computed_style(stack);
    let table = host.computed_style(&vlist);
    Some(format!(
        ".katex .msupsub {{
  vertical-align: {} !important;
  display: {} !important;
  line-height: {} !important;
  position: {} !important;
}}

.katex .msupsub .vlist-t {{
  display: {} !important;
  line-height: {} !important;
  border-collapse: separate !important;
  border-spacing: 0 !important;
}}
",
        value(&outer, "vertical-align", "baseline"),
        value(&outer, "display", "inline-block"),
        value(&outer, "line-height", "normal"),
        value(&outer, "position", "relative"),
        value(&table, "display", "table"),
        value(&table, "line-height", "normal"),
    ))
}
