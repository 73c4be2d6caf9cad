use kuchiki::NodeRef;
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::traits::ToCss;

use crate::dom;
use crate::error::PrintError;
use crate::host::HostStyleSheet;
use crate::style::sheets::MATH_OVERRIDE_BASELINE;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopiedStyles {
    pub shared: String,
    /// Override baseline plus the rules of the override sheet when found.
    pub math_override: String,
    pub override_found: bool,
    pub linked: usize,
    pub skipped: usize,
}

impl CopiedStyles {
    /// Shared layer text. Empty when the override sheet was not found, since
    /// the shared content then moves into the override layer.
    pub fn shared_layer(&self) -> String {
        if self.override_found {
            self.shared.clone()
        } else {
            String::new()
        }
    }

    pub fn math_override_layer(&self) -> String {
        if self.override_found {
            self.math_override.clone()
        } else {
            format!("{}{}", self.math_override, self.shared)
        }
    }
}

pub fn link_base_sheet(head: &NodeRef, href: &str) -> Result<(), PrintError> {
    let link = dom::create_element(
        "link",
        &[("rel", "stylesheet"), ("href", href), ("crossorigin", "anonymous")],
    )
    .ok_or_else(|| PrintError::Platform("could not create link element".to_string()))?;
    head.prepend(link);
    Ok(())
}

/// Copies `sheets` into `head`: the base sheet is linked first, external
/// sheets are linked after it, and rule text of accessible inline sheets
/// and of the math override sheet is collected for the style layers.
pub fn copy_style_sheets(
    sheets: &[HostStyleSheet],
    head: &NodeRef,
    base_href: &str,
    override_marker: &str,
) -> Result<CopiedStyles, PrintError> {
    link_base_sheet(head, base_href)?;
    let mut copied = CopiedStyles {
        math_override: MATH_OVERRIDE_BASELINE.to_string(),
        ..CopiedStyles::default()
    };

    for sheet in sheets {
        match (&sheet.href, &sheet.text) {
            (Some(href), Some(text)) if href.contains(override_marker) => {
                match rule_text(text) {
                    Ok(rules) => {
                        copied.math_override.push_str(&rules);
                        copied.override_found = true;
                    }
                    Err(err) => {
                        log::warn!("skipping math override sheet {href}: {err}");
                        copied.skipped += 1;
                    }
                }
            }
            (Some(href), _) if href == base_href => {}
            (Some(href), _) => {
                let link = dom::create_element("link", &[("rel", "stylesheet"), ("href", href)])
                    .ok_or_else(|| {
                        PrintError::Platform("could not create link element".to_string())
                    })?;
                head.append(link);
                copied.linked += 1;
            }
            (None, Some(text)) => match rule_text(text) {
                Ok(rules) => copied.shared.push_str(&rules),
                Err(err) => {
                    log::warn!("skipping inline style sheet: {err}");
                    copied.skipped += 1;
                }
            },
            (None, None) => {
                log::warn!("skipping inline style sheet with inaccessible rules");
                copied.skipped += 1;
            }
        }
    }
    Ok(copied)
}

pub fn rule_text(css: &str) -> Result<String, String> {
    let sheet = StyleSheet::parse(css, ParserOptions::default()).map_err(|err| err.to_string())?;
    let mut out = String::new();
    for rule in &sheet.rules.0 {
        let text = rule
            .to_css_string(PrinterOptions {
                minify: true,
                ..PrinterOptions::default()
            })
            .map_err(|err| err.to_string())?;
        out.push_str(&text);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://cdn.example/katex.min.css";
    const MARKER: &str = "katex-vscode.css";

    fn head() -> NodeRef {
        let doc = dom::parse_document(
            r#"<!DOCTYPE html><html><head><meta charset="utf-8"></head><body></body></html>"#,
        );
        dom::select_first(&doc, "head").expect("head")
    }

    fn hrefs(head: &NodeRef) -> Vec<String> {
        dom::select_all(head, "link")
            .iter()
            .filter_map(|link| dom::get_attr(link, "href"))
            .collect()
    }

    #[test]
    fn base_sheet_is_linked_first_and_externals_follow() {
        let head = head();
        let sheets = vec![
            HostStyleSheet::linked("/assets/app.css"),
            HostStyleSheet::linked(BASE),
            HostStyleSheet::inline(".a { color: red }"),
        ];
        let copied = copy_style_sheets(&sheets, &head, BASE, MARKER).expect("copy");
        assert_eq!(hrefs(&head), vec![BASE.to_string(), "/assets/app.css".to_string()]);
        let first = head.children().find(|n| n.as_element().is_some()).expect("first");
        assert_eq!(dom::tag_name(&first).as_deref(), Some("link"));
        assert_eq!(copied.linked, 1);
        assert!(copied.shared.contains(".a"));
        assert!(!copied.override_found);
    }

    #[test]
    fn override_sheet_is_kept_out_of_shared_layer() {
        let head = head();
        let sheets = vec![
            HostStyleSheet::inline(".note { color: red }"),
            HostStyleSheet::linked_with_rules(
                "/styles/katex-vscode.css",
                ".katex .custom { margin: 0 }",
            ),
        ];
        let copied = copy_style_sheets(&sheets, &head, BASE, MARKER).expect("copy");
        assert!(copied.override_found);
        let shared = copied.shared_layer();
        let math = copied.math_override_layer();
        assert!(shared.contains(".note"));
        assert!(!shared.contains(".custom"));
        assert!(math.starts_with(MATH_OVERRIDE_BASELINE));
        assert!(math.contains(".katex .custom"));
        assert!(!hrefs(&head).iter().any(|href| href.contains(MARKER)));
    }

    #[test]
    fn without_override_sheet_shared_content_moves_to_override_layer() {
        let head = head();
        let sheets = vec![HostStyleSheet::inline(".note { color: red }")];
        let copied = copy_style_sheets(&sheets, &head, BASE, MARKER).expect("copy");
        assert!(copied.shared_layer().is_empty());
        let math = copied.math_override_layer();
        assert!(math.starts_with(MATH_OVERRIDE_BASELINE));
        assert!(math.contains(".note"));
    }

    #[test]
    fn inaccessible_override_sheet_is_linked_instead() {
        let head = head();
        let sheets = vec![HostStyleSheet::linked("/styles/katex-vscode.css")];
        let copied = copy_style_sheets(&sheets, &head, BASE, MARKER).expect("copy");
        assert!(!copied.override_found);
        assert_eq!(copied.linked, 1);
    }

    #[test]
    fn inaccessible_and_broken_sheets_are_skipped() {
        let head = head();
        let sheets = vec![
            HostStyleSheet {
                href: None,
                text: None,
            },
            HostStyleSheet::inline("..y { color: red }"),
            HostStyleSheet::inline(".z { color: blue }"),
        ];
        let copied = copy_style_sheets(&sheets, &head, BASE, MARKER).expect("copy");
        assert_eq!(copied.skipped, 2);
        assert!(copied.shared.contains(".z"));
    }

    #[test]
    fn rule_text_puts_one_rule_per_line() {
        let text = rule_text(".a{color:red}\n\n.b { margin: 0 }").expect("parse");
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().next().expect("line").starts_with(".a"));
    }
}
