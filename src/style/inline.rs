use kuchiki::NodeRef;

use crate::dom::{self, markers};

const SCOPED_ATTR_PREFIX: &str = "data-v-";

const SECTION: &[(&str, &str)] = &[
    ("background", "white"),
    ("border", "none"),
    ("border-left", "none"),
    ("padding", "0.75rem 0"),
    ("margin-top", "0.75rem"),
    ("margin-bottom", "0.5rem"),
    ("break-inside", "avoid"),
    ("page-break-inside", "avoid"),
];

const LABEL: &[(&str, &str)] = &[
    ("font-size", "0.875rem"),
    ("font-weight", "700"),
    ("color", "black"),
    ("margin-bottom", "0.5rem"),
    ("display", "block"),
];

const CONTENT: &[(&str, &str)] = &[
    ("font-size", "0.875rem"),
    ("color", "black"),
    ("line-height", "1.6"),
    ("margin-top", "0.25rem"),
];

fn apply(node: &NodeRef, declarations: &[(&str, &str)]) {
    dom::remove_attrs_with_prefix(node, SCOPED_ATTR_PREFIX);
    for (name, value) in declarations {
        dom::set_style_property(node, name, value, true);
    }
}

/// Writes the print overrides onto every answer/solution section, label and
/// content block under `root`. Returns how many nodes were touched.
pub fn apply_print_overrides(root: &NodeRef) -> usize {
    let groups: [(&[&str], &[(&str, &str)]); 3] = [
        (&[markers::ANSWER_SECTION, markers::SOLUTION_SECTION], SECTION),
        (&[markers::ANSWER_LABEL, markers::SOLUTION_LABEL], LABEL),
        (&[markers::ANSWER_CONTENT, markers::SOLUTION_CONTENT], CONTENT),
    ];
    let mut touched = 0;
    for (classes, declarations) in groups {
        for class in classes {
            for node in dom::descendants_with_class(root, class) {
                apply(&node, declarations);
                touched += 1;
            }
        }
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_are_important_and_scoped_attributes_go() {
        let doc = dom::parse_document(
            r#"<div class="print-container">
              <div class="answer-section" data-v-3f2a="" style="background: #eef; padding: 4px">
                <span class="answer-label" data-v-3f2a="">Answer</span>
                <div class="answer-content">42</div>
              </div>
              <div class="solution-section"><div class="solution-content">because</div></div>
            </div>"#,
        );
        let root = dom::select_first(&doc, ".print-container").expect("root");
        assert_eq!(apply_print_overrides(&root), 5);

        let section = dom::select_first(&root, ".answer-section").expect("section");
        assert!(dom::get_attr(&section, "data-v-3f2a").is_none());
        assert_eq!(dom::style_property(&section, "background").as_deref(), Some("white"));
        assert_eq!(dom::style_property(&section, "padding").as_deref(), Some("0.75rem 0"));
        let style = dom::get_attr(&section, "style").expect("style");
        assert!(style.contains("border-left: none !important;"));
        assert!(!style.contains("#eef"));

        let label = dom::select_first(&root, ".answer-label").expect("label");
        assert_eq!(dom::style_property(&label, "font-weight").as_deref(), Some("700"));
        let content = dom::select_first(&root, ".solution-content").expect("content");
        assert_eq!(dom::style_property(&content, "line-height").as_deref(), Some("1.6"));
    }

    #[test]
    fn applying_twice_is_stable() {
        let doc = dom::parse_document(r#"<div class="answer-section">x</div>"#);
        let body = dom::select_first(&doc, "body").expect("body");
        apply_print_overrides(&body);
        let once = dom::outer_html(&body);
        apply_print_overrides(&body);
        assert_eq!(dom::outer_html(&body), once);
    }
}
