use std::collections::BTreeMap;

use kuchiki::NodeRef;

use crate::dom::{self, markers};
use crate::error::PrintError;
use crate::sandbox::{SandboxSurface, SurfaceRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStyleSheet {
    pub href: Option<String>,
    /// Rule text, or `None` when the platform refuses access to the rules
    /// (cross-origin sheets).
    pub text: Option<String>,
}

impl HostStyleSheet {
    pub fn linked(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            text: None,
        }
    }

    pub fn linked_with_rules(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            text: Some(text.into()),
        }
    }

    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            href: None,
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputedStyle {
    properties: BTreeMap<String, String>,
}

impl ComputedStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.properties
            .insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_hidden(&self) -> bool {
        self.get("display") == Some("none") || self.get("visibility") == Some("hidden")
    }
}

/// The platform seam. Everything the pipeline cannot do on a plain tree
/// (style resolution, printing, user alerts) goes through here.
pub trait Host {
    fn document(&self) -> NodeRef;

    fn style_sheets(&self) -> Vec<HostStyleSheet>;

    fn computed_style(&self, node: &NodeRef) -> ComputedStyle;

    fn surfaces(&self) -> &SurfaceRegistry;

    fn print(&self, surface: &SandboxSurface) -> Result<(), PrintError>;

    fn alert(&self, message: &str);

    fn editor_root(&self) -> Option<NodeRef> {
        find_editor_root(&self.document())
    }

    /// Bulk subtree copy. Platforms whose bulk copy loses parts of complex
    /// math substructures are repaired afterwards.
    fn deep_clone(&self, node: &NodeRef) -> NodeRef {
        dom::deep_clone(node)
    }

    /// Copy of a single math node, used by repair to bypass the bulk copy.
    fn clone_node(&self, node: &NodeRef) -> NodeRef {
        dom::deep_clone(node)
    }

    fn adopt(&self, _node: &NodeRef) {}
}

pub fn find_editor_root(document: &NodeRef) -> Option<NodeRef> {
    markers::EDITOR_ROOTS
        .iter()
        .find_map(|class| dom::first_descendant_with_class(document, class))
}

/// Non-blank text, or a nested rich-text root that may still be filling in.
pub fn editor_has_content(editor: &NodeRef) -> bool {
    !dom::is_blank(editor) || dom::first_descendant_with_class(editor, markers::PROSEMIRROR).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editor_candidates_are_tried_in_order() {
        let doc = dom::parse_document(
            r#"<div class="ProseMirror">inner</div><div class="block-editor-container">block</div>"#,
        );
        let editor = find_editor_root(&doc).expect("editor");
        assert!(dom::has_class(&editor, "block-editor-container"));

        let doc = dom::parse_document(r#"<p>nothing editable</p>"#);
        assert!(find_editor_root(&doc).is_none());
    }

    #[test]
    fn content_detection_accepts_nested_rich_text_root() {
        let doc = dom::parse_document(
            r#"<div class="continuous-editor">  </div><div class="block-editor-container"><div class="ProseMirror"></div></div>"#,
        );
        let blank = dom::select_first(&doc, ".continuous-editor").expect("blank");
        let nested = dom::select_first(&doc, ".block-editor-container").expect("nested");
        assert!(!editor_has_content(&blank));
        assert!(editor_has_content(&nested));
    }

    #[test]
    fn computed_style_visibility() {
        let style = ComputedStyle::new().with("Display", "none");
        assert!(style.is_hidden());
        assert_eq!(style.get("display"), Some("none"));
        assert!(!ComputedStyle::new().with("visibility", "visible").is_hidden());
    }
}
