pub mod computed;
pub mod copy;
pub mod inline;
pub mod sheets;

use kuchiki::NodeRef;
use sha2::{Digest, Sha256};

use crate::dom;
use crate::error::PrintError;

pub use computed::extract_computed_overrides;
pub use copy::{CopiedStyles, copy_style_sheets, link_base_sheet};
pub use inline::apply_print_overrides;

pub const LAYER_ATTR: &str = "data-print-layer";

/// The four style layers, in cascade order. Later layers win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleLayer {
    Print,
    Shared,
    MathOverride,
    ComputedOverride,
}

impl StyleLayer {
    pub const ORDER: [StyleLayer; 4] = [
        StyleLayer::Print,
        StyleLayer::Shared,
        StyleLayer::MathOverride,
        StyleLayer::ComputedOverride,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StyleLayer::Print => "print",
            StyleLayer::Shared => "shared",
            StyleLayer::MathOverride => "math-override",
            StyleLayer::ComputedOverride => "computed-override",
        }
    }

    pub fn element_id(self) -> &'static str {
        match self {
            StyleLayer::Print => "print-styles",
            StyleLayer::Shared => "shared-styles",
            StyleLayer::MathOverride => "math-override-styles",
            StyleLayer::ComputedOverride => "editor-computed-styles",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|layer| layer.name() == name)
    }
}

/// CSS text of each layer for one generation. An empty string means the
/// layer is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleBundle {
    pub print_layer: String,
    pub shared_layer: String,
    pub math_override_layer: String,
    pub computed_override_layer: String,
}

impl StyleBundle {
    pub fn layer(&self, layer: StyleLayer) -> &str {
        match layer {
            StyleLayer::Print => &self.print_layer,
            StyleLayer::Shared => &self.shared_layer,
            StyleLayer::MathOverride => &self.math_override_layer,
            StyleLayer::ComputedOverride => &self.computed_override_layer,
        }
    }

    fn layer_mut(&mut self, layer: StyleLayer) -> &mut String {
        match layer {
            StyleLayer::Print => &mut self.print_layer,
            StyleLayer::Shared => &mut self.shared_layer,
            StyleLayer::MathOverride => &mut self.math_override_layer,
            StyleLayer::ComputedOverride => &mut self.computed_override_layer,
        }
    }

    pub fn layers(&self) -> [(StyleLayer, &str); 4] {
        StyleLayer::ORDER.map(|layer| (layer, self.layer(layer)))
    }

    pub fn is_complete(&self) -> bool {
        !self.print_layer.trim().is_empty() && !self.math_override_layer.trim().is_empty()
    }

    /// SHA-256 over the layers in injection order, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (layer, css) in self.layers() {
            hasher.update(layer.name().as_bytes());
            hasher.update([0u8]);
            hasher.update(css.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for b in digest {
            use std::fmt::Write;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }

    pub fn harvest(document: &NodeRef) -> Self {
        let mut bundle = StyleBundle::default();
        for layer in StyleLayer::ORDER {
            let selector = format!("style#{}", layer.element_id());
            if let Some(block) = dom::select_first(document, &selector) {
                *bundle.layer_mut(layer) = block.text_contents();
            }
        }
        bundle
    }
}

pub fn injected_layer_order(head: &NodeRef) -> Vec<StyleLayer> {
    dom::select_all(head, "style")
        .iter()
        .filter_map(|block| dom::get_attr(block, LAYER_ATTR))
        .filter_map(|name| StyleLayer::from_name(&name))
        .collect()
}

/// Appends one `<style>` block per non-empty layer, always in
/// [`StyleLayer::ORDER`]. Returns the layers that were written.
pub fn inject_bundle(head: &NodeRef, bundle: &StyleBundle) -> Result<Vec<StyleLayer>, PrintError> {
    let mut written = Vec::new();
    for (layer, css) in bundle.layers() {
        if css.trim().is_empty() {
            continue;
        }
        inject_layer(head, layer, css)?;
        written.push(layer);
    }
    Ok(written)
}

pub fn inject_layer(head: &NodeRef, layer: StyleLayer, css: &str) -> Result<(), PrintError> {
    if let Some(existing) = dom::select_first(head, &format!("style#{}", layer.element_id())) {
        existing.detach();
    }
    let block = dom::create_element(
        "style",
        &[("id", layer.element_id()), (LAYER_ATTR, layer.name())],
    )
    .ok_or_else(|| PrintError::Platform("could not create style element".to_string()))?;
    block.append(NodeRef::new_text(css));
    head.append(block);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_bundle() -> StyleBundle {
        StyleBundle {
            print_layer: "@page { size: A4; }".to_string(),
            shared_layer: ".note { color: red; }".to_string(),
            math_override_layer: ".katex { font-size: 1em; }".to_string(),
            computed_override_layer: ".katex .sqrt { display: inline-block !important; }"
                .to_string(),
        }
    }

    fn blank_head() -> (NodeRef, NodeRef) {
        let doc = dom::parse_document("<!DOCTYPE html><html><head></head><body></body></html>");
        let head = dom::select_first(&doc, "head").expect("head");
        (doc, head)
    }

    #[test]
    fn injection_follows_layer_order_and_round_trips() {
        let (doc, head) = blank_head();
        let bundle = full_bundle();
        let written = inject_bundle(&head, &bundle).expect("inject");
        assert_eq!(written, StyleLayer::ORDER.to_vec());
        assert_eq!(injected_layer_order(&head), StyleLayer::ORDER.to_vec());
        let harvested = StyleBundle::harvest(&doc);
        assert_eq!(harvested, bundle);
        assert_eq!(harvested.fingerprint(), bundle.fingerprint());
    }

    #[test]
    fn empty_layers_are_skipped_without_reordering() {
        let (_doc, head) = blank_head();
        let bundle = StyleBundle {
            shared_layer: String::new(),
            computed_override_layer: "  ".to_string(),
            ..full_bundle()
        };
        let written = inject_bundle(&head, &bundle).expect("inject");
        assert_eq!(written, vec![StyleLayer::Print, StyleLayer::MathOverride]);
        assert_eq!(injected_layer_order(&head), written);
    }

    #[test]
    fn reinjecting_a_layer_replaces_it() {
        let (doc, head) = blank_head();
        inject_layer(&head, StyleLayer::Print, "a { color: red; }").expect("first");
        inject_layer(&head, StyleLayer::Print, "a { color: blue; }").expect("second");
        assert_eq!(dom::select_all(&head, "style").len(), 1);
        assert_eq!(StyleBundle::harvest(&doc).print_layer, "a { color: blue; }");
    }

    #[test]
    fn completeness_and_fingerprint() {
        let bundle = full_bundle();
        assert!(bundle.is_complete());
        let partial = StyleBundle {
            math_override_layer: String::new(),
            ..full_bundle()
        };
        assert!(!partial.is_complete());
        assert_ne!(bundle.fingerprint(), partial.fingerprint());
        assert_eq!(bundle.fingerprint().len(), 64);

        let swapped = StyleBundle {
            shared_layer: bundle.math_override_layer.clone(),
            math_override_layer: bundle.shared_layer.clone(),
            ..full_bundle()
        };
        assert_ne!(bundle.fingerprint(), swapped.fingerprint());
    }

    #[test]
    fn layer_names_round_trip() {
        for layer in StyleLayer::ORDER {
            assert_eq!(StyleLayer::from_name(layer.name()), Some(layer));
        }
        assert_eq!(StyleLayer::from_name("other"), None);
    }
}
