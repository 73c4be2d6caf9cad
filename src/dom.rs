use kuchiki::traits::TendrilSink;
use kuchiki::{NodeData, NodeRef};

/// Class names the pipeline relies on to find math, answer and solution
/// substructures. They are a contract with the editor and the math library.
pub mod markers {
    pub const MATH: &str = "katex";
    pub const MATH_HTML: &str = "katex-html";
    pub const MATH_DISPLAY: &str = "katex-display";
    pub const RADICAL: &str = "sqrt";
    pub const RADICAL_SIGN: &str = "sqrt-sign";
    pub const EXPONENT: &str = "msupsub";
    pub const VLIST_TABLE: &str = "vlist-t";
    pub const VLIST_ROW: &str = "vlist-r";

    pub const ANSWER_SECTION: &str = "answer-section";
    pub const SOLUTION_SECTION: &str = "solution-section";
    pub const ANSWER_LABEL: &str = "answer-label";
    pub const SOLUTION_LABEL: &str = "solution-label";
    pub const ANSWER_CONTENT: &str = "answer-content";
    pub const SOLUTION_CONTENT: &str = "solution-content";

    pub const QUESTION_BLOCK: &str = "question-display";
    pub const SECTION_BLOCK: &str = "section-block";

    pub const PRINT_CONTAINER: &str = "print-container";
    pub const WATERMARK: &str = "watermark";

    /// Editor roots in lookup priority order.
    pub const EDITOR_ROOTS: [&str; 3] = ["continuous-editor", "block-editor-container", "ProseMirror"];
    pub const PROSEMIRROR: &str = "ProseMirror";
    pub const TOOLBARS: [&str; 2] = ["question-toolbar", "section-toolbar"];
    pub const AUTHORING_ONLY_ATTR: &str = "data-authoring-only";
}

/// Geometry attributes a radical's graphic must carry over from the source.
pub const GRAPHIC_GEOMETRY_ATTRS: [&str; 4] = ["viewBox", "width", "height", "preserveAspectRatio"];

pub fn select_all(node: &NodeRef, selector: &str) -> Vec<NodeRef> {
    match node.select(selector) {
        Ok(matches) => matches.map(|el| el.as_node().clone()).collect(),
        Err(()) => Vec::new(),
    }
}

pub fn select_first(node: &NodeRef, selector: &str) -> Option<NodeRef> {
    node.select_first(selector).ok().map(|el| el.as_node().clone())
}

pub fn descendants_with_class(node: &NodeRef, class: &str) -> Vec<NodeRef> {
    node.descendants()
        .filter(|candidate| has_class(candidate, class))
        .collect()
}

pub fn first_descendant_with_class(node: &NodeRef, class: &str) -> Option<NodeRef> {
    node.descendants().find(|candidate| has_class(candidate, class))
}

pub fn has_class(node: &NodeRef, class: &str) -> bool {
    let Some(element) = node.as_element() else {
        return false;
    };
    let attrs = element.attributes.borrow();
    attrs
        .get("class")
        .is_some_and(|value| value.split_whitespace().any(|name| name == class))
}

pub fn remove_class(node: &NodeRef, class: &str) {
    let Some(element) = node.as_element() else {
        return;
    };
    let mut attrs = element.attributes.borrow_mut();
    let Some(value) = attrs.get("class").map(str::to_string) else {
        return;
    };
    let kept: Vec<&str> = value.split_whitespace().filter(|name| *name != class).collect();
    if kept.is_empty() {
        attrs.remove("class");
    } else {
        attrs.insert("class", kept.join(" "));
    }
}

pub fn tag_name(node: &NodeRef) -> Option<String> {
    node.as_element()
        .map(|element| element.name.local.as_ref().to_ascii_lowercase())
}

pub fn get_attr(node: &NodeRef, name: &str) -> Option<String> {
    node.as_element()
        .and_then(|element| element.attributes.borrow().get(name).map(str::to_string))
}

pub fn set_attr(node: &NodeRef, name: &str, value: &str) {
    if let Some(element) = node.as_element() {
        element
            .attributes
            .borrow_mut()
            .insert(name, value.to_string());
    }
}

pub fn remove_attr(node: &NodeRef, name: &str) {
    if let Some(element) = node.as_element() {
        element.attributes.borrow_mut().remove(name);
    }
}

pub fn remove_attrs_with_prefix(node: &NodeRef, prefix: &str) {
    if let Some(element) = node.as_element() {
        element
            .attributes
            .borrow_mut()
            .map
            .retain(|name, _| !name.local.as_ref().starts_with(prefix));
    }
}

/// Faithful recursive copy of `node` and its subtree. The copy is detached.
pub fn deep_clone(node: &NodeRef) -> NodeRef {
    let copy = match node.data() {
        NodeData::Element(element) => {
            let attrs = element.attributes.borrow();
            NodeRef::new_element(
                element.name.clone(),
                attrs
                    .map
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone())),
            )
        }
        NodeData::Text(text) => NodeRef::new_text(text.borrow().clone()),
        NodeData::Comment(text) => NodeRef::new_comment(text.borrow().clone()),
        NodeData::ProcessingInstruction(pi) => {
            let pi = pi.borrow();
            NodeRef::new_processing_instruction(pi.0.clone(), pi.1.clone())
        }
        NodeData::Doctype(doctype) => NodeRef::new_doctype(
            doctype.name.clone(),
            doctype.public_id.clone(),
            doctype.system_id.clone(),
        ),
        NodeData::Document(_) => NodeRef::new_document(),
        NodeData::DocumentFragment => NodeRef::new(NodeData::DocumentFragment),
    };
    for child in node.children() {
        copy.append(deep_clone(&child));
    }
    copy
}

pub fn parse_document(html: &str) -> NodeRef {
    kuchiki::parse_html().one(html)
}

/// Parses markup as body content and returns the resulting top-level nodes,
/// detached and ready to splice.
pub fn parse_fragment(markup: &str) -> Vec<NodeRef> {
    let document = parse_document(&format!("<!DOCTYPE html><html><head></head><body>{markup}</body></html>"));
    let Some(body) = select_first(&document, "body") else {
        return Vec::new();
    };
    let children: Vec<NodeRef> = body.children().collect();
    for child in &children {
        child.detach();
    }
    children
}

/// Serializes `node` and parses it back, returning the first element that
/// comes out. Used when structural copying has proven unreliable.
pub fn reparse(node: &NodeRef) -> Option<NodeRef> {
    parse_fragment(&outer_html(node))
        .into_iter()
        .find(|candidate| candidate.as_element().is_some())
}

pub fn create_element(tag: &str, attrs: &[(&str, &str)]) -> Option<NodeRef> {
    let document = parse_document(&format!("<!DOCTYPE html><{tag}></{tag}>"));
    let element = select_first(&document, tag)?;
    element.detach();
    for child in element.children().collect::<Vec<_>>() {
        child.detach();
    }
    for (name, value) in attrs {
        set_attr(&element, name, value);
    }
    Some(element)
}

pub fn outer_html(node: &NodeRef) -> String {
    node.to_string()
}

pub fn inner_html(node: &NodeRef) -> String {
    node.children().map(|child| child.to_string()).collect()
}

pub fn clear_children(node: &NodeRef) {
    for child in node.children().collect::<Vec<_>>() {
        child.detach();
    }
}

pub fn replace_node(old: &NodeRef, new: &NodeRef) -> bool {
    if old.parent().is_none() {
        return false;
    }
    new.detach();
    old.insert_before(new.clone());
    old.detach();
    true
}

pub fn is_blank(node: &NodeRef) -> bool {
    node.text_contents().trim().is_empty()
}

pub fn root_of(node: &NodeRef) -> NodeRef {
    node.ancestors().last().unwrap_or_else(|| node.clone())
}

pub fn is_within(node: &NodeRef, ancestor: &NodeRef) -> bool {
    node.inclusive_ancestors().any(|candidate| candidate == *ancestor)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// Splits an inline style into declarations. Semicolons inside quotes or
/// parentheses do not terminate a declaration.
pub fn parse_inline_style(style: &str) -> Vec<Declaration> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for ch in style.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                chunks.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    chunks.push(current);

    chunks
        .into_iter()
        .filter_map(|chunk| {
            let (name, value) = chunk.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            let mut value = value.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let lower = value.to_ascii_lowercase();
            let important = lower.ends_with("!important");
            if important {
                value.truncate(value.len() - "!important".len());
                value = value.trim_end().to_string();
            }
            Some(Declaration {
                name,
                value,
                important,
            })
        })
        .collect()
}

pub fn serialize_inline_style(declarations: &[Declaration]) -> String {
    declarations
        .iter()
        .map(|decl| {
            if decl.important {
                format!("{}: {} !important;", decl.name, decl.value)
            } else {
                format!("{}: {};", decl.name, decl.value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn set_style_property(node: &NodeRef, name: &str, value: &str, important: bool) {
    let mut declarations = parse_inline_style(&get_attr(node, "style").unwrap_or_default());
    let name = name.to_ascii_lowercase();
    declarations.retain(|decl| decl.name != name);
    declarations.push(Declaration {
        name,
        value: value.to_string(),
        important,
    });
    set_attr(node, "style", &serialize_inline_style(&declarations));
}

pub fn style_property(node: &NodeRef, name: &str) -> Option<String> {
    let style = get_attr(node, "style")?;
    parse_inline_style(&style)
        .into_iter()
        .rev()
        .find(|decl| decl.name.eq_ignore_ascii_case(name))
        .map(|decl| decl.value)
}
