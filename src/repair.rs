use kuchiki::NodeRef;

use crate::dom::{self, GRAPHIC_GEOMETRY_ATTRS, markers};
use crate::host::Host;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStrategy {
    RecloneNode,
    ReparseMarkup,
}

pub const DEFAULT_STRATEGIES: [RepairStrategy; 2] =
    [RepairStrategy::RecloneNode, RepairStrategy::ReparseMarkup];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairVariant {
    Detached,
    Attached,
}

impl RepairVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairVariant::Detached => "detached",
            RepairVariant::Attached => "attached",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub candidates: usize,
    pub repaired: usize,
    pub attribute_fixes: usize,
    pub reparsed: usize,
    pub skipped: usize,
}

pub fn repair_detached<H: Host + ?Sized>(
    host: &H,
    original_root: &NodeRef,
    clone_root: &NodeRef,
) -> RepairReport {
    repair_with(
        host,
        original_root,
        clone_root,
        RepairVariant::Detached,
        &DEFAULT_STRATEGIES,
    )
}

/// Repairs nodes after they have been moved into a sandbox document. Each
/// spliced node is handed to [`Host::adopt`].
pub fn repair_attached<H: Host + ?Sized>(
    host: &H,
    original_root: &NodeRef,
    surface_root: &NodeRef,
) -> RepairReport {
    repair_with(
        host,
        original_root,
        surface_root,
        RepairVariant::Attached,
        &DEFAULT_STRATEGIES,
    )
}

pub fn repair_with<H: Host + ?Sized>(
    host: &H,
    original_root: &NodeRef,
    target_root: &NodeRef,
    variant: RepairVariant,
    strategies: &[RepairStrategy],
) -> RepairReport {
    let originals = dom::descendants_with_class(original_root, markers::MATH);
    let targets = dom::descendants_with_class(target_root, markers::MATH);
    if originals.len() != targets.len() {
        log::warn!(
            "{} repair: {} math nodes in source, {} in target; matching by content",
            variant.as_str(),
            originals.len(),
            targets.len()
        );
    }

    let mut report = RepairReport::default();
    let mut claimed: Vec<NodeRef> = Vec::new();

    for (index, original) in originals.iter().enumerate() {
        if !needs_repair(original) {
            continue;
        }
        report.candidates += 1;

        let Some(target) = locate(original, index, &originals, &targets, &claimed) else {
            log::warn!(
                "{} repair: no counterpart for math node {index}; leaving it as-is",
                variant.as_str()
            );
            report.skipped += 1;
            continue;
        };
        claimed.push(target.clone());

        let mut spliced = false;
        for strategy in strategies {
            let Some(replacement) = produce(host, original, *strategy) else {
                continue;
            };
            let Some(fixes) = validate(original, &replacement) else {
                log::debug!(
                    "{} repair: {:?} produced an incomplete copy of math node {index}",
                    variant.as_str(),
                    strategy
                );
                continue;
            };
            if !dom::replace_node(&target, &replacement) {
                break;
            }
            if variant == RepairVariant::Attached {
                host.adopt(&replacement);
            }
            report.repaired += 1;
            report.attribute_fixes += fixes;
            if *strategy == RepairStrategy::ReparseMarkup {
                report.reparsed += 1;
            }
            spliced = true;
            break;
        }

        if !spliced {
            log::warn!(
                "{} repair: every strategy failed for math node {index}; leaving it as-is",
                variant.as_str()
            );
            report.skipped += 1;
        }
    }
    report
}

fn needs_repair(math: &NodeRef) -> bool {
    dom::first_descendant_with_class(math, markers::RADICAL).is_some()
        || dom::first_descendant_with_class(math, markers::EXPONENT).is_some()
}

fn substructure_text(math: &NodeRef) -> Option<String> {
    dom::first_descendant_with_class(math, markers::RADICAL)
        .or_else(|| dom::first_descendant_with_class(math, markers::EXPONENT))
        .map(|node| node.text_contents())
}

fn locate(
    original: &NodeRef,
    index: usize,
    originals: &[NodeRef],
    targets: &[NodeRef],
    claimed: &[NodeRef],
) -> Option<NodeRef> {
    if originals.len() == targets.len() {
        return targets.get(index).cloned();
    }
    let wanted = substructure_text(original)?;
    targets
        .iter()
        .filter(|candidate| !claimed.contains(candidate))
        .find(|candidate| substructure_text(candidate).as_deref() == Some(wanted.as_str()))
        .cloned()
}

fn produce<H: Host + ?Sized>(
    host: &H,
    original: &NodeRef,
    strategy: RepairStrategy,
) -> Option<NodeRef> {
    match strategy {
        RepairStrategy::RecloneNode => Some(host.clone_node(original)),
        RepairStrategy::ReparseMarkup => dom::reparse(original),
    }
}

/// Checks a replacement against its original. Drifted graphic geometry is
/// corrected in place; returns the number of corrected attributes, or `None`
/// when the replacement lacks a substructure the original has.
fn validate(original: &NodeRef, replacement: &NodeRef) -> Option<usize> {
    let mut fixes = 0;

    if let Some(original_radical) = dom::first_descendant_with_class(original, markers::RADICAL) {
        let radical = dom::first_descendant_with_class(replacement, markers::RADICAL)?;
        let original_graphics = dom::select_all(&original_radical, "svg");
        let graphics = dom::select_all(&radical, "svg");
        if graphics.len() < original_graphics.len() {
            return None;
        }
        for (source, copy) in original_graphics.iter().zip(graphics.iter()) {
            for attr in GRAPHIC_GEOMETRY_ATTRS {
                let Some(expected) = dom::get_attr(source, attr) else {
                    continue;
                };
                if dom::get_attr(copy, attr).as_deref() != Some(expected.as_str()) {
                    dom::set_attr(copy, attr, &expected);
                    fixes += 1;
                }
            }
        }
    }

    if dom::first_descendant_with_class(original, markers::EXPONENT).is_some()
        && dom::first_descendant_with_class(replacement, markers::EXPONENT).is_none()
    {
        return None;
    }
    Some(fixes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CloneFault, FakeHost, fixtures};

    fn graphic_attrs(root: &NodeRef) -> Vec<Vec<Option<String>>> {
        dom::select_all(root, ".sqrt svg")
            .iter()
            .map(|svg| {
                GRAPHIC_GEOMETRY_ATTRS
                    .iter()
                    .map(|attr| dom::get_attr(svg, attr))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn dropped_graphic_is_restored_from_the_original() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        host.set_bulk_clone_fault(CloneFault::DropRadicalGraphic);
        let editor = host.editor_root().expect("editor");
        let clone = host.deep_clone(&editor);
        assert!(dom::select_all(&clone, ".sqrt svg").is_empty());

        let report = repair_detached(&host, &editor, &clone);
        assert_eq!(report.candidates, 2);
        assert_eq!(report.repaired, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(graphic_attrs(&clone), graphic_attrs(&editor));
    }

    #[test]
    fn drifted_geometry_is_corrected_in_place() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        host.set_node_clone_fault(Some(CloneFault::DriftViewBox));
        let editor = host.editor_root().expect("editor");
        let clone = dom::deep_clone(&editor);

        let report = repair_detached(&host, &editor, &clone);
        assert_eq!(report.repaired, 2);
        assert_eq!(report.attribute_fixes, 1);
        assert_eq!(report.reparsed, 0);
        assert_eq!(graphic_attrs(&clone), graphic_attrs(&editor));
    }

    #[test]
    fn reparse_fallback_runs_when_reclone_is_lossy() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        host.set_node_clone_fault(Some(CloneFault::DropRadicalGraphic));
        let editor = host.editor_root().expect("editor");
        let clone = dom::deep_clone(&editor);

        let report = repair_detached(&host, &editor, &clone);
        assert_eq!(report.repaired, 2);
        assert_eq!(report.reparsed, 1, "only the radical needed reparsing");
        assert_eq!(graphic_attrs(&clone), graphic_attrs(&editor));
    }

    #[test]
    fn exhausted_strategies_skip_the_node() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        host.set_node_clone_fault(Some(CloneFault::DropRadicalGraphic));
        let editor = host.editor_root().expect("editor");
        let clone = dom::deep_clone(&editor);

        let report = repair_with(
            &host,
            &editor,
            &clone,
            RepairVariant::Detached,
            &[RepairStrategy::RecloneNode],
        );
        assert_eq!(report.candidates, 2);
        assert_eq!(report.repaired, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(dom::select_all(&clone, ".sqrt svg").len(), 1, "node left as it was");
    }

    #[test]
    fn count_mismatch_falls_back_to_text_matching() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        let editor = host.editor_root().expect("editor");
        let clone = dom::deep_clone(&editor);
        let first_math = dom::select_first(&clone, ".katex").expect("math");
        first_math.detach();
        for svg in dom::select_all(&clone, ".sqrt svg") {
            svg.detach();
        }

        let report = repair_detached(&host, &editor, &clone);
        assert_eq!(report.candidates, 2);
        assert_eq!(report.repaired, 2);
        assert_eq!(report.skipped, 0);

        let maths = dom::select_all(&clone, ".katex");
        assert_eq!(maths.len(), 2, "no math node duplicated or lost");
        assert!(dom::select_first(&maths[0], ".sqrt").is_some());
        assert!(dom::select_first(&maths[1], ".msupsub").is_some());
        assert_eq!(dom::select_all(&maths[0], ".sqrt svg").len(), 1);
        assert_eq!(graphic_attrs(&clone), graphic_attrs(&editor));
    }

    #[test]
    fn attached_variant_adopts_spliced_nodes() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        let editor = host.editor_root().expect("editor");
        let doc = dom::parse_document("<!DOCTYPE html><html><head></head><body></body></html>");
        let body = dom::select_first(&doc, "body").expect("body");
        body.append(dom::deep_clone(&editor));

        let report = repair_attached(&host, &editor, &doc);
        assert_eq!(report.repaired, 2);
        assert_eq!(host.adopted_count(), 2);
        assert!(dom::select_all(&doc, ".katex").iter().all(|m| dom::is_within(m, &body)));
    }

    #[test]
    fn math_without_complex_parts_is_ignored() {
        let host = FakeHost::new(fixtures::SIMPLE_MATH);
        let editor = host.editor_root().expect("editor");
        let clone = dom::deep_clone(&editor);
        assert_eq!(repair_detached(&host, &editor, &clone), RepairReport::default());
    }
}
