use kuchiki::NodeRef;

use crate::dom::{self, markers};
use crate::host::Host;
use crate::perf::{PerfLogger, SpanTimer};
use crate::repair::{self, RepairReport};
use crate::retry::{RetryPolicy, retry};

const LIVE_ROOT_CLASSES: [&str; 2] = ["continuous-editor", "block-editor-container"];
const SCOPED_ATTR_PREFIX: &str = "data-v-";

#[derive(Debug, Clone)]
pub struct ClonedEditor {
    pub root: NodeRef,
    pub repair: RepairReport,
}

pub fn math_rendered(root: &NodeRef) -> bool {
    dom::descendants_with_class(root, markers::MATH)
        .iter()
        .all(|math| {
            dom::first_descendant_with_class(math, markers::MATH_HTML)
                .is_some_and(|html| !dom::inner_html(&html).trim().is_empty())
        })
}

/// Waits until math under `root` has rendered. Gives up quietly after the
/// policy runs out; returns whether rendering finished.
pub async fn settle_wait(root: &NodeRef, policy: RetryPolicy) -> bool {
    let settled = retry(policy, || math_rendered(root)).await;
    if !settled {
        log::debug!("math rendering did not settle; cloning anyway");
    }
    settled
}

pub async fn clone_editor<H: Host + ?Sized>(
    host: &H,
    editor: Option<&NodeRef>,
    settle: RetryPolicy,
    perf: Option<&PerfLogger>,
) -> Option<ClonedEditor> {
    let editor = editor?;
    settle_wait(editor, settle).await;
    let root = host.deep_clone(editor);
    let span = SpanTimer::start(perf, "repair.detached", None);
    let repair = repair::repair_detached(host, editor, &root);
    span.finish();
    strip_affordances(&root);
    Some(ClonedEditor { root, repair })
}

pub fn strip_affordances(root: &NodeRef) {
    for class in LIVE_ROOT_CLASSES {
        dom::remove_class(root, class);
    }
    for toolbar in markers::TOOLBARS
        .iter()
        .flat_map(|class| dom::descendants_with_class(root, class))
    {
        toolbar.detach();
    }
    let authoring_selector = format!("[{}]", markers::AUTHORING_ONLY_ATTR);
    for node in dom::select_all(root, &authoring_selector) {
        if node != *root {
            node.detach();
        }
    }
    for node in root.inclusive_descendants() {
        if node.as_element().is_none() {
            continue;
        }
        dom::remove_attr(&node, "contenteditable");
        dom::remove_attrs_with_prefix(&node, SCOPED_ATTR_PREFIX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CloneFault, FakeHost, fixtures};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn missing_editor_yields_nothing() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        assert!(clone_editor(&host, None, RetryPolicy::new(2, 100), None).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn clone_is_stripped_and_source_untouched() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        let editor = host.editor_root().expect("editor");
        let before = dom::outer_html(&editor);

        let cloned = clone_editor(&host, Some(&editor), RetryPolicy::new(2, 100), None)
            .await
            .expect("clone");
        assert_eq!(dom::outer_html(&editor), before);

        let root = &cloned.root;
        assert!(!dom::has_class(root, "continuous-editor"));
        assert!(dom::select_first(root, "[contenteditable]").is_none());
        assert!(dom::select_first(root, ".question-toolbar").is_none());
        assert!(dom::select_first(root, ".section-toolbar").is_none());
        assert!(dom::select_first(root, "[data-authoring-only]").is_none());
        assert!(!dom::outer_html(root).contains("data-v-"));
        assert_eq!(dom::select_all(root, ".katex").len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn lossy_bulk_clone_is_repaired() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        host.set_bulk_clone_fault(CloneFault::DropRadicalGraphic);
        let editor = host.editor_root().expect("editor");
        let cloned = clone_editor(&host, Some(&editor), RetryPolicy::new(2, 100), None)
            .await
            .expect("clone");
        assert_eq!(cloned.repair.repaired, 2);
        assert_eq!(dom::select_all(&cloned.root, ".sqrt svg").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn settle_wait_rechecks_once_after_interval() {
        let host = FakeHost::new(fixtures::UNRENDERED_MATH);
        let editor = host.editor_root().expect("editor");
        assert!(!math_rendered(&editor));

        let started = tokio::time::Instant::now();
        assert!(!settle_wait(&editor, RetryPolicy::new(2, 100)).await);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(100));
        assert!(waited < Duration::from_millis(200));

        let started = tokio::time::Instant::now();
        let rendered = FakeHost::new(fixtures::MIXED_MATH);
        let editor = rendered.editor_root().expect("editor");
        assert!(settle_wait(&editor, RetryPolicy::new(2, 100)).await);
        assert!(started.elapsed() < Duration::from_millis(1));
    }
}
