use kuchiki::NodeRef;

use crate::cancel::CancelToken;
use crate::dom::{self, markers};
use crate::host::Host;
use crate::mode::{ModeRef, PrintMode};
use crate::retry::{Attempt, RetryPolicy, retry_until};
use crate::status::StatusBoard;

/// Whether the sections visible under `editor` agree with `mode`. A section
/// type with no nodes at all always agrees.
pub fn sections_match<H: Host + ?Sized>(host: &H, editor: &NodeRef, mode: PrintMode) -> bool {
    let check = |class: &str, expected: bool| {
        let sections = dom::descendants_with_class(editor, class);
        let visible = sections
            .iter()
            .filter(|section| !host.computed_style(section).is_hidden())
            .count();
        if expected {
            visible > 0 || sections.is_empty()
        } else {
            visible == 0
        }
    };
    check(markers::ANSWER_SECTION, mode.shows_answers())
        && check(markers::SOLUTION_SECTION, mode.shows_solutions())
}

/// Polls until the live surface shows what `requested` needs.
///
/// Returns `false` without further polling when `token` is cancelled, and
/// cancels `token` itself when `mode_ref` has moved away from `requested`.
/// Running out of attempts also yields `false`; callers continue anyway.
pub async fn await_ready<H: Host + ?Sized>(
    host: &H,
    mode_ref: &ModeRef,
    requested: PrintMode,
    token: &CancelToken,
    policy: RetryPolicy,
    status: &StatusBoard,
) -> bool {
    retry_until(policy, |attempt| {
        if token.is_cancelled() {
            return Attempt::Abort;
        }
        if mode_ref.get() != requested {
            log::debug!(
                "print mode changed from {requested} to {} while waiting; cancelling",
                mode_ref.get()
            );
            token.cancel();
            return Attempt::Abort;
        }
        if host
            .editor_root()
            .is_some_and(|editor| sections_match(host, &editor, requested))
        {
            return Attempt::Done;
        }
        status.progress(format!(
            "checking component state ({attempt}/{})",
            policy.max_attempts
        ));
        Attempt::Retry
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHost, fixtures};
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(20, 100)
    }

    #[tokio::test(start_paused = true)]
    async fn ready_when_sections_match_mode() {
        let host = FakeHost::new(fixtures::QUESTION_WITH_SECTIONS);
        host.show_sections_for(PrintMode::WithAnswer);
        let mode = ModeRef::new(PrintMode::WithAnswer);
        let token = CancelToken::new();
        let status = StatusBoard::new();
        assert!(await_ready(&host, &mode, PrintMode::WithAnswer, &token, policy(), &status).await);
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_section_types_count_as_satisfied() {
        let host = FakeHost::new(fixtures::MIXED_MATH);
        let mode = ModeRef::new(PrintMode::WithAll);
        let token = CancelToken::new();
        let status = StatusBoard::new();
        assert!(await_ready(&host, &mode, PrintMode::WithAll, &token, policy(), &status).await);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_false_and_reports_progress() {
        let host = FakeHost::new(fixtures::QUESTION_WITH_SECTIONS);
        host.show_sections_for(PrintMode::QuestionOnly);
        let mode = ModeRef::new(PrintMode::WithSolution);
        let token = CancelToken::new();
        let status = StatusBoard::new();
        let started = tokio::time::Instant::now();
        assert!(!await_ready(&host, &mode, PrintMode::WithSolution, &token, policy(), &status).await);
        assert!(started.elapsed() >= Duration::from_millis(1900));
        assert!(!token.is_cancelled(), "timeouts do not cancel");
        assert_eq!(status.snapshot().message, "checking component state (20/20)");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_stops_immediately() {
        let host = FakeHost::new(fixtures::QUESTION_WITH_SECTIONS);
        let mode = ModeRef::new(PrintMode::WithAnswer);
        let token = CancelToken::new();
        token.cancel();
        let status = StatusBoard::new();
        let started = tokio::time::Instant::now();
        assert!(!await_ready(&host, &mode, PrintMode::WithAnswer, &token, policy(), &status).await);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn mode_flip_mid_poll_cancels_the_token() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let host = FakeHost::new(fixtures::QUESTION_WITH_SECTIONS);
                host.show_sections_for(PrintMode::QuestionOnly);
                let mode = ModeRef::new(PrintMode::WithAnswer);
                let token = CancelToken::new();
                let status = StatusBoard::new();

                let flipper = mode.clone();
                tokio::task::spawn_local(async move {
                    tokio::time::sleep(Duration::from_millis(250)).await;
                    flipper.set(PrintMode::WithSolution);
                });

                let started = tokio::time::Instant::now();
                let ready =
                    await_ready(&host, &mode, PrintMode::WithAnswer, &token, policy(), &status)
                        .await;
                assert!(!ready);
                assert!(token.is_cancelled());
                assert!(started.elapsed() < Duration::from_millis(500));
            })
            .await;
    }
}
