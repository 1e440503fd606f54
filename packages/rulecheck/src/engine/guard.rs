//! Time-bounded filter evaluation.
//!
//! The `regex` crate matches in linear time, so a single filter cannot hang on
//! catastrophic backtracking. A large subject combined with a large automaton
//! can still take a long time, so filters over big subjects run on a helper
//! thread while the caller waits at most [`EvalOptions::filter_timeout`].
//! Matching cannot be interrupted: an abandoned helper thread finishes in the
//! background and its result is dropped.
//!
//! Abandoned helpers still hold a CPU, so the number of live helpers is
//! capped. Once the cap is reached, guarded filters are reported as timed out
//! without being run until some helpers finish.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::Duration;

use crate::{rules::RegexMatcher, snippet::Match};

use super::EvalOptions;

/// Lower bound on the helper cap, for machines reporting few CPUs.
const MIN_HELPERS: usize = 64;

static HELPERS: LazyLock<Arc<HelperLimit>> = LazyLock::new(|| {
    let cpus = thread::available_parallelism().map_or(1, usize::from);
    Arc::new(HelperLimit::new(MIN_HELPERS.max(cpus * 4)))
});

/// The outcome of evaluating one filter.
#[derive(Debug)]
pub(crate) enum Outcome {
    Matched(Match),
    Missed,
    TimedOut(Duration),
}

impl From<Option<Match>> for Outcome {
    fn from(found: Option<Match>) -> Self {
        match found {
            Some(m) => Outcome::Matched(m),
            None => Outcome::Missed,
        }
    }
}

/// Match `pattern` against `subject`, bounded by the configured timeout.
pub(crate) fn run(pattern: &RegexMatcher, subject: &Arc<str>, options: &EvalOptions) -> Outcome {
    let Some(timeout) = options.filter_timeout else {
        return pattern.first_match(subject).into();
    };
    if subject.len() < options.guard_threshold {
        return pattern.first_match(subject).into();
    }

    let Some(permit) = HelperLimit::acquire(&HELPERS) else {
        tracing::warn!(
            live = HELPERS.live(),
            pattern = %pattern,
            "too many filter threads still running; skipping filter"
        );
        return Outcome::TimedOut(timeout);
    };

    let (tx, rx) = mpsc::channel();
    let worker_pattern = pattern.clone();
    let worker_subject = Arc::clone(subject);
    let spawned = thread::Builder::new()
        .name(String::from("rulecheck-filter"))
        .spawn(move || {
            let _permit = permit;
            // The receiver is gone if the caller already gave up on us.
            tx.send(worker_pattern.first_match(&worker_subject)).ok();
        });

    if let Err(error) = spawned {
        tracing::warn!(?error, "spawn filter thread; evaluating without a timeout");
        return pattern.first_match(subject).into();
    }

    match rx.recv_timeout(timeout) {
        Ok(found) => found.into(),
        Err(RecvTimeoutError::Timeout) => {
            tracing::debug!(live = HELPERS.live(), "abandoned filter thread");
            Outcome::TimedOut(timeout)
        }
        Err(RecvTimeoutError::Disconnected) => {
            tracing::error!(pattern = %pattern, "filter thread exited without a result");
            Outcome::Missed
        }
    }
}

/// Counts live helper threads against a fixed cap.
#[derive(Debug)]
struct HelperLimit {
    live: AtomicUsize,
    max: usize,
}

impl HelperLimit {
    fn new(max: usize) -> Self {
        Self {
            live: AtomicUsize::new(0),
            max,
        }
    }

    fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Reserve a slot, or `None` if `max` helpers are already live.
    fn acquire(limit: &Arc<Self>) -> Option<Permit> {
        limit
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < limit.max).then_some(live + 1)
            })
            .ok()?;
        Some(Permit(Arc::clone(limit)))
    }
}

/// A reserved helper slot, released on drop.
#[derive(Debug)]
struct Permit(Arc<HelperLimit>);

impl Drop for Permit {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq as pretty_assert_eq;

    use super::*;

    #[test]
    fn test_helper_limit_caps_live_permits() {
        let limit = Arc::new(HelperLimit::new(2));

        let first = HelperLimit::acquire(&limit).expect("first permit");
        let second = HelperLimit::acquire(&limit).expect("second permit");
        assert!(HelperLimit::acquire(&limit).is_none());
        pretty_assert_eq!(limit.live(), 2);

        drop(first);
        pretty_assert_eq!(limit.live(), 1);
        let third = HelperLimit::acquire(&limit).expect("slot freed by drop");

        drop(second);
        drop(third);
        pretty_assert_eq!(limit.live(), 0);
    }

    #[test]
    fn test_permit_released_when_helper_finishes() {
        let limit = Arc::new(HelperLimit::new(1));
        let permit = HelperLimit::acquire(&limit).expect("permit");

        thread::spawn(move || drop(permit))
            .join()
            .expect("join helper");
        pretty_assert_eq!(limit.live(), 0);
    }
}
