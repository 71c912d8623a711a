//! Adaptive pagination and stop condition.
//!
//! ```text
//! Fetching ──page──▶ Evaluating ──end_page──▶ Advancing ──page──▶ Evaluating …
//!    │                    │                       │
//!    └──no page──▶ Exhausted                      └──no page──▶ Exhausted
//!                         └──limit──▶ LimitReached
//! ```
//!
//! A page whose skip count reaches the threshold grows the page limit by one,
//! so runs of already-known results do not use up the page budget.

use crate::models::Outcome;

/// When a run stops on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopPolicy {
    /// Stop once this many records were processed (not skipped)
    TargetCount(usize),
    /// Stop after visiting this many pages, extended by noisy pages
    PageLimit(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Fetching,
    Evaluating,
    Advancing,
    Exhausted,
    LimitReached,
}

impl CursorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CursorState::Exhausted | CursorState::LimitReached)
    }

    /// Whether the cursor is waiting for the next page.
    pub fn wants_page(&self) -> bool {
        matches!(self, CursorState::Fetching | CursorState::Advancing)
    }
}

#[derive(Debug, Clone)]
pub struct PageCursor {
    state: CursorState,
    skip_threshold: usize,
    target_count: Option<usize>,
    page_limit: Option<u32>,
    pages_visited: u32,
    page_skips: usize,
    processed: usize,
    extensions: u32,
}

impl PageCursor {
    pub fn new(policy: StopPolicy, skip_threshold: usize) -> Self {
        let (target_count, page_limit) = match policy {
            StopPolicy::TargetCount(target) => (Some(target), None),
            StopPolicy::PageLimit(pages) => (None, Some(pages)),
        };
        Self {
            state: CursorState::Fetching,
            skip_threshold,
            target_count,
            page_limit,
            pages_visited: 0,
            page_skips: 0,
            processed: 0,
            extensions: 0,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn pages_visited(&self) -> u32 {
        self.pages_visited
    }

    /// Current page limit, including extensions. `None` under a target policy.
    pub fn page_limit(&self) -> Option<u32> {
        self.page_limit
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Pages that were not counted against the budget.
    pub fn extensions(&self) -> u32 {
        self.extensions
    }

    /// A page of records arrived.
    pub fn begin_page(&mut self) {
        debug_assert!(self.state.wants_page(), "begin_page in {:?}", self.state);
        self.page_skips = 0;
        self.state = CursorState::Evaluating;
    }

    /// The source has no more pages.
    pub fn exhaust(&mut self) {
        if self.state.wants_page() {
            self.state = CursorState::Exhausted;
        }
    }

    /// Tally one routed record. Returns `false` once the run should stop
    /// taking records from the current page.
    pub fn record(&mut self, outcome: &Outcome) -> bool {
        if outcome.is_skip() {
            self.page_skips += 1;
        } else {
            self.processed += 1;
        }

        if self.target_reached() {
            self.state = CursorState::LimitReached;
            return false;
        }
        true
    }

    /// Close the current page and decide whether to continue.
    pub fn end_page(&mut self) -> CursorState {
        self.pages_visited += 1;
        if self.state == CursorState::LimitReached {
            return self.state;
        }

        if self.page_skips >= self.skip_threshold {
            if let Some(limit) = self.page_limit.as_mut() {
                *limit += 1;
                self.extensions += 1;
                log::info!(
                    "Page {}: {} skips, page limit raised to {}",
                    self.pages_visited,
                    self.page_skips,
                    limit
                );
            }
        }

        let pages_done = self
            .page_limit
            .is_some_and(|limit| self.pages_visited >= limit);
        self.state = if pages_done || self.target_reached() {
            CursorState::LimitReached
        } else {
            CursorState::Advancing
        };
        self.state
    }

    fn target_reached(&self) -> bool {
        self.target_count
            .is_some_and(|target| self.processed >= target)
    }
}
