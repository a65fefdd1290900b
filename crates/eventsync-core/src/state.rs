//! Sync state machine.
//!
//! Both functions here are pure: the orchestrator feeds them the stored
//! cursor, the observed chain head and the provider range limit, and persists
//! whatever they return.
//!
//! ```text
//! DownwardSyncStart ──► DownwardSync ──► DownwardSyncComplete ──► UpwardSyncMax ⇄ UpwardSync
//!        │                                                            ▲
//!        └──────────── (range limit enforced) ──► UpwardSync ─────────┘
//! ```

use crate::cursor::SyncCursor;
use crate::limits::RangeLimit;
use crate::sizing::next_window_size;
use crate::types::{BlockTag, SyncState, SyncWindow};

/// Number of provider ranges an enforced-limit chain starts behind the head.
pub const LIMITED_START_RANGES: u64 = 3;

/// A computed window plus the side effect the orchestrator must persist
/// before fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    pub window: SyncWindow,
    /// Head to record as `sync_start_block` (first downward scan only).
    pub sync_start: Option<u64>,
}

/// Compute the next window for `cursor`. `None` when the head is unknown.
pub fn plan_window(cursor: &SyncCursor, chain_head: u64, limit: RangeLimit) -> Option<WindowPlan> {
    if chain_head == 0 {
        return None;
    }
    let max = limit.max_range.max(1);
    let window_size = match cursor.window_size {
        0 => max,
        ws => limit.cap(ws),
    };
    let last = cursor.last_read_block;
    let mut sync_start = None;

    let (start, end, state) = match cursor.state {
        SyncState::DownwardSyncStart if limit.enforced => (
            chain_head.saturating_sub(max.saturating_mul(LIMITED_START_RANGES)),
            BlockTag::Latest,
            SyncState::UpwardSync,
        ),
        SyncState::DownwardSyncStart => {
            sync_start = Some(chain_head);
            (1, BlockTag::Latest, SyncState::DownwardSyncStart)
        }
        SyncState::DownwardSync => match last.checked_sub(window_size).filter(|s| *s > 0) {
            Some(start) => (start, BlockTag::Number(last), SyncState::DownwardSync),
            None => (1, BlockTag::Number(last), SyncState::DownwardSyncComplete),
        },
        SyncState::DownwardSyncComplete => {
            let resume = match cursor.sync_start_block {
                0 => chain_head,
                block => block,
            };
            let reseeded = SyncCursor {
                state: SyncState::UpwardSyncMax,
                last_read_block: resume,
                ..*cursor
            };
            return plan_window(&reseeded, chain_head, limit);
        }
        SyncState::UpwardSync => {
            if chain_head.saturating_sub(last) < max - 1 {
                (last, BlockTag::Latest, SyncState::UpwardSyncMax)
            } else {
                (last, BlockTag::Number(last.saturating_add(window_size)), SyncState::UpwardSync)
            }
        }
        SyncState::UpwardSyncMax => {
            if limit.enforced && chain_head.saturating_sub(last) >= max {
                // lost state: fell too far behind to query up to latest
                (last, BlockTag::Latest, SyncState::UpwardSync)
            } else {
                (last, BlockTag::Latest, SyncState::UpwardSyncMax)
            }
        }
    };

    let start = start.max(1);
    if start >= chain_head {
        return Some(WindowPlan {
            window: SyncWindow {
                start_block: chain_head.saturating_sub(1).max(1),
                end_block: BlockTag::Latest,
                state: SyncState::UpwardSyncMax,
                upward: true,
                chain_head,
            },
            sync_start,
        });
    }

    let mut end = end;
    if limit.enforced && chain_head - start >= max {
        let capped = start.saturating_add(max - 1);
        end = BlockTag::Number(end.number().map_or(capped, |e| e.min(capped)));
    }
    if let BlockTag::Number(e) = end {
        end = BlockTag::Number(e.clamp(start, chain_head));
    }

    Some(WindowPlan {
        window: SyncWindow {
            start_block: start,
            end_block: end,
            state,
            upward: state.is_upward(),
            chain_head,
        },
        sync_start,
    })
}

/// Cursor to persist after `window` completed with `events_returned` logs.
///
/// Depends only on `prev.sync_start_block` and the window, so committing the
/// same window twice stores the same cursor.
pub fn committed_cursor(
    prev: &SyncCursor,
    window: &SyncWindow,
    events_returned: usize,
    limit: RangeLimit,
) -> SyncCursor {
    let max = limit.max_range.max(1);
    let sized = || limit.cap(next_window_size(window.width(), events_returned, max, window.upward));

    match window.state {
        SyncState::DownwardSyncStart => SyncCursor {
            state: SyncState::UpwardSyncMax,
            last_read_block: window.chain_head,
            window_size: max,
            sync_start_block: match prev.sync_start_block {
                0 => window.chain_head,
                block => block,
            },
        },
        SyncState::UpwardSyncMax => SyncCursor {
            state: SyncState::UpwardSyncMax,
            last_read_block: window.chain_head,
            window_size: max,
            ..*prev
        },
        SyncState::DownwardSyncComplete => SyncCursor {
            state: SyncState::UpwardSyncMax,
            last_read_block: match prev.sync_start_block {
                0 => window.chain_head,
                block => block,
            },
            window_size: max,
            ..*prev
        },
        SyncState::DownwardSync => SyncCursor {
            state: SyncState::DownwardSync,
            last_read_block: window.start_block,
            window_size: sized(),
            ..*prev
        },
        SyncState::UpwardSync => SyncCursor {
            state: SyncState::UpwardSync,
            last_read_block: window.end_block.resolve(window.chain_head),
            window_size: sized(),
            ..*prev
        },
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
