//! Range-error recovery.
//!
//! When a provider rejects a log query because the block span is too wide,
//! the engine narrows the window and retries immediately instead of failing
//! the cycle.

use crate::cursor::SyncCursor;
use crate::types::{BlockTag, SyncState, SyncWindow};

/// Provider phrasings for state the node no longer keeps. These mention
/// blocks but narrowing the window cannot help.
const PRUNED_STATE_MARKERS: [&str; 3] = ["pruned", "missing trie node", "header not found"];

/// Returns `true` if a provider error message reports a block-range violation.
pub fn is_range_error(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    if PRUNED_STATE_MARKERS.iter().any(|m| message.contains(m)) {
        return false;
    }
    message.contains("block")
        || message.contains("range too large")
        || message.contains("query returned more than")
}

/// Narrow a window the provider rejected as too wide.
pub fn narrow_window(window: &SyncWindow, max_range: u64) -> SyncWindow {
    let max = max_range.max(1);
    let head = window.chain_head;

    if window.upward {
        let start = window.start_block.max(1);
        let width = match window.end_block {
            BlockTag::Latest => max,
            BlockTag::Number(end) => (end.saturating_sub(start) / 2).max(1),
        };
        return SyncWindow {
            start_block: start,
            end_block: BlockTag::Number(start.saturating_add(width)),
            state: SyncState::UpwardSync,
            upward: true,
            chain_head: head,
        };
    }

    let (start, end) = match window.end_block {
        BlockTag::Latest => (head.saturating_sub(max), head),
        BlockTag::Number(end) if window.start_block <= 1 && end > max.saturating_add(1) => {
            (end - max, end)
        }
        BlockTag::Number(end) => (end - end.saturating_sub(window.start_block) / 2, end),
    };
    let end = end.max(1);
    SyncWindow {
        start_block: start.min(end.saturating_sub(1)).max(1),
        end_block: BlockTag::Number(end),
        state: SyncState::DownwardSync,
        upward: false,
        chain_head: head,
    }
}

/// Cursor that makes the next computed window start where `narrowed` does.
pub fn narrowed_cursor(prev: &SyncCursor, narrowed: &SyncWindow) -> SyncCursor {
    let end = narrowed.end_block.resolve(narrowed.chain_head);
    let width = end.saturating_sub(narrowed.start_block).max(1);
    if narrowed.upward {
        SyncCursor {
            state: SyncState::UpwardSync,
            last_read_block: narrowed.start_block,
            window_size: width,
            ..*prev
        }
    } else {
        SyncCursor {
            state: SyncState::DownwardSync,
            last_read_block: end,
            window_size: width,
            ..*prev
        }
    }
}
