//! Window-sizing policy.
//!
//! The thresholds below are tuned against real providers; keep them as they
//! are unless a new tuning has been measured.

/// Event count under which the window doubles.
pub const SPARSE_EVENT_THRESHOLD: usize = 1_000;

/// Width of the next window after one that returned `events_returned` logs.
///
/// Upward scans always use `max_range`. Otherwise the previous width is
/// scaled by activity: ×4 when empty, ×2 when sparse, `+max_range` while more
/// than a quarter of the provider budget is still free, unchanged when close
/// to saturation. Never returns less than one block.
pub fn next_window_size(
    previous_width: u64,
    events_returned: usize,
    max_range: u64,
    upward: bool,
) -> u64 {
    if upward {
        return max_range.max(1);
    }

    let headroom = max_range as i128 - events_returned as i128;
    let next = if events_returned == 0 {
        previous_width.saturating_mul(4)
    } else if events_returned < SPARSE_EVENT_THRESHOLD {
        previous_width.saturating_mul(2)
    } else if headroom > (max_range / 4) as i128 {
        previous_width.saturating_add(max_range)
    } else {
        previous_width
    };
    next.max(1)
}
