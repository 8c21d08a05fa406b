//! Pagination coordinator: when to ask for more, how many rows to report, and
//! which phase a list view is in.

use serde::Serialize;

/// Loader flags the coordinator needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageFlags {
    pub loaded: bool,
    pub has_next_page: bool,
    pub is_fetching_next_page: bool,
    pub errored: bool,
}

impl PageFlags {
    /// The only condition under which a next-page request is issued.
    pub fn can_fetch_more(&self) -> bool {
        !self.errored && self.has_next_page && !self.is_fetching_next_page
    }
}

/// Rows the renderer should account for: one placeholder row while more pages exist.
pub fn row_count(filtered: usize, has_next_page: bool) -> usize {
    if has_next_page { filtered + 1 } else { filtered }
}

/// The renderer reached the end of the visible window.
pub fn should_request_more(flags: PageFlags, stop_index: usize, filtered: usize) -> bool {
    flags.loaded && flags.can_fetch_more() && stop_index + 1 >= filtered
}

/// First pages can come back empty after client-side filtering while more exist.
/// The view then fetches on by itself instead of showing "no data".
pub fn should_auto_advance(flags: PageFlags, source_len: usize) -> bool {
    flags.loaded && source_len == 0 && flags.can_fetch_more()
}

/// Whether the view reports itself as loaded.
pub fn view_loaded(flags: PageFlags, source_len: usize) -> bool {
    flags.loaded && !(flags.has_next_page && source_len == 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewPhase {
    Idle,
    Loaded { empty: bool, has_more: bool },
    FetchingMore,
    Error,
}

pub fn phase(flags: PageFlags, source_len: usize) -> ViewPhase {
    if flags.errored {
        ViewPhase::Error
    } else if !flags.loaded {
        ViewPhase::Idle
    } else if flags.is_fetching_next_page {
        ViewPhase::FetchingMore
    } else {
        ViewPhase::Loaded { empty: source_len == 0, has_more: flags.has_next_page }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(loaded: bool, more: bool, fetching: bool) -> PageFlags {
        PageFlags { loaded, has_next_page: more, is_fetching_next_page: fetching, errored: false }
    }

    #[test]
    fn placeholder_row_only_with_more_pages() {
        assert_eq!(row_count(10, true), 11);
        assert_eq!(row_count(10, false), 10);
        assert_eq!(row_count(0, true), 1);
    }

    #[test]
    fn empty_first_page_advances_and_reports_not_loaded() {
        let f = flags(true, true, false);
        assert!(should_auto_advance(f, 0));
        assert!(!view_loaded(f, 0));
        assert_eq!(phase(f, 0), ViewPhase::Loaded { empty: true, has_more: true });
        assert!(!should_auto_advance(flags(true, true, true), 0));
        assert!(!should_auto_advance(flags(true, false, false), 0));
        assert!(view_loaded(flags(true, false, false), 0));
    }

    #[test]
    fn end_of_window_requests_more_once() {
        assert!(should_request_more(flags(true, true, false), 9, 10));
        assert!(!should_request_more(flags(true, true, false), 5, 10));
        assert!(!should_request_more(flags(true, true, true), 9, 10));
        let mut err = flags(true, true, false);
        err.errored = true;
        assert!(!should_request_more(err, 9, 10));
        assert_eq!(phase(err, 3), ViewPhase::Error);
    }
}
