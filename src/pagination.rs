//! Pagination renderer
//!
//! Pure page arithmetic for the equipment and request listings. Out-of-range
//! page requests clamp silently; an empty sequence still yields one (empty)
//! page so a listing always has something to render.

use crate::events::ActionToken;
use crate::notifier::Button;

/// Result of paginating a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Start of the visible slice
    pub offset: usize,
    /// End of the visible slice (exclusive)
    pub end: usize,
    /// Clamped zero-based page index
    pub page: usize,
    /// Total pages, at least 1
    pub total_pages: usize,
    /// A previous page exists
    pub has_prev: bool,
    /// A next page exists
    pub has_next: bool,
}

/// Compute the visible window for `len` items at `page`.
pub fn paginate(len: usize, page: usize, page_size: usize) -> Page {
    let page_size = page_size.max(1);
    let total_pages = (len.div_ceil(page_size)).max(1);
    let page = page.min(total_pages - 1);
    let offset = page * page_size;
    let end = (offset + page_size).min(len);
    Page {
        offset,
        end,
        page,
        total_pages,
        has_prev: page > 0,
        has_next: page + 1 < total_pages,
    }
}

/// Paginate a slice, returning the visible window alongside the page data.
pub fn render<T>(items: &[T], page: usize, page_size: usize) -> (&[T], Page) {
    let p = paginate(items.len(), page, page_size);
    (&items[p.offset..p.end], p)
}

/// Navigation buttons for a page: prev and next when they exist, plus a
/// close button. `goto` builds the token that targets a page index.
pub fn nav_buttons(page: &Page, goto: impl Fn(usize) -> ActionToken) -> Vec<Button> {
    let mut row = Vec::new();
    if page.has_prev {
        row.push(Button::new("◀", goto(page.page - 1)));
    }
    if page.has_next {
        row.push(Button::new("▶", goto(page.page + 1)));
    }
    row.push(Button::new("✖ Close", ActionToken::CloseView));
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sequence_yields_one_empty_page() {
        let items: Vec<i32> = vec![];
        let (slice, page) = render(&items, 0, 10);
        assert!(slice.is_empty());
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_prev);
        assert!(!page.has_next);
    }

    #[test]
    fn test_out_of_range_page_clamps_to_last() {
        let items: Vec<i32> = (0..25).collect();
        let (slice, page) = render(&items, 5, 10);
        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(slice, &[20, 21, 22, 23, 24]);
        assert!(page.has_prev);
        assert!(!page.has_next);
    }

    #[test]
    fn test_exact_multiple_has_no_phantom_page() {
        let page = paginate(20, 1, 10);
        assert_eq!(page.total_pages, 2);
        assert_eq!((page.offset, page.end), (10, 20));
        assert!(page.has_prev);
        assert!(!page.has_next);
    }

    #[test]
    fn test_middle_page_has_both_directions() {
        let page = paginate(25, 1, 10);
        assert!(page.has_prev);
        assert!(page.has_next);
        assert_eq!((page.offset, page.end), (10, 20));
    }

    #[test]
    fn test_zero_page_size_treated_as_one() {
        let page = paginate(3, 0, 0);
        assert_eq!(page.total_pages, 3);
        assert_eq!((page.offset, page.end), (0, 1));
    }

    #[test]
    fn test_nav_buttons_match_page_shape() {
        let page = paginate(25, 1, 10);
        let row = nav_buttons(&page, ActionToken::EquipPage);
        assert_eq!(row.len(), 3);
        assert_eq!(row[0].token, ActionToken::EquipPage(0));
        assert_eq!(row[1].token, ActionToken::EquipPage(2));
        assert_eq!(row[2].token, ActionToken::CloseView);

        let first = paginate(25, 0, 10);
        let row = nav_buttons(&first, ActionToken::EquipPage);
        assert_eq!(row.len(), 2, "no prev on the first page");
    }
}
