//! Pagination arithmetic and the page result shape.

use serde::{Deserialize, Serialize};

/// Default page size shared by the three datasets.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Pages are 1-based; 0 and below clamp to the first page.
pub fn clamp_page(page: u32) -> u32 {
  page.max(1)
}

/// Row offset for a page. Never negative thanks to the clamp.
pub fn offset(page: u32, page_size: u32) -> u64 {
  u64::from(clamp_page(page) - 1) * u64::from(page_size)
}

/// `ceil(total_items / page_size)`.
pub fn total_pages(total_items: u64, page_size: u32) -> u64 {
  total_items.div_ceil(u64::from(page_size.max(1)))
}

/// One page of rows plus the totals callers need to render a pager.
///
/// Computed fresh on every cache miss and replaced wholesale; never mutated
/// in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPage<T> {
  pub rows: Vec<T>,
  pub total_items: u64,
  pub total_pages: u64,
}

impl<T> ResultPage<T> {
  pub fn new(rows: Vec<T>, total_items: u64, page_size: u32) -> Self {
    Self {
      rows,
      total_items,
      total_pages: total_pages(total_items, page_size),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn total_pages_is_ceiling_division() {
    let cases = [(0, 0), (1, 1), (49, 1), (50, 1), (51, 2), (1000, 20)];
    for (items, pages) in cases {
      assert_eq!(total_pages(items, 50), pages, "total_items = {}", items);
    }
  }

  #[test]
  fn offset_is_zero_based_and_never_negative() {
    assert_eq!(offset(0, 50), 0);
    assert_eq!(offset(1, 50), 0);
    assert_eq!(offset(2, 50), 50);
    assert_eq!(offset(21, 50), 1000);
  }

  #[test]
  fn result_page_derives_page_count() {
    let page = ResultPage::new(vec![1, 2, 3], 51, 50);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.total_items, 51);
  }
}
