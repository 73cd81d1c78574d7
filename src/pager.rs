/// One page of a filtered sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a, T> {
  pub items: &'a [T],
  /// 1-based page number that was requested.
  pub number: usize,
  pub total_pages: usize,
  pub total_items: usize,
  /// Zero-based index of the first item of this page.
  pub start: usize,
}

impl<T> Page<'_, T> {
  /// 1-based "showing X-Y of N" range, or None when the page is empty.
  #[cfg(test)]
  pub fn showing(&self) -> Option<(usize, usize)> {
    if self.items.is_empty() { None } else { Some((self.start + 1, self.start + self.items.len())) }
  }
}

/// `ceil(len / per_page)`, 0 for an empty sequence.
pub fn total_pages(len: usize, per_page: usize) -> usize {
  if per_page == 0 { 0 } else { len.div_ceil(per_page) }
}

/// Keep a page number within `[1, max(1, total_pages)]`.
pub fn clamp_page(page: usize, total_pages: usize) -> usize {
  page.clamp(1, total_pages.max(1))
}

/// Slice `[(page-1)*per_page, min(page*per_page, len))`. Callers clamp `page` first;
/// an out-of-range page yields an empty slice rather than panicking.
pub fn paginate<T>(items: &[T], per_page: usize, page: usize) -> Page<'_, T> {
  let total_items = items.len();
  let start = page.saturating_sub(1).saturating_mul(per_page).min(total_items);
  let end = start.saturating_add(per_page).min(total_items);
  Page { items: &items[start..end], number: page, total_pages: total_pages(total_items, per_page), total_items, start }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn forty_five_by_twenty() {
    let items: Vec<usize> = (0..45).collect();
    let page = paginate(&items, 20, 3);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.items, &[40, 41, 42, 43, 44]);
    assert_eq!(page.showing(), Some((41, 45)));
  }

  #[test]
  fn empty_sequence_has_no_pages() {
    let items: Vec<u8> = Vec::new();
    let page = paginate(&items, 20, 1);
    assert_eq!(page.total_pages, 0);
    assert!(page.items.is_empty());
    assert_eq!(page.showing(), None);
  }

  #[test]
  fn page_lengths_sum_to_total() {
    for n in [1usize, 19, 20, 21, 99, 100, 101, 250] {
      for per_page in [20usize, 50, 100] {
        let items: Vec<usize> = (0..n).collect();
        let total = total_pages(n, per_page);
        let lengths: Vec<usize> = (1..=total).map(|k| paginate(&items, per_page, k).items.len()).collect();
        assert_eq!(lengths.iter().sum::<usize>(), n);
        let last = *lengths.last().unwrap();
        assert_eq!(last, n - (total - 1) * per_page);
        assert!((1..=per_page).contains(&last));
      }
    }
  }

  #[test]
  fn out_of_range_page_is_empty() {
    let items: Vec<usize> = (0..5).collect();
    assert!(paginate(&items, 20, 4).items.is_empty());
    assert_eq!(paginate(&items, 20, 0).items, &[0, 1, 2, 3, 4]);
  }

  #[test]
  fn clamp_keeps_page_in_bounds() {
    assert_eq!(clamp_page(0, 3), 1);
    assert_eq!(clamp_page(5, 3), 3);
    assert_eq!(clamp_page(2, 3), 2);
    assert_eq!(clamp_page(4, 0), 1);
  }
}
