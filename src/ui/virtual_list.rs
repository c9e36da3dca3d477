//! Windowing math for long lists.
//!
//! Only the rows inside (or just around) the viewport are rendered. Heights
//! are in whatever unit the caller scrolls in: terminal rows for the list
//! views, but nothing here assumes that.

/// The slice of a list that has to be rendered for one scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualWindow {
  /// First rendered index
  pub start_index: usize,
  /// Last rendered index (inclusive)
  pub end_index: usize,
  /// Height of the whole list
  pub total_height: usize,
  /// Offset of `start_index` from the top of the list
  pub offset_y: usize,
}

impl VirtualWindow {
  pub fn range(&self) -> std::ops::RangeInclusive<usize> {
    self.start_index..=self.end_index
  }
}

/// Compute the rendered window, padded by `overscan` rows on each side.
///
/// Returns `None` for an empty list or a zero item height.
pub fn compute_window(
  scroll_top: usize,
  item_height: usize,
  container_height: usize,
  overscan: usize,
  len: usize,
) -> Option<VirtualWindow> {
  if len == 0 || item_height == 0 {
    return None;
  }

  let last = len - 1;
  let first_visible = scroll_top / item_height;
  let last_visible = (scroll_top + container_height).div_ceil(item_height);

  let start_index = first_visible.saturating_sub(overscan).min(last);
  let end_index = (last_visible + overscan).min(last);

  Some(VirtualWindow {
    start_index,
    end_index,
    total_height: len * item_height,
    offset_y: start_index * item_height,
  })
}

/// Scroll state for a virtualized list.
///
/// The only state is the scroll offset; geometry is fixed at construction
/// and resized as the viewport changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualScroll {
  scroll_top: usize,
  item_height: usize,
  container_height: usize,
  overscan: usize,
}

impl Default for VirtualScroll {
  fn default() -> Self {
    Self::new(1, 0, 5)
  }
}

impl VirtualScroll {
  pub fn new(item_height: usize, container_height: usize, overscan: usize) -> Self {
    Self {
      scroll_top: 0,
      item_height: item_height.max(1),
      container_height,
      overscan,
    }
  }

  pub fn scroll_top(&self) -> usize {
    self.scroll_top
  }

  pub fn container_height(&self) -> usize {
    self.container_height
  }

  pub fn set_container_height(&mut self, height: usize) {
    self.container_height = height;
  }

  /// Jump to an offset, clamped so the last page stays full.
  pub fn scroll_to(&mut self, scroll_top: usize, len: usize) {
    let max = (len * self.item_height).saturating_sub(self.container_height);
    self.scroll_top = scroll_top.min(max);
  }

  /// Scroll the minimum amount needed for `index` to be fully visible.
  pub fn ensure_visible(&mut self, index: usize, len: usize) {
    let top = index * self.item_height;
    let bottom = top + self.item_height;
    if top < self.scroll_top {
      self.scroll_to(top, len);
    } else if bottom > self.scroll_top + self.container_height {
      self.scroll_to(bottom.saturating_sub(self.container_height), len);
    }
  }

  pub fn window(&self, len: usize) -> Option<VirtualWindow> {
    compute_window(
      self.scroll_top,
      self.item_height,
      self.container_height,
      self.overscan,
      len,
    )
  }
}
