//! Visible window over the (possibly filtered) record set.

use serde::{Deserialize, Serialize};
use std::ops::Range;

pub const DEFAULT_VISIBLE_AREA_SIZE: u64 = 20;

/// Invariant: `visible_area_size >= 1` and
/// `visible_area_top <= max(0, num_records - visible_area_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub visible_area_top: u64,
    pub visible_area_size: u64,
    pub num_records: u64,
}

impl Default for Paging {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBLE_AREA_SIZE)
    }
}

/// Partial paging change. `visible_area_top` is signed so callers can scroll
/// past the top and rely on clamping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingUpdate {
    pub visible_area_top: Option<i64>,
    pub visible_area_size: Option<u64>,
    pub num_records: Option<u64>,
}

impl PagingUpdate {
    pub fn top(top: i64) -> Self {
        Self {
            visible_area_top: Some(top),
            ..Default::default()
        }
    }

    pub fn size(size: u64) -> Self {
        Self {
            visible_area_size: Some(size),
            ..Default::default()
        }
    }

    pub fn records(num_records: u64) -> Self {
        Self {
            num_records: Some(num_records),
            ..Default::default()
        }
    }
}

/// Flags for `set_paging`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagingOptions {
    /// Keep the active update draft instead of clearing it.
    pub preserve_draft: bool,
    /// Only update the paging state, do not fetch the new window.
    pub skip_reload: bool,
}

impl Paging {
    pub fn new(visible_area_size: u64) -> Self {
        Self {
            visible_area_top: 0,
            visible_area_size: visible_area_size.max(1),
            num_records: 0,
        }
    }

    pub fn max_top(&self) -> u64 {
        self.num_records.saturating_sub(self.visible_area_size)
    }

    /// Apply `update` and clamp the result.
    pub fn merged(&self, update: PagingUpdate) -> Paging {
        let size = update
            .visible_area_size
            .unwrap_or(self.visible_area_size)
            .max(1);
        let num_records = update.num_records.unwrap_or(self.num_records);
        let top = match update.visible_area_top {
            Some(top) => top.max(0) as u64,
            None => self.visible_area_top,
        };
        Paging {
            visible_area_top: top,
            visible_area_size: size,
            num_records,
        }
        .clamped()
    }

    pub fn clamped(self) -> Paging {
        let size = self.visible_area_size.max(1);
        let max_top = self.num_records.saturating_sub(size);
        Paging {
            visible_area_top: self.visible_area_top.min(max_top),
            visible_area_size: size,
            num_records: self.num_records,
        }
    }

    /// Absolute row indices currently on screen.
    pub fn visible_range(&self) -> Range<u64> {
        let end = self
            .visible_area_top
            .saturating_add(self.visible_area_size)
            .min(self.num_records);
        self.visible_area_top..end.max(self.visible_area_top)
    }

    pub fn is_visible(&self, row: u64) -> bool {
        self.visible_range().contains(&row)
    }

    /// Top that brings `row` into view with the smallest shift, or `None` if
    /// it is already visible.
    pub fn top_to_reveal(&self, row: u64) -> Option<u64> {
        if row < self.visible_area_top {
            Some(row)
        } else if row >= self.visible_area_top + self.visible_area_size {
            Some(row + 1 - self.visible_area_size)
        } else {
            None
        }
    }

    pub fn last_row(&self) -> Option<u64> {
        self.num_records.checked_sub(1)
    }
}
