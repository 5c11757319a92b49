use crate::db::Database;
use crate::error::Result;
use crate::types::{ListTradersOptions, SortField, SortOrder, Trader};

pub const PAGE_SIZE: i64 = 20;

/// `ceil(total / page_size)`, never less than one.
pub fn total_pages(total: i64, page_size: i64) -> i64 {
    if total <= 0 || page_size <= 0 {
        return 1;
    }
    ((total + page_size - 1) / page_size).max(1)
}

/// Sort and page position of the leaderboard.
///
/// Every change here is meant to be followed by a fresh read from the store
/// through [`Ranking::options`]; cached rows are never re-sorted in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranking {
    pub field: SortField,
    pub order: SortOrder,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

impl Default for Ranking {
    fn default() -> Self {
        Self {
            field: SortField::ProfitLoss,
            order: SortOrder::Desc,
            page: 0,
            page_size: PAGE_SIZE,
            total: 0,
        }
    }
}

impl Ranking {
    /// Same field flips the order; a different field starts descending.
    /// Either way the view returns to the first page.
    pub fn select_sort(&mut self, field: SortField) {
        if self.field == field {
            self.order = self.order.flipped();
        } else {
            self.field = field;
            self.order = SortOrder::Desc;
        }
        self.page = 0;
    }

    pub fn total_pages(&self) -> i64 {
        total_pages(self.total, self.page_size)
    }

    /// Returns false when already on the last page.
    pub fn next_page(&mut self) -> bool {
        if self.page + 1 < self.total_pages() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Record a new total and pull the page back in range if it shrank.
    pub fn set_total(&mut self, total: i64) {
        self.total = total.max(0);
        self.page = self.page.min(self.total_pages() - 1).max(0);
    }

    pub fn options(&self) -> ListTradersOptions {
        ListTradersOptions {
            sort_by: self.field,
            order: self.order,
            limit: Some(self.page_size),
            offset: self.page * self.page_size,
        }
    }

    /// `Sorted by: P&L ↓ | Page 1/3 | Total: 42 traders`
    pub fn header(&self) -> String {
        format!(
            "Sorted by: {} {} | Page {}/{} | Total: {} traders",
            self.field.label(),
            self.order.arrow(),
            self.page + 1,
            self.total_pages(),
            self.total,
        )
    }

    /// 1-based rank of the row at `index` on the current page.
    pub fn rank_of(&self, index: usize) -> i64 {
        self.page * self.page_size + index as i64 + 1
    }
}

/// One page of the leaderboard plus the current total.
pub async fn load_page(db: &Database, ranking: &Ranking) -> Result<(Vec<Trader>, i64)> {
    let total = db.count_traders().await?;
    let traders = db.list_traders_with_options(&ranking.options()).await?;
    Ok((traders, total))
}
