//! 结果展示的固定大小分页

pub const ITEMS_PER_PAGE: usize = 10;

/// `len` 条数据所需的页数；没有数据时为零
pub fn total_pages(len: usize, per_page: usize) -> usize {
    if per_page == 0 {
        0
    } else {
        len.div_ceil(per_page)
    }
}

/// 第 `page` 页（从1开始）的数据。第0页视为第1页；
/// 超出末尾的页为空
pub fn paginate<T>(items: &[T], page: usize, per_page: usize) -> &[T] {
    let start = page.saturating_sub(1).saturating_mul(per_page);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(per_page).min(items.len());
    &items[start..end]
}
