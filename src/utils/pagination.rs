use crate::error::{Error, Result};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub per_page: i64,
    pub offset: i64,
}

/// Resolves `page`/`per_page` query values into a LIMIT/OFFSET window.
pub fn page_window(page: Option<i64>, per_page: Option<i64>) -> Result<PageWindow> {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let offset = (page - 1)
        .checked_mul(per_page)
        .ok_or_else(|| Error::BadRequest(format!("Page {} is out of range", page)))?;
    Ok(PageWindow {
        page,
        per_page,
        offset,
    })
}
