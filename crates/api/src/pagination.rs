pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Clamp pagination params to (effective_page, effective_page_size).
pub fn effective(page: Option<u32>, page_size: Option<u32>) -> (u32, u32) {
	let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
	let page = page.unwrap_or(1).max(1);
	(page, page_size)
}
