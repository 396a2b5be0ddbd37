//! Offset/limit paging over collection endpoints.

use std::future::Future;

use tracing::debug;

use crate::models::Page;

/// Walk a collection endpoint and return every item in API order.
///
/// `fetch(offset, limit)` is called from offset 0. Stops on the first page
/// shorter than `page_size` (which includes an empty page). Otherwise the
/// offset advances by the number of items actually received, so a server that
/// returns more than requested is not read twice.
pub async fn collect_all<T, E, F, Fut>(page_size: u32, mut fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut items = Vec::new();
    let mut offset = 0u32;

    loop {
        let page = fetch(offset, page_size).await?;
        let received = page.items.len();
        debug!("Page at offset {}: {} items", offset, received);

        items.extend(page.items);

        if received == 0 || received < page_size as usize {
            break;
        }
        offset += received as u32;
    }

    Ok(items)
}

/// Search page by page until `find` picks a result from a page.
///
/// Unlike [`collect_all`], a short page does not end the search: only an
/// empty page does. Returns `Ok(None)` once the collection is exhausted.
pub async fn search_pages<T, R, E, F, Fut, M>(
    page_size: u32,
    mut fetch: F,
    mut find: M,
) -> Result<Option<R>, E>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
    M: FnMut(&[T]) -> Option<R>,
{
    let mut offset = 0u32;

    loop {
        let page = fetch(offset, page_size).await?;
        if let Some(found) = find(&page.items) {
            return Ok(Some(found));
        }
        if page.items.is_empty() {
            return Ok(None);
        }
        offset += page.items.len() as u32;
    }
}
