use roster_types::api::PageMeta;

pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_SKIP: u32 = 0;

/// Build the list-endpoint pagination metadata.
///
/// A `next` link exists only when the page came back full — a short page
/// means the collection is exhausted. A `previous` link exists whenever a
/// full step back stays at or above zero.
pub fn page_meta(base_url: &str, limit: u32, skip: u32, returned: usize) -> PageMeta {
    let next = if returned as u32 == limit {
        Some(format!(
            "{}?limit={}&skip={}",
            base_url,
            limit,
            skip + limit
        ))
    } else {
        None
    };

    let previous = if skip >= limit {
        Some(format!(
            "{}?limit={}&skip={}",
            base_url,
            limit,
            skip - limit
        ))
    } else {
        None
    };

    PageMeta {
        limit,
        skip,
        next,
        previous,
    }
}
