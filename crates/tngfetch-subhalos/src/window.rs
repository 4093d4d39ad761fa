//! Offset/limit windows over a paginated collection

/// One `?limit=..&offset=..` slice of the remote collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// Position in dispatch order
    pub index: usize,
    pub offset: u64,
    pub limit: u64,
    pub url: String,
}

impl Window {
    /// Exclusive end of the requested range (may pass the collection end).
    pub fn end(&self) -> u64 {
        self.offset + self.limit
    }

    /// Short name for logs and bars.
    pub fn label(&self) -> String {
        format!("window {} [{}..{})", self.index, self.offset, self.end())
    }
}

/// Number of windows needed to cover `total` records.
pub fn window_count(total: u64, group_size: u64) -> u64 {
    total.div_ceil(group_size)
}

/// Split `[0, total)` into fixed-size windows over `collection_url`.
///
/// Every window requests `group_size` records; the server truncates the last
/// one. Panics if `group_size` is zero (rejected earlier by `Config::validate`).
pub fn plan_windows(total: u64, group_size: u64, collection_url: &str) -> Vec<Window> {
    assert!(group_size > 0, "group_size must be positive");
    let sep = if collection_url.contains('?') { '&' } else { '?' };
    (0..window_count(total, group_size))
        .map(|i| {
            let offset = i * group_size;
            Window {
                index: i as usize,
                offset,
                limit: group_size,
                url: format!("{collection_url}{sep}limit={group_size}&offset={offset}"),
            }
        })
        .collect()
}
