//! Reconciles an explicit page request with the selected worksheet.

/// Pick the 1-based page to render.
///
/// An explicit request always wins when it names an existing page. Otherwise
/// the selected worksheet's ordinal is used, falling back to page 1 when the
/// rendered document has fewer pages than that.
pub fn resolve_page(requested: Option<i64>, best_sheet: u32, total_pages: u32) -> u32 {
    if let Some(page) = requested
        && page >= 1
        && page <= i64::from(total_pages)
    {
        return page as u32;
    }

    if best_sheet > total_pages || best_sheet == 0 {
        1
    } else {
        best_sheet
    }
}
