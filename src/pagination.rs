//! Page indicators for the monitor table.

use maud::{Markup, html};

/// Controls how pages of transactions are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    /// The number of rows per page.
    pub page_size: usize,
    /// The maximum number of numbered pages shown in the indicator.
    pub max_pages: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            max_pages: 5,
        }
    }
}

/// One element of the page indicator.
#[derive(Debug, PartialEq, Eq)]
pub enum PaginationIndicator {
    /// A link to a page.
    Page(u64),
    /// The page being shown.
    CurrPage(u64),
    /// Pages left out of the indicator.
    Ellipsis,
    /// A link to the next page.
    NextButton(u64),
    /// A link to the previous page.
    BackButton(u64),
}

/// Build the indicator for `curr_page` out of `page_count` pages, showing at
/// most `max_pages` numbered pages around the current one.
pub fn create_pagination_indicators(
    curr_page: u64,
    page_count: u64,
    max_pages: u64,
) -> Vec<PaginationIndicator> {
    let half = max_pages / 2;

    let (first, last) = if page_count <= max_pages {
        (1, page_count)
    } else if curr_page <= half {
        (1, max_pages)
    } else if curr_page > page_count - half {
        (page_count - max_pages + 1, page_count)
    } else {
        (curr_page - half, curr_page + half)
    };

    let mut indicators = Vec::new();

    if curr_page > 1 {
        indicators.push(PaginationIndicator::BackButton(curr_page - 1));
    }

    let truncated = page_count > max_pages;

    if truncated && curr_page > half + 1 {
        indicators.push(PaginationIndicator::Page(1));
        indicators.push(PaginationIndicator::Ellipsis);
    }

    indicators.extend((first..=last).map(|page| {
        if page == curr_page {
            PaginationIndicator::CurrPage(page)
        } else {
            PaginationIndicator::Page(page)
        }
    }));

    if truncated && curr_page < page_count - half {
        indicators.push(PaginationIndicator::Ellipsis);
        indicators.push(PaginationIndicator::Page(page_count));
    }

    if curr_page < page_count {
        indicators.push(PaginationIndicator::NextButton(curr_page + 1));
    }

    indicators
}

/// Render the indicator. `page_url` gives the table URL for a page.
pub fn pagination_view(indicators: &[PaginationIndicator], page_url: impl Fn(u64) -> String) -> Markup {
    const LINK: &str = "px-3 py-1 rounded text-blue-600 hover:bg-blue-50 \
        dark:text-blue-400 dark:hover:bg-gray-700";
    const CURRENT: &str = "px-3 py-1 rounded bg-blue-600 text-white font-semibold";

    html! {
        nav aria-label="Paginación" class="flex justify-center"
        {
            ul class="inline-flex items-center gap-1 text-sm"
            {
                @for indicator in indicators {
                    li
                    {
                        @match indicator {
                            PaginationIndicator::Page(page) => {
                                a
                                    href="#"
                                    hx-get=(page_url(*page))
                                    hx-target="#monitor-table"
                                    hx-swap="outerHTML"
                                    class=(LINK)
                                { (page) }
                            }
                            PaginationIndicator::CurrPage(page) => {
                                span aria-current="page" class=(CURRENT) { (page) }
                            }
                            PaginationIndicator::Ellipsis => {
                                span class="px-2 text-gray-500" { "…" }
                            }
                            PaginationIndicator::BackButton(page) => {
                                a
                                    href="#"
                                    hx-get=(page_url(*page))
                                    hx-target="#monitor-table"
                                    hx-swap="outerHTML"
                                    class=(LINK)
                                { "Anterior" }
                            }
                            PaginationIndicator::NextButton(page) => {
                                a
                                    href="#"
                                    hx-get=(page_url(*page))
                                    hx-target="#monitor-table"
                                    hx-swap="outerHTML"
                                    class=(LINK)
                                { "Siguiente" }
                            }
                        }
                    }
                }
            }
        }
    }
}
