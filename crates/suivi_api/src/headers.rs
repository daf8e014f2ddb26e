//! Response headers shared by resource handlers: alerts, totals and
//! RFC 5988 pagination links.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use suivi_core::Page;
use url::form_urlencoded;

pub const APPLICATION_NAME: &str = "suiviApp";

pub const ALERT_HEADER: HeaderName = HeaderName::from_static("x-suiviapp-alert");
pub const ERROR_HEADER: HeaderName = HeaderName::from_static("x-suiviapp-error");
pub const PARAMS_HEADER: HeaderName = HeaderName::from_static("x-suiviapp-params");
pub const TOTAL_COUNT_HEADER: HeaderName = HeaderName::from_static("x-total-count");
pub const LINK_HEADER: HeaderName = HeaderName::from_static("link");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    Created,
    Updated,
    Deleted,
}

impl AlertAction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

/// `x-suiviapp-alert: suiviApp.{entity}.{action}` with the id as parameter.
pub fn alert_headers(entity_name: &str, action: AlertAction, param: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let message = format!("{APPLICATION_NAME}.{entity_name}.{}", action.as_str());
    if let Ok(value) = HeaderValue::from_str(&message) {
        headers.insert(ALERT_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(param) {
        headers.insert(PARAMS_HEADER, value);
    }
    headers
}

pub fn total_count_headers(total: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(TOTAL_COUNT_HEADER, HeaderValue::from(total));
    headers
}

/// `x-total-count` plus a `link` header with `next`, `prev`, `last` and
/// `first` relations.
///
/// Links keep every query parameter of the current request except `page`
/// and `size`, which are rewritten per relation.
pub fn pagination_headers<T>(path: &str, params: &[(String, String)], page: &Page<T>) -> HeaderMap {
    let mut headers = total_count_headers(page.total);
    let current = page.pageable.page;
    let size = page.pageable.size;
    let last = u32::try_from(page.total_pages().saturating_sub(1)).unwrap_or(u32::MAX);

    let mut links = Vec::with_capacity(4);
    if current < last {
        links.push(page_link(path, params, current + 1, size, "next"));
    }
    if current > 0 {
        links.push(page_link(path, params, current - 1, size, "prev"));
    }
    links.push(page_link(path, params, last, size, "last"));
    links.push(page_link(path, params, 0, size, "first"));

    if let Ok(value) = HeaderValue::from_str(&links.join(",")) {
        headers.insert(LINK_HEADER, value);
    }
    headers
}

fn page_link(path: &str, params: &[(String, String)], page: u32, size: u32, rel: &str) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        if key != "page" && key != "size" {
            query.append_pair(key, value);
        }
    }
    query.append_pair("page", &page.to_string());
    query.append_pair("size", &size.to_string());
    format!("<{path}?{}>; rel=\"{rel}\"", query.finish())
}
