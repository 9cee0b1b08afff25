//! Paging and ordering parameters shared by the listing endpoints.

use serde::Deserialize;

pub const MAX_PAGE_SIZE: u32 = 100;
pub const BLOG_PAGE_SIZE: u32 = 10;
pub const COMMENT_PAGE_SIZE: u32 = 20;

/// Raw listing query string. Everything arrives as text so that a bad number
/// falls back to the default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn from_params(params: &ListParams, default_limit: u32) -> Self {
        let page = parse_number(params.page.as_deref()).unwrap_or(1);
        let limit = parse_number(params.limit.as_deref()).unwrap_or(default_limit as i64);
        Self::new(
            page.clamp(1, u32::MAX as i64) as u32,
            limit.clamp(1, MAX_PAGE_SIZE as i64) as u32,
        )
    }

    pub fn offset(&self) -> u64 {
        crate::db::models::Pagination::offset(self.page, self.limit)
    }
}

fn parse_number(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse::<i64>().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// `asc` sorts ascending; anything else, including nothing, is descending.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, limit: Option<&str>) -> ListParams {
        ListParams {
            page: page.map(String::from),
            limit: limit.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_apply_when_missing_or_garbage() {
        assert_eq!(
            PageRequest::from_params(&params(None, None), BLOG_PAGE_SIZE),
            PageRequest { page: 1, limit: 10 }
        );
        assert_eq!(
            PageRequest::from_params(&params(Some("abc"), Some("x")), COMMENT_PAGE_SIZE),
            PageRequest { page: 1, limit: 20 }
        );
    }

    #[test]
    fn values_are_clamped() {
        let req = PageRequest::from_params(&params(Some("-3"), Some("5000")), 10);
        assert_eq!(req, PageRequest { page: 1, limit: 100 });
        let req = PageRequest::from_params(&params(Some("4"), Some("0")), 10);
        assert_eq!(req, PageRequest { page: 4, limit: 1 });
        assert_eq!(req.offset(), 3);
    }

    #[test]
    fn order_is_descending_unless_asc() {
        assert_eq!(SortOrder::parse(Some("asc")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("ASC")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("up")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(None), SortOrder::Desc);
    }
}
