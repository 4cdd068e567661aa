//! Success envelope and pagination query.

use axum::Json;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use validator::Validate;
use vellum_core::repository::{PaginatedResult, Pagination};

const DEFAULT_LIMIT: u64 = 20;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

impl PageInfo {
    fn of<T>(result: &PaginatedResult<T>) -> Self {
        let limit = result.limit.max(1);
        Self {
            page: result.offset / limit + 1,
            limit,
            total: result.total,
            pages: result.total.div_ceil(limit),
        }
    }
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        status: "success",
        data,
        pagination: None,
    })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}

pub fn paginated<T: Serialize>(result: PaginatedResult<T>) -> Json<ApiResponse<Vec<T>>> {
    let info = PageInfo::of(&result);
    Json(ApiResponse {
        status: "success",
        data: result.items,
        pagination: Some(info),
    })
}

/// `{"message": ...}` payload for actions with nothing else to return.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

pub fn message(message: &'static str) -> Json<ApiResponse<Message>> {
    ok(Message { message })
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PageQuery {
    #[validate(range(min = 1, max = 1_000_000, message = "page must be between 1 and 1000000"))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<u64>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::page(self.page.unwrap_or(1), self.limit.unwrap_or(DEFAULT_LIMIT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_info_rounds_pages_up() {
        let result = PaginatedResult {
            items: vec![(); 20],
            total: 41,
            offset: 20,
            limit: 20,
        };
        assert_eq!(
            PageInfo::of(&result),
            PageInfo {
                page: 2,
                limit: 20,
                total: 41,
                pages: 3
            }
        );
    }

    #[test]
    fn empty_result_has_no_pages() {
        let result: PaginatedResult<()> = PaginatedResult {
            items: vec![],
            total: 0,
            offset: 0,
            limit: 20,
        };
        assert_eq!(PageInfo::of(&result).pages, 0);
    }

    #[test]
    fn page_query_defaults_and_bounds() {
        let p = PageQuery::default().pagination();
        assert_eq!((p.offset, p.limit), (0, 20));

        let over = PageQuery {
            page: Some(1),
            limit: Some(101),
        };
        assert!(over.validate().is_err());

        let zero = PageQuery {
            page: Some(0),
            limit: None,
        };
        assert!(zero.validate().is_err());

        let huge = PageQuery {
            page: Some(u64::MAX),
            limit: Some(100),
        };
        assert!(huge.validate().is_err());
    }
}
