use serde::{Deserialize, Serialize};

/// Authorization tiers the core is aware of. Enforcement happens in the
/// calling layer; services only use the role for attribution and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "user" => Some(UserRole::User),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationParams {
    pub page: u32,
    pub per_page: u32,
}

/// Server-side ceiling on page size, regardless of what the caller asks for.
pub const MAX_PER_PAGE: u32 = 100;

impl PaginationParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }.clamped()
    }

    /// Clamp page to at least 1 and per_page to [1, MAX_PER_PAGE].
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        ((self.page - 1) * self.per_page) as i64
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

/// Paginated result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, params: PaginationParams) -> Self {
        let total_pages = (total as f64 / params.per_page as f64).ceil() as u32;
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamp() {
        let params = PaginationParams::new(0, 10_000);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, MAX_PER_PAGE);

        let params = PaginationParams::new(3, 25);
        assert_eq!(params.offset(), 50);
    }

    #[test]
    fn test_paginated_result_page_count() {
        let result = PaginatedResult::new(vec![1, 2, 3], 41, PaginationParams::new(1, 20));
        assert_eq!(result.total_pages, 3);
        assert_eq!(result.total, 41);
    }
}
