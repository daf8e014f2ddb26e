//! Pagination and sorting parameters for list and search use-cases.
//!
//! # Responsibility
//! - Parse `page`, `size` and repeated `sort=field,dir` query parameters.
//! - Render a validated `ORDER BY` clause for one entity table.
//!
//! # Invariants
//! - Sort keys are restricted to `id` and the entity's declared columns.
//! - `id ASC` is always appended as the final tie-breaker.

use crate::model::Entity;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 2000;

pub type PageResult<T> = Result<T, PageError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    InvalidNumber { param: &'static str, value: String },
    UnknownSortField(String),
}

impl Display for PageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { param, value } => {
                write!(f, "`{param}` must be a non-negative integer, got `{value}`")
            }
            Self::UnknownSortField(field) => write!(f, "unknown sort property `{field}`"),
        }
    }
}

impl Error for PageError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub field: String,
    pub direction: Direction,
}

/// Requested page window and ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pageable {
    /// Zero-based page index.
    pub page: u32,
    /// Page size in `1..=MAX_PAGE_SIZE`; zero falls back to
    /// [`DEFAULT_PAGE_SIZE`].
    pub size: u32,
    pub sort: Vec<SortOrder>,
}

impl Default for Pageable {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: Vec::new(),
        }
    }
}

fn clamp_size(size: u32) -> u32 {
    if size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        size.min(MAX_PAGE_SIZE)
    }
}

impl Pageable {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: clamp_size(size),
            sort: Vec::new(),
        }
    }

    /// Builds a pageable from raw query pairs, ignoring unrelated keys.
    ///
    /// `sort` accepts `field`, `field,dir` and `a,b,dir` (direction shared by
    /// every listed property); a trailing token that is not `asc`/`desc` is
    /// read as one more property. Repeated `sort` keys apply in order.
    pub fn from_params(params: &[(String, String)]) -> PageResult<Self> {
        let mut pageable = Self::default();
        for (key, value) in params {
            match key.as_str() {
                "page" => pageable.page = parse_number("page", value)?,
                "size" => pageable.size = clamp_size(parse_number("size", value)?),
                "sort" => pageable.sort.extend(parse_sort(value)),
                _ => {}
            }
        }
        Ok(pageable)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    /// Renders ` ORDER BY ...` for `E`, qualified with its table name.
    pub fn order_by_sql<E: Entity>(&self) -> PageResult<String> {
        let mut terms = Vec::with_capacity(self.sort.len() + 1);
        let mut has_id = false;
        for order in &self.sort {
            let column = sort_column::<E>(&order.field)
                .ok_or_else(|| PageError::UnknownSortField(order.field.clone()))?;
            has_id |= column == "id";
            terms.push(format!("{}.{column} {}", E::TABLE, order.direction.as_sql()));
        }
        if !has_id {
            terms.push(format!("{}.id ASC", E::TABLE));
        }
        Ok(format!(" ORDER BY {}", terms.join(", ")))
    }
}

/// Items of one page plus the unpaged total.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub pageable: Pageable,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.pageable.size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.pageable.size))
    }
}

fn sort_column<E: Entity>(field: &str) -> Option<&'static str> {
    if field == "id" {
        return Some("id");
    }
    E::COLUMNS
        .iter()
        .find(|column| column.field == field)
        .map(|column| column.name)
}

fn parse_number(param: &'static str, value: &str) -> PageResult<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| PageError::InvalidNumber {
            param,
            value: value.to_string(),
        })
}

fn parse_sort(value: &str) -> Vec<SortOrder> {
    let mut parts = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();
    if parts.is_empty() {
        return Vec::new();
    }

    let mut direction = Direction::Asc;
    if parts.len() > 1 {
        if let Some(parsed) = parts.last().and_then(|last| Direction::parse(last)) {
            direction = parsed;
            parts.pop();
        }
    }

    parts
        .into_iter()
        .map(|field| SortOrder {
            field: field.to_string(),
            direction,
        })
        .collect()
}
