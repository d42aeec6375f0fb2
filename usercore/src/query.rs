//! Filter, sort and pagination descriptors for user queries.
//!
//! [`QueryBuilder::build`] clamps pagination into range and rejects empty
//! time windows. [`QuerySpec::by_username`], [`QuerySpec::by_email`],
//! `Default` and deserialization also produce specs; their pagination is
//! kept in range by the same validated types, and a deserialized empty
//! window simply matches nothing. Stores hand their snapshot to
//! [`QuerySpec::apply`] so every implementation filters, orders and pages
//! identically.

use std::cmp::Ordering;
use std::str::FromStr;

use nutype::nutype;
use serde::{Deserialize, Serialize};

use crate::errors::QueryError;
use crate::types::Timestamp;
use crate::user::User;

/// Smallest page a query may request.
pub const MIN_LIMIT: i64 = 1;
/// Largest page a query may request.
pub const MAX_LIMIT: i64 = 1000;
/// Page size used when none is requested.
pub const DEFAULT_LIMIT: i64 = 100;

/// Page size, clamped to `[MIN_LIMIT, MAX_LIMIT]`.
#[nutype(
    sanitize(with = |n: i64| n.clamp(MIN_LIMIT, MAX_LIMIT)),
    derive(Debug, Clone, Copy, PartialEq, Eq, Into, Serialize, Deserialize)
)]
pub struct PageLimit(i64);

/// Number of matches to skip, clamped to be non-negative.
#[nutype(
    sanitize(with = |n: i64| n.max(0)),
    derive(Debug, Clone, Copy, PartialEq, Eq, Into, Serialize, Deserialize)
)]
pub struct PageOffset(i64);

/// Field a query result is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortField {
    /// Creation time
    #[default]
    CreatedAt,
    /// Login name
    Username,
    /// Contact address
    Email,
}

impl FromStr for SortField {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" | "created_at" => Ok(Self::CreatedAt),
            "username" => Ok(Self::Username),
            "email" => Ok(Self::Email),
            other => Err(QueryError::UnknownSortField(other.to_string())),
        }
    }
}

/// Direction of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

impl FromStr for SortDirection {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            _ => Err(QueryError::UnknownSortDirection(s.to_string())),
        }
    }
}

/// Immutable query over a store's users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    username: Option<String>,
    email: Option<String>,
    active: Option<bool>,
    created_after: Option<Timestamp>,
    created_before: Option<Timestamp>,
    sort_field: SortField,
    sort_direction: SortDirection,
    limit: PageLimit,
    offset: PageOffset,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            username: None,
            email: None,
            active: None,
            created_after: None,
            created_before: None,
            sort_field: SortField::default(),
            sort_direction: SortDirection::default(),
            limit: PageLimit::new(DEFAULT_LIMIT),
            offset: PageOffset::new(0),
        }
    }
}

impl QuerySpec {
    /// Starts a new builder.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Exact-match lookup on username, at most one result.
    pub fn by_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            limit: PageLimit::new(1),
            ..Self::default()
        }
    }

    /// Exact-match lookup on email, at most one result.
    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            limit: PageLimit::new(1),
            ..Self::default()
        }
    }

    /// Page size.
    pub fn limit(&self) -> i64 {
        self.limit.into_inner()
    }

    /// Matches skipped before the page starts.
    pub fn offset(&self) -> i64 {
        self.offset.into_inner()
    }

    /// Field the results are ordered by.
    pub const fn sort_field(&self) -> SortField {
        self.sort_field
    }

    /// Direction the results are ordered in.
    pub const fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    /// True when `user` satisfies every filter.
    pub fn matches(&self, user: &User) -> bool {
        self.username
            .as_deref()
            .is_none_or(|username| user.username() == username)
            && self
                .email
                .as_deref()
                .is_none_or(|email| user.email() == email)
            && self.active.is_none_or(|active| user.is_active() == active)
            && self
                .created_after
                .is_none_or(|after| user.created_at() > after)
            && self
                .created_before
                .is_none_or(|before| user.created_at() < before)
    }

    /// Filters, sorts and pages `users`.
    pub fn apply<I>(&self, users: I) -> Vec<User>
    where
        I: IntoIterator<Item = User>,
    {
        let mut matched: Vec<User> = users.into_iter().filter(|u| self.matches(u)).collect();
        matched.sort_by(|a, b| self.compare(a, b));

        let offset = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit()).unwrap_or(usize::MAX);
        matched.into_iter().skip(offset).take(limit).collect()
    }

    fn compare(&self, a: &User, b: &User) -> Ordering {
        let primary = match self.sort_field {
            SortField::CreatedAt => a.created_at().cmp(&b.created_at()),
            SortField::Username => a.username().cmp(b.username()),
            SortField::Email => a.email().cmp(b.email()),
        };
        // identity breaks ties so equal keys still page deterministically
        let ordering = primary.then_with(|| a.id().cmp(&b.id()));
        match self.sort_direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Fluent builder for [`QuerySpec`].
///
/// ```rust,ignore
/// let query = QueryBuilder::new()
///     .active(true)
///     .sort_by(SortField::Username, SortDirection::Ascending)
///     .limit(20)
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct QueryBuilder {
    spec: QuerySpec,
}

impl QueryBuilder {
    /// Builder with defaults: newest-last by creation time, 100 per page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only users with exactly this username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.spec.username = Some(username.into());
        self
    }

    /// Only users with exactly this email.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.spec.email = Some(email.into());
        self
    }

    /// Only users whose active flag equals `active`.
    pub const fn active(mut self, active: bool) -> Self {
        self.spec.active = Some(active);
        self
    }

    /// Only users created strictly after `at`.
    pub const fn created_after(mut self, at: Timestamp) -> Self {
        self.spec.created_after = Some(at);
        self
    }

    /// Only users created strictly before `at`.
    pub const fn created_before(mut self, at: Timestamp) -> Self {
        self.spec.created_before = Some(at);
        self
    }

    /// Order results by `field` in `direction`.
    pub const fn sort_by(mut self, field: SortField, direction: SortDirection) -> Self {
        self.spec.sort_field = field;
        self.spec.sort_direction = direction;
        self
    }

    /// Page size; clamped to `[1, 1000]`.
    pub fn limit(mut self, limit: i64) -> Self {
        self.spec.limit = PageLimit::new(limit);
        self
    }

    /// Matches to skip; negative values become zero.
    pub fn offset(mut self, offset: i64) -> Self {
        self.spec.offset = PageOffset::new(offset);
        self
    }

    /// Finishes the query.
    pub fn build(self) -> Result<QuerySpec, QueryError> {
        if let (Some(after), Some(before)) = (self.spec.created_after, self.spec.created_before) {
            if after >= before {
                return Err(QueryError::EmptyTimeWindow);
            }
        }
        Ok(self.spec)
    }
}
