//! Listing query builder
//!
//! Turns raw, client-supplied listing parameters (`Sort`, `Order`, `Offset`,
//! `Limit`, `Search`) into a bounded [`ListingQuery`]. Building never fails:
//! anything missing or malformed degrades to a default.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::num::IntErrorKind;

use crate::config::ListingConfig;
use crate::{POST_PRIMARY_KEY, POST_SEARCHABLE_FIELDS, POST_SORTABLE_FIELDS};

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Parse `ASC`/`DESC` case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("asc") {
            Some(SortOrder::Asc)
        } else if value.eq_ignore_ascii_case("desc") {
            Some(SortOrder::Desc)
        } else {
            None
        }
    }

    /// SQL keyword for this direction
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Orient an ascending comparison result in this direction
    pub fn orient(&self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Raw listing parameters exactly as the client sent them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingParams {
    pub sort: Option<String>,
    pub order: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

impl ListingParams {
    /// Collect parameters from query-string pairs
    ///
    /// Keys match case-insensitively and the first occurrence of a key wins.
    /// Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref().to_ascii_lowercase().as_str() {
                "sort" => &mut params.sort,
                "order" => &mut params.order,
                "offset" => &mut params.offset,
                "limit" => &mut params.limit,
                "search" => &mut params.search,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        params
    }
}

/// Case-insensitive substring filter across a set of fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    term: String,
    needle: String,
    fields: Vec<String>,
}

impl SearchFilter {
    /// The term as supplied (trimmed)
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Fields the term is matched against, OR'ed together
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Whether `text` contains the term, ignoring case
    pub fn matches_text(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.needle)
    }

    /// Term wrapped for a SQL `ILIKE ... ESCAPE '\'` with wildcards escaped
    pub fn like_pattern(&self) -> String {
        let mut escaped = String::with_capacity(self.term.len() + 2);
        escaped.push('%');
        for c in self.term.chars() {
            if matches!(c, '\\' | '%' | '_') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped.push('%');
        escaped
    }
}

/// Validated, bounded listing query
///
/// Only [`ListingPolicy::build`] constructs this, so the sort field is always
/// allow-listed and the limit is always within `1..=max_page_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    sort_field: String,
    sort_order: SortOrder,
    offset: u64,
    limit: u32,
    search: Option<SearchFilter>,
}

impl ListingQuery {
    pub fn sort_field(&self) -> &str {
        &self.sort_field
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn search(&self) -> Option<&SearchFilter> {
        self.search.as_ref()
    }
}

/// One page of a listing plus its counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPage<T> {
    /// Records ignoring the search term
    #[serde(rename = "totalData")]
    pub total: u64,
    /// Records matching the search term, before pagination
    #[serde(rename = "filteredData")]
    pub filtered: u64,
    /// The requested page
    #[serde(rename = "data")]
    pub items: Vec<T>,
}

/// Allow-lists and page-size bounds for one resource
#[derive(Debug, Clone)]
pub struct ListingPolicy {
    primary_key: String,
    sortable_fields: Vec<String>,
    searchable_fields: Vec<String>,
    default_page_size: u32,
    max_page_size: u32,
}

impl ListingPolicy {
    /// Create a policy; the primary key is always sortable
    pub fn new(
        primary_key: &str,
        sortable_fields: &[&str],
        searchable_fields: &[&str],
        config: &ListingConfig,
    ) -> Self {
        let mut sortable: Vec<String> = sortable_fields.iter().map(|f| f.to_string()).collect();
        if !sortable.iter().any(|f| f == primary_key) {
            sortable.push(primary_key.to_string());
        }

        let max_page_size = config.max_page_size.max(1);
        let default_page_size = config.default_page_size.clamp(1, max_page_size);

        Self {
            primary_key: primary_key.to_string(),
            sortable_fields: sortable,
            searchable_fields: searchable_fields.iter().map(|f| f.to_string()).collect(),
            default_page_size,
            max_page_size,
        }
    }

    /// Policy for the post resource
    pub fn posts(config: &ListingConfig) -> Self {
        Self::new(POST_PRIMARY_KEY, POST_SORTABLE_FIELDS, POST_SEARCHABLE_FIELDS, config)
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    pub fn default_page_size(&self) -> u32 {
        self.default_page_size
    }

    /// Build a bounded query from raw parameters
    pub fn build(&self, params: &ListingParams) -> ListingQuery {
        let sort_field = params
            .sort
            .as_deref()
            .and_then(|s| self.resolve_sort_field(s.trim()))
            .unwrap_or(&self.primary_key)
            .to_string();

        let sort_order = params
            .order
            .as_deref()
            .and_then(SortOrder::parse)
            .unwrap_or_default();

        let offset = match params.offset.as_deref().and_then(parse_integer) {
            Some(n) if n > 0 => u64::try_from(n).unwrap_or(u64::MAX),
            _ => 0,
        };

        let limit = match params.limit.as_deref().and_then(parse_integer) {
            Some(n) if n > 0 => u32::try_from(n)
                .unwrap_or(u32::MAX)
                .min(self.max_page_size),
            _ => self.default_page_size,
        };

        let search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty() && !self.searchable_fields.is_empty())
            .map(|term| SearchFilter {
                term: term.to_string(),
                needle: term.to_lowercase(),
                fields: self.searchable_fields.clone(),
            });

        ListingQuery {
            sort_field,
            sort_order,
            offset,
            limit,
            search,
        }
    }

    fn resolve_sort_field(&self, requested: &str) -> Option<&str> {
        self.sortable_fields
            .iter()
            .find(|f| f.eq_ignore_ascii_case(requested))
            .map(String::as_str)
    }
}

/// Parse a decimal integer, saturating digit strings too long to represent
fn parse_integer(value: &str) -> Option<i128> {
    match value.trim().parse::<i128>() {
        Ok(n) => Some(n),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Some(i128::MAX),
            IntErrorKind::NegOverflow => Some(i128::MIN),
            _ => None,
        },
    }
}
