//! Query state accumulated by chained builder calls
//!
//! Filters, sorting, grouping and pagination are collected in call order and
//! rendered into the bracket/pipe mini-language the remote API reads from the
//! query string:
//!
//! ```text
//! query_and=[name,=,alice|age,between,[18:30]]&per_page=10&page=1&sort=[age:desc]
//! ```

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_DATABASE: &str = "my-db";
pub const DEFAULT_COLLECTION: &str = "my-collection";

/// Serialized query string pairs, in wire order
pub type QueryParams = Vec<(&'static str, String)>;

/// Filter operators understood by the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    Between,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Operator::Eq,
        Operator::NotEq,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::Like,
        Operator::NotLike,
        Operator::Between,
    ];

    /// Spelling accepted from callers
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "like",
            Operator::NotLike => "not_like",
            Operator::Between => "between",
        }
    }

    /// Spelling sent to the server (`like` is case-insensitive there)
    pub fn wire(&self) -> &'static str {
        match self {
            Operator::Like => "ilike",
            other => other.as_str(),
        }
    }
}

impl FromStr for Operator {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| Rejection::UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl FromStr for SortDirection {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(Rejection::InvalidSortDirection(other.to_string())),
        }
    }
}

/// Why a builder call was ignored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    EmptyName,
    UnknownOperator(String),
    InvalidSortDirection(String),
    NonPositivePage(i64),
    NonPositivePageSize(i64),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::EmptyName => write!(f, "empty name"),
            Rejection::UnknownOperator(op) => write!(f, "unknown operator '{}'", op),
            Rejection::InvalidSortDirection(dir) => write!(f, "invalid sort direction '{}'", dir),
            Rejection::NonPositivePage(n) => write!(f, "page must be positive, got {}", n),
            Rejection::NonPositivePageSize(n) => {
                write!(f, "page size must be positive, got {}", n)
            }
        }
    }
}

/// Outcome of a builder mutation.
///
/// The chaining API on the client drops this; it exists so callers and tests
/// can tell an ignored call from an applied one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Accepted,
    Rejected(Rejection),
}

impl Applied {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Applied::Accepted)
    }

    fn rejected(reason: Rejection) -> Self {
        tracing::debug!("Ignoring query builder call: {}", reason);
        Applied::Rejected(reason)
    }
}

/// A single filter constraint
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    /// `field,operator,value` as sent inside `query_and` / `query_or`
    pub fn to_wire(&self) -> String {
        format!(
            "{},{},{}",
            self.field,
            self.operator.wire(),
            render_value(&self.value)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDirective {
    pub field: String,
    pub direction: SortDirection,
}

impl SortDirective {
    pub fn to_wire(&self) -> String {
        format!("{}:{}", self.field, self.direction.as_str())
    }
}

/// Render a condition value. A two element array becomes a `[low:high]`
/// range; everything else is its plain string form.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Array(items) if items.len() == 2 => {
            format!("[{}:{}]", render_plain(&items[0]), render_plain(&items[1]))
        }
        other => render_plain(other),
    }
}

fn render_plain(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(render_plain).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn bracketed<I>(parts: I) -> String
where
    I: IntoIterator<Item = String>,
{
    format!("[{}]", parts.into_iter().collect::<Vec<_>>().join("|"))
}

/// Target plus filter, sort, grouping and pagination state
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    database: String,
    collection: String,
    and_conditions: Vec<Condition>,
    or_conditions: Vec<Condition>,
    sorts: Vec<SortDirective>,
    group_by: Option<String>,
    page: Option<u64>,
    page_size: Option<u64>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE, DEFAULT_COLLECTION)
    }
}

impl QueryState {
    /// Empty names fall back to the built-in placeholders
    pub fn new(database: &str, collection: &str) -> Self {
        let pick = |name: &str, fallback: &str| {
            if name.is_empty() {
                fallback.to_string()
            } else {
                name.to_string()
            }
        };

        Self {
            database: pick(database, DEFAULT_DATABASE),
            collection: pick(collection, DEFAULT_COLLECTION),
            and_conditions: Vec::new(),
            or_conditions: Vec::new(),
            sorts: Vec::new(),
            group_by: None,
            page: None,
            page_size: None,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn and_conditions(&self) -> &[Condition] {
        &self.and_conditions
    }

    pub fn or_conditions(&self) -> &[Condition] {
        &self.or_conditions
    }

    pub fn sorts(&self) -> &[SortDirective] {
        &self.sorts
    }

    pub fn group_by(&self) -> Option<&str> {
        self.group_by.as_deref()
    }

    pub fn page(&self) -> Option<u64> {
        self.page
    }

    pub fn page_size(&self) -> Option<u64> {
        self.page_size
    }

    pub fn set_database(&mut self, name: &str) -> Applied {
        if name.is_empty() {
            return Applied::rejected(Rejection::EmptyName);
        }
        self.database = name.to_string();
        Applied::Accepted
    }

    pub fn set_collection(&mut self, name: &str) -> Applied {
        if name.is_empty() {
            return Applied::rejected(Rejection::EmptyName);
        }
        self.collection = name.to_string();
        Applied::Accepted
    }

    pub fn add_condition(
        &mut self,
        field: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Applied {
        match Self::condition(field, operator, value) {
            Ok(condition) => {
                self.and_conditions.push(condition);
                Applied::Accepted
            }
            Err(reason) => Applied::rejected(reason),
        }
    }

    pub fn add_or_condition(
        &mut self,
        field: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Applied {
        match Self::condition(field, operator, value) {
            Ok(condition) => {
                self.or_conditions.push(condition);
                Applied::Accepted
            }
            Err(reason) => Applied::rejected(reason),
        }
    }

    fn condition(
        field: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Condition, Rejection> {
        Ok(Condition {
            field: field.into(),
            operator: operator.parse()?,
            value: value.into(),
        })
    }

    pub fn set_sort(&mut self, field: impl Into<String>, direction: &str) -> Applied {
        match direction.parse::<SortDirection>() {
            Ok(direction) => {
                self.sorts.push(SortDirective {
                    field: field.into(),
                    direction,
                });
                Applied::Accepted
            }
            Err(reason) => Applied::rejected(reason),
        }
    }

    /// Replaces any previous group-by field; an empty name clears it
    pub fn set_group_by(&mut self, field: &str) -> Applied {
        self.group_by = if field.is_empty() {
            None
        } else {
            Some(field.to_string())
        };
        Applied::Accepted
    }

    pub fn set_page(&mut self, page: i64) -> Applied {
        if page <= 0 {
            return Applied::rejected(Rejection::NonPositivePage(page));
        }
        self.page = Some(page as u64);
        Applied::Accepted
    }

    pub fn set_page_size(&mut self, per_page: i64) -> Applied {
        if per_page <= 0 {
            return Applied::rejected(Rejection::NonPositivePageSize(per_page));
        }
        self.page_size = Some(per_page as u64);
        Applied::Accepted
    }

    /// Drop filters, sorting, grouping and pagination. The database and
    /// collection target is kept.
    pub fn reset(&mut self) {
        self.and_conditions.clear();
        self.or_conditions.clear();
        self.sorts.clear();
        self.group_by = None;
        self.page = None;
        self.page_size = None;
    }

    /// Query string pairs; keys with no backing state are left out
    pub fn serialize(&self) -> QueryParams {
        let mut params = QueryParams::new();

        if !self.and_conditions.is_empty() {
            params.push((
                "query_and",
                bracketed(self.and_conditions.iter().map(Condition::to_wire)),
            ));
        }

        if !self.or_conditions.is_empty() {
            params.push((
                "query_or",
                bracketed(self.or_conditions.iter().map(Condition::to_wire)),
            ));
        }

        if let Some(per_page) = self.page_size {
            params.push(("per_page", per_page.to_string()));
        }

        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }

        if !self.sorts.is_empty() {
            params.push(("sort", bracketed(self.sorts.iter().map(SortDirective::to_wire))));
        }

        if let Some(group_by) = &self.group_by {
            params.push(("group_by", group_by.clone()));
        }

        params
    }
}
