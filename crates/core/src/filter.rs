//! Row filters applied during backup
//!
//! A filter list is a left-associated chain of property comparisons:
//! `f1 JOIN2 f2 JOIN3 f3` means `((f1 JOIN2 f2) JOIN3 f3)`. The list is handed
//! to the table source unchanged; [`filter_expression`] renders it in the
//! OData query syntax used by table services, with explicit parentheses so the
//! rendered text and [`matches_all`] agree on evaluation order.
//!
//! A filter may declare the kind of its literal (`Qty gt 5 as Int32`). The
//! kind decides how the literal is written in the expression (`5`, `5L`,
//! `datetime'...'`) and restricts matching to properties of that kind.
//! Without one, the literal is read at whatever kind the row's property has
//! and rendered as a quoted string.

use crate::error::{Error, Result};
use crate::row::{Row, PARTITION_KEY, ROW_KEY, TIMESTAMP};
use crate::value::{format_timestamp, parse_timestamp, EdmType, TypedValue};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `eq`
    Equal,
    /// `ne`
    NotEqual,
    /// `lt`
    LessThan,
    /// `le`
    LessThanOrEqual,
    /// `gt`
    GreaterThan,
    /// `ge`
    GreaterThanOrEqual,
}

impl Comparison {
    /// OData operator keyword
    pub fn as_odata(&self) -> &'static str {
        match self {
            Comparison::Equal => "eq",
            Comparison::NotEqual => "ne",
            Comparison::LessThan => "lt",
            Comparison::LessThanOrEqual => "le",
            Comparison::GreaterThan => "gt",
            Comparison::GreaterThanOrEqual => "ge",
        }
    }

    fn accepts(&self, ord: Ordering) -> bool {
        match self {
            Comparison::Equal => ord == Ordering::Equal,
            Comparison::NotEqual => ord != Ordering::Equal,
            Comparison::LessThan => ord == Ordering::Less,
            Comparison::LessThanOrEqual => ord != Ordering::Greater,
            Comparison::GreaterThan => ord == Ordering::Greater,
            Comparison::GreaterThanOrEqual => ord != Ordering::Less,
        }
    }
}

impl FromStr for Comparison {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let op = match s.to_ascii_lowercase().as_str() {
            "=" | "==" | "eq" => Comparison::Equal,
            "<>" | "!=" | "ne" => Comparison::NotEqual,
            "<" | "lt" => Comparison::LessThan,
            "<=" | "le" => Comparison::LessThanOrEqual,
            ">" | "gt" => Comparison::GreaterThan,
            ">=" | "ge" => Comparison::GreaterThanOrEqual,
            _ => {
                return Err(Error::parameter(format!(
                    "Unknown filter comparison '{}'.",
                    s
                )))
            }
        };
        Ok(op)
    }
}

/// How a filter combines with the filters before it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Join {
    /// Both must hold
    #[default]
    And,
    /// Either may hold
    Or,
}

impl Join {
    /// OData keyword
    pub fn as_odata(&self) -> &'static str {
        match self {
            Join::And => "and",
            Join::Or => "or",
        }
    }
}

impl FromStr for Join {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "and" | "&&" => Ok(Join::And),
            "or" | "||" => Ok(Join::Or),
            _ => Err(Error::parameter(format!("Unknown filter join '{}'.", s))),
        }
    }
}

/// A single property comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Property (or reserved field) to compare
    pub column: String,
    /// Operator
    pub comparison: Comparison,
    /// Literal, interpreted at the property's kind
    pub value: String,
    /// Join with the preceding filters; ignored on the first filter
    pub join: Join,
    /// Declared kind of the literal
    pub kind: Option<EdmType>,
}

impl Filter {
    /// Filter joined with `And`
    pub fn new(column: impl Into<String>, comparison: Comparison, value: impl Into<String>) -> Self {
        Filter {
            column: column.into(),
            comparison,
            value: value.into(),
            join: Join::And,
            kind: None,
        }
    }

    /// Declare the literal's kind
    pub fn with_kind(mut self, kind: EdmType) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the join
    pub fn with_join(mut self, join: Join) -> Self {
        self.join = join;
        self
    }

    /// Parse `"[and|or] <column> <op> <value...> [as <kind>]"`.
    ///
    /// The value is the remainder of the text, so it may contain spaces. A
    /// trailing `as <kind>` is taken as the literal's kind only when `<kind>`
    /// names one of the eight kinds.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut tokens = spec.split_whitespace().peekable();
        let join = match tokens.peek().map(|t| t.parse::<Join>()) {
            Some(Ok(join)) => {
                tokens.next();
                join
            }
            _ => Join::And,
        };
        let column = tokens
            .next()
            .ok_or_else(|| Error::parameter(format!("Filter '{}' has no column.", spec)))?;
        let comparison: Comparison = tokens
            .next()
            .ok_or_else(|| Error::parameter(format!("Filter '{}' has no comparison.", spec)))?
            .parse()?;
        let mut rest: Vec<&str> = tokens.collect();
        let kind = match rest.as_slice() {
            [.., keyword, tag] if keyword.eq_ignore_ascii_case("as") => tag.parse::<EdmType>().ok(),
            _ => None,
        };
        if kind.is_some() {
            rest.truncate(rest.len() - 2);
        }
        Ok(Filter {
            kind,
            ..Filter::new(column, comparison, rest.join(" ")).with_join(join)
        })
    }

    /// Evaluate against a row.
    ///
    /// A missing property only satisfies `ne`.
    pub fn matches(&self, row: &Row) -> bool {
        let ord = match self.column.as_str() {
            PARTITION_KEY => Some(row.partition_key.as_str().cmp(self.value.as_str())),
            ROW_KEY => Some(row.row_key.as_str().cmp(self.value.as_str())),
            TIMESTAMP => match (row.timestamp, parse_timestamp(&self.value)) {
                (Some(ts), Ok(literal)) => Some(ts.cmp(&literal)),
                _ => None,
            },
            name => match row.properties.get(name) {
                Some(value) if self.kind.map_or(true, |k| k == value.edm_type()) => {
                    value.compare_literal(&self.value)
                }
                Some(_) => None,
                None => return self.comparison == Comparison::NotEqual,
            },
        };
        match ord {
            Some(ord) => self.comparison.accepts(ord),
            None => self.comparison == Comparison::NotEqual,
        }
    }

    /// Kind the literal is read at: the declared one, `DateTime` for the
    /// `Timestamp` column, `String` otherwise
    pub fn literal_kind(&self) -> EdmType {
        match (self.kind, self.column.as_str()) {
            (Some(kind), _) => kind,
            (None, TIMESTAMP) => EdmType::DateTime,
            (None, _) => EdmType::String,
        }
    }

    /// The literal in OData syntax
    fn odata_literal(&self) -> String {
        match TypedValue::parse(self.literal_kind(), &self.value) {
            Ok(TypedValue::Int32(i)) => i.to_string(),
            Ok(TypedValue::Int64(i)) => format!("{}L", i),
            Ok(TypedValue::Double(d)) => {
                let text = TypedValue::Double(d).to_wire_string();
                if text.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
                    format!("{}.0", text)
                } else {
                    text
                }
            }
            Ok(TypedValue::Boolean(b)) => b.to_string(),
            Ok(TypedValue::DateTime(dt)) => format!("datetime'{}'", format_timestamp(&dt)),
            Ok(TypedValue::Guid(g)) => format!("guid'{}'", g.hyphenated()),
            Ok(TypedValue::Bytes(bytes)) => {
                let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                format!("X'{}'", hex)
            }
            Ok(TypedValue::String(_)) | Err(_) => format!("'{}'", self.value.replace('\'', "''")),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} {} {})",
            self.column,
            self.comparison.as_odata(),
            self.odata_literal()
        )
    }
}

/// Check every filter before any query runs
pub fn validate_filters(filters: &[Filter]) -> Result<()> {
    for filter in filters {
        if filter.column.trim().is_empty() {
            return Err(Error::parameter(
                "One or more of the supplied filter criteria is invalid: empty column.",
            ));
        }
        if filter.column.chars().any(|c| c.is_whitespace() || c == '\'') {
            return Err(Error::parameter(format!(
                "One or more of the supplied filter criteria is invalid: column '{}'.",
                filter.column
            )));
        }
        let kind = filter.literal_kind();
        if kind != EdmType::String {
            if let Err(e) = TypedValue::parse(kind, &filter.value) {
                return Err(Error::parameter(format!(
                    "One or more of the supplied filter criteria is invalid: {}.",
                    e
                )));
            }
        }
    }
    Ok(())
}

/// Render the filter chain as a query string; `None` when there are no filters
pub fn filter_expression(filters: &[Filter]) -> Option<String> {
    let (first, rest) = filters.split_first()?;
    let mut expr = first.to_string();
    for (i, filter) in rest.iter().enumerate() {
        expr = if i == 0 {
            format!("{} {} {}", expr, filter.join.as_odata(), filter)
        } else {
            format!("({}) {} {}", expr, filter.join.as_odata(), filter)
        };
    }
    Some(expr)
}

/// Evaluate the whole chain; an empty chain matches everything
pub fn matches_all(filters: &[Filter], row: &Row) -> bool {
    let Some((first, rest)) = filters.split_first() else {
        return true;
    };
    rest.iter().fold(first.matches(row), |acc, filter| match filter.join {
        Join::And => acc && filter.matches(row),
        Join::Or => acc || filter.matches(row),
    })
}
