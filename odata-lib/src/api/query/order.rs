//! Ordering for `$orderby`.

use std::fmt;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending order (A-Z, 0-9).
    Asc,
    /// Descending order (Z-A, 9-0).
    Desc,
}

impl Direction {
    /// Returns the direction keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// Specifies the ordering of query results.
///
/// Fields without a direction render bare and use the server's default
/// (ascending).
///
/// # Example
///
/// ```
/// use odata_lib::api::query::OrderBy;
///
/// let order = OrderBy::desc("Price").then_asc("Name");
/// assert_eq!(order.to_string(), "Price desc,Name asc");
///
/// let order = OrderBy::from("Name");
/// assert_eq!(order.to_string(), "Name");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderBy {
    fields: Vec<(String, Option<Direction>)>,
}

impl OrderBy {
    /// Orders by a field using the server's default direction.
    pub fn field(field: impl Into<String>) -> Self {
        Self {
            fields: vec![(field.into(), None)],
        }
    }

    /// Creates an ascending order on a field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            fields: vec![(field.into(), Some(Direction::Asc))],
        }
    }

    /// Creates a descending order on a field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            fields: vec![(field.into(), Some(Direction::Desc))],
        }
    }

    /// Adds a secondary ascending order on a field.
    pub fn then_asc(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), Some(Direction::Asc)));
        self
    }

    /// Adds a secondary descending order on a field.
    pub fn then_desc(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), Some(Direction::Desc)));
        self
    }

    /// Appends the fields of another ordering.
    pub fn then(mut self, other: OrderBy) -> Self {
        self.fields.extend(other.fields);
        self
    }

    /// Returns the ordered fields with their directions.
    pub fn fields(&self) -> &[(String, Option<Direction>)] {
        &self.fields
    }

    /// Returns `true` if no field is ordered.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<&str> for OrderBy {
    fn from(field: &str) -> Self {
        OrderBy::field(field)
    }
}

impl From<String> for OrderBy {
    fn from(field: String) -> Self {
        OrderBy::field(field)
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<_> = self
            .fields
            .iter()
            .map(|(field, direction)| match direction {
                Some(direction) => format!("{} {}", field, direction.as_str()),
                None => field.clone(),
            })
            .collect();
        f.write_str(&parts.join(","))
    }
}
