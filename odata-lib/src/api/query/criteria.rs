//! Filter criteria for `$filter` expressions.

use std::fmt;

use crate::model::Property;
use crate::model::Value;
use crate::model::types::quote;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `eq`
    Eq,
    /// `ne`
    Ne,
    /// `gt`
    Gt,
    /// `ge`
    Ge,
    /// `lt`
    Lt,
    /// `le`
    Le,
}

impl Operator {
    /// Returns the operator keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::Lt => "lt",
            Operator::Le => "le",
        }
    }
}

/// Function applied to the criteria's property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Contains,
    StartsWith,
    EndsWith,
    ToLower,
    ToUpper,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    FractionalSeconds,
    Date,
    Time,
    GeoDistance,
    GeoIntersects,
    /// Lambda `any` over a collection.
    Any,
    /// Lambda `all` over a collection.
    All,
}

impl Function {
    /// Returns the function name as written in a filter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Function::Contains => "contains",
            Function::StartsWith => "startswith",
            Function::EndsWith => "endswith",
            Function::ToLower => "tolower",
            Function::ToUpper => "toupper",
            Function::Year => "year",
            Function::Month => "month",
            Function::Day => "day",
            Function::Hour => "hour",
            Function::Minute => "minute",
            Function::Second => "second",
            Function::FractionalSeconds => "fractionalseconds",
            Function::Date => "date",
            Function::Time => "time",
            Function::GeoDistance => "geo.distance",
            Function::GeoIntersects => "geo.intersects",
            Function::Any => "any",
            Function::All => "all",
        }
    }

    /// Returns `true` for the `any`/`all` lambda operators.
    pub fn is_lambda(&self) -> bool {
        matches!(self, Function::Any | Function::All)
    }
}

/// One filter expression on a property.
///
/// Builder methods consume and return the criteria, so a function can be
/// followed by a comparison.
///
/// Literals are rendered through the bound schema property when there is
/// one, so quoting follows the property's EDM type. Unbound criteria (or
/// values the property rejects) fall back to a literal chosen from the
/// value itself.
///
/// # Example
///
/// ```
/// use odata_lib::api::query::Criteria;
///
/// assert_eq!(Criteria::new("Name").eq("Bread").to_string(), "Name eq 'Bread'");
/// assert_eq!(Criteria::new("Name").contains("read").to_string(), "contains(Name,'read')");
/// assert_eq!(Criteria::new("Name").to_lower().eq("bread").to_string(), "tolower(Name) eq 'bread'");
/// assert_eq!(
///     Criteria::new("Items").any("Quantity").gt(100).to_string(),
///     "Items/any(d:d/Quantity gt 100)"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Criteria {
    property: String,
    template: Option<Property>,
    function: Option<Function>,
    argument: Option<Value>,
    operator: Option<Operator>,
    value: Option<Value>,
}

impl Criteria {
    /// Creates criteria on a property name, without type information.
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            template: None,
            function: None,
            argument: None,
            operator: None,
            value: None,
        }
    }

    /// Creates criteria bound to a schema property.
    pub fn bound(template: Property) -> Self {
        let mut criteria = Self::new(template.name());
        criteria.template = Some(template);
        criteria
    }

    /// Returns the property name.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Returns the function, if one was applied.
    pub fn function(&self) -> Option<Function> {
        self.function
    }

    /// Returns the comparison operator, if one was applied.
    pub fn operator(&self) -> Option<Operator> {
        self.operator
    }

    // =========================================================================
    // Comparison
    // =========================================================================

    fn compare(mut self, operator: Operator, value: impl Into<Value>) -> Self {
        self.operator = Some(operator);
        self.value = Some(value.into());
        self
    }

    /// `property eq value`
    pub fn eq(self, value: impl Into<Value>) -> Self {
        self.compare(Operator::Eq, value)
    }

    /// `property ne value`
    pub fn ne(self, value: impl Into<Value>) -> Self {
        self.compare(Operator::Ne, value)
    }

    /// `property gt value`
    pub fn gt(self, value: impl Into<Value>) -> Self {
        self.compare(Operator::Gt, value)
    }

    /// `property ge value`
    pub fn ge(self, value: impl Into<Value>) -> Self {
        self.compare(Operator::Ge, value)
    }

    /// `property lt value`
    pub fn lt(self, value: impl Into<Value>) -> Self {
        self.compare(Operator::Lt, value)
    }

    /// `property le value`
    pub fn le(self, value: impl Into<Value>) -> Self {
        self.compare(Operator::Le, value)
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn apply(mut self, function: Function, argument: Option<Value>) -> Self {
        self.function = Some(function);
        self.argument = argument;
        self
    }

    /// `contains(property,'value')`
    pub fn contains(self, value: impl Into<Value>) -> Self {
        self.apply(Function::Contains, Some(value.into()))
    }

    /// `startswith(property,'value')`
    pub fn starts_with(self, value: impl Into<Value>) -> Self {
        self.apply(Function::StartsWith, Some(value.into()))
    }

    /// `endswith(property,'value')`
    pub fn ends_with(self, value: impl Into<Value>) -> Self {
        self.apply(Function::EndsWith, Some(value.into()))
    }

    /// `tolower(property)`
    pub fn to_lower(self) -> Self {
        self.apply(Function::ToLower, None)
    }

    /// `toupper(property)`
    pub fn to_upper(self) -> Self {
        self.apply(Function::ToUpper, None)
    }

    /// `year(property)`
    pub fn year(self) -> Self {
        self.apply(Function::Year, None)
    }

    /// `month(property)`
    pub fn month(self) -> Self {
        self.apply(Function::Month, None)
    }

    /// `day(property)`
    pub fn day(self) -> Self {
        self.apply(Function::Day, None)
    }

    /// `hour(property)`
    pub fn hour(self) -> Self {
        self.apply(Function::Hour, None)
    }

    /// `minute(property)`
    pub fn minute(self) -> Self {
        self.apply(Function::Minute, None)
    }

    /// `second(property)`
    pub fn second(self) -> Self {
        self.apply(Function::Second, None)
    }

    /// `fractionalseconds(property)`
    pub fn fractional_seconds(self) -> Self {
        self.apply(Function::FractionalSeconds, None)
    }

    /// `date(property)`
    pub fn date(self) -> Self {
        self.apply(Function::Date, None)
    }

    /// `time(property)`
    pub fn time(self) -> Self {
        self.apply(Function::Time, None)
    }

    /// `geo.distance(property,point)`
    pub fn distance(self, to: impl Into<Value>) -> Self {
        self.apply(Function::GeoDistance, Some(to.into()))
    }

    /// `geo.intersects(property,polygon)`
    pub fn intersects(self, with: impl Into<Value>) -> Self {
        self.apply(Function::GeoIntersects, Some(with.into()))
    }

    /// `property/any(d:d/inner ...)`; follow with a comparison.
    pub fn any(self, inner: impl Into<String>) -> Self {
        self.apply(Function::Any, Some(Value::String(inner.into())))
    }

    /// `property/all(d:d/inner ...)`; follow with a comparison.
    pub fn all(self, inner: impl Into<String>) -> Self {
        self.apply(Function::All, Some(Value::String(inner.into())))
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Renders a value as a URL literal.
    ///
    /// The value is assigned to a copy of the bound property and read back
    /// through its `url_value`; on any failure the value's own literal form
    /// is used.
    pub fn url_value(&self, value: &Value) -> String {
        if let Some(template) = &self.template {
            let mut property = template.clone();
            if property.set_value(value.clone()).is_ok() {
                if let Ok(literal) = property.url_value() {
                    return literal;
                }
            }
        }
        literal(value)
    }

    fn comparison(&self) -> Option<String> {
        let operator = self.operator?;
        let value = match &self.value {
            Some(value) if self.compares_property_type() => self.url_value(value),
            Some(value) => literal(value),
            None => "null".to_string(),
        };
        Some(format!("{} {}", operator.as_str(), value))
    }

    /// Whether the compared expression still has the bound property's type.
    ///
    /// `tolower`/`toupper` keep it; every other function yields a value of
    /// its own type (boolean, number, date) and lambdas compare a member.
    fn compares_property_type(&self) -> bool {
        matches!(self.function, None | Some(Function::ToLower) | Some(Function::ToUpper))
    }
}

/// Literal form of a value without type information.
fn literal(value: &Value) -> String {
    match value {
        Value::String(s) | Value::Enum(s) => quote(s),
        Value::Json(serde_json::Value::String(s)) => quote(s),
        Value::Guid(g) => format!("guid'{}'", g),
        Value::Geography(g) => g.to_wkt(),
        other => other.to_string(),
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let comparison = self.comparison();
        match self.function {
            Some(function) if function.is_lambda() => {
                let inner = self.argument.as_ref().map(|a| a.to_string()).unwrap_or_default();
                match comparison {
                    Some(comparison) => write!(
                        f,
                        "{}/{}(d:d/{} {})",
                        self.property,
                        function.as_str(),
                        inner,
                        comparison
                    ),
                    None => write!(f, "{}/{}(d:d/{})", self.property, function.as_str(), inner),
                }
            }
            Some(function) => {
                write!(f, "{}({}", function.as_str(), self.property)?;
                if let Some(argument) = &self.argument {
                    write!(f, ",{}", self.url_value(argument))?;
                }
                f.write_str(")")?;
                match comparison {
                    Some(comparison) => write!(f, " {}", comparison),
                    None => Ok(()),
                }
            }
            None => match comparison {
                Some(comparison) => write!(f, "{} {}", self.property, comparison),
                None => f.write_str(&self.property),
            },
        }
    }
}
