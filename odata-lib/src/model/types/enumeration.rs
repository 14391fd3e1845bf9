//! Schema-declared enum types

use super::Ctx;
use crate::error::ValidationError;
use crate::model::Value;

/// One member of an enum type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    /// Member name.
    pub name: String,
    /// Underlying value.
    pub value: i64,
    /// Textual annotation, if the schema attached one.
    pub annotation: Option<String>,
}

/// An `<EnumType>` definition.
///
/// Shared by every property of this type through `PropertyKind::Enum`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    /// Unqualified type name.
    pub name: String,
    /// Schema namespace.
    pub namespace: String,
    /// Whether several members may be combined.
    pub is_flags: bool,
    /// Underlying integer type, `Edm.Int32` unless declared.
    pub underlying_type: String,
    /// Members in declaration order.
    pub members: Vec<EnumMember>,
}

impl EnumType {
    /// Creates an enum type without members.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            is_flags: false,
            underlying_type: "Edm.Int32".to_string(),
            members: Vec::new(),
        }
    }

    /// Marks the type as a flags enum.
    pub fn flags(mut self) -> Self {
        self.is_flags = true;
        self
    }

    /// Adds a member.
    pub fn member(mut self, name: impl Into<String>, value: i64) -> Self {
        self.members.push(EnumMember {
            name: name.into(),
            value,
            annotation: None,
        });
        self
    }

    /// Returns the qualified name, e.g. `NS.Color`.
    pub fn type_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Looks up a member by name.
    pub fn member_by_name(&self, name: &str) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Looks up a member by its underlying value.
    pub fn member_by_value(&self, value: i64) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.value == value)
    }

    /// Returns the annotation attached to a member.
    pub fn annotation(&self, name: &str) -> Option<&str> {
        self.member_by_name(name)?.annotation.as_deref()
    }

    fn resolve_token(&self, token: &str) -> Option<&EnumMember> {
        self.member_by_name(token).or_else(|| {
            token
                .parse::<i64>()
                .ok()
                .and_then(|value| self.member_by_value(value))
        })
    }

    fn tokens(value: &Value) -> Option<Vec<String>> {
        let split = |s: &str| {
            s.split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
        };
        match value {
            Value::String(s) | Value::Enum(s) => Some(split(s)),
            Value::Flags(names) => Some(names.clone()),
            Value::Byte(_) | Value::SByte(_) | Value::Int16(_) | Value::Int32(_) | Value::Int64(_) => {
                Some(vec![value.to_string()])
            }
            Value::Collection(items) => items
                .iter()
                .map(|item| Self::tokens(item).filter(|t| t.len() == 1).map(|mut t| t.remove(0)))
                .collect(),
            Value::Json(serde_json::Value::String(s)) => Some(split(s)),
            Value::Json(serde_json::Value::Number(n)) => Some(vec![n.to_string()]),
            Value::Json(serde_json::Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// Resolves setter input to `Value::Enum` or, for flags types, `Value::Flags`.
    pub(crate) fn coerce(&self, ctx: &Ctx<'_>, value: &Value) -> Result<Value, ValidationError> {
        let unknown = |token: &str| ValidationError::UnknownMember {
            property: ctx.property.to_string(),
            enum_type: self.type_name(),
            value: token.to_string(),
        };
        let tokens = Self::tokens(value).ok_or_else(|| unknown(&value.to_string()))?;

        if tokens.len() > 1 && !self.is_flags {
            return Err(ValidationError::MultipleMembers {
                property: ctx.property.to_string(),
                enum_type: self.type_name(),
                value: tokens.join(","),
            });
        }

        let mut names = Vec::with_capacity(tokens.len());
        for token in &tokens {
            let member = self.resolve_token(token).ok_or_else(|| unknown(token))?;
            names.push(member.name.clone());
        }

        if self.is_flags {
            Ok(Value::Flags(names))
        } else {
            names
                .pop()
                .map(Value::Enum)
                .ok_or_else(|| unknown(&value.to_string()))
        }
    }

    /// Renders the typed value as an OData enum literal, e.g. `NS.Color'Red'`.
    pub(crate) fn literal(&self, typed: &Value) -> String {
        match typed {
            Value::Null => "null".to_string(),
            other => format!("{}'{}'", self.type_name(), other),
        }
    }
}
