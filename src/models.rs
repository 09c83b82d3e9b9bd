//! Data models for the admin API catalog.
//!
//! Field names follow the server's camelCase JSON. Only the fields the
//! catalog reads are typed; unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Size unit reported by the server.
/// Includes `Unknown` variant for forward-compatibility with new units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeUnit {
    Bytes,
    KiloBytes,
    MegaBytes,
    GigaBytes,
    TeraBytes,
    #[serde(other)]
    Unknown,
}

impl SizeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeUnit::Bytes => "Bytes",
            SizeUnit::KiloBytes => "KiloBytes",
            SizeUnit::MegaBytes => "MegaBytes",
            SizeUnit::GigaBytes => "GigaBytes",
            SizeUnit::TeraBytes => "TeraBytes",
            SizeUnit::Unknown => "Unknown",
        }
    }

    /// Bytes per unit, `None` for unknown units.
    pub fn multiplier(&self) -> Option<u64> {
        match self {
            SizeUnit::Bytes => Some(1),
            SizeUnit::KiloBytes => Some(1 << 10),
            SizeUnit::MegaBytes => Some(1 << 20),
            SizeUnit::GigaBytes => Some(1 << 30),
            SizeUnit::TeraBytes => Some(1 << 40),
            SizeUnit::Unknown => None,
        }
    }
}

/// Quantity with unit, e.g. a mailbox's consumed size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsumedSize {
    pub value: f64,
    pub units: SizeUnit,
}

impl ConsumedSize {
    /// Size in bytes, `None` for unknown units.
    pub fn bytes(&self) -> Option<u64> {
        self.units
            .multiplier()
            .map(|m| (self.value * m as f64).round() as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: Option<String>,
    pub login_name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub consumed_size: Option<ConsumedSize>,
}

impl User {
    /// `login@domain`.
    pub fn address(&self, domain: &str) -> String {
        format!("{}@{}", self.login_name, domain)
    }
}

/// One page of a list query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
    #[serde(default)]
    pub total_items: u64,
}

/// Sort direction of a query column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOrder {
    pub column_name: String,
    /// Usually `"Asc"`/`"Desc"`; servers may hand out their own constant.
    pub direction: Value,
}

impl SortOrder {
    pub fn new(column: &str, direction: SortDirection) -> Self {
        Self {
            column_name: column.to_string(),
            direction: serde_json::to_value(direction).unwrap_or(Value::Null),
        }
    }

    /// Sort using a direction value obtained from the server constants.
    pub fn with_direction(column: &str, direction: Value) -> Self {
        Self {
            column_name: column.to_string(),
            direction,
        }
    }
}

/// Filter condition of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub field_name: String,
    pub comparator: String,
    pub value: Value,
}

impl Condition {
    pub fn new(field: &str, comparator: &str, value: impl Into<Value>) -> Self {
        Self {
            field_name: field.to_string(),
            comparator: comparator.to_string(),
            value: value.into(),
        }
    }
}

/// Search query accepted by the `*.get` methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<SortOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combining: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl Query {
    pub fn fields(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn order_by(mut self, order: SortOrder) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    pub fn combining(mut self, combining: &str) -> Self {
        self.combining = Some(combining.to_string());
        self
    }

    pub fn page(mut self, start: u64, limit: u64) -> Self {
        self.start = Some(start);
        self.limit = Some(limit);
        self
    }
}
