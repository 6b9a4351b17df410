//! 查询构建器可选择的字段

use serde::{Deserialize, Serialize};

pub use crate::ast::FilterCondition as Filter;

/// 字段值的读取与展示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Currency,
    Number,
    Percentage,
    String,
}

/// 可聚合字段，以 `value` 作为标识
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub value: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl Metric {
    pub fn new(value: &str, label: &str, field_type: FieldType) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
            field_type,
        }
    }
}

/// 可分组字段，以 `value` 作为标识
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub value: String,
    pub label: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
}

impl Dimension {
    pub fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
            field_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_json_shape() {
        let metric: Metric =
            serde_json::from_str(r#"{"value":"revenue","label":"Revenue","type":"currency"}"#).unwrap();
        assert_eq!(metric, Metric::new("revenue", "Revenue", FieldType::Currency));
    }

    #[test]
    fn test_dimension_type_is_optional() {
        let dimension: Dimension = serde_json::from_str(r#"{"value":"region","label":"Region"}"#).unwrap();
        assert_eq!(dimension, Dimension::new("region", "Region"));
        assert_eq!(
            serde_json::to_string(&dimension).unwrap(),
            r#"{"value":"region","label":"Region"}"#
        );
    }
}
