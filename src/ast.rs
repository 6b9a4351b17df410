//! 解析后查询的结构化表示

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 解析结果的根节点：每个子句对应一个字段。
///
/// 每个子句都有零值（空列表或空字符串），因此缺少任意子句的查询
/// 仍然是合法的 `ParsedQuery`。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    /// SELECT 列表中的普通字段名
    pub select: Vec<String>,
    /// SELECT 列表中的聚合调用
    pub aggregations: Vec<Aggregation>,
    /// FROM 子句中的表名
    pub from: String,
    /// 以 AND 连接的 WHERE 条件
    pub where_clause: Vec<FilterCondition>,
    /// GROUP BY 字段名，保持顺序
    pub group_by: Vec<String>,
}

impl ParsedQuery {
    /// 什么都没有识别出来时为真，例如占位查询
    pub fn is_empty(&self) -> bool {
        self.select.is_empty()
            && self.aggregations.is_empty()
            && self.from.is_empty()
            && self.where_clause.is_empty()
            && self.group_by.is_empty()
    }
}

/// SELECT 列表中的一个 `FUNC(field) [AS alias]` 项
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub func: AggregateFunc,
    pub field: String,
    /// 输出列名；未指定别名时等于 `field`
    pub alias: String,
}

/// 聚合函数名。无法识别的名称保存为 `Other`，
/// 执行器将其视为空操作。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
    Sum,
    Count,
    Avg,
    Min,
    Max,
    Other(String),
}

impl AggregateFunc {
    /// 不区分大小写查找；未知名称转为小写存入 `Other`
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "sum" => AggregateFunc::Sum,
            "count" => AggregateFunc::Count,
            "avg" => AggregateFunc::Avg,
            "min" => AggregateFunc::Min,
            "max" => AggregateFunc::Max,
            other => AggregateFunc::Other(other.to_string()),
        }
    }

    /// 小写名称，与解析结果中记录的一致
    pub fn name(&self) -> &str {
        match self {
            AggregateFunc::Sum => "sum",
            AggregateFunc::Count => "count",
            AggregateFunc::Avg => "avg",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
            AggregateFunc::Other(name) => name,
        }
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name().to_ascii_uppercase())
    }
}

impl Serialize for AggregateFunc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AggregateFunc {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(AggregateFunc::from_name(&name))
    }
}

/// 单个 `field operator value` 谓词
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: Operator,
    pub value: String,
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// 比较操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "LIKE")]
    Like,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
