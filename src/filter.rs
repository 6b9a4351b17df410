//! WHERE 条件的行谓词

use crate::ast::{FilterCondition, Operator};
use crate::value::{Row, Value};

impl FilterCondition {
    /// `row` 是否满足此条件。缺失字段按空字符串比较
    pub fn matches(&self, row: &Row) -> bool {
        let missing = Value::Text(String::new());
        let cell = row.get(&self.field).unwrap_or(&missing);

        match self.operator {
            Operator::Eq => loosely_equal(cell, &self.value),
            Operator::Gt => cell.to_number() > target(&self.value),
            Operator::Lt => cell.to_number() < target(&self.value),
            Operator::Gte => cell.to_number() >= target(&self.value),
            Operator::Lte => cell.to_number() <= target(&self.value),
            Operator::Like => like(&cell.to_string(), &self.value),
        }
    }
}

/// `row` 满足所有条件时为真，遇到第一个不满足的条件即停止
pub fn matches_all(conditions: &[FilterCondition], row: &Row) -> bool {
    conditions.iter().all(|condition| condition.matches(row))
}

/// 满足所有条件的行，保持输入顺序
pub fn apply_filters<'r>(conditions: &[FilterCondition], rows: &'r [Row]) -> Vec<&'r Row> {
    rows.iter()
        .filter(|row| matches_all(conditions, row))
        .collect()
}

fn target(value: &str) -> f64 {
    Value::Text(value.to_string()).to_number()
}

/// 不区分大小写的文本相等；两侧都是有限数字时按数值相等
fn loosely_equal(cell: &Value, expected: &str) -> bool {
    if cell.to_string().to_lowercase() == expected.to_lowercase() {
        return true;
    }
    match (cell.as_finite(), Value::Text(expected.to_string()).as_finite()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// 不区分大小写的 LIKE。`%` 匹配任意字符序列，并锚定两端；
/// 不含 `%` 的模式按子串匹配
pub fn like(text: &str, pattern: &str) -> bool {
    let text = text.to_lowercase();
    let pattern = pattern.to_lowercase();

    if !pattern.contains('%') {
        return text.contains(&pattern);
    }

    let parts: Vec<&str> = pattern.split('%').collect();
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return true,
    };
    let Some(mut remaining) = text.strip_prefix(first) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };

    for part in middle {
        match remaining.find(part) {
            Some(at) => remaining = &remaining[at + part.len()..],
            None => return false,
        }
    }
    remaining.len() >= last.len() && remaining.ends_with(last)
}
