//! 分组聚合的流式累加器
//!
//! 每个累加器以分组的第一行作为初始值，之后每行更新一次。
//! `result` 在任意时刻都有效，不必等到最后一行。

use crate::ast::AggregateFunc;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// 一个分组中一个聚合列的运行状态
pub trait Aggregate {
    fn apply(&mut self, value: &Value);
    fn result(&self) -> Value;
}

/// 新分组中 COUNT 的起始值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountSeed {
    /// 第一行计为一
    #[default]
    One,
    /// 第一行的字段值，与早期版本的查询构建器一致。
    /// 之后每行仍然加一。
    FieldValue,
}

/// 为 `func` 创建累加器，以分组的第一个值作为初始值。
/// 无法识别的函数得到一个保持初始值的累加器。
pub fn seeded(func: &AggregateFunc, first: &Value, count_seed: CountSeed) -> Box<dyn Aggregate> {
    match func {
        AggregateFunc::Sum => {
            let mut sum = Sum::new();
            sum.apply(first);
            Box::new(sum)
        }
        AggregateFunc::Count => {
            let count = match count_seed {
                CountSeed::One => 1.0,
                CountSeed::FieldValue => first.to_number(),
            };
            Box::new(Count { count })
        }
        AggregateFunc::Avg => {
            let mut avg = Avg::new();
            avg.apply(first);
            Box::new(avg)
        }
        AggregateFunc::Min => {
            let mut min = Min::new();
            min.apply(first);
            Box::new(min)
        }
        AggregateFunc::Max => {
            let mut max = Max::new();
            max.apply(first);
            Box::new(max)
        }
        AggregateFunc::Other(_) => Box::new(Passthrough { seed: first.clone() }),
    }
}

pub struct Sum {
    sum: Option<f64>,
}

impl Sum {
    pub fn new() -> Self {
        Sum { sum: None }
    }
}

impl Aggregate for Sum {
    fn apply(&mut self, value: &Value) {
        if let Some(v) = value.as_finite() {
            self.sum = Some(self.sum.unwrap_or(0.0) + v);
        }
    }

    fn result(&self) -> Value {
        self.sum.map_or(Value::Null, Value::Number)
    }
}

pub struct Count {
    count: f64,
}

impl Aggregate for Count {
    fn apply(&mut self, _value: &Value) {
        self.count += 1.0;
    }

    fn result(&self) -> Value {
        Value::from_finite(self.count)
    }
}

/// 维护 `(sum, count)`，需要时再计算平均值
pub struct Avg {
    sum: f64,
    count: usize,
}

impl Avg {
    pub fn new() -> Self {
        Avg { sum: 0.0, count: 0 }
    }
}

impl Aggregate for Avg {
    fn apply(&mut self, value: &Value) {
        if let Some(v) = value.as_finite() {
            self.sum += v;
            self.count += 1;
        }
    }

    fn result(&self) -> Value {
        if self.count > 0 {
            Value::Number(self.sum / self.count as f64)
        } else {
            Value::Null
        }
    }
}

pub struct Min {
    min: Option<f64>,
}

impl Min {
    pub fn new() -> Self {
        Min { min: None }
    }
}

impl Aggregate for Min {
    fn apply(&mut self, value: &Value) {
        if let Some(v) = value.as_finite() {
            self.min = Some(self.min.map_or(v, |min| min.min(v)));
        }
    }

    fn result(&self) -> Value {
        self.min.map_or(Value::Null, Value::Number)
    }
}

pub struct Max {
    max: Option<f64>,
}

impl Max {
    pub fn new() -> Self {
        Max { max: None }
    }
}

impl Aggregate for Max {
    fn apply(&mut self, value: &Value) {
        if let Some(v) = value.as_finite() {
            self.max = Some(self.max.map_or(v, |max| max.max(v)));
        }
    }

    fn result(&self) -> Value {
        self.max.map_or(Value::Null, Value::Number)
    }
}

/// 未知函数的空操作累加器
pub struct Passthrough {
    seed: Value,
}

impl Aggregate for Passthrough {
    fn apply(&mut self, _value: &Value) {}

    fn result(&self) -> Value {
        self.seed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(func: AggregateFunc, seed: CountSeed, values: &[Value]) -> Value {
        let (first, rest) = values.split_first().unwrap();
        let mut acc = seeded(&func, first, seed);
        for v in rest {
            acc.apply(v);
        }
        acc.result()
    }

    fn nums(values: &[f64]) -> Vec<Value> {
        values.iter().map(|&v| Value::from(v)).collect()
    }

    #[test]
    fn test_sum() {
        assert_eq!(run(AggregateFunc::Sum, CountSeed::One, &nums(&[100.0, 50.0])), Value::from(150.0));
    }

    #[test]
    fn test_avg_is_valid_after_every_row() {
        let mut acc = seeded(&AggregateFunc::Avg, &Value::from(100.0), CountSeed::One);
        assert_eq!(acc.result(), Value::from(100.0));
        acc.apply(&Value::from(50.0));
        assert_eq!(acc.result(), Value::from(75.0));
        acc.apply(&Value::from(0.0));
        assert_eq!(acc.result(), Value::from(50.0));
    }

    #[test]
    fn test_min_max() {
        let values = nums(&[7.0, 3.0, 9.0, 5.0]);
        assert_eq!(run(AggregateFunc::Min, CountSeed::One, &values), Value::from(3.0));
        assert_eq!(run(AggregateFunc::Max, CountSeed::One, &values), Value::from(9.0));
    }

    #[test]
    fn test_count_seeds_at_one() {
        let values = nums(&[40.0, 50.0, 60.0]);
        assert_eq!(run(AggregateFunc::Count, CountSeed::One, &values), Value::from(3.0));
    }

    #[test]
    fn test_count_seeded_with_field_value() {
        let values = nums(&[40.0, 50.0, 60.0]);
        assert_eq!(run(AggregateFunc::Count, CountSeed::FieldValue, &values), Value::from(42.0));
    }

    #[test]
    fn test_non_numeric_values_are_skipped() {
        let values = vec![Value::from("n/a"), Value::from(10.0), Value::Null, Value::from("20")];
        assert_eq!(run(AggregateFunc::Sum, CountSeed::One, &values), Value::from(30.0));
        assert_eq!(run(AggregateFunc::Avg, CountSeed::One, &values), Value::from(15.0));
        assert_eq!(run(AggregateFunc::Min, CountSeed::One, &values), Value::from(10.0));
        assert_eq!(run(AggregateFunc::Count, CountSeed::One, &values), Value::from(4.0));
    }

    #[test]
    fn test_no_numeric_values_is_null() {
        let values = vec![Value::from("East"), Value::from("West")];
        assert_eq!(run(AggregateFunc::Sum, CountSeed::One, &values), Value::Null);
        assert_eq!(run(AggregateFunc::Avg, CountSeed::One, &values), Value::Null);
        assert_eq!(run(AggregateFunc::Max, CountSeed::One, &values), Value::Null);
    }

    #[test]
    fn test_unknown_function_keeps_seed() {
        let values = nums(&[12.0, 99.0, 1.0]);
        let func = AggregateFunc::Other("median".to_string());
        assert_eq!(run(func, CountSeed::One, &values), Value::from(12.0));
    }
}
