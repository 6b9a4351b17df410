//! 在内存数据上执行解析后的查询

use crate::aggregate::{self, Aggregate, CountSeed};
use crate::ast::{AggregateFunc, ParsedQuery};
use crate::catalog::Dataset;
use crate::filter::apply_filters;
use crate::generator::ID_FIELD;
use crate::value::{Row, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

static NULL: Value = Value::Null;

/// 旧字段名及替代它们的规范字段名。
///
/// 每次解析聚合的源字段时都会查询此表。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldAliases {
    mappings: BTreeMap<String, String>,
}

impl FieldAliases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mappings(mappings: BTreeMap<String, String>) -> Self {
        Self { mappings }
    }

    /// 内置数据需要的重命名：`sales` 改为 `revenue`
    pub fn legacy() -> Self {
        let mut aliases = Self::new();
        aliases.insert("sales", "revenue");
        aliases
    }

    pub fn insert(&mut self, legacy: &str, canonical: &str) {
        self.mappings.insert(legacy.to_string(), canonical.to_string());
    }

    /// `field` 的规范名称，没有映射时返回 `field` 本身
    pub fn resolve<'a>(&'a self, field: &'a str) -> &'a str {
        self.mappings.get(field).map(String::as_str).unwrap_or(field)
    }

    /// 按规范名称从 `row` 读取 `field`，
    /// 找不到时回退为原始名称
    pub fn lookup<'r>(&self, row: &'r Row, field: &str) -> Option<&'r Value> {
        row.get(self.resolve(field)).or_else(|| row.get(field))
    }
}

/// 执行器配置，来自目录的 `executor` 对象
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub count_seed: CountSeed,
}

/// 执行解析后的查询。不保存单次执行的状态，
/// 同一个执行器可以被多次调用。
#[derive(Debug, Clone)]
pub struct Executor {
    aliases: FieldAliases,
    config: ExecutorConfig,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// 使用旧字段别名表和默认配置的执行器
    pub fn new() -> Self {
        Self::with_aliases(FieldAliases::legacy())
    }

    pub fn with_aliases(aliases: FieldAliases) -> Self {
        Self {
            aliases,
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// 按 WHERE 条件过滤 `rows`，有 GROUP BY 时再分组聚合。
    /// 没有 GROUP BY 时原样返回过滤后的行，
    /// 聚合被忽略。
    ///
    /// `rows` 不会被修改；返回的每一行都是新值。
    pub fn execute(&self, query: &ParsedQuery, rows: &[Row]) -> Vec<Row> {
        if query.is_empty() {
            debug!("empty query, nothing to execute");
            return Vec::new();
        }

        let filtered = apply_filters(&query.where_clause, rows);
        debug!(
            input = rows.len(),
            kept = filtered.len(),
            conditions = query.where_clause.len(),
            "applied filters"
        );

        if query.group_by.is_empty() {
            if !query.aggregations.is_empty() {
                debug!("no GROUP BY, aggregations ignored");
            }
            return filtered.into_iter().cloned().collect();
        }

        self.group(query, &filtered)
    }

    /// 在 FROM 子句指定的表上执行。
    /// 未知表返回空结果。
    pub fn execute_on(&self, query: &ParsedQuery, dataset: &Dataset) -> Vec<Row> {
        match dataset.table(&query.from) {
            Some(rows) => self.execute(query, rows),
            None => {
                warn!(table = %query.from, "unknown table");
                Vec::new()
            }
        }
    }

    fn group(&self, query: &ParsedQuery, rows: &[&Row]) -> Vec<Row> {
        for aggregation in &query.aggregations {
            if let AggregateFunc::Other(name) = &aggregation.func {
                warn!(func = %name, alias = %aggregation.alias, "unknown aggregation function, keeping first value");
            }
        }

        let mut index: HashMap<GroupKey, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();

        for row in rows {
            let key = GroupKey::of(row, &query.group_by);
            match index.get(&key) {
                Some(&position) => {
                    let group = &mut groups[position];
                    for (aggregation, (_, accumulator)) in
                        query.aggregations.iter().zip(group.accumulators.iter_mut())
                    {
                        accumulator.apply(self.source_value(row, &aggregation.field));
                    }
                }
                None => {
                    index.insert(key, groups.len());
                    groups.push(self.start_group(query, row));
                }
            }
        }

        debug!(groups = groups.len(), "grouped rows");
        groups.into_iter().map(Group::finish).collect()
    }

    fn start_group(&self, query: &ParsedQuery, first: &Row) -> Group {
        let mut row = Row::new();
        if let Some(id) = first.get(ID_FIELD) {
            row.insert(ID_FIELD.to_string(), id.clone());
        }
        for field in &query.group_by {
            if let Some(value) = first.get(field) {
                row.insert(field.clone(), value.clone());
            }
        }

        let accumulators = query
            .aggregations
            .iter()
            .map(|aggregation| {
                let seed = self.source_value(first, &aggregation.field);
                (
                    aggregation.alias.clone(),
                    aggregate::seeded(&aggregation.func, seed, self.config.count_seed),
                )
            })
            .collect();

        Group { row, accumulators }
    }

    fn source_value<'r>(&self, row: &'r Row, field: &str) -> &'r Value {
        self.aliases.lookup(row, field).unwrap_or(&NULL)
    }
}

/// 一行的分组字段值，按 GROUP BY 顺序排列，显示时以 `|` 连接
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(Vec<String>);

impl GroupKey {
    pub fn of(row: &Row, fields: &[String]) -> Self {
        GroupKey(
            fields
                .iter()
                .map(|field| row.get(field).map(Value::to_string).unwrap_or_default())
                .collect(),
        )
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("|"))
    }
}

struct Group {
    row: Row,
    accumulators: Vec<(String, Box<dyn Aggregate>)>,
}

impl Group {
    fn finish(self) -> Row {
        let mut row = self.row;
        for (alias, accumulator) in self.accumulators {
            row.insert(alias, accumulator.result());
        }
        row
    }
}
