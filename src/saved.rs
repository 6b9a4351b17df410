//! 保存的查询：用户保留以便之后重新执行的记录。
//!
//! 持久化由宿主负责；本模块在内存中维护列表，
//! 并负责与JSON之间的转换。

use crate::ast::ParsedQuery;
use crate::catalog::Dataset;
use crate::executor::Executor;
use crate::generator::is_sentinel;
use crate::model::{Dimension, Metric};
use crate::parser::parse_query;
use crate::value::Row;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// 保存的查询没有 FROM 子句时使用的表
pub const DEFAULT_TABLE: &str = "sales";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuery {
    /// 保存时刻距纪元的毫秒数
    pub id: i64,
    pub query: String,
    pub metrics: Vec<Metric>,
    pub dimensions: Vec<Dimension>,
    /// ISO-8601 格式的保存时间
    pub timestamp: String,
    pub table_name: String,
    pub aggregation: String,
}

impl SavedQuery {
    pub fn new(
        query: &str,
        metrics: Vec<Metric>,
        dimensions: Vec<Dimension>,
        table_name: &str,
        aggregation: &str,
        saved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: saved_at.timestamp_millis(),
            query: query.to_string(),
            metrics,
            dimensions,
            timestamp: saved_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            table_name: table_name.to_string(),
            aggregation: aggregation.to_string(),
        }
    }

    /// 查询 FROM 子句中的表名，小写
    pub fn source_table(&self) -> String {
        table_of(&parse_query(&self.query))
    }

    /// 重新解析保存的查询，并在其源表上执行
    pub fn execute(&self, dataset: &Dataset, executor: &Executor) -> Vec<Row> {
        if is_sentinel(&self.query) {
            return Vec::new();
        }
        let parsed = parse_query(&self.query);
        let table = table_of(&parsed);
        match dataset.table(&table) {
            Some(rows) => executor.execute(&parsed, rows),
            None => {
                debug!(%table, id = self.id, "saved query names an unknown table");
                Vec::new()
            }
        }
    }
}

fn table_of(parsed: &ParsedQuery) -> String {
    if parsed.from.is_empty() {
        DEFAULT_TABLE.to_string()
    } else {
        parsed.from.to_lowercase()
    }
}

/// 按保存顺序排列的查询，查询文本唯一
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedQueries {
    queries: Vec<SavedQuery>,
}

impl SavedQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加 `record`，除非相同的查询文本已保存。
    /// id 冲突时改为当前最大 id 之后的值。
    /// 返回是否已添加。
    pub fn save(&mut self, mut record: SavedQuery) -> bool {
        if self.queries.iter().any(|q| q.query == record.query) {
            debug!(id = record.id, "query already saved");
            return false;
        }
        if self.get(record.id).is_some() {
            record.id = self.queries.iter().map(|q| q.id).max().unwrap_or(0) + 1;
        }
        info!(id = record.id, table = %record.table_name, "saved query");
        self.queries.push(record);
        true
    }

    pub fn remove(&mut self, id: i64) -> Option<SavedQuery> {
        let position = self.queries.iter().position(|q| q.id == id)?;
        Some(self.queries.remove(position))
    }

    pub fn get(&self, id: i64) -> Option<&SavedQuery> {
        self.queries.iter().find(|q| q.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SavedQuery> {
        self.queries.iter()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// 执行 id 为 `id` 的保存查询（如果存在）
    pub fn execute(&self, id: i64, dataset: &Dataset, executor: &Executor) -> Option<Vec<Row>> {
        self.get(id).map(|saved| saved.execute(dataset, executor))
    }

    /// 读取JSON记录数组，丢弃重复的查询文本
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let records: Vec<SavedQuery> = serde_json::from_str(json)?;
        let mut saved = Self::new();
        for record in records {
            saved.save(record);
        }
        Ok(saved)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.queries)
    }
}
