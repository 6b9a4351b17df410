//! 构建器会话状态。
//!
//! [`BuilderState`] 保存一个用户当前的选择、由其生成的查询文本
//! 以及最近一次的结果集。所有变更都经过 [`BuilderState::apply`]，
//! 因此除非用户手动编辑，查询文本始终与选择保持一致。

use crate::ast::AggregateFunc;
use crate::catalog::Dataset;
use crate::executor::Executor;
use crate::generator::{generate, is_sentinel};
use crate::model::{Dimension, Filter, Metric};
use crate::pagination::{paginate, total_pages, ITEMS_PER_PAGE};
use crate::parser::parse_query;
use crate::saved::{SavedQuery, DEFAULT_TABLE};
use crate::value::Row;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// 对构建器的一次变更
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SelectTable(String),
    SelectAggregation(AggregateFunc),
    ToggleMetric(Metric),
    ToggleDimension(Dimension),
    AddFilter(Filter),
    RemoveFilter(usize),
    ClearFilters,
    /// 替换查询文本，不改变选择
    EditQuery(String),
    LoadSaved(SavedQuery),
    Execute,
    SetPage(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuilderState {
    pub table: String,
    pub aggregation: AggregateFunc,
    pub metrics: Vec<Metric>,
    pub dimensions: Vec<Dimension>,
    pub filters: Vec<Filter>,
    pub query: String,
    pub results: Vec<Row>,
    /// 从1开始
    pub page: usize,
}

impl Default for BuilderState {
    fn default() -> Self {
        let mut state = Self {
            table: DEFAULT_TABLE.to_string(),
            aggregation: AggregateFunc::Sum,
            metrics: Vec::new(),
            dimensions: Vec::new(),
            filters: Vec::new(),
            query: String::new(),
            results: Vec::new(),
            page: 1,
        };
        state.regenerate();
        state
    }
}

impl BuilderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, action: Action, dataset: &Dataset, executor: &Executor) {
        match action {
            Action::SelectTable(table) => {
                self.table = table.to_lowercase();
                self.metrics.clear();
                self.dimensions.clear();
                self.filters.clear();
                self.regenerate();
            }
            Action::SelectAggregation(func) => {
                self.aggregation = func;
                self.regenerate();
            }
            Action::ToggleMetric(metric) => {
                toggle(&mut self.metrics, metric, |a, b| a.value == b.value);
                self.regenerate();
            }
            Action::ToggleDimension(dimension) => {
                toggle(&mut self.dimensions, dimension, |a, b| a.value == b.value);
                self.regenerate();
            }
            Action::AddFilter(filter) => {
                self.filters.push(filter);
                self.regenerate();
            }
            Action::RemoveFilter(index) => {
                if index < self.filters.len() {
                    self.filters.remove(index);
                    self.regenerate();
                }
            }
            Action::ClearFilters => {
                self.filters.clear();
                self.regenerate();
            }
            Action::EditQuery(query) => self.query = query,
            Action::LoadSaved(saved) => {
                self.table = saved.table_name.to_lowercase();
                self.aggregation = AggregateFunc::from_name(&saved.aggregation);
                self.metrics = saved.metrics;
                self.dimensions = saved.dimensions;
                self.filters = parse_query(&saved.query).where_clause;
                self.query = saved.query;
            }
            Action::Execute => self.execute(dataset, executor),
            Action::SetPage(page) => {
                let last = self.total_pages().max(1);
                self.page = page.clamp(1, last);
            }
        }
    }

    fn regenerate(&mut self) {
        self.query = generate(
            &self.table,
            &self.aggregation,
            &self.metrics,
            &self.dimensions,
            &self.filters,
        );
    }

    fn execute(&mut self, dataset: &Dataset, executor: &Executor) {
        self.page = 1;
        if is_sentinel(&self.query) {
            self.results.clear();
            return;
        }

        let parsed = parse_query(&self.query);
        let table = if parsed.from.is_empty() {
            self.table.clone()
        } else {
            parsed.from.to_lowercase()
        };

        self.results = match dataset.table(&table) {
            Some(rows) => executor.execute(&parsed, rows),
            None => {
                debug!(%table, "query names an unknown table");
                Vec::new()
            }
        };
        info!(%table, rows = self.results.len(), "executed query");
    }

    /// 当前查询的保存记录；没有可保存内容时为 `None`
    pub fn saved_record(&self, at: DateTime<Utc>) -> Option<SavedQuery> {
        if is_sentinel(&self.query) {
            return None;
        }
        Some(SavedQuery::new(
            &self.query,
            self.metrics.clone(),
            self.dimensions.clone(),
            &self.table,
            &self.aggregation.to_string(),
            at,
        ))
    }

    pub fn save(&self) -> Option<SavedQuery> {
        self.saved_record(Utc::now())
    }

    /// 当前页的数据行
    pub fn page_rows(&self) -> &[Row] {
        paginate(&self.results, self.page, ITEMS_PER_PAGE)
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.results.len(), ITEMS_PER_PAGE)
    }
}

fn toggle<T>(items: &mut Vec<T>, item: T, same: impl Fn(&T, &T) -> bool) {
    match items.iter().position(|existing| same(existing, &item)) {
        Some(position) => {
            items.remove(position);
        }
        None => items.push(item),
    }
}
