//! 小型BI工具的查询构建器核心。
//!
//! 流水线分三个阶段：[`generator`] 将指标、维度和过滤条件的选择
//! 转换为查询文本，[`parser`] 将查询文本（生成的或手工编辑的）
//! 解析回 [`ParsedQuery`]，
//! [`executor`] 在内存数据上执行它。

pub mod aggregate;
pub mod ast;
pub mod catalog;
pub mod config;
pub mod executor;
pub mod filter;
pub mod generator;
pub mod lexer;
pub mod model;
pub mod pagination;
pub mod parser;
pub mod saved;
pub mod session;
pub mod token;
pub mod value;

pub use ast::{AggregateFunc, Aggregation, FilterCondition, Operator, ParsedQuery};
pub use catalog::{Catalog, Dataset, TableDefinition};
pub use executor::{Executor, ExecutorConfig, FieldAliases};
pub use generator::{generate, is_sentinel, NO_QUERY};
pub use model::{Dimension, FieldType, Filter, Metric};
pub use parser::parse_query;
pub use saved::{SavedQueries, SavedQuery};
pub use session::{Action, BuilderState};
pub use value::{row, Row, Value};
