//! 根据结构化选择生成查询，通过 sea-query 渲染

use crate::ast::{AggregateFunc, Operator};
use crate::lexer::Lexer;
use crate::model::{Dimension, Filter, Metric};
use crate::token::TokenKind;
use sea_query::{Expr, Func, Iden, PostgresQueryBuilder, Query, SimpleExpr};

/// 未选择任何内容时代替查询返回的占位文本
pub const NO_QUERY: &str = "-- Select metrics or dimensions to generate a query";

/// 每个生成的查询首先选择的列，使结果行保持可定位
pub const ID_FIELD: &str = "id";

/// 不应被解析或执行的文本返回真：空白文本
/// 或以注释标记开头的文本
pub fn is_sentinel(query: &str) -> bool {
    let trimmed = query.trim_start();
    trimmed.is_empty() || trimmed.starts_with("--")
}

/// sea-query 的标识符包装
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// 为一次选择构建查询文本。
///
/// SELECT 列表依次为 id 列、维度、每个指标一个
/// `AGG(metric) AS metric`，均保持给定顺序。过滤条件以 AND
/// 连接写入 WHERE 子句，维度在 GROUP BY 中重复出现。
/// FROM、WHERE、GROUP BY 各起一行，每个过滤条件各占一行。
/// 相同输入总是生成相同文本。
pub fn generate(
    table: &str,
    aggregation: &AggregateFunc,
    metrics: &[Metric],
    dimensions: &[Dimension],
    filters: &[Filter],
) -> String {
    if metrics.is_empty() && dimensions.is_empty() {
        return NO_QUERY.to_string();
    }

    let mut select = Query::select();
    select.column(ColumnName(ID_FIELD.to_string()));

    for dimension in dimensions {
        select.column(ColumnName(dimension.value.clone()));
    }

    for metric in metrics {
        select.expr_as(
            aggregate_call(aggregation, &metric.value),
            ColumnName(metric.value.clone()),
        );
    }

    select.from(ColumnName(table.to_string()));

    for filter in filters {
        select.and_where(filter_expr(filter));
    }

    for dimension in dimensions {
        select.group_by_col(ColumnName(dimension.value.clone()));
    }

    layout(&select.to_string(PostgresQueryBuilder))
}

/// 在顶层子句关键字和 WHERE 中的顶层 AND 前换行
fn layout(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 16);
    let mut last = 0;
    let mut depth = 0usize;
    let mut in_where = false;

    for token in Lexer::new(sql) {
        let prefix = match token.kind {
            TokenKind::LParen => {
                depth += 1;
                None
            }
            TokenKind::RParen => {
                depth = depth.saturating_sub(1);
                None
            }
            TokenKind::From | TokenKind::Group if depth == 0 => {
                in_where = false;
                Some("\n")
            }
            TokenKind::Where if depth == 0 => {
                in_where = true;
                Some("\n")
            }
            TokenKind::And if depth == 0 && in_where => Some("\n  "),
            _ => None,
        };
        if let Some(prefix) = prefix {
            out.push_str(sql[last..token.span.start].trim_end());
            out.push_str(prefix);
            last = token.span.start;
        }
    }

    out.push_str(&sql[last..]);
    out
}

fn aggregate_call(aggregation: &AggregateFunc, field: &str) -> SimpleExpr {
    let col = Expr::col(ColumnName(field.to_string()));
    match aggregation {
        AggregateFunc::Sum => Func::sum(col).into(),
        AggregateFunc::Count => Func::count(col).into(),
        AggregateFunc::Avg => Func::avg(col).into(),
        AggregateFunc::Min => Func::min(col).into(),
        AggregateFunc::Max => Func::max(col).into(),
        AggregateFunc::Other(name) => Func::cust(ColumnName(name.to_ascii_uppercase()))
            .arg(col)
            .into(),
    }
}

/// `field operator 'value'`；LIKE 形式相同，值作为 `%` 模式
fn filter_expr(filter: &Filter) -> SimpleExpr {
    let col = Expr::col(ColumnName(filter.field.clone()));
    let value = filter.value.clone();
    match filter.operator {
        Operator::Eq => col.eq(value),
        Operator::Gt => col.gt(value),
        Operator::Lt => col.lt(value),
        Operator::Gte => col.gte(value),
        Operator::Lte => col.lte(value),
        Operator::Like => col.like(value),
    }
}
