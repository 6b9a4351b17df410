//! 查询语言的容错递归下降语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ SELECT → parse_select_list()
//! │             └─ 按顶层逗号拆分的每一项 → classify_select_item()
//!   │                  ├─ FUNC ( arg ) [AS alias] → Aggregation
//! │                  └─ 其他                      → 普通字段名
//!   ├─ FROM   → parse_table_name()
//!   ├─ WHERE  → parse_where_conditions()
//! │             └─ 按顶层 AND 拆分 → parse_condition()
//!   │                  └─ field operator value...
//!   ├─ GROUP  → parse_group_by()
//! │             └─ 期望 BY，然后是逗号分隔的字段
//! └─ 其他   → 跳过
//! ```
//!
//! ## 语法
//!
//! ```text
//! SELECT item (, item)* FROM table [WHERE cond (AND cond)*] [GROUP BY field (, field)*]
//! item  := field | FUNC(field) [AS alias]
//! cond  := field (= | > | < | >= | <= | LIKE) value
//! ```
//!
//! 关键字不区分大小写，标识符可以带或不带双引号。
//! 解析永远不会失败：无法理解的子句会被丢弃并记录日志，
//! 然后从下一个子句关键字继续解析。

use crate::ast::{AggregateFunc, Aggregation, FilterCondition, Operator, ParsedQuery};
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};
use std::fmt;
use tracing::debug;

pub struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token<'a>],
    position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    fn at_position(message: String, span: Span) -> Self {
        Self { message, span: Some(span) }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{} at {}-{}", self.message, span.start, span.end),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// 一步完成 `input` 的词法和语法分析
pub fn parse_query(input: &str) -> ParsedQuery {
    let tokens: Vec<_> = Lexer::new(input).collect();
    Parser::new(input, &tokens).parse()
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, tokens: &'a [Token<'a>]) -> Self {
        Self {
            source,
            tokens,
            position: 0,
        }
    }

    /// 返回当前token，不推进位置
    fn peek(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position)
    }

    /// 返回当前token并推进位置
    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    fn match_token(&self, kind: &TokenKind) -> bool {
        self.peek()
            .is_some_and(|token| std::mem::discriminant(&token.kind) == std::mem::discriminant(kind))
    }

    pub fn parse(&mut self) -> ParsedQuery {
        let mut query = ParsedQuery::default();

        while let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Select => {
                    self.advance();
                    self.parse_select_list(&mut query);
                }
                TokenKind::From => {
                    self.advance();
                    match self.parse_table_name() {
                        Ok(table) if query.from.is_empty() => query.from = table,
                        Ok(_) => {}
                        Err(e) => self.recover("FROM", e),
                    }
                }
                TokenKind::Where => {
                    self.advance();
                    let conditions = self.parse_where_conditions();
                    query.where_clause.extend(conditions);
                }
                TokenKind::Group => {
                    self.advance();
                    match self.parse_group_by() {
                        Ok(fields) => query.group_by.extend(fields),
                        Err(e) => self.recover("GROUP BY", e),
                    }
                }
                _ => {
                    self.advance(); // 不属于任何子句的token
                }
            }
        }

        query
    }

    /// 记录被丢弃的子句，并跳到下一个子句关键字
    fn recover(&mut self, clause: &str, error: ParseError) {
        debug!(clause, %error, "dropping unparseable clause");
        while let Some(token) = self.peek() {
            if token.kind.is_clause_keyword() {
                break;
            }
            self.advance();
        }
    }

    /// 消费token，直到括号深度为零且满足 `stop` 的token
    /// 或下一个子句关键字（均不包含）
    fn take_until(&mut self, stop: impl Fn(&TokenKind) -> bool) -> &'a [Token<'a>] {
        let start = self.position;
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match &token.kind {
                kind if kind.is_clause_keyword() => break,
                kind if depth == 0 && stop(kind) => break,
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.advance();
        }
        &self.tokens[start..self.position]
    }

    /// 一串token覆盖的源文本，去除首尾空白
    fn text_of(&self, tokens: &[Token<'a>]) -> &'a str {
        match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => Span::new(first.span.start, last.span.end)
                .text(self.source)
                .trim(),
            _ => "",
        }
    }

    fn parse_select_list(&mut self, query: &mut ParsedQuery) {
        loop {
            let item = self.take_until(|kind| matches!(kind, TokenKind::Comma));
            if !item.is_empty() {
                match self.classify_select_item(item) {
                    SelectItem::Field(field) => query.select.push(field),
                    SelectItem::Aggregation(aggregation) => query.aggregations.push(aggregation),
                }
            }
            if self.match_token(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// 检查一项是否符合 `FUNC ( arg ) [AS alias]`；否则视为普通字段
    fn classify_select_item(&self, item: &'a [Token<'a>]) -> SelectItem {
        if let [name, open, rest @ ..] = item {
            if let (TokenKind::Identifier(func), TokenKind::LParen) = (&name.kind, &open.kind) {
                if let Some(close) = matching_paren(rest) {
                    let argument = &rest[..close];
                    let trailing = &rest[close + 1..];
                    if !argument.is_empty() {
                        let field = self.field_name(argument);
                        let alias = match trailing {
                            [as_kw, alias, ..] if as_kw.kind == TokenKind::As => {
                                self.field_name(std::slice::from_ref(alias))
                            }
                            _ => field.clone(),
                        };
                        return SelectItem::Aggregation(Aggregation {
                            func: AggregateFunc::from_name(func),
                            field,
                            alias,
                        });
                    }
                }
            }
        }
        SelectItem::Field(self.field_name(item))
    }

    /// 字段引用的名称：单个标识符去掉引号，`*` 保持不变，
    /// 限定名 `t.field` 取最后一部分，
    /// 其他情况回退为去除空白的源文本
    fn field_name(&self, tokens: &'a [Token<'a>]) -> String {
        match tokens {
            [single] => match &single.kind {
                TokenKind::Identifier(_) | TokenKind::QuotedIdentifier(_) => {
                    identifier_name(single).unwrap_or_default()
                }
                TokenKind::Star => "*".to_string(),
                _ => self.text_of(tokens).to_string(),
            },
            [qualifier, dot, last]
                if identifier_name(qualifier).is_some() && dot.kind == TokenKind::Dot =>
            {
                identifier_name(last).unwrap_or_else(|| self.text_of(tokens).to_string())
            }
            _ => self.text_of(tokens).to_string(),
        }
    }

    fn parse_table_name(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(token) => match identifier_name(token) {
                Some(name) => {
                    self.advance();
                    Ok(name)
                }
                None => Err(ParseError::at_position(
                    format!("Expected table name, found {:?}", token.kind),
                    token.span,
                )),
            },
            None => Err(ParseError::new(
                "Expected table name, but reached end of input".to_string(),
                None,
            )),
        }
    }

    /// 按顶层 AND 拆分 WHERE 子句；无法解析的条件
    /// 单独丢弃
    fn parse_where_conditions(&mut self) -> Vec<FilterCondition> {
        let mut conditions = Vec::new();
        loop {
            let tokens = self.take_until(|kind| matches!(kind, TokenKind::And));
            if !tokens.is_empty() {
                match self.parse_condition(tokens) {
                    Ok(condition) => conditions.push(condition),
                    Err(error) => debug!(%error, "dropping WHERE condition"),
                }
            }
            if self.match_token(&TokenKind::And) {
                self.advance();
            } else {
                break;
            }
        }
        conditions
    }

    /// `field operator value...`
    fn parse_condition(&self, tokens: &'a [Token<'a>]) -> Result<FilterCondition, ParseError> {
        let [field, op, value @ ..] = tokens else {
            return Err(ParseError::new(
                format!("Incomplete condition '{}'", self.text_of(tokens)),
                tokens.first().map(|t| t.span),
            ));
        };

        let field = identifier_name(field).ok_or_else(|| {
            ParseError::at_position(
                format!("Expected field name, found {:?}", field.kind),
                field.span,
            )
        })?;

        let operator = match &op.kind {
            TokenKind::Eq => Operator::Eq,
            TokenKind::Gt => Operator::Gt,
            TokenKind::Lt => Operator::Lt,
            TokenKind::Gte => Operator::Gte,
            TokenKind::Lte => Operator::Lte,
            TokenKind::Like => Operator::Like,
            other => {
                return Err(ParseError::at_position(
                    format!("Unsupported operator {:?}", other),
                    op.span,
                ))
            }
        };

        if value.is_empty() {
            return Err(ParseError::at_position(
                format!("Missing value after '{}'", operator),
                op.span,
            ));
        }

        Ok(FilterCondition {
            field,
            operator,
            value: self.literal_value(value),
        })
    }

    /// 去掉两侧引号后的条件值
    fn literal_value(&self, tokens: &'a [Token<'a>]) -> String {
        match tokens {
            [single] => match &single.kind {
                TokenKind::String(s) => s.replace("''", "'"),
                TokenKind::EscapedString(s) => unescape(s),
                TokenKind::QuotedIdentifier(s) => s.replace("\"\"", "\""),
                TokenKind::Identifier(s) | TokenKind::Number(s) => s.to_string(),
                _ => strip_quotes(self.text_of(tokens)).to_string(),
            },
            _ => strip_quotes(self.text_of(tokens)).to_string(),
        }
    }

    fn parse_group_by(&mut self) -> Result<Vec<String>, ParseError> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::By => {
                self.advance();
            }
            Some(token) => {
                return Err(ParseError::at_position(
                    format!("Expected BY after GROUP, found {:?}", token.kind),
                    token.span,
                ))
            }
            None => {
                return Err(ParseError::new(
                    "Expected BY after GROUP, but reached end of input".to_string(),
                    None,
                ))
            }
        }

        let mut fields = Vec::new();
        loop {
            let item = self.take_until(|kind| matches!(kind, TokenKind::Comma));
            if !item.is_empty() {
                fields.push(self.field_name(item));
            }
            if self.match_token(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(fields)
    }
}

enum SelectItem {
    Field(String),
    Aggregation(Aggregation),
}

/// 普通标识符原样返回；带引号的标识符将 `""` 还原为 `"`
fn identifier_name(token: &Token<'_>) -> Option<String> {
    match token.kind {
        TokenKind::Identifier(name) => Some(name.to_string()),
        TokenKind::QuotedIdentifier(name) => Some(name.replace("\"\"", "\"")),
        _ => None,
    }
}

/// 还原 `E'...'` 内容中的反斜杠转义和双写引号
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some('b') => out.push('\u{8}'),
                Some('f') => out.push('\u{c}'),
                Some(other) => out.push(other),
                None => {}
            },
            '\'' if chars.peek() == Some(&'\'') => {
                chars.next();
                out.push('\'');
            }
            _ => out.push(c),
        }
    }
    out
}

/// 与已打开的括号匹配的 `)` 的下标
fn matching_paren(tokens: &[Token<'_>]) -> Option<usize> {
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen if depth == 0 => return Some(index),
            TokenKind::RParen => depth -= 1,
            _ => {}
        }
    }
    None
}

fn strip_quotes(text: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_shape() {
        let input = r#"SELECT "id", "region", SUM("revenue") AS "revenue" FROM "sales" WHERE "quantity" > '10' GROUP BY "region""#;
        let result = parse_query(input);

        assert_eq!(result.select, vec!["id", "region"]);
        assert_eq!(result.aggregations.len(), 1);
        assert_eq!(result.aggregations[0].func, AggregateFunc::Sum);
        assert_eq!(result.aggregations[0].field, "revenue");
        assert_eq!(result.aggregations[0].alias, "revenue");
        assert_eq!(result.from, "sales");
        assert_eq!(
            result.where_clause,
            vec![FilterCondition::new("quantity", Operator::Gt, "10")]
        );
        assert_eq!(result.group_by, vec!["region"]);
    }

    #[test]
    fn test_hand_written_lowercase_query() {
        let input = "select product, avg(profit) as avg_profit\nfrom Sales\ngroup by product";
        let result = parse_query(input);

        assert_eq!(result.select, vec!["product"]);
        assert_eq!(result.aggregations[0].func, AggregateFunc::Avg);
        assert_eq!(result.aggregations[0].field, "profit");
        assert_eq!(result.aggregations[0].alias, "avg_profit");
        assert_eq!(result.from, "Sales");
        assert_eq!(result.group_by, vec!["product"]);
    }

    #[test]
    fn test_alias_defaults_to_field() {
        let result = parse_query("SELECT MAX(quantity) FROM inventory");
        assert_eq!(result.aggregations[0].func, AggregateFunc::Max);
        assert_eq!(result.aggregations[0].alias, "quantity");
    }

    #[test]
    fn test_unknown_function_is_kept() {
        let result = parse_query("SELECT MEDIAN(revenue) AS revenue FROM sales");
        assert_eq!(result.aggregations[0].func, AggregateFunc::Other("median".to_string()));
    }

    #[test]
    fn test_count_star() {
        let result = parse_query("SELECT region, COUNT(*) AS n FROM sales GROUP BY region");
        assert_eq!(result.aggregations[0].field, "*");
        assert_eq!(result.aggregations[0].alias, "n");
    }

    #[test]
    fn test_multiple_conditions_and_like() {
        let input = "SELECT id FROM sales WHERE region = 'East' AND product LIKE 'Prod%' AND quantity <= 50";
        let result = parse_query(input);

        assert_eq!(
            result.where_clause,
            vec![
                FilterCondition::new("region", Operator::Eq, "East"),
                FilterCondition::new("product", Operator::Like, "Prod%"),
                FilterCondition::new("quantity", Operator::Lte, "50"),
            ]
        );
    }

    #[test]
    fn test_and_inside_quoted_value_does_not_split() {
        let result = parse_query("SELECT id FROM t WHERE name = 'Rock AND Roll'");
        assert_eq!(
            result.where_clause,
            vec![FilterCondition::new("name", Operator::Eq, "Rock AND Roll")]
        );
    }

    #[test]
    fn test_escaped_quote_in_value() {
        let result = parse_query("SELECT id FROM t WHERE name = 'O''Brien'");
        assert_eq!(result.where_clause[0].value, "O'Brien");
    }

    #[test]
    fn test_backslash_escaped_value() {
        let result = parse_query(r#"SELECT id FROM t WHERE name = E'say \"hi\" to O\'Brien'"#);
        assert_eq!(result.where_clause[0].value, r#"say "hi" to O'Brien"#);
    }

    #[test]
    fn test_backspace_and_form_feed_escapes() {
        let result = parse_query(r"SELECT id FROM t WHERE note = E'a\bb\fc'");
        assert_eq!(result.where_clause[0].value, "a\u{8}b\u{c}c");
    }

    #[test]
    fn test_doubled_quote_in_identifier() {
        let result = parse_query(
            r#"SELECT "id", "we""ird", SUM("re""v") AS "re""v" FROM "t" WHERE "we""ird" = 'x' GROUP BY "we""ird""#,
        );
        assert_eq!(result.select, vec!["id", r#"we"ird"#]);
        assert_eq!(result.aggregations[0].field, r#"re"v"#);
        assert_eq!(result.aggregations[0].alias, r#"re"v"#);
        assert_eq!(result.where_clause[0].field, r#"we"ird"#);
        assert_eq!(result.group_by, vec![r#"we"ird"#]);
    }

    #[test]
    fn test_unquoted_multi_word_value() {
        let result = parse_query("SELECT id FROM t WHERE region = North East");
        assert_eq!(result.where_clause[0].value, "North East");
    }

    #[test]
    fn test_bad_condition_is_dropped_others_kept() {
        let result = parse_query("SELECT id FROM t WHERE region != 'East' AND quantity > 5 AND profit");
        assert_eq!(
            result.where_clause,
            vec![FilterCondition::new("quantity", Operator::Gt, "5")]
        );
    }

    #[test]
    fn test_sentinel_parses_to_empty() {
        let result = parse_query("-- Select metrics or dimensions to generate a query");
        assert!(result.is_empty());
        assert_eq!(result, ParsedQuery::default());
    }

    #[test]
    fn test_where_and_group_without_select_or_from() {
        let result = parse_query("WHERE region = 'West' GROUP BY region, month");
        assert!(result.select.is_empty());
        assert!(result.aggregations.is_empty());
        assert_eq!(result.from, "");
        assert_eq!(result.where_clause.len(), 1);
        assert_eq!(result.group_by, vec!["region", "month"]);
    }

    #[test]
    fn test_group_without_by_is_dropped() {
        let result = parse_query("SELECT region FROM sales GROUP region");
        assert!(result.group_by.is_empty());
        assert_eq!(result.from, "sales");
    }

    #[test]
    fn test_missing_table_name() {
        let result = parse_query("SELECT region FROM WHERE q > 1");
        assert_eq!(result.from, "");
        assert_eq!(result.where_clause.len(), 1);
    }

    #[test]
    fn test_garbage_never_panics() {
        for input in ["", "(((", "SELECT", "SELECT ,,, FROM", "GROUP BY", "WHERE AND AND", "'", "\"", "SUM(", "))) AS"] {
            let _ = parse_query(input);
        }
    }

    #[test]
    fn test_nested_parens_stay_in_one_item() {
        let result = parse_query("SELECT ROUND(SUM(revenue), 2) AS total, region FROM sales");
        assert_eq!(result.select.len(), 1);
        assert_eq!(result.select[0], "region");
        assert_eq!(result.aggregations.len(), 1);
        assert_eq!(result.aggregations[0].alias, "total");
    }

    #[test]
    fn test_qualified_names() {
        let result = parse_query("SELECT s.region FROM sales GROUP BY s.region");
        assert_eq!(result.select, vec!["region"]);
        assert_eq!(result.group_by, vec!["region"]);
    }
}
