//! 查询语言的token定义

/// token是语言的最小单元，带有类型和位置
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// token的类型
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // 关键字
    Select, // "SELECT"
    From,   // "FROM"
    Where,  // "WHERE"
    Group,  // "GROUP"
    By,     // "BY"
    As,     // "AS"
    And,    // "AND"
    Like,   // "LIKE"

    // 字面量
    Identifier(&'a str),
    /// 双引号标识符，不含引号
    QuotedIdentifier(&'a str),
    /// 单引号字符串，不含引号，仍保留转义（`''`）
    String(&'a str),
    /// 带反斜杠转义的 `E'...'` 字符串，不含引号
    EscapedString(&'a str),
    /// 原始数字文本，例如 `42`、`-3.5`
    Number(&'a str),

    // 标点符号
    LParen, // (
    RParen, // )
    Comma,  // ,
    Star,   // *
    Dot,    // .

    // 操作符
    Eq,    // =
    NotEq, // != or <>
    Gt,    // >
    Lt,    // <
    Gte,   // >=
    Lte,   // <=

    // 特殊
    Illegal, // 非法/未知字符
}

impl TokenKind<'_> {
    /// 开启一个查询子句的关键字
    pub fn is_clause_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Select | TokenKind::From | TokenKind::Where | TokenKind::Group
        )
    }
}

/// 表示源文本中的一个区间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// 起始字节偏移
    pub start: usize,
    /// 结束字节偏移
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// 此区间覆盖的 `source` 切片
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        source.get(self.start..self.end).unwrap_or("")
    }
}
