//! 生成器所产生的类SQL查询文本的词法分析器

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 返回下一个位置的字符，不推进位置
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// 跳过 `--` 注释直到行尾。
    /// 两个短横线已被消费。
    fn skip_line_comment(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        Token { kind, span: Span::new(start, self.position) }
    }

    /// 读取数字字面量，开头的 `-` 可能已被消费。
    fn read_number(&mut self, start: usize) -> Token<'a> {
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else if c == '.' && !seen_dot && self.peek_next().is_some_and(|n| n.is_ascii_digit()) {
                seen_dot = true;
                self.bump();
            } else {
                break;
            }
        }
        self.token(TokenKind::Number(&self.input[start..self.position]), start)
    }

    /// 读取单引号字符串，开头的引号已被消费。
    /// 连续两个引号（`''`）表示转义的引号，不会结束字面量；
    /// 未闭合的字面量一直读到输入末尾。
    fn read_string(&mut self, start: usize) -> Token<'a> {
        let content_start = self.position;
        let mut content_end = self.input.len();
        while let Some(c) = self.peek() {
            if c == '\'' {
                if self.peek_next() == Some('\'') {
                    self.bump();
                    self.bump();
                    continue;
                }
                content_end = self.position;
                self.bump(); // 结束引号
                break;
            }
            self.bump();
        }
        let content = &self.input[content_start..content_end.min(self.position)];
        self.token(TokenKind::String(content), start)
    }

    /// 读取 `E'...'` 字符串，`E` 和开头的引号已被消费。
    /// 反斜杠转义其后的一个字符。
    fn read_escaped_string(&mut self, start: usize) -> Token<'a> {
        let content_start = self.position;
        let mut content_end = self.input.len();
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '\'' if self.peek_next() == Some('\'') => {
                    self.bump();
                    self.bump();
                }
                '\'' => {
                    content_end = self.position;
                    self.bump();
                    break;
                }
                _ => {
                    self.bump();
                }
            }
        }
        let content = &self.input[content_start..content_end.min(self.position)];
        self.token(TokenKind::EscapedString(content), start)
    }

    /// 读取双引号标识符，开头的引号已被消费；
    /// 内部连续的 `""` 保留在token文本中。
    fn read_quoted_identifier(&mut self, start: usize) -> Token<'a> {
        let content_start = self.position;
        let mut content_end = self.input.len();
        while let Some(c) = self.peek() {
            if c == '"' {
                if self.peek_next() == Some('"') {
                    self.bump();
                    self.bump();
                    continue;
                }
                content_end = self.position;
                self.bump();
                break;
            }
            self.bump();
        }
        let content = &self.input[content_start..content_end.min(self.position)];
        self.token(TokenKind::QuotedIdentifier(content), start)
    }

    /// 读取标识符或关键字：字母、数字和下划线
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.position];
        if (literal == "E" || literal == "e") && self.peek() == Some('\'') {
            self.bump();
            return self.read_escaped_string(start);
        }
        self.token(match_keyword(literal), start)
    }
}

fn match_keyword(s: &str) -> TokenKind {
    match s.to_ascii_lowercase().as_str() {
        "select" => TokenKind::Select,
        "from" => TokenKind::From,
        "where" => TokenKind::Where,
        "group" => TokenKind::Group,
        "by" => TokenKind::By,
        "as" => TokenKind::As,
        "and" => TokenKind::And,
        "like" => TokenKind::Like,
        _ => TokenKind::Identifier(s),
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.skip_whitespace();
            let start = self.position;

            let c = self.bump()?;

            let token = match c {
                '-' if self.peek() == Some('-') => {
                    self.bump();
                    self.skip_line_comment();
                    continue;
                }
                '-' if self.peek().is_some_and(|n| n.is_ascii_digit()) => self.read_number(start),
                '=' => self.token(TokenKind::Eq, start),
                '(' => self.token(TokenKind::LParen, start),
                ')' => self.token(TokenKind::RParen, start),
                ',' => self.token(TokenKind::Comma, start),
                '*' => self.token(TokenKind::Star, start),
                '.' => self.token(TokenKind::Dot, start),
                '<' => match self.peek() {
                    Some('=') => {
                        self.bump();
                        self.token(TokenKind::Lte, start)
                    }
                    Some('>') => {
                        self.bump();
                        self.token(TokenKind::NotEq, start)
                    }
                    _ => self.token(TokenKind::Lt, start),
                },
                '>' => {
                    if self.peek() == Some('=') {
                        self.bump();
                        self.token(TokenKind::Gte, start)
                    } else {
                        self.token(TokenKind::Gt, start)
                    }
                }
                '!' => {
                    if self.peek() == Some('=') {
                        self.bump();
                        self.token(TokenKind::NotEq, start)
                    } else {
                        self.token(TokenKind::Illegal, start)
                    }
                }
                '\'' => self.read_string(start),
                '"' => self.read_quoted_identifier(start),
                c if c.is_ascii_digit() => self.read_number(start),
                c if c.is_alphabetic() || c == '_' => self.read_identifier(start),
                _ => self.token(TokenKind::Illegal, start),
            };
            return Some(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        Lexer::new(input).map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_select() {
        let input = "SELECT id, region FROM sales";
        let mut lexer = Lexer::new(input);

        assert_eq!(lexer.next().unwrap().kind, TokenKind::Select);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Identifier("id"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Comma);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Identifier("region"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::From);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Identifier("sales"));
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn test_all_operators_and_punctuation() {
        let input = "!= <> = > < >= <= ( ) , * .";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::NotEq, TokenKind::NotEq, TokenKind::Eq, TokenKind::Gt,
                TokenKind::Lt, TokenKind::Gte, TokenKind::Lte, TokenKind::LParen,
                TokenKind::RParen, TokenKind::Comma, TokenKind::Star, TokenKind::Dot,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let input = "select FROM wHeRe group By as AND like revenue_2024";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Select, TokenKind::From, TokenKind::Where, TokenKind::Group,
                TokenKind::By, TokenKind::As, TokenKind::And, TokenKind::Like,
                TokenKind::Identifier("revenue_2024"),
            ]
        );
    }

    #[test]
    fn test_numbers_and_strings() {
        let input = "12345 -7 3.25 'Product A' \"region\"";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Number("12345"),
                TokenKind::Number("-7"),
                TokenKind::Number("3.25"),
                TokenKind::String("Product A"),
                TokenKind::QuotedIdentifier("region"),
            ]
        );
    }

    #[test]
    fn test_escaped_quote_stays_inside_string() {
        let input = "'O''Brien' AND";
        assert_eq!(kinds(input), vec![TokenKind::String("O''Brien"), TokenKind::And]);
    }

    #[test]
    fn test_escaped_string_prefix() {
        let input = r"E'O\'Brien' e";
        assert_eq!(
            kinds(input),
            vec![TokenKind::EscapedString(r"O\'Brien"), TokenKind::Identifier("e")]
        );
    }

    #[test]
    fn test_doubled_quote_stays_inside_identifier() {
        assert_eq!(
            kinds(r#""we""ird", x"#),
            vec![
                TokenKind::QuotedIdentifier(r#"we""ird"#),
                TokenKind::Comma,
                TokenKind::Identifier("x"),
            ]
        );
    }

    #[test]
    fn test_unterminated_string_runs_to_end() {
        assert_eq!(kinds("'East"), vec![TokenKind::String("East")]);
    }

    #[test]
    fn test_comment_is_skipped() {
        assert!(kinds("-- Select metrics or dimensions to generate a query").is_empty());
        assert_eq!(
            kinds("-- leading note\nFROM sales"),
            vec![TokenKind::From, TokenKind::Identifier("sales")]
        );
    }

    #[test]
    fn test_aggregate_call() {
        let input = r#"SUM("revenue") AS "revenue""#;
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Identifier("SUM"),
                TokenKind::LParen,
                TokenKind::QuotedIdentifier("revenue"),
                TokenKind::RParen,
                TokenKind::As,
                TokenKind::QuotedIdentifier("revenue"),
            ]
        );
    }

    #[test]
    fn test_spans_cover_source_text() {
        let input = "WHERE q >= '10'";
        let tokens: Vec<_> = Lexer::new(input).collect();
        assert_eq!(tokens[0].span.text(input), "WHERE");
        assert_eq!(tokens[2].span.text(input), ">=");
        assert_eq!(tokens[3].span.text(input), "'10'");
    }

    #[test]
    fn test_lone_bang_is_illegal() {
        assert_eq!(kinds("!"), vec![TokenKind::Illegal]);
    }
}
