//! SQL text parser.
//!
//! Grammar (keywords case-insensitive, trailing `;` tolerated):
//!
//! ```text
//! SELECT <cols|*> FROM <table> [JOIN <t> ON <col> = <col>] [WHERE <pred>]
//! INSERT INTO <table> (<cols>) VALUES (<lits>)
//! DELETE FROM <table> [WHERE <pred>]
//! pred := NOT? term ((AND|OR) NOT? term)*
//! term := <col> (=|<|<=|>|>=) <lit> | <col>        -- bare boolean column
//! lit  := signed decimal | TRUE | FALSE | 'single-quoted string'
//! ```
//!
//! A bare boolean column desugars to `col = TRUE`. Quoted strings carry
//! no escapes; commas inside quotes are respected in value lists.

use crate::predicate::CompareOp;
use crate::query::{
    Condition, Connector, DeleteQuery, InsertQuery, JoinSpec, SelectQuery, Statement, WhereClause,
};
use marrow_common::{MarrowError, Result, Value};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Bare word: identifier or keyword.
    Word(String),
    /// Signed integer literal.
    Int(i32),
    /// Single-quoted string literal, quotes stripped.
    Str(String),
    /// Comparison operator.
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
    Semicolon,
    Star,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Word(w) => write!(f, "{}", w),
            Token::Int(v) => write!(f, "{}", v),
            Token::Str(s) => write!(f, "'{}'", s),
            Token::Op(op) => write!(f, "{}", op),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::Star => write!(f, "*"),
        }
    }
}

fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            ';' => {
                chars.next();
                tokens.push(Token::Semicolon);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Op(CompareOp::Eq));
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CompareOp::Lte));
                } else {
                    tokens.push(Token::Op(CompareOp::Lt));
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CompareOp::Gte));
                } else {
                    tokens.push(Token::Op(CompareOp::Gt));
                }
            }
            '\'' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => s.push(c),
                        None => {
                            return Err(MarrowError::ParseError(
                                "unterminated string literal".to_string(),
                            ))
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            '-' => {
                chars.next();
                let mut digits = String::from("-");
                if !chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                    return Err(MarrowError::ParseError(
                        "expected digits after '-'".to_string(),
                    ));
                }
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        digits.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let v = digits.parse::<i32>().map_err(|_| {
                    MarrowError::ParseError(format!("invalid integer literal: {}", digits))
                })?;
                tokens.push(Token::Int(v));
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        digits.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let v = digits.parse::<i32>().map_err(|_| {
                    MarrowError::ParseError(format!("invalid integer literal: {}", digits))
                })?;
                tokens.push(Token::Int(v));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            other => {
                return Err(MarrowError::ParseError(format!(
                    "unexpected character: {:?}",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

/// Parses one SQL statement, dispatching on the leading keyword.
pub fn parse(sql: &str) -> Result<Statement> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser { tokens, pos: 0 };

    let statement = match parser.peek_keyword() {
        Some(k) if k == "SELECT" => Statement::Select(parser.parse_select()?),
        Some(k) if k == "INSERT" => Statement::Insert(parser.parse_insert()?),
        Some(k) if k == "DELETE" => Statement::Delete(parser.parse_delete()?),
        _ => {
            return Err(MarrowError::ParseError(
                "statement must start with SELECT, INSERT, or DELETE".to_string(),
            ))
        }
    };

    parser.expect_end()?;
    Ok(statement)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    /// Uppercased view of the next token if it is a bare word.
    fn peek_keyword(&self) -> Option<String> {
        match self.peek() {
            Some(Token::Word(w)) => Some(w.to_ascii_uppercase()),
            _ => None,
        }
    }

    /// Consumes the next token when it matches `keyword` case-insensitively.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword().as_deref() == Some(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(MarrowError::ParseError(format!(
                "expected {}, found {}",
                keyword,
                self.describe_next()
            )))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Word(w)) => Ok(w),
            other => Err(MarrowError::ParseError(format!(
                "expected identifier, found {}",
                Self::describe(other.as_ref())
            ))),
        }
    }

    fn expect_token(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(ref t) if t == expected => Ok(()),
            other => Err(MarrowError::ParseError(format!(
                "expected {}, found {}",
                expected,
                Self::describe(other.as_ref())
            ))),
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        if self.peek() == Some(&Token::Semicolon) {
            self.advance();
        }
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(MarrowError::ParseError(format!(
                "trailing input after statement: {}",
                t
            ))),
        }
    }

    fn describe_next(&self) -> String {
        Self::describe(self.peek())
    }

    fn describe(token: Option<&Token>) -> String {
        match token {
            Some(t) => t.to_string(),
            None => "end of input".to_string(),
        }
    }

    /// A literal: integer, quoted string, or TRUE/FALSE.
    fn expect_literal(&mut self) -> Result<Value> {
        match self.advance() {
            Some(Token::Int(v)) => Ok(Value::Int(v)),
            Some(Token::Str(s)) => Ok(Value::Varchar(s)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("true") => Ok(Value::Boolean(true)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("false") => Ok(Value::Boolean(false)),
            other => Err(MarrowError::ParseError(format!(
                "expected literal, found {}",
                Self::describe(other.as_ref())
            ))),
        }
    }

    fn parse_select(&mut self) -> Result<SelectQuery> {
        self.expect_keyword("SELECT")?;

        // Column list or '*'.
        let mut columns = Vec::new();
        if self.peek() == Some(&Token::Star) {
            self.advance();
        } else {
            loop {
                columns.push(self.expect_identifier()?);
                if self.peek() == Some(&Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        self.expect_keyword("FROM")?;
        let table = self.expect_identifier()?;

        let join = if self.eat_keyword("JOIN") {
            let right_table = self.expect_identifier()?;
            self.expect_keyword("ON")?;
            let left_column = self.expect_identifier()?;
            self.expect_token(&Token::Op(CompareOp::Eq))?;
            let right_column = self.expect_identifier()?;
            Some(JoinSpec {
                right_table,
                left_column,
                right_column,
            })
        } else {
            None
        };

        let where_clause = if self.eat_keyword("WHERE") {
            Some(self.parse_where()?)
        } else {
            None
        };

        Ok(SelectQuery {
            table,
            columns,
            where_clause,
            join,
        })
    }

    fn parse_insert(&mut self) -> Result<InsertQuery> {
        self.expect_keyword("INSERT")?;
        self.expect_keyword("INTO")?;
        let table = self.expect_identifier()?;

        self.expect_token(&Token::LParen)?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.expect_identifier()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                other => {
                    return Err(MarrowError::ParseError(format!(
                        "expected , or ) in column list, found {}",
                        Self::describe(other.as_ref())
                    )))
                }
            }
        }

        self.expect_keyword("VALUES")?;
        self.expect_token(&Token::LParen)?;
        let mut values = Vec::new();
        loop {
            values.push(self.expect_literal()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                other => {
                    return Err(MarrowError::ParseError(format!(
                        "expected , or ) in value list, found {}",
                        Self::describe(other.as_ref())
                    )))
                }
            }
        }

        InsertQuery::new(table, columns, values)
    }

    fn parse_delete(&mut self) -> Result<DeleteQuery> {
        self.expect_keyword("DELETE")?;
        self.expect_keyword("FROM")?;
        let table = self.expect_identifier()?;

        let where_clause = if self.eat_keyword("WHERE") {
            Some(self.parse_where()?)
        } else {
            None
        };

        Ok(DeleteQuery {
            table,
            where_clause,
        })
    }

    /// Flat AND/OR chain without parentheses; AND binds tighter downstream
    /// in the predicate compiler.
    fn parse_where(&mut self) -> Result<WhereClause> {
        let mut conditions = Vec::new();
        let mut connectors = Vec::new();

        loop {
            let negated = self.eat_keyword("NOT");
            let column = self.expect_identifier()?;

            let condition = match self.peek() {
                Some(Token::Op(_)) => {
                    let Some(Token::Op(op)) = self.advance() else {
                        unreachable!("peeked an operator token");
                    };
                    let literal = self.expect_literal()?;
                    Condition::new(column, op, literal, negated)
                }
                // Bare boolean column: `WHERE active` means `active = TRUE`.
                _ => Condition::new(column, CompareOp::Eq, Value::Boolean(true), negated),
            };
            conditions.push(condition);

            if self.eat_keyword("AND") {
                connectors.push(Connector::And);
            } else if self.eat_keyword("OR") {
                connectors.push(Connector::Or);
            } else {
                break;
            }
        }

        WhereClause::new(conditions, connectors)
    }
}
