//! OData query options: `$filter`, `$orderby`, `$skip`, `$top`, `$select`.
//!
//! Options are applied in that order. `$top` is capped at `MAX_TOP`.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::catalog::Row;

pub const MAX_TOP: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryError(pub String);

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn err<T>(message: impl Into<String>) -> Result<T, QueryError> {
    Err(QueryError(message.into()))
}

/// Evaluate the query options in `params` against `rows`.
///
/// The returned rows hold only the projected columns; the caller decides
/// whether to attach `__metadata`.
pub fn apply(rows: &[Row], params: &HashMap<String, String>) -> Result<Vec<Row>, QueryError> {
    let option = |name: &str| params.get(name).map(|s| s.trim()).filter(|s| !s.is_empty());

    let mut selected: Vec<&Row> = match option("$filter") {
        Some(filter) => {
            let expr = parse_filter(filter)?;
            let mut matched = Vec::new();
            for row in rows {
                if expr.eval(row)? {
                    matched.push(row);
                }
            }
            matched
        }
        None => rows.iter().collect(),
    };

    if let Some(order_by) = option("$orderby") {
        let (field, descending) = parse_order_by(order_by)?;
        if let Some(row) = rows.first() {
            if !row.contains_key(field) {
                return err(format!("No property '{field}' exists"));
            }
        }
        selected.sort_by(|a, b| {
            let ordering = match (a.get(field), b.get(field)) {
                (Some(a), Some(b)) => compare(a, b).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            };
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }

    let skip = parse_count(option("$skip"), "$skip", 0)?;
    let top = parse_count(option("$top"), "$top", MAX_TOP)?.min(MAX_TOP);

    let columns: Option<Vec<&str>> = option("$select").map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    });

    selected
        .into_iter()
        .skip(skip)
        .take(top)
        .map(|row| project(row, columns.as_deref()))
        .collect()
}

fn parse_count(raw: Option<&str>, name: &str, default: usize) -> Result<usize, QueryError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| QueryError(format!("Invalid value '{raw}' for {name}"))),
    }
}

fn parse_order_by(raw: &str) -> Result<(&str, bool), QueryError> {
    let mut parts = raw.split_whitespace();
    let field = parts.next().unwrap_or_default();
    let descending = match parts.next() {
        None | Some("asc") => false,
        Some("desc") => true,
        Some(other) => return err(format!("Unexpected '{other}' in $orderby")),
    };
    if parts.next().is_some() {
        return err("Multiple sort keys are not supported");
    }
    Ok((field, descending))
}

fn project(row: &Row, columns: Option<&[&str]>) -> Result<Row, QueryError> {
    let Some(columns) = columns else {
        return Ok(row.clone());
    };
    let mut projected = Map::new();
    for column in columns {
        match row.get(*column) {
            Some(value) => {
                projected.insert(column.to_string(), value.clone());
            }
            None => return err(format!("No property '{column}' exists")),
        }
    }
    Ok(projected)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Op {
    fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "eq" => Op::Eq,
            "ne" => Op::Ne,
            "gt" => Op::Gt,
            "ge" => Op::Ge,
            "lt" => Op::Lt,
            "le" => Op::Le,
            _ => return None,
        })
    }
}

/// Parsed `$filter` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare { field: String, op: Op, literal: Value },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn eval(&self, row: &Row) -> Result<bool, QueryError> {
        Ok(match self {
            Expr::Compare { field, op, literal } => {
                let Some(value) = row.get(field) else {
                    return err(format!("No property '{field}' exists"));
                };
                let ordering = compare(value, literal);
                match op {
                    Op::Eq => ordering == Some(Ordering::Equal),
                    Op::Ne => ordering != Some(Ordering::Equal),
                    Op::Gt => ordering == Some(Ordering::Greater),
                    Op::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                    Op::Lt => ordering == Some(Ordering::Less),
                    Op::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                }
            }
            Expr::And(a, b) => a.eval(row)? && b.eval(row)?,
            Expr::Or(a, b) => a.eval(row)? || b.eval(row)?,
            Expr::Not(a) => !a.eval(row)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Word(String),
    Str(String),
    Num(f64),
}

fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '\'' => {
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        // '' is an escaped quote inside a literal
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            literal.push('\'');
                        }
                        Some('\'') => break,
                        Some(c) => literal.push(c),
                        None => return err("Unterminated string literal in $filter"),
                    }
                }
                tokens.push(Token::Str(literal));
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let mut number = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '-' || c == '.' {
                        number.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = number
                    .parse()
                    .map_err(|_| QueryError(format!("Invalid number '{number}' in $filter")))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_alphanumeric() || c == '_' => {
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
            other => return err(format!("Unexpected character '{other}' in $filter")),
        }
    }
    Ok(tokens)
}

/// Parse `field op literal` terms joined by `and`/`or`, with `not` and
/// parentheses. `and` binds tighter than `or`.
pub fn parse_filter(input: &str) -> Result<Expr, QueryError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or()?;
    if parser.pos != parser.tokens.len() {
        return err("Unexpected trailing tokens in $filter");
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.tokens.get(self.pos), Some(Token::Word(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<Expr, QueryError> {
        let mut expr = self.and()?;
        while self.eat_word("or") {
            expr = Expr::Or(Box::new(expr), Box::new(self.and()?));
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, QueryError> {
        let mut expr = self.unary()?;
        while self.eat_word("and") {
            expr = Expr::And(Box::new(expr), Box::new(self.unary()?));
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, QueryError> {
        if self.eat_word("not") {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, QueryError> {
        match self.next() {
            Some(Token::Open) => {
                let expr = self.or()?;
                match self.next() {
                    Some(Token::Close) => Ok(expr),
                    _ => err("Expected ')' in $filter"),
                }
            }
            Some(Token::Word(field)) => {
                let op = match self.next() {
                    Some(Token::Word(word)) => Op::from_keyword(&word),
                    _ => None,
                };
                let Some(op) = op else {
                    return err(format!("Expected an operator after '{field}'"));
                };
                let literal = match self.next() {
                    Some(Token::Str(s)) => Value::String(s),
                    Some(Token::Num(n)) => serde_json::Number::from_f64(n)
                        .map(Value::Number)
                        .ok_or_else(|| QueryError(format!("Invalid number in comparison with '{field}'")))?,
                    _ => return err(format!("Expected a literal after '{field}'")),
                };
                Ok(Expr::Compare { field, op, literal })
            }
            _ => err("Expected a comparison in $filter"),
        }
    }
}
