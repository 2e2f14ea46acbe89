use crate::collection::Document;
use crate::common::{
    SortOrder, Value, KW_AND, KW_ASC, KW_DESC, KW_FILTER, KW_FOR, KW_IN, KW_LIMIT, KW_RETURN,
    KW_SORT,
};
use crate::errors::{ErrorKind, StoreError, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt::Display;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(?:(?P<ws>\s+)|(?P<word>[A-Za-z_][A-Za-z0-9_]*)|@(?P<param>[A-Za-z_][A-Za-z0-9_]*)|(?P<num>-?[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?)|"(?P<dq>(?:[^"\\]|\\.)*)"|'(?P<sq>(?:[^'\\]|\\.)*)'|(?P<op>==|!=|>=|<=|>|<|&&)|(?P<punct>[.,]))"#,
    )
    .expect("token pattern is valid")
});

/// Relational operator of a `FILTER` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Ne,
}

impl CompareOp {
    fn parse(symbol: &str) -> Option<CompareOp> {
        match symbol {
            ">" => Some(CompareOp::Gt),
            "<" => Some(CompareOp::Lt),
            ">=" => Some(CompareOp::Gte),
            "<=" => Some(CompareOp::Lte),
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            _ => None,
        }
    }

    /// The operator to use when both sides of the condition are swapped.
    fn flipped(self) -> CompareOp {
        match self {
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Gte => CompareOp::Lte,
            CompareOp::Lte => CompareOp::Gte,
            other => other,
        }
    }

    /// Whether `left <op> right` holds given `left.cmp(right)`.
    pub fn test(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
        }
    }
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        };
        write!(f, "{}", symbol)
    }
}

/// Right-hand side of a condition: a bind parameter or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Param(String),
    Literal(Value),
}

impl Operand {
    fn bind(&self, params: &Document) -> StoreResult<Value> {
        match self {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Param(name) => params.get(name).cloned().ok_or_else(|| {
                log::error!("Bind parameter @{} is not bound", name);
                StoreError::new(
                    &format!("Bind parameter @{} is not bound", name),
                    ErrorKind::UnboundParameter,
                )
            }),
        }
    }
}

/// `<var>.<field> <op> <operand>`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: CompareOp,
    pub operand: Operand,
}

/// A condition whose operand has been resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundCondition {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl BoundCondition {
    /// Tests `document`; a missing field compares as `null`.
    pub fn matches(&self, document: &Document, separator: &str) -> bool {
        let actual = document.get_path(&self.field, separator).unwrap_or(&Value::Null);
        self.op.test(actual.cmp(&self.value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub offset: Option<Operand>,
    pub count: Operand,
}

/// A parsed query of the supported subset:
///
/// ```text
/// FOR <var> IN <collection>
///   [FILTER <cond> [(&& | AND) <cond>]...]...
///   [SORT <var>.<field> [ASC|DESC] [, ...]]
///   [LIMIT [<offset>,] <count>]
///   RETURN <var>
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub variable: String,
    pub collection: String,
    pub conditions: Vec<Condition>,
    pub sort: Vec<SortKey>,
    pub limit: Option<Limit>,
}

/// A query with every bind parameter resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub collection: String,
    pub conditions: Vec<BoundCondition>,
    pub sort: Vec<SortKey>,
    pub offset: usize,
    pub count: Option<usize>,
}

impl Query {
    /// Parses `text`; nested field references are joined with `separator`.
    pub fn parse(text: &str, separator: &str) -> StoreResult<Query> {
        let tokens = tokenize(text)?;
        Parser {
            tokens,
            position: 0,
            separator,
        }
        .parse_query()
    }

    /// Resolves every `@param` from `params`.
    pub fn bind(&self, params: &Document) -> StoreResult<BoundQuery> {
        let conditions = self
            .conditions
            .iter()
            .map(|condition| {
                Ok(BoundCondition {
                    field: condition.field.clone(),
                    op: condition.op,
                    value: condition.operand.bind(params)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let (offset, count) = match &self.limit {
            Some(limit) => {
                let offset = match &limit.offset {
                    Some(operand) => bind_count(operand, params)?,
                    None => 0,
                };
                (offset, Some(bind_count(&limit.count, params)?))
            }
            None => (0, None),
        };

        Ok(BoundQuery {
            collection: self.collection.clone(),
            conditions,
            sort: self.sort.clone(),
            offset,
            count,
        })
    }
}

fn bind_count(operand: &Operand, params: &Document) -> StoreResult<usize> {
    let value = operand.bind(params)?;
    match value.as_i64() {
        Some(n) if n >= 0 => Ok(n as usize),
        _ => {
            log::error!("LIMIT expects a non-negative integer, found {}", value);
            Err(StoreError::new(
                &format!("LIMIT expects a non-negative integer, found {}", value),
                ErrorKind::MalformedQuery,
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Param(String),
    Literal(Value),
    Op(String),
    Dot,
    Comma,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Word(w) => write!(f, "{}", w),
            Token::Param(p) => write!(f, "@{}", p),
            Token::Literal(v) => write!(f, "{}", v),
            Token::Op(o) => write!(f, "{}", o),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
        }
    }
}

fn malformed(message: String) -> StoreError {
    log::error!("Malformed query: {}", message);
    StoreError::new(&message, ErrorKind::MalformedQuery)
}

fn tokenize(text: &str) -> StoreResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut position = 0;

    while position < text.len() {
        let rest = &text[position..];
        let captures = TOKEN
            .captures(rest)
            .ok_or_else(|| malformed(format!("Unexpected character at offset {} in query", position)))?;
        let whole = captures.get(0).map(|m| m.end()).unwrap_or(0);
        if whole == 0 {
            return Err(malformed(format!("Unexpected character at offset {} in query", position)));
        }

        if captures.name("ws").is_some() {
            // skip
        } else if let Some(word) = captures.name("word") {
            tokens.push(Token::Word(word.as_str().to_string()));
        } else if let Some(param) = captures.name("param") {
            tokens.push(Token::Param(param.as_str().to_string()));
        } else if let Some(number) = captures.name("num") {
            tokens.push(Token::Literal(parse_number(number.as_str())?));
        } else if let Some(string) = captures.name("dq").or_else(|| captures.name("sq")) {
            tokens.push(Token::Literal(Value::String(unescape(string.as_str()))));
        } else if let Some(op) = captures.name("op") {
            tokens.push(Token::Op(op.as_str().to_string()));
        } else if let Some(punct) = captures.name("punct") {
            tokens.push(if punct.as_str() == "." { Token::Dot } else { Token::Comma });
        }

        position += whole;
    }

    Ok(tokens)
}

fn parse_number(text: &str) -> StoreResult<Value> {
    if !text.contains(['.', 'e', 'E']) {
        if let Ok(int) = text.parse::<i64>() {
            return Ok(Value::I64(int));
        }
    }
    text.parse::<f64>()
        .map(Value::F64)
        .map_err(|_| malformed(format!("Invalid number literal {}", text)))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

struct Parser<'a> {
    tokens: Vec<Token>,
    position: usize,
    separator: &'a str,
}

impl Parser<'_> {
    fn parse_query(mut self) -> StoreResult<Query> {
        self.expect_keyword(KW_FOR)?;
        let variable = self.expect_identifier("loop variable")?;
        self.expect_keyword(KW_IN)?;
        let collection = self.expect_identifier("collection name")?;

        let mut conditions = Vec::new();
        while self.accept_keyword(KW_FILTER) {
            conditions.push(self.parse_condition(&variable)?);
            while self.accept_op("&&") || self.accept_keyword(KW_AND) {
                conditions.push(self.parse_condition(&variable)?);
            }
        }

        let mut sort = Vec::new();
        if self.accept_keyword(KW_SORT) {
            loop {
                let field = self.parse_field(&variable)?;
                let order = if self.accept_keyword(KW_DESC) {
                    SortOrder::Descending
                } else {
                    self.accept_keyword(KW_ASC);
                    SortOrder::Ascending
                };
                sort.push(SortKey { field, order });
                if !self.accept(&Token::Comma) {
                    break;
                }
            }
        }

        let mut limit = None;
        if self.accept_keyword(KW_LIMIT) {
            let first = self.parse_operand()?;
            limit = Some(if self.accept(&Token::Comma) {
                Limit {
                    offset: Some(first),
                    count: self.parse_operand()?,
                }
            } else {
                Limit {
                    offset: None,
                    count: first,
                }
            });
        }

        self.expect_keyword(KW_RETURN)?;
        let returned = self.expect_identifier("return variable")?;
        if returned != variable {
            return Err(malformed(format!(
                "RETURN {} does not reference loop variable {}",
                returned, variable
            )));
        }

        if let Some(token) = self.peek() {
            return Err(malformed(format!("Unexpected trailing token {}", token)));
        }

        Ok(Query {
            variable,
            collection,
            conditions,
            sort,
            limit,
        })
    }

    fn parse_condition(&mut self, variable: &str) -> StoreResult<Condition> {
        if self.peek_field(variable) {
            let field = self.parse_field(variable)?;
            let op = self.expect_compare_op()?;
            let operand = self.parse_operand()?;
            Ok(Condition { field, op, operand })
        } else {
            let operand = self.parse_operand()?;
            let op = self.expect_compare_op()?;
            let field = self.parse_field(variable)?;
            Ok(Condition {
                field,
                op: op.flipped(),
                operand,
            })
        }
    }

    fn parse_field(&mut self, variable: &str) -> StoreResult<String> {
        let head = self.expect_identifier("field reference")?;
        if head != variable {
            return Err(malformed(format!(
                "Field reference {} does not start with loop variable {}",
                head, variable
            )));
        }

        let mut segments = Vec::new();
        while self.accept(&Token::Dot) {
            match self.next() {
                Some(Token::Word(segment)) => segments.push(segment),
                Some(other) => {
                    return Err(malformed(format!("Expected field name after '.', found {}", other)))
                }
                None => return Err(malformed("Expected field name after '.'".to_string())),
            }
        }

        if segments.is_empty() {
            return Err(malformed(format!("Expected {}.<field>", variable)));
        }
        Ok(segments.join(self.separator))
    }

    fn parse_operand(&mut self) -> StoreResult<Operand> {
        match self.next() {
            Some(Token::Param(name)) => Ok(Operand::Param(name)),
            Some(Token::Literal(value)) => Ok(Operand::Literal(value)),
            Some(Token::Word(word)) => match word.to_ascii_lowercase().as_str() {
                "true" => Ok(Operand::Literal(Value::Bool(true))),
                "false" => Ok(Operand::Literal(Value::Bool(false))),
                "null" => Ok(Operand::Literal(Value::Null)),
                _ => Err(malformed(format!("Expected a bind parameter or literal, found {}", word))),
            },
            Some(other) => Err(malformed(format!("Expected a bind parameter or literal, found {}", other))),
            None => Err(malformed("Expected a bind parameter or literal".to_string())),
        }
    }

    fn expect_compare_op(&mut self) -> StoreResult<CompareOp> {
        match self.next() {
            Some(Token::Op(symbol)) => CompareOp::parse(&symbol)
                .ok_or_else(|| malformed(format!("Unsupported operator {}", symbol))),
            Some(other) => Err(malformed(format!("Expected comparison operator, found {}", other))),
            None => Err(malformed("Expected comparison operator".to_string())),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> StoreResult<()> {
        if self.accept_keyword(keyword) {
            Ok(())
        } else {
            match self.peek() {
                Some(token) => Err(malformed(format!("Expected {}, found {}", keyword, token))),
                None => Err(malformed(format!("Expected {}", keyword))),
            }
        }
    }

    fn expect_identifier(&mut self, what: &str) -> StoreResult<String> {
        match self.next() {
            Some(Token::Word(word)) => Ok(word),
            Some(other) => Err(malformed(format!("Expected {}, found {}", what, other))),
            None => Err(malformed(format!("Expected {}", what))),
        }
    }

    fn peek_field(&self, variable: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w == variable)
            && matches!(self.tokens.get(self.position + 1), Some(Token::Dot))
    }

    fn accept_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword) => {
                self.position += 1;
                true
            }
            _ => false,
        }
    }

    fn accept_op(&mut self, symbol: &str) -> bool {
        match self.peek() {
            Some(Token::Op(op)) if op == symbol => {
                self.position += 1;
                true
            }
            _ => false,
        }
    }

    fn accept(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }
}
