//! Boolean filter expressions over device records.
//!
//! ```text
//! expr  := or
//! or    := and ("||" and)*
//! and   := unary ("&&" unary)*
//! unary := "!" unary | atom
//! atom  := "(" expr ")" | term
//! term  := column "=" value | value
//! ```
//!
//! `AND`/`and`, `OR`/`or` and `NOT`/`not` are accepted as whole words.
//! Matching is case-insensitive. A bare value matches any field; CIDRs and
//! `a.b.c.x-y` ranges match the address only.

use crate::model::DeviceRecord;
use ipnetwork::Ipv4Network;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

static IP_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})-(\d{1,3})(?:\.(\d{1,3})\.(\d{1,3})\.(\d{1,3}))?$")
        .expect("static regex")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unbalanced parentheses")]
    UnbalancedParens,

    #[error("expression cannot start with '{0}'")]
    LeadingOperator(String),

    #[error("expression cannot end with '{0}'")]
    TrailingOperator(String),

    #[error("missing operand")]
    EmptyOperand,

    #[error("missing operator before '{0}'")]
    MissingOperator(String),

    #[error("unterminated quote")]
    UnterminatedQuote,

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("invalid CIDR '{0}'")]
    InvalidCidr(String),

    #[error("invalid IP range '{0}'")]
    InvalidIpRange(String),

    #[error("invalid wildcard '{0}'")]
    InvalidWildcard(String),
}

/// Device fields a term can be scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Ip,
    Hostname,
    Mac,
    Vendor,
    DeviceType,
    Status,
    Source,
    Ports,
}

/// Accepted column names and their short aliases
pub const COLUMN_ALIASES: &[(&str, Column)] = &[
    ("ip", Column::Ip),
    ("i", Column::Ip),
    ("addr", Column::Ip),
    ("hostname", Column::Hostname),
    ("host", Column::Hostname),
    ("name", Column::Hostname),
    ("h", Column::Hostname),
    ("mac", Column::Mac),
    ("m", Column::Mac),
    ("vendor", Column::Vendor),
    ("v", Column::Vendor),
    ("device", Column::DeviceType),
    ("type", Column::DeviceType),
    ("d", Column::DeviceType),
    ("t", Column::DeviceType),
    ("status", Column::Status),
    ("state", Column::Status),
    ("s", Column::Status),
    ("source", Column::Source),
    ("src", Column::Source),
    ("port", Column::Ports),
    ("ports", Column::Ports),
    ("p", Column::Ports),
];

impl FromStr for Column {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        COLUMN_ALIASES
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, column)| *column)
            .ok_or_else(|| FilterError::UnknownColumn(s.to_string()))
    }
}

impl Column {
    fn value(&self, device: &DeviceRecord) -> String {
        match self {
            Self::Ip => device.ip.to_string(),
            Self::Hostname => device.hostname.clone(),
            Self::Mac => device.mac.clone().unwrap_or_default(),
            Self::Vendor => device.vendor.clone().unwrap_or_default(),
            Self::DeviceType => device.device_type.label().to_string(),
            Self::Status => device.status.as_str().to_string(),
            Self::Source => device.hostname_source.as_str().to_string(),
            Self::Ports => device
                .open_ports
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Fields searched by a bare value
const ANY_FIELD: [Column; 6] = [
    Column::Ip,
    Column::Hostname,
    Column::Mac,
    Column::Vendor,
    Column::DeviceType,
    Column::Status,
];

#[derive(Debug, Clone)]
pub enum Matcher {
    /// Lower-cased needle
    Substring(String),
    /// Anchored, case-insensitive
    Pattern(Regex),
}

impl Matcher {
    fn for_value(value: &str) -> Result<Self, FilterError> {
        if value.contains('*') {
            wildcard(value).map(Self::Pattern)
        } else {
            Ok(Self::Substring(value.to_lowercase()))
        }
    }

    fn is_match(&self, haystack: &str) -> bool {
        match self {
            Self::Substring(needle) => haystack.to_lowercase().contains(needle),
            Self::Pattern(re) => re.is_match(haystack),
        }
    }
}

fn wildcard(value: &str) -> Result<Regex, FilterError> {
    let pattern = value
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("(?i)^{}$", pattern)).map_err(|_| FilterError::InvalidWildcard(value.to_string()))
}

#[derive(Debug, Clone)]
pub enum Term {
    /// Bare value matched against every field
    Any(Matcher),
    Field(Column, Matcher),
    Cidr(Ipv4Network),
    IpRange(Ipv4Addr, Ipv4Addr),
}

impl Term {
    fn bare(value: &str) -> Result<Self, FilterError> {
        if let Some(range) = ip_range(value)? {
            return Ok(range);
        }
        if value.contains('/') && value.starts_with(|c: char| c.is_ascii_digit()) {
            return Ipv4Network::from_str(value)
                .map(Self::Cidr)
                .map_err(|_| FilterError::InvalidCidr(value.to_string()));
        }
        Matcher::for_value(value).map(Self::Any)
    }

    fn field(column: Column, value: &str) -> Result<Self, FilterError> {
        if column == Column::Ip {
            if let Some(range) = ip_range(value)? {
                return Ok(range);
            }
            if value.contains('/') {
                return Ipv4Network::from_str(value)
                    .map(Self::Cidr)
                    .map_err(|_| FilterError::InvalidCidr(value.to_string()));
            }
            // a full address matches that host only
            if let Ok(ip) = Ipv4Addr::from_str(value) {
                return Ok(Self::IpRange(ip, ip));
            }
        }
        Matcher::for_value(value).map(|m| Self::Field(column, m))
    }

    fn matches(&self, device: &DeviceRecord) -> bool {
        match self {
            Self::Any(m) => ANY_FIELD.iter().any(|c| m.is_match(&c.value(device))),
            Self::Field(column, m) => m.is_match(&column.value(device)),
            Self::Cidr(net) => net.contains(device.ip),
            Self::IpRange(start, end) => (*start..=*end).contains(&device.ip),
        }
    }
}

fn ip_range(value: &str) -> Result<Option<Term>, FilterError> {
    let Some(caps) = IP_RANGE_RE.captures(value) else {
        return Ok(None);
    };
    let invalid = || FilterError::InvalidIpRange(value.to_string());
    let octet = |i: usize| caps[i].parse::<u8>().map_err(|_| invalid());
    let start = Ipv4Addr::new(octet(1)?, octet(2)?, octet(3)?, octet(4)?);
    // `a.b.c.x-y` shares the first three octets; `a.b.c.d-e.f.g.h` spells both ends
    let end = if caps.get(6).is_some() {
        Ipv4Addr::new(octet(5)?, octet(6)?, octet(7)?, octet(8)?)
    } else {
        let o = start.octets();
        Ipv4Addr::new(o[0], o[1], o[2], octet(5)?)
    };
    if end < start {
        return Err(invalid());
    }
    Ok(Some(Term::IpRange(start, end)))
}

#[derive(Debug, Clone)]
pub enum Expr {
    Term(Term),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn matches(&self, device: &DeviceRecord) -> bool {
        match self {
            Self::Term(term) => term.matches(device),
            Self::Not(inner) => !inner.matches(device),
            Self::And(a, b) => a.matches(device) && b.matches(device),
            Self::Or(a, b) => a.matches(device) || b.matches(device),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Eq,
    Word(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::And => f.write_str("&&"),
            Self::Or => f.write_str("||"),
            Self::Not => f.write_str("!"),
            Self::Eq => f.write_str("="),
            Self::Word(w) if w.contains(char::is_whitespace) => write!(f, "\"{}\"", w),
            Self::Word(w) => f.write_str(w),
        }
    }
}

fn keyword(word: &str) -> Option<Token> {
    match word {
        "AND" | "and" => Some(Token::And),
        "OR" | "or" => Some(Token::Or),
        "NOT" | "not" => Some(Token::Not),
        _ => None,
    }
}

/// Split an expression into tokens, turning word operators into symbols
pub fn tokenize(input: &str) -> Result<Vec<Token>, FilterError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
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
            '&' | '|' => {
                chars.next();
                if chars.peek() == Some(&c) {
                    chars.next();
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '"' => {
                chars.next();
                let mut word = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(ch) => word.push(ch),
                        None => return Err(FilterError::UnterminatedQuote),
                    }
                }
                tokens.push(Token::Word(word));
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || "()&|!=\"".contains(ch) {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(keyword(&word).unwrap_or(Token::Word(word)));
            }
        }
    }
    Ok(tokens)
}

/// Canonical spelling: word operators become `&&`, `||` and `!`
pub fn normalize(input: &str) -> Result<String, FilterError> {
    let tokens = tokenize(input)?;
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        let tight = matches!(token, Token::RParen | Token::Eq)
            || matches!(tokens.get(i.wrapping_sub(1)), Some(Token::LParen | Token::Not | Token::Eq));
        if i > 0 && !tight {
            out.push(' ');
        }
        out.push_str(&token.to_string());
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Expr, FilterError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, FilterError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, FilterError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr, FilterError> {
        match self.next() {
            Some(Token::LParen) => {
                if self.peek() == Some(&Token::RParen) {
                    return Err(FilterError::EmptyOperand);
                }
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(FilterError::UnbalancedParens),
                }
            }
            Some(Token::Word(word)) => {
                if self.peek() == Some(&Token::Eq) {
                    self.pos += 1;
                    let column = Column::from_str(&word)?;
                    match self.next() {
                        Some(Token::Word(value)) if !value.is_empty() => {
                            Ok(Expr::Term(Term::field(column, &value)?))
                        }
                        _ => Err(FilterError::EmptyOperand),
                    }
                } else {
                    Ok(Expr::Term(Term::bare(&word)?))
                }
            }
            _ => Err(FilterError::EmptyOperand),
        }
    }
}

/// Parse an expression. Whitespace-only input is an error; use `Filter`
/// for "match everything" semantics.
pub fn parse(input: &str) -> Result<Expr, FilterError> {
    let tokens = tokenize(input)?;
    validate(&tokens)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(Token::RParen) => Err(FilterError::UnbalancedParens),
        Some(token) => Err(FilterError::MissingOperator(token.to_string())),
    }
}

fn validate(tokens: &[Token]) -> Result<(), FilterError> {
    match tokens.first() {
        None => return Err(FilterError::EmptyOperand),
        Some(t @ (Token::And | Token::Or)) => return Err(FilterError::LeadingOperator(t.to_string())),
        _ => {}
    }
    if let Some(t @ (Token::And | Token::Or | Token::Not)) = tokens.last() {
        return Err(FilterError::TrailingOperator(t.to_string()));
    }
    let mut depth = 0i32;
    for token in tokens {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth < 0 {
                    return Err(FilterError::UnbalancedParens);
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(FilterError::UnbalancedParens);
    }
    Ok(())
}

/// A parsed filter plus the text it came from; empty text matches everything
#[derive(Debug, Clone, Default)]
pub struct Filter {
    text: String,
    expr: Option<Expr>,
}

impl Filter {
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            text: trimmed.to_string(),
            expr: Some(parse(trimmed)?),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.expr.is_none()
    }

    pub fn matches(&self, device: &DeviceRecord) -> bool {
        self.expr.as_ref().map_or(true, |e| e.matches(device))
    }

    /// The complement of this filter
    pub fn negate(&self) -> Self {
        match &self.expr {
            None => Self {
                text: "!*".to_string(),
                expr: Some(Expr::Not(Box::new(Expr::Term(Term::Any(Matcher::Substring(
                    String::new(),
                )))))),
            },
            Some(expr) => Self {
                text: format!("!({})", self.text),
                expr: Some(Expr::Not(Box::new(expr.clone()))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_operators_are_normalized() {
        assert_eq!(
            normalize("vendor=apple AND NOT (status=offline or h=nas)").unwrap(),
            "vendor=apple && !(status=offline || h=nas)"
        );
        // only whole words count
        assert_eq!(normalize("h=android").unwrap(), "h=android");
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(parse("&& a").unwrap_err(), FilterError::LeadingOperator("&&".into()));
        assert_eq!(parse("a ||").unwrap_err(), FilterError::TrailingOperator("||".into()));
        assert_eq!(parse("(a && b").unwrap_err(), FilterError::UnbalancedParens);
        assert_eq!(parse("a && b)").unwrap_err(), FilterError::UnbalancedParens);
        assert_eq!(parse("a && && b").unwrap_err(), FilterError::EmptyOperand);
        assert_eq!(parse("()").unwrap_err(), FilterError::EmptyOperand);
        assert_eq!(parse("a b").unwrap_err(), FilterError::MissingOperator("b".into()));
        assert_eq!(parse("10.0.0.0/33").unwrap_err(), FilterError::InvalidCidr("10.0.0.0/33".into()));
        assert_eq!(
            parse("10.0.0.1-300").unwrap_err(),
            FilterError::InvalidIpRange("10.0.0.1-300".into())
        );
        assert!(matches!(parse("colour=red"), Err(FilterError::UnknownColumn(_))));
    }
}
