//! Script syntax trees.
//!
//! A recursive-descent parser and printer for the subset of JavaScript that
//! page scripts in a static site actually use: declarations, functions,
//! conditionals, calls, member access, operators and literals. Anything
//! outside the subset (regex and template literals, arrow functions, loops)
//! is rejected with [`ParseError::Unsupported`] rather than mangled.
//!
//! Traversal hands each visitor the chain of [`Slot`]s leading to the visited
//! expression, so predicates such as [`is_assignment_target`] are plain
//! functions of their arguments instead of reading mutable walker state.

use super::{ParseError, line_at};
use serde_json::Value;

/// Where an expression sits inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Statement,
    Initializer,
    ReturnValue,
    Test,
    Consequent,
    Alternate,
    AssignTarget,
    AssignValue,
    UpdateArgument,
    UnaryArgument,
    Operand,
    Callee,
    Argument,
    MemberObject,
    IndexObject,
    IndexProperty,
    Element,
    PropertyValue,
    SequenceItem,
}

/// Whether the expression reached through `slots` is written to rather than
/// read: the target of an assignment or update, or the object at the root of
/// a member chain that is (`LOCALEID.x = 1`).
pub fn is_assignment_target(slots: &[Slot]) -> bool {
    for slot in slots.iter().rev() {
        match slot {
            Slot::MemberObject | Slot::IndexObject => continue,
            Slot::AssignTarget | Slot::UpdateArgument => return true,
            _ => return false,
        }
    }
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

impl DeclKind {
    fn keyword(self) -> &'static str {
        match self {
            DeclKind::Var => "var",
            DeclKind::Let => "let",
            DeclKind::Const => "const",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub quoted: bool,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Var {
        kind: DeclKind,
        declarations: Vec<Declarator>,
    },
    Function(Function),
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    Expr(Expr),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Array(Vec<Expr>),
    Object(Vec<Property>),
    Function(Box<Function>),
    Unary {
        op: String,
        arg: Box<Expr>,
    },
    Update {
        op: String,
        prefix: bool,
        arg: Box<Expr>,
    },
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: String,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Sequence(Vec<Expr>),
}

impl Expr {
    /// Build a literal expression from a JSON value.
    pub fn from_json(value: &Value) -> Expr {
        match value {
            Value::Null => Expr::Null,
            Value::Bool(b) => Expr::Bool(*b),
            Value::Number(n) => {
                let f = n.as_f64().unwrap_or(0.0);
                if f < 0.0 {
                    Expr::Unary {
                        op: "-".into(),
                        arg: Box::new(Expr::Num(-f)),
                    }
                } else {
                    Expr::Num(f)
                }
            }
            Value::String(s) => Expr::Str(s.clone()),
            Value::Array(items) => Expr::Array(items.iter().map(Expr::from_json).collect()),
            Value::Object(map) => Expr::Object(
                map.iter()
                    .map(|(k, v)| Property {
                        key: k.clone(),
                        quoted: !is_identifier(k),
                        value: Expr::from_json(v),
                    })
                    .collect(),
            ),
        }
    }

    /// The callee name when this is a call of a plain identifier.
    pub fn called_name(&self) -> Option<&str> {
        match self {
            Expr::Call { callee, .. } => match callee.as_ref() {
                Expr::Ident(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Sequence(_) => 1,
            Expr::Assign { .. } => 2,
            Expr::Conditional { .. } => 3,
            Expr::Binary { op, .. } => 3 + binary_precedence(op).unwrap_or(1),
            Expr::Unary { .. } => 17,
            Expr::Update { .. } => 18,
            Expr::Call { .. } | Expr::New { .. } | Expr::Member { .. } | Expr::Index { .. } => 19,
            _ => 20,
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !KEYWORDS.contains(&s)
}

const KEYWORDS: &[&str] = &[
    "var", "let", "const", "function", "return", "if", "else", "new", "true", "false", "null",
    "typeof", "void", "delete", "instanceof", "in",
];

fn binary_precedence(op: &str) -> Option<u8> {
    Some(match op {
        "??" => 1,
        "||" => 2,
        "&&" => 3,
        "|" => 4,
        "^" => 5,
        "&" => 6,
        "==" | "!=" | "===" | "!==" => 7,
        "<" | ">" | "<=" | ">=" | "instanceof" | "in" => 8,
        "<<" | ">>" | ">>>" => 9,
        "+" | "-" => 10,
        "*" | "/" | "%" => 11,
        "**" => 12,
        _ => return None,
    })
}

const ASSIGN_OPS: &[&str] = &["=", "+=", "-=", "*=", "/=", "%=", "||=", "&&=", "??="];

/// A parsed script.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Stmt>,
    /// Target of a trailing `//# sourceMappingURL=` directive.
    pub source_map_url: Option<String>,
}

impl Program {
    pub fn parse(src: &str) -> Result<Self, ParseError> {
        let (tokens, source_map_url) = tokenize(src)?;
        let mut parser = Parser { tokens, pos: 0 };
        let mut body = Vec::new();
        while !parser.at_eof() {
            body.push(parser.statement()?);
        }
        Ok(Program {
            body,
            source_map_url,
        })
    }

    /// Whether any expression satisfies `pred`. Stops at the first match.
    pub fn any_expr(&self, pred: &mut dyn FnMut(&Expr, &[Slot]) -> bool) -> bool {
        let mut path = Vec::new();
        self.body
            .iter()
            .any(|stmt| any_in_stmt(stmt, &mut path, pred))
    }

    /// Offer every expression to `replace` in pre-order. A returned
    /// expression takes the visited one's place and is not descended into.
    /// Returns the number of replacements.
    pub fn replace_exprs(&mut self, replace: &mut dyn FnMut(&Expr, &[Slot]) -> Option<Expr>) -> usize {
        let mut path = Vec::new();
        let mut count = 0;
        for stmt in &mut self.body {
            replace_in_stmt(stmt, &mut path, replace, &mut count);
        }
        count
    }

    /// Print the program as JavaScript source.
    pub fn to_js(&self) -> String {
        let mut printer = Printer::default();
        for stmt in &self.body {
            printer.stmt(stmt);
        }
        if let Some(url) = &self.source_map_url {
            printer.line(&format!("//# sourceMappingURL={url}"));
        }
        printer.out
    }
}

/// Print one expression on its own.
pub fn print_expr(expr: &Expr) -> String {
    let mut printer = Printer::default();
    printer.expr(expr);
    printer.out
}

// ============================================================================
// Traversal
// ============================================================================

fn any_in_stmt(
    stmt: &Stmt,
    path: &mut Vec<Slot>,
    pred: &mut dyn FnMut(&Expr, &[Slot]) -> bool,
) -> bool {
    match stmt {
        Stmt::Var { declarations, .. } => declarations
            .iter()
            .filter_map(|d| d.init.as_ref())
            .any(|e| any_in_expr(e, Slot::Initializer, path, pred)),
        Stmt::Function(f) => f.body.iter().any(|s| any_in_stmt(s, path, pred)),
        Stmt::Return(value) => value
            .as_ref()
            .is_some_and(|e| any_in_expr(e, Slot::ReturnValue, path, pred)),
        Stmt::If {
            test,
            consequent,
            alternate,
        } => {
            any_in_expr(test, Slot::Test, path, pred)
                || any_in_stmt(consequent, path, pred)
                || alternate
                    .as_ref()
                    .is_some_and(|s| any_in_stmt(s, path, pred))
        }
        Stmt::Block(body) => body.iter().any(|s| any_in_stmt(s, path, pred)),
        Stmt::Expr(e) => any_in_expr(e, Slot::Statement, path, pred),
        Stmt::Empty => false,
    }
}

fn any_in_expr(
    expr: &Expr,
    slot: Slot,
    path: &mut Vec<Slot>,
    pred: &mut dyn FnMut(&Expr, &[Slot]) -> bool,
) -> bool {
    path.push(slot);
    let found = pred(expr, path) || {
        let mut found = false;
        for (child_slot, child) in children(expr) {
            if any_in_expr(child, child_slot, path, pred) {
                found = true;
                break;
            }
        }
        if !found && let Expr::Function(f) = expr {
            found = f.body.iter().any(|s| any_in_stmt(s, path, pred));
        }
        found
    };
    path.pop();
    found
}

fn children(expr: &Expr) -> Vec<(Slot, &Expr)> {
    match expr {
        Expr::Array(items) => items.iter().map(|e| (Slot::Element, e)).collect(),
        Expr::Object(props) => props
            .iter()
            .map(|p| (Slot::PropertyValue, &p.value))
            .collect(),
        Expr::Unary { arg, .. } => vec![(Slot::UnaryArgument, arg.as_ref())],
        Expr::Update { arg, .. } => vec![(Slot::UpdateArgument, arg.as_ref())],
        Expr::Binary { left, right, .. } => {
            vec![(Slot::Operand, left.as_ref()), (Slot::Operand, right.as_ref())]
        }
        Expr::Assign { target, value, .. } => vec![
            (Slot::AssignTarget, target.as_ref()),
            (Slot::AssignValue, value.as_ref()),
        ],
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => vec![
            (Slot::Test, test.as_ref()),
            (Slot::Consequent, consequent.as_ref()),
            (Slot::Alternate, alternate.as_ref()),
        ],
        Expr::Call { callee, args } | Expr::New { callee, args } => {
            std::iter::once((Slot::Callee, callee.as_ref()))
                .chain(args.iter().map(|a| (Slot::Argument, a)))
                .collect()
        }
        Expr::Member { object, .. } => vec![(Slot::MemberObject, object.as_ref())],
        Expr::Index { object, index } => vec![
            (Slot::IndexObject, object.as_ref()),
            (Slot::IndexProperty, index.as_ref()),
        ],
        Expr::Sequence(items) => items.iter().map(|e| (Slot::SequenceItem, e)).collect(),
        _ => Vec::new(),
    }
}

fn children_mut(expr: &mut Expr) -> Vec<(Slot, &mut Expr)> {
    match expr {
        Expr::Array(items) => items.iter_mut().map(|e| (Slot::Element, e)).collect(),
        Expr::Object(props) => props
            .iter_mut()
            .map(|p| (Slot::PropertyValue, &mut p.value))
            .collect(),
        Expr::Unary { arg, .. } => vec![(Slot::UnaryArgument, arg.as_mut())],
        Expr::Update { arg, .. } => vec![(Slot::UpdateArgument, arg.as_mut())],
        Expr::Binary { left, right, .. } => {
            vec![(Slot::Operand, left.as_mut()), (Slot::Operand, right.as_mut())]
        }
        Expr::Assign { target, value, .. } => vec![
            (Slot::AssignTarget, target.as_mut()),
            (Slot::AssignValue, value.as_mut()),
        ],
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => vec![
            (Slot::Test, test.as_mut()),
            (Slot::Consequent, consequent.as_mut()),
            (Slot::Alternate, alternate.as_mut()),
        ],
        Expr::Call { callee, args } | Expr::New { callee, args } => {
            std::iter::once((Slot::Callee, callee.as_mut()))
                .chain(args.iter_mut().map(|a| (Slot::Argument, a)))
                .collect()
        }
        Expr::Member { object, .. } => vec![(Slot::MemberObject, object.as_mut())],
        Expr::Index { object, index } => vec![
            (Slot::IndexObject, object.as_mut()),
            (Slot::IndexProperty, index.as_mut()),
        ],
        Expr::Sequence(items) => items.iter_mut().map(|e| (Slot::SequenceItem, e)).collect(),
        _ => Vec::new(),
    }
}

type Replacer<'a> = dyn FnMut(&Expr, &[Slot]) -> Option<Expr> + 'a;

fn replace_in_stmt(stmt: &mut Stmt, path: &mut Vec<Slot>, f: &mut Replacer<'_>, count: &mut usize) {
    match stmt {
        Stmt::Var { declarations, .. } => {
            for init in declarations.iter_mut().filter_map(|d| d.init.as_mut()) {
                replace_in_expr(init, Slot::Initializer, path, f, count);
            }
        }
        Stmt::Function(func) => {
            for s in &mut func.body {
                replace_in_stmt(s, path, f, count);
            }
        }
        Stmt::Return(Some(value)) => replace_in_expr(value, Slot::ReturnValue, path, f, count),
        Stmt::If {
            test,
            consequent,
            alternate,
        } => {
            replace_in_expr(test, Slot::Test, path, f, count);
            replace_in_stmt(consequent, path, f, count);
            if let Some(alt) = alternate {
                replace_in_stmt(alt, path, f, count);
            }
        }
        Stmt::Block(body) => {
            for s in body {
                replace_in_stmt(s, path, f, count);
            }
        }
        Stmt::Expr(e) => replace_in_expr(e, Slot::Statement, path, f, count),
        Stmt::Return(None) | Stmt::Empty => {}
    }
}

fn replace_in_expr(
    expr: &mut Expr,
    slot: Slot,
    path: &mut Vec<Slot>,
    f: &mut Replacer<'_>,
    count: &mut usize,
) {
    path.push(slot);
    if let Some(replacement) = f(expr, path) {
        *expr = replacement;
        *count += 1;
    } else {
        if let Expr::Function(func) = expr {
            for s in &mut func.body {
                replace_in_stmt(s, path, f, count);
            }
        }
        for (child_slot, child) in children_mut(expr) {
            replace_in_expr(child, child_slot, path, f, count);
        }
    }
    path.pop();
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Num(f64),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
    newline_before: bool,
}

const PUNCTUATORS: &[&str] = &[
    ">>>", "===", "!==", "**", "...", "??=", "||=", "&&=", "==", "!=", "<=", ">=", "&&", "||",
    "??", "+=", "-=", "*=", "/=", "%=", "=>", "++", "--", "<<", ">>", "{", "}", "(", ")", "[",
    "]", ";", ",", "<", ">", "+", "-", "*", "/", "%", "!", "~", "?", ":", ".", "=", "&", "|",
    "^",
];

fn tokenize(src: &str) -> Result<(Vec<Token>, Option<String>), ParseError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut source_map_url = None;
    let mut pos = 0;
    let mut newline_before = false;
    let mut line = 1;

    while pos < src.len() {
        let c = src[pos..].chars().next().unwrap_or(' ');
        if c == '\n' {
            newline_before = true;
            line += 1;
            pos += 1;
            continue;
        }
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }
        if src[pos..].starts_with("//") {
            let end = src[pos..].find('\n').map_or(src.len(), |i| pos + i);
            let comment = src[pos + 2..end].trim();
            if let Some(url) = comment
                .strip_prefix("# sourceMappingURL=")
                .or_else(|| comment.strip_prefix("@ sourceMappingURL="))
            {
                source_map_url = Some(url.trim().to_string());
            }
            pos = end;
            continue;
        }
        if src[pos..].starts_with("/*") {
            let end = src[pos + 2..]
                .find("*/")
                .ok_or(ParseError::Unterminated {
                    what: "comment",
                    line,
                })?;
            let newlines = src[pos..pos + 2 + end].matches('\n').count();
            if newlines > 0 {
                newline_before = true;
                line += newlines;
            }
            pos += 2 + end + 2;
            continue;
        }

        let tok = if c == '"' || c == '\'' {
            let (value, next) = read_string(src, pos, c)?;
            line += src[pos..next].matches('\n').count();
            pos = next;
            Tok::Str(value)
        } else if c == '`' {
            return Err(ParseError::Unsupported {
                what: "template literal".into(),
                line,
            });
        } else if c.is_ascii_digit() || (c == '.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            let (value, next) = read_number(src, pos, line)?;
            pos = next;
            Tok::Num(value)
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = pos;
            while let Some(ch) = src[pos..].chars().next() {
                if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                    pos += ch.len_utf8();
                } else {
                    break;
                }
            }
            Tok::Ident(src[start..pos].to_string())
        } else if let Some(&p) = PUNCTUATORS.iter().find(|p| src[pos..].starts_with(**p)) {
            pos += p.len();
            Tok::Punct(p)
        } else {
            return Err(ParseError::Unexpected {
                found: format!("character {c:?}"),
                expected: "a token",
                line,
            });
        };
        tokens.push(Token {
            tok,
            line,
            newline_before,
        });
        newline_before = false;
    }
    tokens.push(Token {
        tok: Tok::Eof,
        line,
        newline_before,
    });
    Ok((tokens, source_map_url))
}

fn read_string(src: &str, start: usize, quote: char) -> Result<(String, usize), ParseError> {
    let mut out = String::new();
    let mut chars = src[start + 1..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((out, start + 1 + i + 1)),
            '\n' => break,
            '\\' => {
                let Some((_, esc)) = chars.next() else { break };
                match esc {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'v' => out.push('\u{b}'),
                    '0' => out.push('\0'),
                    'u' => {
                        let hex: String = chars.by_ref().take(4).map(|(_, h)| h).collect();
                        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                            Some(ch) => out.push(ch),
                            None => {
                                return Err(ParseError::Unsupported {
                                    what: format!("escape \\u{hex}"),
                                    line: line_at(src, start),
                                });
                            }
                        }
                    }
                    'x' => {
                        let hex: String = chars.by_ref().take(2).map(|(_, h)| h).collect();
                        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                            Some(ch) => out.push(ch),
                            None => {
                                return Err(ParseError::Unsupported {
                                    what: format!("escape \\x{hex}"),
                                    line: line_at(src, start),
                                });
                            }
                        }
                    }
                    '\n' => {}
                    other => out.push(other),
                }
            }
            c => out.push(c),
        }
    }
    Err(ParseError::Unterminated {
        what: "string",
        line: line_at(src, start),
    })
}

fn read_number(src: &str, start: usize, line: usize) -> Result<(f64, usize), ParseError> {
    let rest = &src[start..];
    if let Some(hex) = rest
        .strip_prefix("0x")
        .or_else(|| rest.strip_prefix("0X"))
    {
        let len = hex.chars().take_while(char::is_ascii_hexdigit).count();
        let value = i64::from_str_radix(&hex[..len], 16).map_err(|_| ParseError::Unexpected {
            found: rest[..2 + len].to_string(),
            expected: "a hexadecimal number",
            line,
        })?;
        return Ok((value as f64, start + 2 + len));
    }
    let bytes = rest.as_bytes();
    let mut len = 0;
    while len < bytes.len() && (bytes[len].is_ascii_digit() || bytes[len] == b'.') {
        len += 1;
    }
    if len < bytes.len() && (bytes[len] == b'e' || bytes[len] == b'E') {
        let mut exp = len + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            len = exp;
            while len < bytes.len() && bytes[len].is_ascii_digit() {
                len += 1;
            }
        }
    }
    let text = &rest[..len];
    text.parse::<f64>()
        .map(|v| (v, start + len))
        .map_err(|_| ParseError::Unexpected {
            found: text.to_string(),
            expected: "a number",
            line,
        })
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at_eof(&self) -> bool {
        self.peek().tok == Tok::Eof
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(&self.peek().tok, Tok::Punct(q) if *q == p)
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(&self.peek().tok, Tok::Ident(name) if name == kw)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        let token = self.peek();
        let found = match &token.tok {
            Tok::Ident(name) => format!("'{name}'"),
            Tok::Str(_) => "string".to_string(),
            Tok::Num(n) => format!("number {n}"),
            Tok::Punct(p) => format!("'{p}'"),
            Tok::Eof => "end of input".to_string(),
        };
        ParseError::Unexpected {
            found,
            expected,
            line: token.line,
        }
    }

    fn expect_punct(&mut self, p: &'static str, expected: &'static str) -> Result<(), ParseError> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn identifier(&mut self, expected: &'static str) -> Result<String, ParseError> {
        match &self.peek().tok {
            Tok::Ident(name) if !KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn end_statement(&mut self) -> Result<(), ParseError> {
        if self.eat_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before
        {
            Ok(())
        } else {
            Err(self.unexpected("';'"))
        }
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.peek().line;
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }
        if self.is_punct("{") {
            return Ok(Stmt::Block(self.block()?));
        }
        let keyword = match &self.peek().tok {
            Tok::Ident(name) => Some(name.clone()),
            _ => None,
        };
        match keyword.as_deref() {
            Some(kw @ ("var" | "let" | "const")) => {
                let kind = match kw {
                    "var" => DeclKind::Var,
                    "let" => DeclKind::Let,
                    _ => DeclKind::Const,
                };
                self.advance();
                let mut declarations = Vec::new();
                loop {
                    let name = self.identifier("a variable name")?;
                    let init = if self.eat_punct("=") {
                        Some(self.assignment()?)
                    } else {
                        None
                    };
                    declarations.push(Declarator { name, init });
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.end_statement()?;
                Ok(Stmt::Var { kind, declarations })
            }
            Some("function") => {
                self.advance();
                let function = self.function_rest(true)?;
                Ok(Stmt::Function(function))
            }
            Some("return") => {
                self.advance();
                let value = if self.is_punct(";")
                    || self.is_punct("}")
                    || self.at_eof()
                    || self.peek().newline_before
                {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.end_statement()?;
                Ok(Stmt::Return(value))
            }
            Some("if") => {
                self.advance();
                self.expect_punct("(", "'(' after if")?;
                let test = self.expression()?;
                self.expect_punct(")", "')'")?;
                let consequent = Box::new(self.statement()?);
                let alternate = if self.is_keyword("else") {
                    self.advance();
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    test,
                    consequent,
                    alternate,
                })
            }
            Some(kw @ ("for" | "while" | "do" | "switch" | "try" | "class" | "throw" | "import" | "export")) => {
                Err(ParseError::Unsupported {
                    what: format!("'{kw}' statement"),
                    line,
                })
            }
            _ => {
                let expr = self.expression()?;
                self.end_statement()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect_punct("{", "'{'")?;
        let mut body = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn function_rest(&mut self, require_name: bool) -> Result<Function, ParseError> {
        let name = if require_name {
            Some(self.identifier("a function name")?)
        } else if matches!(self.peek().tok, Tok::Ident(_)) {
            Some(self.identifier("a function name")?)
        } else {
            None
        };
        self.expect_punct("(", "'(' before parameters")?;
        let mut params = Vec::new();
        while !self.eat_punct(")") {
            params.push(self.identifier("a parameter name")?);
            if !self.is_punct(")") {
                self.expect_punct(",", "',' between parameters")?;
            }
        }
        let body = self.block()?;
        Ok(Function { name, params, body })
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        let first = self.assignment()?;
        if !self.is_punct(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_punct(",") {
            items.push(self.assignment()?);
        }
        Ok(Expr::Sequence(items))
    }

    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let line = self.peek().line;
        let target = self.conditional()?;
        let op = match &self.peek().tok {
            Tok::Punct(p) if ASSIGN_OPS.contains(p) => *p,
            Tok::Punct("=>") => {
                return Err(ParseError::Unsupported {
                    what: "arrow function".into(),
                    line,
                });
            }
            _ => return Ok(target),
        };
        if !matches!(
            target,
            Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }
        ) {
            return Err(ParseError::Unexpected {
                found: "assignment".into(),
                expected: "an assignable target",
                line,
            });
        }
        self.advance();
        let value = self.assignment()?;
        Ok(Expr::Assign {
            op: op.to_string(),
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.binary(1)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect_punct(":", "':' in conditional")?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary_op(&self) -> Option<(String, u8)> {
        let op = match &self.peek().tok {
            Tok::Punct(p) => p.to_string(),
            Tok::Ident(kw) if kw == "instanceof" || kw == "in" => kw.clone(),
            _ => return None,
        };
        binary_precedence(&op).map(|p| (op, p))
    }

    fn binary(&mut self, min: u8) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        while let Some((op, prec)) = self.binary_op() {
            if prec < min {
                break;
            }
            self.advance();
            // `**` is right-associative.
            let next_min = if op == "**" { prec } else { prec + 1 };
            let right = self.binary(next_min)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match &self.peek().tok {
            Tok::Punct(p @ ("!" | "-" | "+" | "~")) => Some(p.to_string()),
            Tok::Ident(kw) if matches!(kw.as_str(), "typeof" | "void" | "delete") => {
                Some(kw.clone())
            }
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let arg = self.unary()?;
            return Ok(Expr::Unary {
                op,
                arg: Box::new(arg),
            });
        }
        if self.is_punct("++") || self.is_punct("--") {
            let op = if self.is_punct("++") { "++" } else { "--" };
            self.advance();
            let arg = self.unary()?;
            return Ok(Expr::Update {
                op: op.into(),
                prefix: true,
                arg: Box::new(arg),
            });
        }
        let expr = self.call_member()?;
        if (self.is_punct("++") || self.is_punct("--")) && !self.peek().newline_before {
            let op = if self.is_punct("++") { "++" } else { "--" };
            self.advance();
            return Ok(Expr::Update {
                op: op.into(),
                prefix: false,
                arg: Box::new(expr),
            });
        }
        Ok(expr)
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect_punct("(", "'('")?;
        let mut args = Vec::new();
        while !self.eat_punct(")") {
            args.push(self.assignment()?);
            if !self.is_punct(")") {
                self.expect_punct(",", "',' between arguments")?;
            }
        }
        Ok(args)
    }

    fn call_member(&mut self) -> Result<Expr, ParseError> {
        let mut expr = if self.is_keyword("new") {
            self.advance();
            let callee = self.member_only()?;
            let args = if self.is_punct("(") {
                self.arguments()?
            } else {
                Vec::new()
            };
            Expr::New {
                callee: Box::new(callee),
                args,
            }
        } else {
            self.primary()?
        };
        loop {
            if self.eat_punct(".") {
                let property = match self.advance().tok {
                    Tok::Ident(name) => name,
                    _ => return Err(self.unexpected("a property name")),
                };
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]", "']'")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.is_punct("(") {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Callee of a `new` expression: member accesses but no calls.
    fn member_only(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        while self.eat_punct(".") {
            let property = match self.advance().tok {
                Tok::Ident(name) => name,
                _ => return Err(self.unexpected("a property name")),
            };
            expr = Expr::Member {
                object: Box::new(expr),
                property,
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        match token.tok {
            Tok::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Tok::Num(n) => {
                self.advance();
                Ok(Expr::Num(n))
            }
            Tok::Ident(name) => match name.as_str() {
                "true" | "false" => {
                    self.advance();
                    Ok(Expr::Bool(name == "true"))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Null)
                }
                "function" => {
                    self.advance();
                    Ok(Expr::Function(Box::new(self.function_rest(false)?)))
                }
                kw if KEYWORDS.contains(&kw) => Err(self.unexpected("an expression")),
                _ => {
                    self.advance();
                    Ok(Expr::Ident(name))
                }
            },
            Tok::Punct("(") => {
                self.advance();
                let inner = self.expression()?;
                self.expect_punct(")", "')'")?;
                Ok(inner)
            }
            Tok::Punct("[") => {
                self.advance();
                let mut items = Vec::new();
                while !self.eat_punct("]") {
                    items.push(self.assignment()?);
                    if !self.is_punct("]") {
                        self.expect_punct(",", "',' between elements")?;
                    }
                }
                Ok(Expr::Array(items))
            }
            Tok::Punct("{") => {
                self.advance();
                let mut props = Vec::new();
                while !self.eat_punct("}") {
                    let (key, quoted) = match self.advance().tok {
                        Tok::Ident(name) => (name, false),
                        Tok::Str(s) => (s, true),
                        Tok::Num(n) => (format_number(n), false),
                        _ => return Err(self.unexpected("a property key")),
                    };
                    self.expect_punct(":", "':' after property key")?;
                    let value = self.assignment()?;
                    props.push(Property { key, quoted, value });
                    if !self.is_punct("}") {
                        self.expect_punct(",", "',' between properties")?;
                    }
                }
                Ok(Expr::Object(props))
            }
            Tok::Punct("/") => Err(ParseError::Unsupported {
                what: "regular expression literal".into(),
                line: token.line,
            }),
            _ => Err(self.unexpected("an expression")),
        }
    }
}

// ============================================================================
// Printer
// ============================================================================

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn quote_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        let indent = "  ".repeat(self.depth);
        for line in text.split('\n') {
            self.out.push_str(&indent);
            self.out.push_str(line);
            self.out.push('\n');
        }
    }

    fn inline_expr(expr: &Expr) -> String {
        let mut p = Printer::default();
        p.expr(expr);
        p.out
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var { kind, declarations } => {
                let decls: Vec<String> = declarations
                    .iter()
                    .map(|d| match &d.init {
                        Some(init) => format!("{} = {}", d.name, Self::wrapped(init, 2)),
                        None => d.name.clone(),
                    })
                    .collect();
                self.line(&format!("{} {};", kind.keyword(), decls.join(", ")));
            }
            Stmt::Function(f) => {
                self.function_block(f, "");
            }
            Stmt::Return(None) => self.line("return;"),
            Stmt::Return(Some(value)) => {
                self.line(&format!("return {};", Self::inline_expr(value)));
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                self.line(&format!("if ({}) {{", Self::inline_expr(test)));
                self.nested(consequent);
                match alternate {
                    Some(alt) => {
                        self.line("} else {");
                        self.nested(alt);
                        self.line("}");
                    }
                    None => self.line("}"),
                }
            }
            Stmt::Block(body) => {
                self.line("{");
                self.depth += 1;
                for s in body {
                    self.stmt(s);
                }
                self.depth -= 1;
                self.line("}");
            }
            Stmt::Expr(expr) => {
                let text = Self::inline_expr(expr);
                if text.starts_with("function") || text.starts_with('{') {
                    self.line(&format!("({text});"));
                } else {
                    self.line(&format!("{text};"));
                }
            }
            Stmt::Empty => self.line(";"),
        }
    }

    fn nested(&mut self, stmt: &Stmt) {
        self.depth += 1;
        match stmt {
            Stmt::Block(body) => {
                for s in body {
                    self.stmt(s);
                }
            }
            other => self.stmt(other),
        }
        self.depth -= 1;
    }

    fn function_block(&mut self, f: &Function, suffix: &str) {
        self.line(&format!(
            "function {}({}) {{",
            f.name.as_deref().unwrap_or(""),
            f.params.join(", ")
        ));
        self.depth += 1;
        for s in &f.body {
            self.stmt(s);
        }
        self.depth -= 1;
        self.line(&format!("}}{suffix}"));
    }

    fn wrapped(expr: &Expr, min: u8) -> String {
        let text = Self::inline_expr(expr);
        if expr.precedence() < min {
            format!("({text})")
        } else {
            text
        }
    }

    fn expr(&mut self, expr: &Expr) {
        let text = match expr {
            Expr::Ident(name) => name.clone(),
            Expr::Str(s) => quote_string(s),
            Expr::Num(n) => format_number(*n),
            Expr::Bool(b) => b.to_string(),
            Expr::Null => "null".into(),
            Expr::Array(items) => format!(
                "[{}]",
                items
                    .iter()
                    .map(|e| Self::wrapped(e, 2))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Expr::Object(props) => {
                if props.is_empty() {
                    "{}".into()
                } else {
                    let body: Vec<String> = props
                        .iter()
                        .map(|p| {
                            let key = if p.quoted {
                                quote_string(&p.key)
                            } else {
                                p.key.clone()
                            };
                            format!("{key}: {}", Self::wrapped(&p.value, 2))
                        })
                        .collect();
                    format!("{{{}}}", body.join(", "))
                }
            }
            Expr::Function(f) => {
                let mut inner = Printer {
                    out: String::new(),
                    depth: 1,
                };
                for s in &f.body {
                    inner.stmt(s);
                }
                let name = f.name.as_deref().map(|n| format!(" {n}")).unwrap_or_default();
                let params = f.params.join(", ");
                if inner.out.is_empty() {
                    format!("function{name}({params}) {{}}")
                } else {
                    format!("function{name}({params}) {{\n{}}}", inner.out)
                }
            }
            Expr::Unary { op, arg } => {
                let arg_text = Self::wrapped(arg, 17);
                let is_word = op.chars().all(char::is_alphabetic);
                let needs_space = is_word
                    || (op == "-" && arg_text.starts_with('-'))
                    || (op == "+" && arg_text.starts_with('+'));
                if needs_space {
                    format!("{op} {arg_text}")
                } else {
                    format!("{op}{arg_text}")
                }
            }
            Expr::Update { op, prefix, arg } => {
                let arg_text = Self::wrapped(arg, 19);
                if *prefix {
                    format!("{op}{arg_text}")
                } else {
                    format!("{arg_text}{op}")
                }
            }
            Expr::Binary { op, left, right } => {
                let prec = expr.precedence();
                let right_assoc = op == "**";
                let left_text = if right_assoc {
                    Self::wrapped(left, prec + 1)
                } else {
                    Self::wrapped(left, prec)
                };
                let right_text = if right_assoc {
                    Self::wrapped(right, prec)
                } else {
                    Self::wrapped(right, prec + 1)
                };
                format!("{left_text} {op} {right_text}")
            }
            Expr::Assign { op, target, value } => format!(
                "{} {op} {}",
                Self::wrapped(target, 19),
                Self::wrapped(value, 2)
            ),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => format!(
                "{} ? {} : {}",
                Self::wrapped(test, 4),
                Self::wrapped(consequent, 2),
                Self::wrapped(alternate, 2)
            ),
            Expr::Call { callee, args } => {
                let callee_text = match callee.as_ref() {
                    Expr::Function(_) => format!("({})", Self::inline_expr(callee)),
                    other => Self::wrapped(other, 19),
                };
                format!(
                    "{callee_text}({})",
                    args.iter()
                        .map(|a| Self::wrapped(a, 2))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
            Expr::New { callee, args } => format!(
                "new {}({})",
                Self::wrapped(callee, 19),
                args.iter()
                    .map(|a| Self::wrapped(a, 2))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Expr::Member { object, property } => {
                let object_text = match object.as_ref() {
                    Expr::Num(_) => format!("({})", Self::inline_expr(object)),
                    other => Self::wrapped(other, 19),
                };
                format!("{object_text}.{property}")
            }
            Expr::Index { object, index } => format!(
                "{}[{}]",
                Self::wrapped(object, 19),
                Self::inline_expr(index)
            ),
            Expr::Sequence(items) => items
                .iter()
                .map(|e| Self::wrapped(e, 2))
                .collect::<Vec<_>>()
                .join(", "),
        };
        self.out.push_str(&text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        Program::parse(src).unwrap()
    }

    fn reprint(src: &str) -> String {
        parse(src).to_js()
    }

    #[test]
    fn prints_declarations_and_calls() {
        assert_eq!(
            reprint("var greeting = TR('greeting', 'Hi'), n = 2\nalert(greeting)"),
            "var greeting = TR(\"greeting\", \"Hi\"), n = 2;\nalert(greeting);\n"
        );
    }

    #[test]
    fn respects_operator_precedence() {
        assert_eq!(reprint("x = (a + b) * c;"), "x = (a + b) * c;\n");
        assert_eq!(reprint("x = a + b * c;"), "x = a + b * c;\n");
        assert_eq!(reprint("x = a - (b - c);"), "x = a - (b - c);\n");
        assert_eq!(reprint("x = (a, b);"), "x = (a, b);\n");
        assert_eq!(reprint("x = a ? b : c || d;"), "x = a ? b : c || d;\n");
        assert_eq!(reprint("x = 2 ** 3 ** 2;"), "x = 2 ** 3 ** 2;\n");
    }

    #[test]
    fn prints_functions_and_conditionals() {
        let src = "function greet(name) { if (name) { return 'Hi ' + name; } else return null; }";
        assert_eq!(
            reprint(src),
            "function greet(name) {\n  if (name) {\n    return \"Hi \" + name;\n  } else {\n    return null;\n  }\n}\n"
        );
    }

    #[test]
    fn function_expression_statement_is_parenthesized() {
        assert_eq!(
            reprint("(function () { init(); })();"),
            "(function() {\n  init();\n})();\n"
        );
    }

    #[test]
    fn member_index_and_new() {
        assert_eq!(
            reprint("document.cookie = LOCALECOOKIENAME + '=' + ids[0]; var d = new Date();"),
            "document.cookie = LOCALECOOKIENAME + \"=\" + ids[0];\nvar d = new Date();\n"
        );
    }

    #[test]
    fn object_and_array_literals() {
        assert_eq!(
            reprint("var cfg = {a: 1, 'b-c': [true, null], 3: -1.5};"),
            "var cfg = {a: 1, \"b-c\": [true, null], 3: -1.5};\n"
        );
    }

    #[test]
    fn string_escapes_round_trip() {
        let program = parse(r#"s = 'it\'s "quoted"\né';"#);
        let Stmt::Expr(Expr::Assign { value, .. }) = &program.body[0] else {
            panic!("expected assignment");
        };
        assert_eq!(**value, Expr::Str("it's \"quoted\"\né".into()));
        assert_eq!(parse(&program.to_js()), program);
    }

    #[test]
    fn source_map_directive_is_kept() {
        let program = parse("run();\n//# sourceMappingURL=app.js.map\n");
        assert_eq!(program.source_map_url.as_deref(), Some("app.js.map"));
        assert!(program.to_js().ends_with("//# sourceMappingURL=app.js.map\n"));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(reprint("/* a */ x = 1; // trailing\ny = 2"), "x = 1;\ny = 2;\n");
    }

    #[test]
    fn unsupported_syntax_is_rejected() {
        assert!(matches!(
            Program::parse("for (;;) {}"),
            Err(ParseError::Unsupported { .. })
        ));
        assert!(matches!(
            Program::parse("var f = x => x;"),
            Err(ParseError::Unsupported { .. })
        ));
        assert!(matches!(
            Program::parse("var s = `t`;"),
            Err(ParseError::Unsupported { .. })
        ));
        assert!(matches!(
            Program::parse("var r = /ab+c/;"),
            Err(ParseError::Unsupported { .. })
        ));
    }

    #[test]
    fn unterminated_string_is_error() {
        assert!(matches!(
            Program::parse("x = 'open\n;"),
            Err(ParseError::Unterminated { what: "string", .. })
        ));
    }

    #[test]
    fn missing_separator_on_same_line_is_error() {
        assert!(Program::parse("a b").is_err());
    }

    #[test]
    fn assignment_target_predicate() {
        assert!(is_assignment_target(&[Slot::Statement, Slot::AssignTarget]));
        assert!(is_assignment_target(&[
            Slot::Statement,
            Slot::AssignTarget,
            Slot::MemberObject
        ]));
        assert!(!is_assignment_target(&[Slot::Statement, Slot::AssignValue]));
        assert!(!is_assignment_target(&[
            Slot::AssignTarget,
            Slot::IndexProperty
        ]));
        assert!(is_assignment_target(&[Slot::Statement, Slot::UpdateArgument]));
        assert!(!is_assignment_target(&[]));
    }

    #[test]
    fn any_expr_reports_slot_chain() {
        let program = parse("LOCALEID = 'x'; use(LOCALEID);");
        let mut reads = 0;
        let mut writes = 0;
        program.any_expr(&mut |expr, slots| {
            if *expr == Expr::Ident("LOCALEID".into()) {
                if is_assignment_target(slots) {
                    writes += 1;
                } else {
                    reads += 1;
                }
            }
            false
        });
        assert_eq!((reads, writes), (1, 1));
    }

    #[test]
    fn any_expr_descends_into_function_bodies() {
        let program = parse("var f = function () { return TR('k'); };");
        assert!(program.any_expr(&mut |expr, _| expr.called_name() == Some("TR")));
    }

    #[test]
    fn replace_exprs_does_not_descend_into_replacement() {
        let mut program = parse("a(b(c));");
        let count = program.replace_exprs(&mut |expr, _| match expr {
            Expr::Call { .. } => Some(Expr::Str("done".into())),
            _ => None,
        });
        assert_eq!(count, 1);
        assert_eq!(program.to_js(), "\"done\";\n");
    }

    #[test]
    fn from_json_builds_literals() {
        let value = serde_json::json!({"en": ["a", 1], "is-default": true, "n": -2});
        let expr = Expr::from_json(&value);
        assert_eq!(
            print_expr(&expr),
            "{en: [\"a\", 1], \"is-default\": true, n: -2}"
        );
    }
}
