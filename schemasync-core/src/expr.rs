//! Boolean expression parsing and canonical pretty-printing for CHECK
//! constraint bodies.
//!
//! A declared `status IN ('a', 'b')` and PostgreSQL's deparsed
//! `status = ANY (ARRAY['a'::text, 'b'::text])` describe the same constraint
//! but are lexically different. Both the declared-SQL parser and the
//! introspector run every check expression through [`canonicalize_check_expression`]
//! so that semantically identical constraints collapse to one canonical string
//! before the diff engine ever compares them — otherwise every schema using
//! `IN` or `BETWEEN` would show a spurious check-constraint diff on every run.

use crate::canon::canonicalize_identifier;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    Op(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn tokenize(s: &str) -> Option<Vec<Token>> {
    let bytes: Vec<char> = s.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '\'' => {
                let start = i;
                i += 1;
                loop {
                    if i >= bytes.len() {
                        return None;
                    }
                    if bytes[i] == '\'' {
                        if i + 1 < bytes.len() && bytes[i + 1] == '\'' {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
                tokens.push(Token::Str(bytes[start..i].iter().collect()));
            }
            '"' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i] != '"' {
                    i += 1;
                }
                if i >= bytes.len() {
                    return None;
                }
                i += 1;
                tokens.push(Token::Ident(bytes[start..i].iter().collect()));
            }
            '0'..='9' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Number(bytes[start..i].iter().collect()));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_alphanumeric() || bytes[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(bytes[start..i].iter().collect()));
            }
            _ => {
                let multi_char = ["<=", ">=", "<>", "!=", "::", "||"]
                    .iter()
                    .find(|op| bytes[i..].starts_with(op.chars().collect::<Vec<_>>().as_slice()));
                if let Some(op) = multi_char {
                    tokens.push(Token::Op(op.to_string()));
                    i += op.len();
                    continue;
                }
                match c {
                    '=' | '<' | '>' | '+' | '-' | '*' | '/' | '%' => {
                        tokens.push(Token::Op(c.to_string()));
                        i += 1;
                    }
                    _ => return None,
                }
            }
        }
    }
    Some(tokens)
}

#[derive(Debug, Clone)]
enum Expr {
    Ident(String),
    Literal(String),
    Unary(String, Box<Expr>),
    Binary(Box<Expr>, String, Box<Expr>),
    In { expr: Box<Expr>, negated: bool, list: Vec<Expr> },
    Between { expr: Box<Expr>, negated: bool, low: Box<Expr>, high: Box<Expr> },
    IsNull { expr: Box<Expr>, negated: bool },
    Call(String, Vec<Expr>),
    Cast(Box<Expr>, String),
    Array(Vec<Expr>),
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

fn keyword(tok: &Token, word: &str) -> bool {
    matches!(tok, Token::Ident(s) if s.eq_ignore_ascii_case(word))
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn at_keyword(&self, word: &str) -> bool {
        self.peek().map(|t| keyword(t, word)).unwrap_or(false)
    }

    fn bump(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_or(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_and()?;
        while self.at_keyword("OR") {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(Box::new(lhs), "OR".to_string(), Box::new(rhs));
        }
        Some(lhs)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_not()?;
        while self.at_keyword("AND") {
            self.pos += 1;
            let rhs = self.parse_not()?;
            lhs = Expr::Binary(Box::new(lhs), "AND".to_string(), Box::new(rhs));
        }
        Some(lhs)
    }

    fn parse_not(&mut self) -> Option<Expr> {
        if self.at_keyword("NOT") {
            self.pos += 1;
            let inner = self.parse_not()?;
            return Some(Expr::Unary("NOT".to_string(), Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Option<Expr> {
        let lhs = self.parse_additive()?;

        let negated = if self.at_keyword("NOT") {
            self.pos += 1;
            true
        } else {
            false
        };

        if self.at_keyword("IN") {
            self.pos += 1;
            if self.peek() != Some(&Token::LParen) {
                return None;
            }
            self.pos += 1;
            let mut list = Vec::new();
            if self.peek() != Some(&Token::RParen) {
                loop {
                    list.push(self.parse_or()?);
                    if self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                        continue;
                    }
                    break;
                }
            }
            if self.peek() != Some(&Token::RParen) {
                return None;
            }
            self.pos += 1;
            return Some(Expr::In { expr: Box::new(lhs), negated, list });
        }

        if self.at_keyword("BETWEEN") {
            self.pos += 1;
            let low = self.parse_additive()?;
            if !self.at_keyword("AND") {
                return None;
            }
            self.pos += 1;
            let high = self.parse_additive()?;
            return Some(Expr::Between { expr: Box::new(lhs), negated, low: Box::new(low), high: Box::new(high) });
        }

        if negated {
            // `NOT` consumed but neither IN nor BETWEEN followed: not a
            // construct this parser understands.
            return None;
        }

        if self.at_keyword("IS") {
            self.pos += 1;
            let is_negated = if self.at_keyword("NOT") {
                self.pos += 1;
                true
            } else {
                false
            };
            if !self.at_keyword("NULL") {
                return None;
            }
            self.pos += 1;
            return Some(Expr::IsNull { expr: Box::new(lhs), negated: is_negated });
        }

        if let Some(Token::Op(op)) = self.peek() {
            if matches!(op.as_str(), "=" | "<>" | "!=" | "<" | ">" | "<=" | ">=") {
                let op = op.clone();
                self.pos += 1;
                let rhs = self.parse_additive()?;
                // `lhs = ANY (ARRAY[...])` / `lhs <> ALL (ARRAY[...])` is how
                // PostgreSQL deparses an `IN`/`NOT IN` check constraint; fold it
                // back into `In` so it canonicalizes to the same form the
                // declared-SQL `IN` syntax produces.
                if op == "=" {
                    if let Expr::Call(name, args) = &rhs {
                        if name.eq_ignore_ascii_case("ANY") && args.len() == 1 {
                            if let Expr::Array(list) = &args[0] {
                                return Some(Expr::In { expr: Box::new(lhs), negated: false, list: list.clone() });
                            }
                        }
                    }
                }
                if op == "<>" || op == "!=" {
                    if let Expr::Call(name, args) = &rhs {
                        if name.eq_ignore_ascii_case("ALL") && args.len() == 1 {
                            if let Expr::Array(list) = &args[0] {
                                return Some(Expr::In { expr: Box::new(lhs), negated: true, list: list.clone() });
                            }
                        }
                    }
                }
                return Some(Expr::Binary(Box::new(lhs), op, Box::new(rhs)));
            }
        }

        if self.at_keyword("LIKE") || self.at_keyword("ILIKE") {
            let op = if self.at_keyword("LIKE") { "LIKE" } else { "ILIKE" }.to_string();
            self.pos += 1;
            let rhs = self.parse_additive()?;
            return Some(Expr::Binary(Box::new(lhs), op, Box::new(rhs)));
        }

        Some(lhs)
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            match self.peek() {
                Some(Token::Op(op)) if op == "+" || op == "-" || op == "||" => {
                    let op = op.clone();
                    self.pos += 1;
                    let rhs = self.parse_mul()?;
                    lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
                }
                _ => break,
            }
        }
        Some(lhs)
    }

    fn parse_mul(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::Op(op)) if op == "*" || op == "/" || op == "%" => {
                    let op = op.clone();
                    self.pos += 1;
                    let rhs = self.parse_unary()?;
                    lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
                }
                _ => break,
            }
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        if let Some(Token::Op(op)) = self.peek() {
            if op == "-" {
                self.pos += 1;
                let inner = self.parse_unary()?;
                return Some(Expr::Unary("-".to_string(), Box::new(inner)));
            }
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;
        while let Some(Token::Op(op)) = self.peek() {
            if op == "::" {
                self.pos += 1;
                let ty = self.parse_type_name()?;
                expr = Expr::Cast(Box::new(expr), ty);
            } else {
                break;
            }
        }
        Some(expr)
    }

    fn parse_type_name(&mut self) -> Option<String> {
        let name = match self.bump()? {
            Token::Ident(s) => s.clone(),
            _ => return None,
        };
        let mut ty = name;
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let mut params = Vec::new();
            while self.peek() != Some(&Token::RParen) {
                match self.bump()? {
                    Token::Number(n) => params.push(n.clone()),
                    Token::Comma => continue,
                    _ => return None,
                }
            }
            self.pos += 1;
            ty = format!("{}({})", ty, params.join(","));
        }
        Some(ty)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        match self.bump()?.clone() {
            Token::LParen => {
                let inner = self.parse_or()?;
                if self.peek() != Some(&Token::RParen) {
                    return None;
                }
                self.pos += 1;
                Some(inner)
            }
            Token::Number(n) => Some(Expr::Literal(n)),
            Token::Str(s) => Some(Expr::Literal(s)),
            Token::Ident(name) if name.eq_ignore_ascii_case("ARRAY") && self.peek() == Some(&Token::LBracket) => {
                self.pos += 1;
                let mut items = Vec::new();
                if self.peek() != Some(&Token::RBracket) {
                    loop {
                        items.push(self.parse_or()?);
                        if self.peek() == Some(&Token::Comma) {
                            self.pos += 1;
                            continue;
                        }
                        break;
                    }
                }
                if self.peek() != Some(&Token::RBracket) {
                    return None;
                }
                self.pos += 1;
                Some(Expr::Array(items))
            }
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if self.peek() != Some(&Token::RParen) {
                        loop {
                            args.push(self.parse_or()?);
                            if self.peek() == Some(&Token::Comma) {
                                self.pos += 1;
                                continue;
                            }
                            break;
                        }
                    }
                    if self.peek() != Some(&Token::RParen) {
                        return None;
                    }
                    self.pos += 1;
                    Some(Expr::Call(name, args))
                } else {
                    Some(Expr::Ident(name))
                }
            }
            _ => None,
        }
    }
}

fn parse_expr(tokens: &[Token]) -> Option<Expr> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != tokens.len() {
        return None;
    }
    Some(expr)
}

fn render_ident(name: &str) -> String {
    if name.starts_with('"') {
        name.to_string()
    } else {
        canonicalize_identifier(name)
    }
}

fn render(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => render_ident(name),
        Expr::Literal(lit) => lit.clone(),
        Expr::Unary(op, inner) if op == "NOT" => format!("(NOT {})", render(inner)),
        Expr::Unary(op, inner) => format!("({}{})", op, render(inner)),
        Expr::Binary(lhs, op, rhs) => format!("({} {} {})", render(lhs), op, render(rhs)),
        Expr::In { expr, negated: false, list } => {
            format!("{} = ANY (ARRAY[{}])", render(expr), list.iter().map(render).collect::<Vec<_>>().join(", "))
        }
        Expr::In { expr, negated: true, list } => {
            format!("{} <> ALL (ARRAY[{}])", render(expr), list.iter().map(render).collect::<Vec<_>>().join(", "))
        }
        Expr::Between { expr, negated: false, low, high } => {
            format!("({} >= {}) AND ({} <= {})", render(expr), render(low), render(expr), render(high))
        }
        Expr::Between { expr, negated: true, low, high } => {
            format!("({} < {}) OR ({} > {})", render(expr), render(low), render(expr), render(high))
        }
        Expr::IsNull { expr, negated: false } => format!("({} IS NULL)", render(expr)),
        Expr::IsNull { expr, negated: true } => format!("({} IS NOT NULL)", render(expr)),
        Expr::Call(name, args) => format!("{}({})", render_ident(name), args.iter().map(render).collect::<Vec<_>>().join(", ")),
        // A `::text` cast on a string literal is PostgreSQL's own default
        // type for an unadorned string literal, so it carries no semantic
        // difference from the declared side, which never writes it.
        Expr::Cast(inner, ty) if ty.eq_ignore_ascii_case("text") && matches!(inner.as_ref(), Expr::Literal(l) if l.starts_with('\'')) => render(inner),
        Expr::Cast(inner, ty) => format!("{}::{}", render(inner), ty),
        Expr::Array(items) => format!("ARRAY[{}]", items.iter().map(render).collect::<Vec<_>>().join(", ")),
    }
}

/// Canonicalize a CHECK constraint body so that declared text and PostgreSQL's
/// deparsed `pg_get_constraintdef` text collapse to the same string whenever
/// they describe the same constraint.
///
/// Falls back to whitespace-collapsed raw text when the expression can't be
/// parsed by this module's (intentionally non-exhaustive) grammar — a
/// constraint using a construct outside that grammar still gets compared
/// consistently between the two sides, it just won't dedupe across an
/// `IN`/`BETWEEN` rewrite the way a fully parsed one does.
pub fn canonicalize_check_expression(raw: &str) -> String {
    let trimmed = raw.trim();
    let fallback: String = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");

    let tokens = match tokenize(trimmed) {
        Some(t) if !t.is_empty() => t,
        _ => return fallback,
    };
    match parse_expr(&tokens) {
        Some(expr) => render(&expr),
        None => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_rewritten_to_any_array() {
        assert_eq!(
            canonicalize_check_expression("status IN ('a', 'b')"),
            "status = ANY (ARRAY['a', 'b'])"
        );
    }

    #[test]
    fn test_not_in_rewritten_to_all_array() {
        assert_eq!(
            canonicalize_check_expression("status NOT IN ('a', 'b')"),
            "status <> ALL (ARRAY['a', 'b'])"
        );
    }

    #[test]
    fn test_between_rewritten_to_range_comparison() {
        assert_eq!(
            canonicalize_check_expression("age BETWEEN 0 AND 150"),
            "(age >= 0) AND (age <= 150)"
        );
    }

    #[test]
    fn test_declared_and_deparsed_forms_converge() {
        let declared = canonicalize_check_expression("status IN ('a', 'b')");
        let deparsed = canonicalize_check_expression("status = ANY (ARRAY['a', 'b'])");
        assert_eq!(declared, deparsed);
    }

    #[test]
    fn test_declared_and_real_postgres_deparsed_form_converge() {
        // This is the literal form pg_get_constraintdef produces for an IN
        // check on a text/varchar column, casts and all.
        let declared = canonicalize_check_expression("status IN ('a', 'b')");
        let deparsed = canonicalize_check_expression("(status = ANY (ARRAY['a'::text, 'b'::text]))");
        assert_eq!(declared, deparsed);
    }

    #[test]
    fn test_not_in_and_real_postgres_deparsed_form_converge() {
        let declared = canonicalize_check_expression("status NOT IN ('a', 'b')");
        let deparsed = canonicalize_check_expression("(status <> ALL (ARRAY['a'::text, 'b'::text]))");
        assert_eq!(declared, deparsed);
    }

    #[test]
    fn test_whitespace_insignificant() {
        assert_eq!(
            canonicalize_check_expression("age  >=   0"),
            canonicalize_check_expression("age>=0")
        );
    }

    #[test]
    fn test_unparseable_expression_falls_back_to_collapsed_text() {
        assert_eq!(canonicalize_check_expression("  a  @@  b  "), "a @@ b");
    }

    #[test]
    fn test_and_of_two_comparisons() {
        assert_eq!(canonicalize_check_expression("a > 0 AND b < 10"), "(a > 0) AND (b < 10)");
    }
}
