//! Recursive descent parser for function bodies and parameters
//!
//! Parses the subset of JavaScript the interpreter can run. Constructs
//! outside the subset fail with `Error::Unsupported` rather than a syntax
//! error, so callers can tell "not valid JavaScript" apart from "valid,
//! but not something we run".

use crate::error::Error;
use crate::interp::ast::{DeclKind, Expr, Param, Stmt};
use crate::interp::lexer::{tokenize, Spanned, Token};
use crate::js_op;

/// Keywords for constructs the interpreter does not run
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "async", "await", "catch", "class", "delete", "do", "export", "finally", "function",
    "import", "in", "instanceof", "new", "super", "switch", "this", "throw", "try", "void",
    "with",
];

/// Keywords that may not be used as plain identifiers
const RESERVED: &[&str] = &[
    "break", "const", "continue", "else", "for", "if", "let", "return", "typeof", "var",
    "while", "yield",
];

const ASSIGNMENT_OPS: &[&str] = &["=", "+=", "-=", "*=", "/=", "%=", "**="];

// Nesting past this depth is rejected instead of overflowing the stack.
// Each link of an operator or member chain counts as one level.
const MAX_DEPTH: usize = 128;

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    generator: bool,
}

fn unsupported(construct: &str) -> Error {
    Error::Unsupported {
        construct: construct.into(),
    }
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, generator: bool) -> Result<Self, Error> {
        Ok(Parser {
            text,
            tokens: tokenize(text)?,
            pos: 0,
            depth: 0,
            generator,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|spanned| &spanned.token)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|spanned| spanned.offset)
            .unwrap_or(self.text.len())
    }

    fn syntax(&self, reason: &str) -> Error {
        Error::Syntax {
            offset: self.offset(),
            reason: reason.into(),
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek().cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Some(Token::Punct(p)) if *p == punct)
    }

    fn is_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(n)) if n == name)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        let found = self.is_punct(punct);
        if found {
            self.pos += 1;
        }
        found
    }

    fn eat_any(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Punct(p)) if ops.contains(p) => {
                let op = *p;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), Error> {
        match self.eat_punct(punct) {
            true => Ok(()),
            false => Err(self.syntax(&format!("expected '{}'", punct))),
        }
    }

    /// Whether a line break separates the current token from the previous one.
    fn newline_before(&self) -> bool {
        match (self.pos.checked_sub(1), self.tokens.get(self.pos)) {
            (Some(prev), Some(current)) => self.text
                [self.tokens[prev].offset..current.offset]
                .contains('\n'),
            _ => false,
        }
    }

    /// Consume a statement terminator, inserting one where JS would.
    fn end_statement(&mut self) -> Result<(), Error> {
        if self.eat_punct(";") || self.is_punct("}") || self.at_end() || self.newline_before() {
            Ok(())
        } else {
            Err(self.syntax("expected ';'"))
        }
    }

    fn binding_name(&mut self) -> Result<String, Error> {
        match self.peek() {
            Some(Token::Ident(name))
                if !RESERVED.contains(&name.as_str())
                    && !UNSUPPORTED_KEYWORDS.contains(&name.as_str()) =>
            {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            Some(Token::Punct("[")) | Some(Token::Punct("{")) => {
                Err(unsupported("destructuring pattern"))
            }
            _ => Err(self.syntax("expected an identifier")),
        }
    }

    fn nested<T>(&mut self, parse: fn(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        if self.depth >= MAX_DEPTH {
            return Err(self.syntax("nesting is too deep"));
        }
        self.depth += 1;
        let rv = parse(self);
        self.depth -= 1;
        rv
    }

    /// Account for one more link in a left-leaning chain such as `a + b + c`
    /// or `a.b.c`. The caller restores `depth` once the chain ends.
    fn link(&mut self) -> Result<(), Error> {
        if self.depth >= MAX_DEPTH {
            return Err(self.syntax("nesting is too deep"));
        }
        self.depth += 1;
        Ok(())
    }

    // =================================================================
    // Statements
    // =================================================================

    fn program(&mut self) -> Result<Vec<Stmt>, Error> {
        let mut body = Vec::new();
        while !self.at_end() {
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn statement(&mut self) -> Result<Stmt, Error> {
        self.nested(Self::statement_inner)
    }

    fn statement_inner(&mut self) -> Result<Stmt, Error> {
        let keyword = match self.peek() {
            Some(Token::Punct("{")) => {
                self.pos += 1;
                return self.block_rest().map(Stmt::Block);
            }
            Some(Token::Punct(";")) => {
                self.pos += 1;
                return Ok(Stmt::Empty);
            }
            Some(Token::Ident(name)) => name.clone(),
            _ => String::new(),
        };
        match keyword.as_str() {
            "var" | "let" | "const" => {
                let decl = self.declaration()?;
                self.end_statement()?;
                Ok(decl)
            }
            "return" => {
                self.pos += 1;
                let value = match self.is_punct(";")
                    || self.is_punct("}")
                    || self.at_end()
                    || self.newline_before()
                {
                    true => None,
                    false => Some(self.expression()?),
                };
                self.end_statement()?;
                Ok(Stmt::Return(value))
            }
            "if" => {
                self.pos += 1;
                let test = self.parenthesized()?;
                let consequent = Box::new(self.statement()?);
                let alternate = match self.is_ident("else") {
                    true => {
                        self.pos += 1;
                        Some(Box::new(self.statement()?))
                    }
                    false => None,
                };
                Ok(Stmt::If {
                    test,
                    consequent,
                    alternate,
                })
            }
            "while" => {
                self.pos += 1;
                let test = self.parenthesized()?;
                let body = Box::new(self.statement()?);
                Ok(Stmt::While { test, body })
            }
            "for" => self.for_statement(),
            "break" | "continue" => {
                self.pos += 1;
                if matches!(self.peek(), Some(Token::Ident(_))) && !self.newline_before() {
                    return Err(unsupported("labeled jump"));
                }
                self.end_statement()?;
                Ok(match keyword.as_str() {
                    "break" => Stmt::Break,
                    _ => Stmt::Continue,
                })
            }
            "else" => Err(self.syntax("unexpected 'else'")),
            kw if UNSUPPORTED_KEYWORDS.contains(&kw) => Err(unsupported(kw)),
            _ => {
                let expr = self.expression()?;
                self.end_statement()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// Statements up to and including the closing brace of a block.
    fn block_rest(&mut self) -> Result<Vec<Stmt>, Error> {
        let mut body = Vec::new();
        while !self.eat_punct("}") {
            if self.at_end() {
                return Err(self.syntax("expected '}'"));
            }
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn parenthesized(&mut self) -> Result<Expr, Error> {
        self.expect_punct("(")?;
        let expr = self.expression()?;
        self.expect_punct(")")?;
        Ok(expr)
    }

    fn declaration(&mut self) -> Result<Stmt, Error> {
        let kind = match self.advance() {
            Some(Token::Ident(kw)) if kw == "var" => DeclKind::Var,
            Some(Token::Ident(kw)) if kw == "let" => DeclKind::Let,
            _ => DeclKind::Const,
        };
        let mut decls = Vec::new();
        loop {
            let name = self.binding_name()?;
            let init = match self.eat_punct("=") {
                true => Some(self.assignment()?),
                false => None,
            };
            let loop_head = self.is_ident("of") || self.is_ident("in");
            if init.is_none() && kind == DeclKind::Const && !loop_head {
                return Err(self.syntax("missing initializer in const declaration"));
            }
            decls.push((name, init));
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(Stmt::Declare { kind, decls })
    }

    fn for_statement(&mut self) -> Result<Stmt, Error> {
        self.pos += 1;
        self.expect_punct("(")?;
        let init = match self.peek() {
            Some(Token::Punct(";")) => None,
            Some(Token::Ident(kw)) if kw == "var" || kw == "let" || kw == "const" => {
                Some(Box::new(self.declaration()?))
            }
            _ => Some(Box::new(Stmt::Expr(self.expression()?))),
        };
        if self.is_ident("of") || self.is_ident("in") {
            return Err(unsupported("for-in/of loop"));
        }
        self.expect_punct(";")?;
        let test = match self.is_punct(";") {
            true => None,
            false => Some(self.expression()?),
        };
        self.expect_punct(";")?;
        let update = match self.is_punct(")") {
            true => None,
            false => Some(self.expression()?),
        };
        self.expect_punct(")")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    // =================================================================
    // Expressions, lowest precedence first
    // =================================================================

    fn expression(&mut self) -> Result<Expr, Error> {
        let expr = self.assignment()?;
        if self.is_punct(",") {
            // Commas only separate items inside brackets
            return Err(unsupported("comma operator"));
        }
        Ok(expr)
    }

    fn assignment(&mut self) -> Result<Expr, Error> {
        self.nested(Self::assignment_inner)
    }

    fn assignment_inner(&mut self) -> Result<Expr, Error> {
        if self.is_ident("yield") {
            return self.yield_expression();
        }
        let target = self.conditional()?;
        if self.is_punct("=>") {
            return Err(unsupported("nested arrow function"));
        }
        match self.eat_any(ASSIGNMENT_OPS) {
            Some(op) => {
                match target {
                    Expr::Ident(_) | Expr::Member { .. } => {}
                    _ => return Err(self.syntax("invalid assignment target")),
                }
                let value = self.assignment()?;
                Ok(Expr::Assign {
                    op,
                    target: Box::new(target),
                    value: Box::new(value),
                })
            }
            None => Ok(target),
        }
    }

    fn yield_expression(&mut self) -> Result<Expr, Error> {
        if !self.generator {
            return Err(self.syntax("'yield' is only valid in generator functions"));
        }
        self.pos += 1;
        if self.eat_punct("*") {
            return Err(unsupported("yield*"));
        }
        let bare = self.at_end()
            || self.newline_before()
            || [")", "]", "}", ",", ";", ":"]
                .iter()
                .any(|closer| self.is_punct(closer));
        match bare {
            true => Ok(Expr::Yield(None)),
            false => Ok(Expr::Yield(Some(Box::new(self.assignment()?)))),
        }
    }

    fn conditional(&mut self) -> Result<Expr, Error> {
        let test = self.logical_or()?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect_punct(":")?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn logical(
        &mut self,
        ops: &[&'static str],
        next: fn(&mut Self) -> Result<Expr, Error>,
    ) -> Result<Expr, Error> {
        let mut left = next(self)?;
        let depth = self.depth;
        while let Some(op) = self.eat_any(ops) {
            self.link()?;
            let right = next(self)?;
            left = Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = depth;
        Ok(left)
    }

    fn binary(
        &mut self,
        ops: &[&'static str],
        next: fn(&mut Self) -> Result<Expr, Error>,
    ) -> Result<Expr, Error> {
        let mut left = next(self)?;
        let depth = self.depth;
        while let Some(op) = self.eat_any(ops) {
            self.link()?;
            let right = next(self)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = depth;
        Ok(left)
    }

    fn logical_or(&mut self) -> Result<Expr, Error> {
        self.logical(&["||", "??"], Self::logical_and)
    }

    fn logical_and(&mut self) -> Result<Expr, Error> {
        self.logical(&["&&"], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr, Error> {
        self.binary(&["===", "!==", "==", "!="], Self::relational)
    }

    fn relational(&mut self) -> Result<Expr, Error> {
        let expr = self.binary(&["<=", ">=", "<", ">"], Self::additive)?;
        if self.is_ident("in") || self.is_ident("instanceof") {
            return Err(unsupported("in/instanceof operator"));
        }
        Ok(expr)
    }

    fn additive(&mut self) -> Result<Expr, Error> {
        self.binary(&["+", "-"], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Expr, Error> {
        self.binary(&["*", "/", "%"], Self::exponent)
    }

    fn exponent(&mut self) -> Result<Expr, Error> {
        let base = self.unary()?;
        match self.eat_punct("**") {
            true => Ok(Expr::Binary {
                op: "**",
                left: Box::new(base),
                right: Box::new(self.nested(Self::exponent)?),
            }),
            false => Ok(base),
        }
    }

    fn unary(&mut self) -> Result<Expr, Error> {
        if let Some(op) = self.eat_any(&["!", "-", "+"]) {
            let operand = self.nested(Self::unary)?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        if self.is_ident("typeof") {
            self.pos += 1;
            let operand = self.nested(Self::unary)?;
            return Ok(Expr::Unary {
                op: "typeof",
                operand: Box::new(operand),
            });
        }
        if let Some(op) = self.eat_any(&["++", "--"]) {
            let target = self.nested(Self::unary)?;
            return self.update(op, true, target);
        }
        self.postfix()
    }

    fn update(&self, op: &'static str, prefix: bool, target: Expr) -> Result<Expr, Error> {
        match target {
            Expr::Ident(_) | Expr::Member { .. } => Ok(Expr::Update {
                op,
                prefix,
                target: Box::new(target),
            }),
            _ => Err(self.syntax(&format!("invalid '{}' operand", op))),
        }
    }

    fn postfix(&mut self) -> Result<Expr, Error> {
        let expr = self.call_member()?;
        if self.newline_before() {
            return Ok(expr);
        }
        match self.eat_any(&["++", "--"]) {
            Some(op) => self.update(op, false, expr),
            None => Ok(expr),
        }
    }

    fn call_member(&mut self) -> Result<Expr, Error> {
        let mut expr = self.primary()?;
        let depth = self.depth;
        loop {
            if self.is_punct(".") || self.is_punct("[") || self.is_punct("(") {
                self.link()?;
            }
            if self.eat_punct(".") {
                let name = match self.advance() {
                    Some(Token::Ident(name)) => name,
                    _ => return Err(self.syntax("expected a property name")),
                };
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(Expr::Literal(name.into())),
                };
            } else if self.eat_punct("[") {
                let property = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(property),
                };
            } else if self.eat_punct("(") {
                let args = self.list(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                self.depth = depth;
                return Ok(expr);
            }
        }
    }

    /// Comma separated expressions up to `closer`, allowing a trailing comma.
    fn list(&mut self, closer: &str) -> Result<Vec<Expr>, Error> {
        let mut items = Vec::new();
        while !self.eat_punct(closer) {
            if self.is_punct("...") {
                return Err(unsupported("spread"));
            }
            if self.is_punct(",") {
                return Err(self.syntax("unexpected ','"));
            }
            items.push(self.assignment()?);
            if !self.eat_punct(",") {
                self.expect_punct(closer)?;
                break;
            }
        }
        Ok(items)
    }

    fn object(&mut self) -> Result<Expr, Error> {
        let mut entries = Vec::new();
        while !self.eat_punct("}") {
            let key = match self.advance() {
                Some(Token::Ident(name)) => name,
                Some(Token::Str(s)) => s,
                Some(Token::Number(num)) => js_op::to_string(&js_op::to_number_value(num, "key")?),
                Some(Token::Punct("[")) => return Err(unsupported("computed property key")),
                Some(Token::Punct("...")) => return Err(unsupported("spread")),
                _ => return Err(self.syntax("expected a property key")),
            };
            let value = match self.eat_punct(":") {
                true => self.assignment()?,
                false if self.is_punct("(") => return Err(unsupported("method definition")),
                false => Expr::Ident(key.clone()),
            };
            entries.push((key, value));
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(Expr::Object(entries))
    }

    fn primary(&mut self) -> Result<Expr, Error> {
        let token = match self.advance() {
            Some(token) => token,
            None => return Err(self.syntax("unexpected end of input")),
        };
        match token {
            Token::Number(num) => Ok(Expr::Literal(js_op::to_number_value(num, "literal")?)),
            Token::Str(s) => Ok(Expr::Literal(s.into())),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(true.into())),
                "false" => Ok(Expr::Literal(false.into())),
                "null" | "undefined" => Ok(Expr::Literal(serde_json::Value::Null)),
                kw if UNSUPPORTED_KEYWORDS.contains(&kw) => Err(unsupported(kw)),
                kw if RESERVED.contains(&kw) => {
                    self.pos -= 1;
                    Err(self.syntax(&format!("unexpected keyword '{}'", kw)))
                }
                _ => Ok(Expr::Ident(name)),
            },
            Token::Punct("(") => {
                if self.is_punct(")") {
                    return Err(unsupported("nested arrow function"));
                }
                let expr = self.expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            Token::Punct("[") => self.list("]").map(Expr::Array),
            Token::Punct("{") => self.nested(Self::object),
            Token::Punct(p) => {
                self.pos -= 1;
                Err(self.syntax(&format!("unexpected '{}'", p)))
            }
        }
    }

    // =================================================================
    // Parameters
    // =================================================================

    fn param(&mut self) -> Result<Param, Error> {
        let rest = self.eat_punct("...");
        let name = self.binding_name()?;
        let default = match self.eat_punct("=") {
            true if rest => return Err(self.syntax("rest parameter may not have a default")),
            true => Some(self.assignment()?),
            false => None,
        };
        if !self.at_end() {
            return Err(self.syntax("unexpected token after parameter"));
        }
        Ok(Param {
            name,
            default,
            rest,
        })
    }
}

/// Parse a function body into statements.
pub fn parse_program(text: &str, generator: bool) -> Result<Vec<Stmt>, Error> {
    Parser::new(text, generator)?.program()
}

/// Parse one parameter fragment, e.g. `b = 2` or `...rest`.
pub fn parse_param(text: &str) -> Result<Param, Error> {
    Parser::new(text, false)?.param()
}
