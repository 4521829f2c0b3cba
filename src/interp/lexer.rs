//! Tokenizer for function bodies

use phf::phf_set;

use crate::error::Error;

/// Punctuators, matched longest first
pub static PUNCTUATORS: phf::Set<&'static str> = phf_set! {
    "===", "!==", "**=", "...",
    "==", "!=", "<=", ">=", "&&", "||", "??", "++", "--", "**",
    "+=", "-=", "*=", "/=", "%=", "=>",
    "{", "}", "(", ")", "[", "]", ";", ",", ".", ":", "?",
    "+", "-", "*", "/", "%", "<", ">", "=", "!",
};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

/// A token and the byte offset it starts at
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

struct Lexer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn syntax(&self, reason: &str) -> Error {
        Error::Syntax {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), Error> {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if trimmed.starts_with("//") {
                self.pos += trimmed.find('\n').unwrap_or(trimmed.len());
            } else if trimmed.starts_with("/*") {
                match trimmed[2..].find("*/") {
                    Some(end) => self.pos += end + 4,
                    None => return Err(self.syntax("unterminated comment")),
                }
            } else {
                return Ok(());
            }
        }
    }

    fn number(&mut self) -> Result<Token, Error> {
        let rest = self.rest();
        if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
            let digits: String = hex.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
            let value = i64::from_str_radix(&digits, 16)
                .map_err(|_| self.syntax("invalid hexadecimal literal"))?;
            self.pos += 2 + digits.len();
            return Ok(Token::Number(value as f64));
        }

        let bytes = rest.as_bytes();
        let digits = |from: usize| {
            from + bytes[from..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count()
        };
        let mut end = digits(0);
        if bytes.get(end) == Some(&b'.') {
            end = digits(end + 1);
        }
        if let Some(b'e') | Some(b'E') = bytes.get(end) {
            let mut exp = end + 1;
            if let Some(b'+') | Some(b'-') = bytes.get(exp) {
                exp += 1;
            }
            let exp_end = digits(exp);
            if exp_end > exp {
                end = exp_end;
            }
        }
        let value = rest[..end]
            .parse::<f64>()
            .map_err(|_| self.syntax("invalid numeric literal"))?;
        self.pos += end;
        Ok(Token::Number(value))
    }

    fn string(&mut self, quote: char) -> Result<Token, Error> {
        let start = self.pos;
        let mut value = String::new();
        let mut chars = self.rest().char_indices().skip(1);
        while let Some((idx, ch)) = chars.next() {
            match ch {
                c if c == quote => {
                    self.pos += idx + 1;
                    return Ok(Token::Str(value));
                }
                '\\' => {
                    let (_, escaped) = chars.next().ok_or(Error::Syntax {
                        offset: start,
                        reason: "unterminated string".into(),
                    })?;
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        // Line continuation
                        '\n' => {}
                        other => value.push(other),
                    }
                }
                '\n' => break,
                other => value.push(other),
            }
        }
        Err(Error::Syntax {
            offset: start,
            reason: "unterminated string".into(),
        })
    }

    fn next_token(&mut self) -> Result<Option<Spanned>, Error> {
        self.skip_trivia()?;
        let offset = self.pos;
        let ch = match self.peek() {
            Some(ch) => ch,
            None => return Ok(None),
        };
        let token = if ch.is_ascii_digit()
            || (ch == '.' && self.rest()[1..].starts_with(|c: char| c.is_ascii_digit()))
        {
            self.number()?
        } else if ch == '"' || ch == '\'' {
            self.string(ch)?
        } else if ch == '`' {
            return Err(Error::Unsupported {
                construct: "template literal".into(),
            });
        } else if is_ident_start(ch) {
            let rest = self.rest();
            let len = rest
                .char_indices()
                .find(|(_, c)| !is_ident_char(*c))
                .map(|(idx, _)| idx)
                .unwrap_or(rest.len());
            self.pos += len;
            Token::Ident(rest[..len].to_string())
        } else {
            let rest = self.rest();
            let punct = (1..=3)
                .rev()
                .filter_map(|len| rest.get(..len))
                .find_map(|candidate| PUNCTUATORS.get_key(candidate).copied())
                .ok_or_else(|| self.syntax(&format!("unexpected character {:?}", ch)))?;
            self.pos += punct.len();
            Token::Punct(punct)
        };
        Ok(Some(Spanned { token, offset }))
    }
}

/// Split source text into tokens, dropping whitespace and comments.
pub fn tokenize(text: &str) -> Result<Vec<Spanned>, Error> {
    let mut lexer = Lexer { text, pos: 0 };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

#[cfg(test)]
mod test_lexer {
    use super::*;

    fn tokens(text: &str) -> Vec<Token> {
        tokenize(text)
            .unwrap()
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    fn ident(name: &str) -> Token {
        Token::Ident(name.into())
    }

    #[test]
    fn test_tokens() {
        let cases = vec![
            (
                "return a+b;",
                vec![ident("return"), ident("a"), Token::Punct("+"), ident("b"), Token::Punct(";")],
            ),
            (
                "x === 1.5e2",
                vec![ident("x"), Token::Punct("==="), Token::Number(150.0)],
            ),
            ("a**=2", vec![ident("a"), Token::Punct("**="), Token::Number(2.0)]),
            ("0xff .5", vec![Token::Number(255.0), Token::Number(0.5)]),
            ("'a\\'b\\n'", vec![Token::Str("a'b\n".into())]),
            ("\"}\"", vec![Token::Str("}".into())]),
            ("$x _y", vec![ident("$x"), ident("_y")]),
            ("a // comment\n/* block */ b", vec![ident("a"), ident("b")]),
        ];
        cases.into_iter().for_each(|(text, exp)| {
            println!("{:?}", text);
            assert_eq!(tokens(text), exp);
        })
    }

    #[test]
    fn test_offsets() {
        let spanned = tokenize("  a +b").unwrap();
        let offsets: Vec<usize> = spanned.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![2, 4, 5]);
    }

    #[test]
    fn test_member_access_after_number_is_not_a_decimal() {
        assert_eq!(
            tokens("a.length"),
            vec![ident("a"), Token::Punct("."), ident("length")]
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(tokenize("'abc"), Err(Error::Syntax { .. })));
        assert!(matches!(tokenize("/* abc"), Err(Error::Syntax { .. })));
        assert!(matches!(tokenize("a # b"), Err(Error::Syntax { offset: 2, .. })));
        assert!(matches!(tokenize("`x`"), Err(Error::Unsupported { .. })));
    }
}
