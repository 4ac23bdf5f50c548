// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use logos::Logos;
use thiserror::Error;

use crate::ast::Line;

#[derive(Logos, Debug, Clone, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f\v]+")]
pub enum Tok {
    // Keywords (case-insensitive except true/false first letter must be lowercase)
    #[regex(r"(?i:class)")]
    KwClass,
    #[regex(r"(?i:inherits)")]
    KwInherits,
    #[regex(r"(?i:if)")]
    KwIf,
    #[regex(r"(?i:then)")]
    KwThen,
    #[regex(r"(?i:else)")]
    KwElse,
    #[regex(r"(?i:fi)")]
    KwFi,
    #[regex(r"(?i:while)")]
    KwWhile,
    #[regex(r"(?i:loop)")]
    KwLoop,
    #[regex(r"(?i:pool)")]
    KwPool,
    #[regex(r"(?i:let)")]
    KwLet,
    #[regex(r"(?i:in)")]
    KwIn,
    #[regex(r"(?i:case)")]
    KwCase,
    #[regex(r"(?i:of)")]
    KwOf,
    #[regex(r"(?i:esac)")]
    KwEsac,
    #[regex(r"(?i:new)")]
    KwNew,
    #[regex(r"(?i:isvoid)")]
    KwIsVoid,
    #[regex(r"(?i:not)")]
    KwNot,

    // true/false special casing rule (first char lowercase)
    #[regex(r"t[rR][uU][eE]")]
    KwTrue,
    #[regex(r"f[aA][lL][sS][eE]")]
    KwFalse,

    // Special identifiers
    #[token("self")]
    SelfId,
    #[token("SELF_TYPE")]
    SelfType,

    // Symbols / operators
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("@")]
    At,

    #[token("<-")]
    Assign,
    #[token("=>")]
    Darrow,
    #[token("<=")]
    Le,
    #[token("<")]
    Lt,
    #[token("=")]
    Eq,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    #[token("~")]
    Tilde,

    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i32>().ok())]
    Int(i32),

    #[regex(r#""([^"\\\n]|\\.|\\\n)*""#, parse_string)]
    Str(String),

    // Identifiers
    #[regex(r"[A-Z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    TypeId(String),

    #[regex(r"[a-z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    ObjId(String),
}

fn parse_string(lex: &mut logos::Lexer<Tok>) -> String {
    let raw = lex.slice();
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::new();
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('b') => out.push('\u{0008}'),
                Some('t') => out.push('\t'),
                Some('n') => out.push('\n'),
                Some('f') => out.push('\u{000C}'),
                Some(other) => out.push(other),
                None => break,
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LexError {
    pub line: Line,
    pub message: String,
}

/// Token stream plus the source line of each token.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub toks: Vec<Tok>,
    pub lines: Vec<Line>,
}

/// Strip COOL comments:
///  - line comments: -- ... \n
///  - block comments: (* ... *) nested
///
/// Newlines inside comments are kept so token lines stay correct, and string
/// literals pass through untouched.
pub fn strip_comments(input: &str) -> Result<String, LexError> {
    let bytes = input.as_bytes();
    let mut i = 0usize;
    let mut out = Vec::with_capacity(bytes.len());
    let mut depth = 0usize;
    let mut line: Line = 1;
    let mut opened_at: Line = 1;
    let mut in_string = false;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        if b == b'\n' {
            line += 1;
        }

        if in_string {
            out.push(b);
            match (b, next) {
                (b'\\', Some(n)) => {
                    if n == b'\n' {
                        line += 1;
                    }
                    out.push(n);
                    i += 2;
                    continue;
                }
                (b'"', _) | (b'\n', _) => in_string = false,
                _ => {}
            }
            i += 1;
            continue;
        }

        if depth > 0 {
            match (b, next) {
                (b'(', Some(b'*')) => {
                    depth += 1;
                    i += 2;
                }
                (b'*', Some(b')')) => {
                    depth -= 1;
                    i += 2;
                }
                (b'\n', _) => {
                    out.push(b'\n');
                    i += 1;
                }
                _ => i += 1,
            }
            continue;
        }

        match (b, next) {
            (b'-', Some(b'-')) => {
                i += 2;
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            (b'(', Some(b'*')) => {
                depth = 1;
                opened_at = line;
                i += 2;
            }
            (b'*', Some(b')')) => {
                return Err(LexError {
                    line,
                    message: "Unmatched *)".to_string(),
                });
            }
            _ => {
                if b == b'"' {
                    in_string = true;
                }
                out.push(b);
                i += 1;
            }
        }
    }

    if depth != 0 {
        return Err(LexError {
            line: opened_at,
            message: "EOF in comment".to_string(),
        });
    }
    // Only whole ASCII delimiters were removed, so the bytes are still UTF-8.
    String::from_utf8(out).map_err(|e| LexError {
        line,
        message: format!("invalid UTF-8 in source: {e}"),
    })
}

/// Lex COOL input into tokens, recording the line each token starts on.
pub fn lex(input: &str) -> Result<Lexed, LexError> {
    let cleaned = strip_comments(input)?;
    let mut out = Lexed::default();
    let mut lx = Tok::lexer(&cleaned);
    let mut line: Line = 1;
    let mut scanned = 0usize;

    while let Some(res) = lx.next() {
        let span = lx.span();
        line += cleaned[scanned..span.start].matches('\n').count() as Line;
        scanned = span.start;

        match res {
            Ok(tok) => {
                out.toks.push(tok);
                out.lines.push(line);
            }
            Err(()) => {
                return Err(LexError {
                    line,
                    message: format!("lexical error at or near {:?}", lx.slice()),
                });
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_comments() {
        let s = "class Main { -- hi\n x:Int; };";
        let cleaned = strip_comments(s).unwrap();
        assert!(cleaned.contains("class Main"));
        assert!(!cleaned.contains("-- hi"));
    }

    #[test]
    fn strips_nested_block_comments() {
        let s = "(* a (* b *) c *) class Main { };";
        let cleaned = strip_comments(s).unwrap();
        assert!(cleaned.contains("class Main"));
        assert!(!cleaned.contains('b'));
    }

    #[test]
    fn comment_markers_inside_strings_are_kept() {
        let cleaned = strip_comments(r#"x <- "a--b(*c*)";"#).unwrap();
        assert_eq!(cleaned, r#"x <- "a--b(*c*)";"#);
    }

    #[test]
    fn unterminated_comment_reports_opening_line() {
        let err = strip_comments("class A {};\n(* open\n\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "EOF in comment");
    }

    #[test]
    fn lex_keywords_case_insensitive_but_true_false_special() {
        let lexed = lex("ClAsS Main { x:Bool <- tRuE; };").unwrap();
        assert!(lexed.toks.contains(&Tok::KwClass));
        assert!(lexed.toks.contains(&Tok::KwTrue));

        // "True" should NOT be KwTrue
        let lexed = lex("class Main { x:Bool <- True; };").unwrap();
        assert!(!lexed.toks.contains(&Tok::KwTrue));
    }

    #[test]
    fn lex_basic_class_tokens() {
        let lexed = lex("class Main inherits Object { x : Int <- 1; };").unwrap();
        let toks = &lexed.toks;
        assert!(toks.contains(&Tok::KwClass));
        assert!(toks.contains(&Tok::KwInherits));
        assert!(toks.iter().any(|t| matches!(t, Tok::TypeId(s) if s == "Main")));
        assert!(toks.iter().any(|t| matches!(t, Tok::ObjId(s) if s == "x")));
        assert!(toks.iter().any(|t| matches!(t, Tok::Int(1))));
    }

    #[test]
    fn token_lines_survive_comments() {
        let src = "class Main {\n(* one\ntwo *)\n  x : Int; -- trailing\n};\n";
        let lexed = lex(src).unwrap();
        let x = lexed
            .toks
            .iter()
            .position(|t| matches!(t, Tok::ObjId(s) if s == "x"))
            .unwrap();
        assert_eq!(lexed.lines[x], 4);
        assert_eq!(*lexed.lines.last().unwrap(), 5);
    }

    #[test]
    fn string_escapes_are_decoded() {
        let lexed = lex(r#""a\tb\nc\\""#).unwrap();
        assert_eq!(lexed.toks, vec![Tok::Str("a\tb\nc\\".to_string())]);
    }

    #[test]
    fn oversized_integer_is_a_lex_error() {
        let err = lex("x <- 99999999999;").unwrap_err();
        assert_eq!(err.line, 1);
    }
}
