//! Statement splitting for multi-statement scripts
//!
//! Scripts are tokenized with `sqlparser` and cut at top-level semicolons, so
//! semicolons inside string literals, quoted identifiers, comments and
//! dollar-quoted bodies stay put. `BEGIN ... END` compound bodies (MySQL
//! routines and triggers, Postgres `BEGIN ATOMIC`) and `CASE ... END` nest, and
//! semicolons inside them do not split. Statement text is reassembled from the raw
//! tokens rather than re-rendered from an AST, keeping it as written.

use sqlparser::dialect::Dialect;
use sqlparser::tokenizer::{Token, Tokenizer};

/// Split `sql` into individual statements for `dialect`.
///
/// Fragments holding nothing but whitespace and comments are dropped. If the
/// tokenizer rejects the script, falls back to a quote- and comment-aware
/// character scan.
pub fn split_sql_statements(dialect: &dyn Dialect, sql: &str) -> Vec<String> {
    let tokens = match Tokenizer::new(dialect, sql).with_unescape(false).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(
                target: "dbmigrator",
                "SQL tokenizing failed, using plain semicolon splitting: {}",
                e
            );
            return naive_split(sql);
        }
    };

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_content = false;
    let mut depth = 0usize;

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::SemiColon if depth == 0 => {
                push_statement(&mut statements, &mut current, has_content);
                has_content = false;
            }
            Token::EOF => {}
            Token::Whitespace(ws) => current.push_str(&ws.to_string()),
            other => {
                if let Some(word) = unquoted_word(Some(other)) {
                    let next = next_significant(&tokens, i + 1);
                    match word.as_str() {
                        "BEGIN" if opens_block(next) => depth += 1,
                        "CASE" => depth += 1,
                        "END" if depth > 0 && !closes_control_flow(next) => depth -= 1,
                        _ => {}
                    }
                }
                has_content = true;
                current.push_str(&other.to_string());
            }
        }
    }
    push_statement(&mut statements, &mut current, has_content);
    statements
}

fn unquoted_word(token: Option<&Token>) -> Option<String> {
    match token {
        Some(Token::Word(w)) if w.quote_style.is_none() => Some(w.value.to_ascii_uppercase()),
        _ => None,
    }
}

fn next_significant(tokens: &[Token], from: usize) -> Option<&Token> {
    tokens
        .get(from..)?
        .iter()
        .find(|t| !matches!(t, Token::Whitespace(_)))
}

/// `BEGIN` starts a compound body unless it starts a transaction
/// (`begin;`, `begin work`, `begin transaction ...`).
fn opens_block(next: Option<&Token>) -> bool {
    match next {
        None | Some(Token::SemiColon) | Some(Token::EOF) => false,
        token => !matches!(
            unquoted_word(token).as_deref(),
            Some("TRANSACTION" | "WORK" | "ISOLATION" | "READ" | "DEFERRED" | "IMMEDIATE" | "EXCLUSIVE")
        ),
    }
}

/// `END IF`, `END LOOP`, `END WHILE` and `END REPEAT` close constructs that
/// never opened a level.
fn closes_control_flow(next: Option<&Token>) -> bool {
    matches!(
        unquoted_word(next).as_deref(),
        Some("IF" | "LOOP" | "WHILE" | "REPEAT")
    )
}

fn push_statement(statements: &mut Vec<String>, current: &mut String, has_content: bool) {
    let text = std::mem::take(current);
    if has_content {
        statements.push(text.trim().to_string());
    }
}

/// Character scan splitting on semicolons outside quotes and comments
fn naive_split(sql: &str) -> Vec<String> {
    #[derive(PartialEq)]
    enum State {
        Normal,
        Quoted(char),
        LineComment,
        BlockComment,
    }

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                ';' => {
                    let text = std::mem::take(&mut current);
                    if !text.trim().is_empty() {
                        statements.push(text.trim().to_string());
                    }
                    continue;
                }
                '\'' | '"' | '`' => state = State::Quoted(c),
                '-' if chars.peek() == Some(&'-') => state = State::LineComment,
                '/' if chars.peek() == Some(&'*') => state = State::BlockComment,
                _ => {}
            },
            State::Quoted(quote) if c == quote => state = State::Normal,
            State::LineComment if c == '\n' => state = State::Normal,
            State::BlockComment if c == '*' && chars.peek() == Some(&'/') => {
                current.push(c);
                if let Some(slash) = chars.next() {
                    current.push(slash);
                }
                state = State::Normal;
                continue;
            }
            _ => {}
        }
        current.push(c);
    }

    if !current.trim().is_empty() {
        statements.push(current.trim().to_string());
    }
    statements
}
