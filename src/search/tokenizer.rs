//! Free-text query tokenizer
//!
//! Supports:
//! - Terms: `hello world` (all must match)
//! - Exact phrase: `"hello world"` or `'hello world'`
//! - Exclude: `-unwanted` or `-"unwanted phrase"`
//! - Keywords: `tag:music`, `category:linux`, `user:bob`, `feed:42`
//! - OR groups: `{hello world}`, nestable
//!
//! Tokenizing never fails. An unterminated quote runs to the end of the
//! input and an unterminated group closes at the end of the input. Groups
//! nest at most [`MAX_GROUP_DEPTH`] deep; braces past that are ignored and
//! their words join the innermost open group.

use serde::{Deserialize, Serialize};

pub const MAX_GROUP_DEPTH: usize = 32;

/// One node of a parsed query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Term { text: String, negated: bool },
    Phrase { text: String, negated: bool },
    Keyword { key: String, value: String, negated: bool },
    OrGroup(Vec<Node>),
}

impl Node {
    pub fn term(text: &str) -> Self {
        Node::Term { text: text.to_string(), negated: false }
    }

    pub fn phrase(text: &str) -> Self {
        Node::Phrase { text: text.to_string(), negated: false }
    }

    pub fn keyword(key: &str, value: &str) -> Self {
        Node::Keyword { key: key.to_string(), value: value.to_string(), negated: false }
    }

    /// Negated copy of a leaf; groups are returned unchanged
    pub fn negate(self) -> Self {
        match self {
            Node::Term { text, .. } => Node::Term { text, negated: true },
            Node::Phrase { text, .. } => Node::Phrase { text, negated: true },
            Node::Keyword { key, value, .. } => Node::Keyword { key, value, negated: true },
            group => group,
        }
    }
}

/// A raw lexical token before classification
#[derive(Debug)]
enum Lexeme {
    Open,
    Close,
    Word {
        text: String,
        /// The word began with a quote
        leading_quote: bool,
        /// Any part of the word was quoted
        quoted: bool,
    },
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

fn lex(raw: &str) -> Vec<Lexeme> {
    let mut lexemes = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '{' {
            chars.next();
            lexemes.push(Lexeme::Open);
            continue;
        }
        if c == '}' {
            chars.next();
            lexemes.push(Lexeme::Close);
            continue;
        }

        // A word runs until whitespace or a brace outside quotes. Quoted
        // sections join the surrounding word, so `search:"a b"` is one word.
        let mut text = String::new();
        let mut quoted = false;
        // `-"phrase"` still counts as a phrase
        let leading_quote = is_quote(c) || (c == '-' && raw_quote_follows(&chars));
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '{' || c == '}' {
                break;
            }
            chars.next();
            if is_quote(c) {
                quoted = true;
                // Everything up to the matching quote, or the end of input
                for inner in chars.by_ref() {
                    if inner == c {
                        break;
                    }
                    text.push(inner);
                }
            } else {
                text.push(c);
            }
        }
        lexemes.push(Lexeme::Word { text, leading_quote, quoted });
    }

    lexemes
}

fn raw_quote_follows(chars: &std::iter::Peekable<std::str::Chars<'_>>) -> bool {
    let mut ahead = chars.clone();
    ahead.next();
    matches!(ahead.next(), Some(c) if is_quote(c))
}

fn classify(text: String, leading_quote: bool, quoted: bool) -> Option<Node> {
    let (negated, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.to_string()),
        None => (false, text),
    };
    if body.is_empty() {
        return None;
    }

    let node = if leading_quote {
        Node::Phrase { text: body, negated }
    } else if let Some((key, value)) = keyword_split(&body) {
        Node::Keyword { key: key.to_string(), value: value.to_string(), negated }
    } else if quoted {
        // Quotes in the middle of a word still group its words together
        Node::Phrase { text: body, negated }
    } else {
        Node::Term { text: body, negated }
    };
    Some(node)
}

/// `key:value` when a colon appears before any whitespace
fn keyword_split(body: &str) -> Option<(&str, &str)> {
    let colon = body.find(':')?;
    let key = &body[..colon];
    if key.is_empty() || key.chars().any(char::is_whitespace) {
        return None;
    }
    Some((key, &body[colon + 1..]))
}

/// Parse a raw query string into nodes
pub fn tokenize(raw: &str) -> Vec<Node> {
    let mut root: Vec<Node> = Vec::new();
    // Open groups, innermost last
    let mut or_stack: Vec<Vec<Node>> = Vec::new();
    // Opens past the depth limit, so their closes are skipped too
    let mut ignored_opens = 0usize;

    for lexeme in lex(raw) {
        match lexeme {
            Lexeme::Open if or_stack.len() >= MAX_GROUP_DEPTH => ignored_opens += 1,
            Lexeme::Open => or_stack.push(Vec::new()),
            Lexeme::Close if ignored_opens > 0 => ignored_opens -= 1,
            Lexeme::Close => {
                // A stray close brace is ignored
                if let Some(group) = or_stack.pop() {
                    push_group(&mut root, &mut or_stack, group);
                }
            }
            Lexeme::Word { text, leading_quote, quoted } => {
                if let Some(node) = classify(text, leading_quote, quoted) {
                    match or_stack.last_mut() {
                        Some(group) => group.push(node),
                        None => root.push(node),
                    }
                }
            }
        }
    }

    // Unterminated groups close at the end of the input
    while let Some(group) = or_stack.pop() {
        push_group(&mut root, &mut or_stack, group);
    }

    root
}

fn push_group(root: &mut Vec<Node>, or_stack: &mut [Vec<Node>], group: Vec<Node>) {
    if group.is_empty() {
        return;
    }
    let node = Node::OrGroup(group);
    match or_stack.last_mut() {
        Some(parent) => parent.push(node),
        None => root.push(node),
    }
}
