//! The shunting-yard lexer: turns the raw infix source into a postfix token
//! stream (spec.md §4.1).
//!
//! Atoms accumulate across whitespace (a bare multi-word phrase like
//! `twilight sparkle` is one atom, not two) and terminate only at an
//! explicit AND/OR boundary or an unbalanced `)`. `~fuzz`/`^boost` modifiers
//! attach to the atom currently being built, falling back to literal atom
//! text if what follows isn't a clean number-then-terminator. Parenthesized
//! groups nested inside an atom (`pinkie pie (cosplayer)`) are consumed as
//! balanced, literal text rather than breaking the atom.

use crate::error::LexError;

/// A single token in the postfix stream produced by [`lex`].
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A leaf term, carrying any attached `^boost`/`~fuzz` modifiers.
    Atom {
        text: String,
        boost: Option<f64>,
        fuzz: Option<f64>,
    },
    And,
    Or,
    /// A unary negation applied to the value immediately preceding it on
    /// the operand stack.
    ///
    /// `collapses` distinguishes the two lexer-level negation mechanisms: a
    /// chained bare-atom marker (`!!!flutterbat`) always stacks (`false`),
    /// while a group-closing marker (`!(...)`) is eligible for the
    /// double-negation collapse the parser performs at `Merge` (`true`).
    Not { collapses: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackOp {
    LParen,
    And,
    Or,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    output: Vec<Token>,
    op_stack: Vec<StackOp>,
    group_not_stack: Vec<bool>,
    pending_not: u32,
    at_boundary: bool,

    atom: String,
    atom_open: bool,
    atom_pending_not: u32,
    atom_boost: Option<f64>,
    atom_fuzz: Option<f64>,
}

/// Tokenizes `source` into the postfix stream the parser folds into a tree.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    tracing::debug!(len = source.len(), "lexing query source");
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        output: Vec::new(),
        op_stack: Vec::new(),
        group_not_stack: Vec::new(),
        pending_not: 0,
        at_boundary: true,
        atom: String::new(),
        atom_open: false,
        atom_pending_not: 0,
        atom_boost: None,
        atom_fuzz: None,
    };
    lexer.run()?;
    Ok(lexer.output)
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn starts_with_ci(&self, word: &str) -> bool {
        let wlen = word.chars().count();
        if self.pos + wlen > self.chars.len() {
            return false;
        }
        self.chars[self.pos..self.pos + wlen]
            .iter()
            .zip(word.chars())
            .all(|(a, b)| a.to_ascii_uppercase() == b.to_ascii_uppercase())
    }

    fn run(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek() {
            if c == '"' {
                self.lex_quoted();
                continue;
            }
            if (c == '~' || c == '^') && self.atom_open && self.try_modifier(c) {
                continue;
            }
            if c == '(' {
                self.lex_lparen();
                continue;
            }
            if c == ')' {
                self.lex_rparen()?;
                continue;
            }
            if self.try_and() {
                continue;
            }
            if self.try_or() {
                continue;
            }
            if self.try_not() {
                continue;
            }
            if c.is_whitespace() {
                if self.atom_open && !self.atom.ends_with(' ') && !self.atom.is_empty() {
                    self.atom.push(' ');
                }
                self.pos += 1;
                self.at_boundary = true;
                continue;
            }
            if c == '\\' {
                // Raw backslash preserved verbatim; resolving escapes here
                // would make the analyzer's escaped-colon/wildcard handling
                // impossible (spec.md §3: atoms keep their raw text,
                // escapes included, until term analysis).
                self.open_atom_if_needed();
                self.atom.push('\\');
                self.pos += 1;
                if let Some(escaped) = self.peek() {
                    self.atom.push(escaped);
                    self.pos += 1;
                }
                self.at_boundary = false;
                continue;
            }
            self.open_atom_if_needed();
            self.atom.push(c);
            self.pos += 1;
            self.at_boundary = false;
        }
        self.flush_atom();
        while let Some(op) = self.op_stack.pop() {
            match op {
                StackOp::And => self.output.push(Token::And),
                StackOp::Or => self.output.push(Token::Or),
                StackOp::LParen => return Err(LexError::UnmatchedParen),
            }
        }
        Ok(())
    }

    fn open_atom_if_needed(&mut self) {
        if !self.atom_open {
            self.atom_open = true;
            self.atom_pending_not = self.pending_not;
            self.pending_not = 0;
        }
    }

    fn flush_atom(&mut self) {
        if !self.atom_open {
            return;
        }
        let text = std::mem::take(&mut self.atom);
        let text = text.trim_end().to_string();
        let boost = self.atom_boost.take();
        let fuzz = self.atom_fuzz.take();
        self.output.push(Token::Atom { text, boost, fuzz });
        for _ in 0..self.atom_pending_not {
            self.output.push(Token::Not { collapses: false });
        }
        self.atom_pending_not = 0;
        self.atom_open = false;
    }

    /// Tries to parse a `~<float>` or `^<signed number>` modifier at the
    /// current position. Returns `true` if it consumed input (either
    /// attaching the modifier, or abandoning it into literal atom text).
    fn try_modifier(&mut self, marker: char) -> bool {
        let start = self.pos + 1;
        let mut end = start;
        if matches!(self.chars.get(end), Some('+' | '-')) {
            end += 1;
        }
        let digits_start = end;
        while matches!(self.chars.get(end), Some(d) if d.is_ascii_digit()) {
            end += 1;
        }
        if matches!(self.chars.get(end), Some('.')) {
            end += 1;
            while matches!(self.chars.get(end), Some(d) if d.is_ascii_digit()) {
                end += 1;
            }
        }
        if end == digits_start {
            // No digits at all: not a modifier, not even an abandonable one.
            return false;
        }
        let terminates = match self.chars.get(end) {
            None => true,
            Some(c) => c.is_whitespace() || *c == ')',
        };
        if !terminates {
            // Abandoned: append just the marker, let normal scanning pick
            // up the rest as literal atom text.
            self.atom.push(marker);
            self.pos += 1;
            self.at_boundary = false;
            return true;
        }
        let text: String = self.chars[start..end].iter().collect();
        let Ok(value) = text.parse::<f64>() else {
            self.atom.push(marker);
            self.pos += 1;
            self.at_boundary = false;
            return true;
        };
        if marker == '~' {
            self.atom_fuzz = Some(value);
        } else {
            self.atom_boost = Some(value);
        }
        self.pos = end;
        self.at_boundary = false;
        true
    }

    /// Consumes a `"..."` quoted literal, keeping the surrounding quotes in
    /// the atom text. An escaped quote (`\"`) doesn't terminate the scan.
    fn lex_quoted(&mut self) {
        self.open_atom_if_needed();
        self.atom.push('"');
        self.pos += 1;
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.atom.push(c);
                self.pos += 1;
                if let Some(escaped) = self.peek() {
                    self.atom.push(escaped);
                    self.pos += 1;
                }
                continue;
            }
            if c == '"' {
                self.atom.push(c);
                self.pos += 1;
                break;
            }
            self.atom.push(c);
            self.pos += 1;
        }
        self.at_boundary = false;
    }

    fn lex_lparen(&mut self) {
        if self.atom_open {
            // Balanced parens embedded in an atom become literal text.
            let mut depth = 0usize;
            let mut j = self.pos;
            loop {
                match self.chars.get(j) {
                    Some('(') => depth += 1,
                    Some(')') => {
                        depth -= 1;
                        if depth == 0 {
                            let text: String = self.chars[self.pos..=j].iter().collect();
                            self.atom.push_str(&text);
                            self.pos = j + 1;
                            self.at_boundary = false;
                            return;
                        }
                    }
                    None => break,
                    _ => {}
                }
                j += 1;
            }
            // No matching close: degrade to a single literal '('.
            self.atom.push('(');
            self.pos += 1;
            self.at_boundary = false;
            return;
        }
        let parity = self.pending_not % 2 == 1;
        self.group_not_stack.push(parity);
        self.pending_not = 0;
        self.op_stack.push(StackOp::LParen);
        self.pos += 1;
        self.at_boundary = true;
    }

    fn lex_rparen(&mut self) -> Result<(), LexError> {
        self.flush_atom();
        loop {
            match self.op_stack.pop() {
                Some(StackOp::LParen) => break,
                Some(StackOp::And) => self.output.push(Token::And),
                Some(StackOp::Or) => self.output.push(Token::Or),
                None => return Err(LexError::UnmatchedParen),
            }
        }
        if self.group_not_stack.pop() == Some(true) {
            self.output.push(Token::Not { collapses: true });
        }
        self.pos += 1;
        self.at_boundary = true;
        Ok(())
    }

    fn terminator_after(&self, offset: usize) -> bool {
        match self.peek_at(offset) {
            None => true,
            Some(c) => c.is_whitespace() || c == '(' || c == ')',
        }
    }

    fn try_and(&mut self) -> bool {
        if self.peek() == Some(',') {
            self.push_and_operator();
            self.pos += 1;
            self.at_boundary = true;
            return true;
        }
        if self.peek() == Some('&') && self.peek_at(1) == Some('&') {
            self.push_and_operator();
            self.pos += 2;
            self.at_boundary = true;
            return true;
        }
        if self.at_boundary && self.starts_with_ci("AND") && self.terminator_after(3) {
            self.push_and_operator();
            self.pos += 3;
            self.at_boundary = true;
            return true;
        }
        false
    }

    fn try_or(&mut self) -> bool {
        if self.peek() == Some('|') && self.peek_at(1) == Some('|') {
            self.push_or_operator();
            self.pos += 2;
            self.at_boundary = true;
            return true;
        }
        if self.at_boundary && self.starts_with_ci("OR") && self.terminator_after(2) {
            self.push_or_operator();
            self.pos += 2;
            self.at_boundary = true;
            return true;
        }
        false
    }

    fn try_not(&mut self) -> bool {
        if self.atom_open {
            return false;
        }
        if self.starts_with_ci("NOT") && matches!(self.peek_at(3), Some(c) if c.is_whitespace() || c == '(')
        {
            self.pending_not += 1;
            self.pos += 3;
            self.at_boundary = true;
            return true;
        }
        if self.peek() == Some('!') {
            self.pending_not += 1;
            self.pos += 1;
            self.at_boundary = true;
            return true;
        }
        if self.peek() == Some('-') {
            self.pending_not += 1;
            self.pos += 1;
            self.at_boundary = true;
            return true;
        }
        false
    }

    fn push_and_operator(&mut self) {
        self.flush_atom();
        while matches!(self.op_stack.last(), Some(StackOp::And)) {
            self.op_stack.pop();
            self.output.push(Token::And);
        }
        self.op_stack.push(StackOp::And);
    }

    fn push_or_operator(&mut self) {
        self.flush_atom();
        while matches!(self.op_stack.last(), Some(StackOp::And) | Some(StackOp::Or)) {
            match self.op_stack.pop() {
                Some(StackOp::And) => self.output.push(Token::And),
                Some(StackOp::Or) => self.output.push(Token::Or),
                _ => unreachable!(),
            }
        }
        self.op_stack.push(StackOp::Or);
    }
}
