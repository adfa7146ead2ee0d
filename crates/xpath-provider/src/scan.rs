//! Lexical pass that lists the names an expression refers to.
//!
//! The engine only sees functions, variables and namespaces registered up front, so the
//! binding needs to know which names to resolve before evaluation starts. Tokens are
//! classified with the XPath 1.0 disambiguation rules (section 3.7).

use std::collections::BTreeSet;

use crate::namespace::{is_name_char, is_name_start};

const NODE_TYPES: [&str; 4] = ["comment", "text", "processing-instruction", "node"];
const OPERATOR_NAMES: [&str; 4] = ["and", "or", "mod", "div"];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct NameRef {
    pub(crate) prefix: Option<String>,
    pub(crate) local: String,
}

impl NameRef {
    /// Name as written in the expression.
    pub(crate) fn written(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local),
            None => self.local.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Signature {
    pub(crate) functions: BTreeSet<NameRef>,
    pub(crate) variables: BTreeSet<NameRef>,
    pub(crate) prefixes: BTreeSet<String>,
}

pub(crate) fn scan(expression: &str) -> Signature {
    Scanner { chars: expression.chars().collect(), position: 0, operand_expected: true }
        .run()
}

struct Scanner {
    chars: Vec<char>,
    position: usize,
    /// True when the previous token cannot end an operand, so a name is a name test or call.
    operand_expected: bool,
}

impl Scanner {
    fn run(mut self) -> Signature {
        let mut signature = Signature::default();
        while let Some(ch) = self.peek(0) {
            match ch {
                c if c.is_whitespace() => self.position += 1,
                '\'' | '"' => {
                    self.skip_literal(ch);
                    self.operand_expected = false;
                }
                '$' => {
                    self.position += 1;
                    if let Some(name) = self.qualified_name() {
                        if let Some(prefix) = &name.prefix {
                            signature.prefixes.insert(prefix.clone());
                        }
                        signature.variables.insert(name);
                    }
                    self.operand_expected = false;
                }
                c if c.is_ascii_digit()
                    || (c == '.' && self.peek(1).is_some_and(|next| next.is_ascii_digit())) =>
                {
                    self.skip_number();
                    self.operand_expected = false;
                }
                '.' => {
                    self.position += if self.peek(1) == Some('.') { 2 } else { 1 };
                    self.operand_expected = false;
                }
                ')' | ']' => {
                    self.position += 1;
                    self.operand_expected = false;
                }
                '*' => {
                    self.position += 1;
                    // A name test when an operand is expected, multiplication otherwise.
                    self.operand_expected = !self.operand_expected;
                }
                ':' if self.peek(1) == Some(':') => {
                    self.position += 2;
                    self.operand_expected = true;
                }
                c if is_name_start(c) => self.name(&mut signature),
                _ => {
                    self.position += 1;
                    self.operand_expected = true;
                }
            }
        }
        signature
    }

    fn name(&mut self, signature: &mut Signature) {
        if !self.operand_expected {
            let word = self.ncname();
            if OPERATOR_NAMES.contains(&word.as_str()) {
                self.operand_expected = true;
            }
            return;
        }

        let first = self.ncname();
        if self.peek_after_whitespace_is("::") {
            // axis name
            self.operand_expected = true;
            return;
        }

        if self.peek(0) == Some(':') && self.peek(1) == Some('*') {
            self.position += 2;
            signature.prefixes.insert(first);
            self.operand_expected = false;
            return;
        }

        let name = if self.peek(0) == Some(':') && self.peek(1).is_some_and(is_name_start) {
            self.position += 1;
            let local = self.ncname();
            NameRef { prefix: Some(first), local }
        } else {
            NameRef { prefix: None, local: first }
        };

        if let Some(prefix) = &name.prefix {
            signature.prefixes.insert(prefix.clone());
        }

        if self.peek_after_whitespace_is("(") {
            let is_node_type = name.prefix.is_none() && NODE_TYPES.contains(&name.local.as_str());
            if !is_node_type {
                signature.functions.insert(name);
            }
            self.operand_expected = true;
        } else {
            self.operand_expected = false;
        }
    }

    fn qualified_name(&mut self) -> Option<NameRef> {
        self.skip_whitespace();
        if !self.peek(0).is_some_and(is_name_start) {
            return None;
        }
        let first = self.ncname();
        if self.peek(0) == Some(':') && self.peek(1).is_some_and(is_name_start) {
            self.position += 1;
            let local = self.ncname();
            Some(NameRef { prefix: Some(first), local })
        } else {
            Some(NameRef { prefix: None, local: first })
        }
    }

    fn ncname(&mut self) -> String {
        let start = self.position;
        self.position += 1;
        while self.peek(0).is_some_and(is_name_char) {
            self.position += 1;
        }
        self.chars[start..self.position].iter().collect()
    }

    fn skip_literal(&mut self, quote: char) {
        self.position += 1;
        while let Some(ch) = self.peek(0) {
            self.position += 1;
            if ch == quote {
                break;
            }
        }
    }

    fn skip_number(&mut self) {
        while self.peek(0).is_some_and(|ch| ch.is_ascii_digit() || ch == '.') {
            self.position += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek(0).is_some_and(char::is_whitespace) {
            self.position += 1;
        }
    }

    fn peek_after_whitespace_is(&self, token: &str) -> bool {
        let mut offset = 0;
        while self.peek(offset).is_some_and(char::is_whitespace) {
            offset += 1;
        }
        token
            .chars()
            .enumerate()
            .all(|(index, expected)| self.peek(offset + index) == Some(expected))
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }
}
