// Copyright 2025 Pavel Roskin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tokenizing parameterized strings into an evaluation tree
//!
//! Plain text and `%` directives are split into operations, and every
//! `%?`...`%;` sequence becomes a [`Conditional`] holding its branches, so the
//! evaluator can walk the tree recursively and skip untaken branches entirely.

use crate::expand::Error;

/// Maximal nesting depth of `%?` conditionals
pub const MAX_NESTING: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variable {
    /// `a`-`z`, reset for every expansion
    Dynamic(usize),
    /// `A`-`Z`, kept in the expansion context
    Static(usize),
}

/// Options of a printf-style directive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Flags {
    pub width: u16,
    pub precision: Option<u16>,
    pub alternate: bool,
    pub left: bool,
    pub sign: bool,
    pub space: bool,
    pub zero: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op<'a> {
    /// Text copied to the output as is
    Literal(&'a [u8]),
    /// `%c`
    Char,
    /// `%p1`-`%p9`, zero-based index
    PushParam(usize),
    /// `%P`
    SetVar(Variable),
    /// `%g`
    GetVar(Variable),
    /// `%'c'`
    CharConstant(u8),
    /// `%{nn}`
    IntConstant(i32),
    /// `%l`
    Length,
    /// Arithmetic, bitwise, comparison and logical operators
    Binary(char),
    /// `%!` and `%~`
    Unary(char),
    /// `%i`
    Increment,
    /// `%d`, `%o`, `%x`, `%X`, `%s` with optional flags
    Format(char, Flags),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token<'a> {
    Op(Op<'a>),
    If,
    Then,
    Else,
    EndIf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node<'a> {
    Op(Op<'a>),
    Conditional(Conditional<'a>),
}

/// `%? c1 %t b1 %e c2 %t b2 %e b3 %;`
///
/// Arms are tried in order, `otherwise` is evaluated if no condition holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conditional<'a> {
    pub arms: Vec<Arm<'a>>,
    pub otherwise: Vec<Node<'a>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Arm<'a> {
    pub condition: Vec<Node<'a>>,
    pub body: Vec<Node<'a>>,
}

#[derive(Clone, Copy, PartialEq)]
enum FormatState {
    Flags,
    Width,
    Precision,
}

struct Lexer<'a> {
    cap: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    const fn new(cap: &'a [u8]) -> Self {
        Self { cap, pos: 0 }
    }

    fn next_byte(&mut self) -> Option<u8> {
        let c = *self.cap.get(self.pos)?;
        self.pos += 1;
        Some(c)
    }

    fn expect_byte(&mut self, directive: char) -> Result<u8, Error> {
        self.next_byte()
            .ok_or(Error::UnterminatedDirective(directive))
    }

    fn literal(&mut self, start: usize) -> Token<'a> {
        let end = self.cap[start..]
            .iter()
            .position(|c| *c == b'%')
            .map_or(self.cap.len(), |length| start + length);
        self.pos = end;
        Token::Op(Op::Literal(&self.cap[start..end]))
    }

    fn directive(&mut self, start: usize) -> Result<Token<'a>, Error> {
        let Some(c) = self.next_byte() else {
            // Lone percent sign at the end
            return Ok(Token::Op(Op::Literal(&self.cap[start..])));
        };
        let cur = char::from(c);
        let op = match cur {
            '%' => Op::Literal(&self.cap[start + 1..self.pos]),
            'c' => Op::Char,
            'p' => match self.expect_byte(cur)? {
                // params are 1-indexed
                index @ b'1'..=b'9' => Op::PushParam(usize::from(index - b'1')),
                index => return Err(Error::InvalidParameterIndex(char::from(index))),
            },
            'P' => Op::SetVar(self.variable(cur)?),
            'g' => Op::GetVar(self.variable(cur)?),
            '\'' => {
                let value = self.next_byte();
                match (value, self.next_byte()) {
                    (Some(value), Some(b'\'')) => Op::CharConstant(value),
                    _ => return Err(Error::MalformedCharacterConstant),
                }
            }
            '{' => Op::IntConstant(self.integer()?),
            'l' => Op::Length,
            '+' | '-' | '*' | '/' | 'm' | '&' | '|' | '^' | '=' | '>' | '<' | 'A' | 'O' => {
                Op::Binary(cur)
            }
            '!' | '~' => Op::Unary(cur),
            'i' => Op::Increment,
            'd' | 'o' | 'x' | 'X' | 's' => Op::Format(cur, Flags::default()),
            ':' | '#' | ' ' | '.' | '0'..='9' => self.format(cur)?,
            '?' => return Ok(Token::If),
            't' => return Ok(Token::Then),
            'e' => return Ok(Token::Else),
            ';' => return Ok(Token::EndIf),
            // Not a directive, keep the text
            _ => Op::Literal(&self.cap[start..self.pos]),
        };
        Ok(Token::Op(op))
    }

    fn variable(&mut self, directive: char) -> Result<Variable, Error> {
        match self.expect_byte(directive)? {
            c @ b'a'..=b'z' => Ok(Variable::Dynamic(usize::from(c - b'a'))),
            c @ b'A'..=b'Z' => Ok(Variable::Static(usize::from(c - b'A'))),
            c => Err(Error::InvalidVariableName(char::from(c))),
        }
    }

    fn integer(&mut self) -> Result<i32, Error> {
        let mut value: i32 = 0;
        loop {
            match self.next_byte() {
                Some(b'}') => return Ok(value),
                Some(c @ b'0'..=b'9') => {
                    value = value
                        .checked_mul(10)
                        .and_then(|value| value.checked_add(i32::from(c - b'0')))
                        .ok_or(Error::IntegerConstantOverflow)?;
                }
                _ => return Err(Error::MalformedIntegerConstant),
            }
        }
    }

    /// Parse `[:][flags][width[.precision]]conversion`, `first` is already consumed
    fn format(&mut self, first: char) -> Result<Op<'a>, Error> {
        let mut flags = Flags::default();
        let mut fstate = FormatState::Flags;
        let mut cur = first;
        if cur == ':' {
            cur = char::from(self.expect_byte(':')?);
        }
        loop {
            match (fstate, cur) {
                (_, 'd' | 'o' | 'x' | 'X' | 's') => return Ok(Op::Format(cur, flags)),
                (FormatState::Flags, '#') => flags.alternate = true,
                (FormatState::Flags, '-') => flags.left = true,
                (FormatState::Flags, '+') => flags.sign = true,
                (FormatState::Flags, ' ') => flags.space = true,
                (FormatState::Flags, '0') => flags.zero = true,
                (FormatState::Flags | FormatState::Width, '0'..='9') => {
                    flags.width = flags
                        .width
                        .checked_mul(10)
                        .and_then(|w| w.checked_add(digit(cur)))
                        .ok_or(Error::FormatWidthOverflow)?;
                    fstate = FormatState::Width;
                }
                (FormatState::Flags | FormatState::Width, '.') => {
                    // A bare `.` means zero precision
                    flags.precision = Some(0);
                    fstate = FormatState::Precision;
                }
                (FormatState::Precision, '0'..='9') => {
                    flags.precision = Some(
                        flags
                            .precision
                            .unwrap_or_default()
                            .checked_mul(10)
                            .and_then(|p| p.checked_add(digit(cur)))
                            .ok_or(Error::FormatPrecisionOverflow)?,
                    );
                }
                _ => return Err(Error::UnrecognizedFormatOption(cur)),
            }
            cur = char::from(self.expect_byte(first)?);
        }
    }
}

fn digit(c: char) -> u16 {
    c as u16 - '0' as u16
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.pos;
        match self.next_byte()? {
            b'%' => Some(self.directive(start)),
            _ => Some(Ok(self.literal(start))),
        }
    }
}

/// Syntax error together with the operations that precede it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Incomplete<'a> {
    /// Complete top-level operations before the failing one
    pub parsed: Vec<Node<'a>>,
    pub error: Error,
}

/// Split a parameterized string into a tree of operations
pub fn compile(cap: &[u8]) -> Result<Vec<Node<'_>>, Incomplete<'_>> {
    let mut lexer = Lexer::new(cap);
    let mut parsed = vec![];
    while let Some(token) = lexer.next() {
        let node = match token {
            Ok(Token::Op(op)) => Ok(Node::Op(op)),
            Ok(Token::If) => conditional(&mut lexer, 1).map(Node::Conditional),
            // `%t`, `%e` or `%;` outside of a conditional
            Ok(_) => Err(Error::MalformedConditional),
            Err(error) => Err(error),
        };
        match node {
            Ok(node) => parsed.push(node),
            Err(error) => return Err(Incomplete { parsed, error }),
        }
    }
    Ok(parsed)
}

/// Operations up to the end of input or the next `%t`, `%e` or `%;`
type Block<'a> = (Vec<Node<'a>>, Option<Token<'a>>);

fn block<'a>(lexer: &mut Lexer<'a>, depth: usize) -> Result<Block<'a>, Error> {
    let mut nodes = vec![];
    while let Some(token) = lexer.next() {
        match token? {
            Token::Op(op) => nodes.push(Node::Op(op)),
            Token::If => nodes.push(Node::Conditional(conditional(lexer, depth + 1)?)),
            end => return Ok((nodes, Some(end))),
        }
    }
    Ok((nodes, None))
}

fn conditional<'a>(lexer: &mut Lexer<'a>, depth: usize) -> Result<Conditional<'a>, Error> {
    if depth > MAX_NESTING {
        return Err(Error::NestingTooDeep);
    }
    let mut arms = vec![];
    let mut condition = match block(lexer, depth)? {
        (nodes, Some(Token::Then)) => nodes,
        _ => return Err(Error::MalformedConditional),
    };
    loop {
        let (body, end) = block(lexer, depth)?;
        arms.push(Arm { condition, body });
        match end {
            Some(Token::EndIf) => {
                return Ok(Conditional {
                    arms,
                    otherwise: vec![],
                });
            }
            Some(Token::Else) => match block(lexer, depth)? {
                // else-if
                (nodes, Some(Token::Then)) => condition = nodes,
                (otherwise, Some(Token::EndIf)) => return Ok(Conditional { arms, otherwise }),
                _ => return Err(Error::MalformedConditional),
            },
            _ => return Err(Error::MalformedConditional),
        }
    }
}
