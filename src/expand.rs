// Copyright 2019 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Parameterized string expansion

use std::{array::from_fn, iter::repeat_n};

use tracing::trace;

use crate::template::{self, Conditional, Flags, Node, Op, Variable};

/// Maximal number of parameters, `%p1` to `%p9`
pub const MAX_PARAMETERS: usize = 9;

/// Values of parameters, variables and stack entries
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Parameter {
    Number(i32),
    String(Vec<u8>),
    /// Character constant from `%'c'`
    Char(u8),
    /// Result of comparisons and logical operators
    Boolean(bool),
}

impl Parameter {
    /// Integer value for numeric operators
    ///
    /// Characters and booleans are accepted, strings are not.
    fn integer(&self, op: char) -> Result<i32, Error> {
        match *self {
            Self::Number(value) => Ok(value),
            Self::Char(value) => Ok(i32::from(value)),
            Self::Boolean(value) => Ok(i32::from(value)),
            Self::String(_) => Err(Error::TypeMismatch(op)),
        }
    }
}

impl From<i32> for Parameter {
    fn from(value: i32) -> Parameter {
        Parameter::Number(value)
    }
}

impl From<bool> for Parameter {
    fn from(value: bool) -> Parameter {
        Parameter::Boolean(value)
    }
}

impl From<&[u8]> for Parameter {
    fn from(value: &[u8]) -> Parameter {
        Parameter::String(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Parameter {
    fn from(value: &[u8; N]) -> Parameter {
        Parameter::String(value.to_vec())
    }
}

impl From<&str> for Parameter {
    fn from(value: &str) -> Parameter {
        Parameter::String(value.as_bytes().to_vec())
    }
}

/// Errors reported when expanding a string
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("Not enough stack elements for operator {0}")]
    StackUnderflow(char),
    #[error("Parameter type not expected by operator {0}")]
    TypeMismatch(char),
    #[error("Unrecognized format option: {0}")]
    UnrecognizedFormatOption(char),
    #[error("Invalid variable name: {0}")]
    InvalidVariableName(char),
    #[error("Invalid parameter index: {0}")]
    InvalidParameterIndex(char),
    #[error("Parameter {0} was not supplied")]
    MissingParameter(usize),
    #[error("Too many parameters: {0}")]
    TooManyParameters(usize),
    #[error("Malformed character constant")]
    MalformedCharacterConstant,
    #[error("Integer constant too large")]
    IntegerConstantOverflow,
    #[error("Integer constant malformed")]
    MalformedIntegerConstant,
    #[error("Overflow in format width")]
    FormatWidthOverflow,
    #[error("Overflow in format precision")]
    FormatPrecisionOverflow,
    #[error("Division by zero in operator {0}")]
    DivisionByZero(char),
    #[error("Incomplete directive %{0}")]
    UnterminatedDirective(char),
    #[error("Unbalanced %?, %t, %e and %;")]
    MalformedConditional,
    #[error("Condition produced output")]
    ConditionalOutput,
    #[error("Conditionals nested too deeply")]
    NestingTooDeep,
}

/// Context for variable expansion
///
/// Static variables `A`-`Z` live in the context and survive between
/// expansions. To be compatible with ncurses, the `ExpandContext` instance
/// should be the same for the same terminal. Expansion needs `&mut self`, so
/// a context shared between threads has to be wrapped in a `Mutex`.
#[derive(Clone, Debug)]
pub struct ExpandContext {
    /// Static variables A-Z
    static_variables: [Parameter; 26],
}

impl ExpandContext {
    /// Return a newly initialized ExpandContext
    pub fn new() -> Self {
        Self {
            static_variables: from_fn(|_| Parameter::from(0)),
        }
    }

    /// Expand a parameterized capability
    ///
    /// # Arguments
    /// * `cap`    - string to expand
    /// * `params` - up to 9 params for %p1 etc
    pub fn expand(&mut self, cap: &[u8], params: &[Parameter]) -> Result<Vec<u8>, Error> {
        // expanded cap will only rarely be larger than the cap itself
        let mut output = Vec::with_capacity(cap.len());
        self.expand_into(cap, params, &mut output)?;
        Ok(output)
    }

    /// Expand a parameterized capability, appending to `output`
    ///
    /// On error, `output` keeps whatever was produced before the failing
    /// directive.
    pub fn expand_into(
        &mut self,
        cap: &[u8],
        params: &[Parameter],
        output: &mut Vec<u8>,
    ) -> Result<(), Error> {
        if params.len() > MAX_PARAMETERS {
            return Err(Error::TooManyParameters(params.len()));
        }
        trace!(cap = %cap.escape_ascii(), params = params.len(), "expanding");
        // Operations before a syntax error still produce their output
        let (program, syntax_error) = match template::compile(cap) {
            Ok(program) => (program, None),
            Err(incomplete) => (incomplete.parsed, Some(incomplete.error)),
        };
        let mut evaluation = Evaluation {
            static_variables: &mut self.static_variables,
            dynamic_variables: from_fn(|_| Parameter::from(0)),
            stack: Vec::new(),
            params: params.to_vec(),
            incremented: false,
        };
        evaluation.run(&program, output)?;
        match syntax_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for ExpandContext {
    fn default() -> Self {
        Self::new()
    }
}

/// State of one expansion
struct Evaluation<'a> {
    static_variables: &'a mut [Parameter; 26],
    /// Dynamic variables a-z
    dynamic_variables: [Parameter; 26],
    stack: Vec<Parameter>,
    /// Copy of the parameters, changed by %i
    params: Vec<Parameter>,
    /// The increment should only be done once
    incremented: bool,
}

impl Evaluation<'_> {
    fn run(&mut self, nodes: &[Node<'_>], output: &mut Vec<u8>) -> Result<(), Error> {
        for node in nodes {
            match node {
                Node::Op(op) => self.step(*op, output)?,
                Node::Conditional(conditional) => self.branch(conditional, output)?,
            }
        }
        Ok(())
    }

    fn pop(&mut self, op: char) -> Result<Parameter, Error> {
        self.stack.pop().ok_or(Error::StackUnderflow(op))
    }

    fn variable(&mut self, variable: Variable) -> &mut Parameter {
        match variable {
            Variable::Static(index) => &mut self.static_variables[index],
            Variable::Dynamic(index) => &mut self.dynamic_variables[index],
        }
    }

    fn branch(&mut self, conditional: &Conditional<'_>, output: &mut Vec<u8>) -> Result<(), Error> {
        for (index, arm) in conditional.arms.iter().enumerate() {
            let mut condition_output = Vec::new();
            self.run(&arm.condition, &mut condition_output)?;
            if !condition_output.is_empty() {
                return Err(Error::ConditionalOutput);
            }
            if self.pop('t')?.integer('t')? != 0 {
                trace!(arm = index, "condition met");
                return self.run(&arm.body, output);
            }
        }
        self.run(&conditional.otherwise, output)
    }

    fn increment(&mut self) -> Result<(), Error> {
        if self.incremented || self.params.len() < 2 {
            return Ok(());
        }
        for param in &mut self.params[..2] {
            match param {
                Parameter::Number(value) => *value = value.wrapping_add(1),
                _ => return Err(Error::TypeMismatch('i')),
            }
        }
        self.incremented = true;
        Ok(())
    }

    fn step(&mut self, op: Op<'_>, output: &mut Vec<u8>) -> Result<(), Error> {
        match op {
            Op::Literal(text) => output.extend_from_slice(text),
            Op::Char => {
                // if c is 0, use 0200 (128) for ncurses compatibility
                // Don't check bounds. ncurses just casts and truncates.
                match self.pop('c')?.integer('c')? {
                    0 => output.push(128u8),
                    c => output.push(c as u8),
                }
            }
            Op::PushParam(index) => {
                let Some(param) = self.params.get(index) else {
                    return Err(Error::MissingParameter(index + 1));
                };
                self.stack.push(param.clone());
            }
            Op::SetVar(variable) => {
                let value = self.pop('P')?;
                *self.variable(variable) = value;
            }
            Op::GetVar(variable) => {
                let value = self.variable(variable).clone();
                self.stack.push(value);
            }
            Op::CharConstant(c) => self.stack.push(Parameter::Char(c)),
            Op::IntConstant(value) => self.stack.push(Parameter::Number(value)),
            Op::Length => match self.pop('l')? {
                Parameter::String(s) => {
                    let length = i32::try_from(s.len()).unwrap_or(i32::MAX);
                    self.stack.push(Parameter::from(length));
                }
                _ => return Err(Error::TypeMismatch('l')),
            },
            Op::Binary(op) => {
                let right = self.pop(op)?;
                let left = self.pop(op)?;
                self.stack.push(binary(op, &left, &right)?);
            }
            Op::Unary(op) => {
                let x = self.pop(op)?.integer(op)?;
                self.stack.push(match op {
                    '!' => Parameter::Boolean(x == 0),
                    '~' => Parameter::Number(!x),
                    _ => unreachable!("logic error"),
                });
            }
            Op::Increment => self.increment()?,
            Op::Format(op, flags) => {
                let arg = self.pop(op)?;
                output.extend(format(arg, op, flags)?);
            }
        }
        Ok(())
    }
}

/// Apply a binary operator, `left` is the operand pushed first
fn binary(op: char, left: &Parameter, right: &Parameter) -> Result<Parameter, Error> {
    if let ('=', Parameter::String(x), Parameter::String(y)) = (op, left, right) {
        return Ok(Parameter::Boolean(x == y));
    }
    let x = left.integer(op)?;
    let y = right.integer(op)?;
    let result = match op {
        '+' => Parameter::Number(x.wrapping_add(y)),
        '-' => Parameter::Number(x.wrapping_sub(y)),
        '*' => Parameter::Number(x.wrapping_mul(y)),
        '/' | 'm' if y == 0 => return Err(Error::DivisionByZero(op)),
        '/' => Parameter::Number(x.wrapping_div(y)),
        'm' => Parameter::Number(x.wrapping_rem(y)),
        '&' => Parameter::Number(x & y),
        '|' => Parameter::Number(x | y),
        '^' => Parameter::Number(x ^ y),
        '=' => Parameter::Boolean(x == y),
        '>' => Parameter::Boolean(x > y),
        '<' => Parameter::Boolean(x < y),
        'A' => Parameter::Boolean(x != 0 && y != 0),
        'O' => Parameter::Boolean(x != 0 || y != 0),
        _ => unreachable!("logic error"),
    };
    Ok(result)
}

fn format_number(d: i32, op: char, flags: Flags) -> String {
    let precision = flags.precision.map_or(0, usize::from);
    // Zero printed with zero precision has no digits
    let no_digits = d == 0 && flags.precision == Some(0);
    match op {
        'd' => {
            let sign = if d < 0 {
                "-"
            } else if flags.sign {
                "+"
            } else if flags.space {
                " "
            } else {
                ""
            };
            if no_digits {
                sign.to_owned()
            } else {
                format!("{sign}{:0precision$}", d.unsigned_abs())
            }
        }
        'o' => {
            let digits = if no_digits {
                String::new()
            } else {
                format!("{d:0precision$o}")
            };
            // Leading octal zero counts against precision.
            if flags.alternate && !digits.starts_with('0') {
                format!("0{digits}")
            } else {
                digits
            }
        }
        'x' | 'X' => {
            let digits = if no_digits {
                String::new()
            } else if op == 'x' {
                format!("{d:0precision$x}")
            } else {
                format!("{d:0precision$X}")
            };
            if flags.alternate && d != 0 {
                format!("0{op}{digits}")
            } else {
                digits
            }
        }
        _ => unreachable!("logic error"),
    }
}

/// Position after the sign or the hex prefix, where zero padding goes
fn zero_padding_position(s: &[u8]) -> usize {
    match s {
        [b'+' | b'-' | b' ', ..] => 1,
        [b'0', b'x' | b'X', ..] => 2,
        _ => 0,
    }
}

fn format(val: Parameter, op: char, flags: Flags) -> Result<Vec<u8>, Error> {
    let mut s = match (val, op) {
        (Parameter::String(mut s), 's') => {
            if let Some(precision) = flags.precision.map(usize::from)
                && precision < s.len()
            {
                s.truncate(precision);
            }
            s
        }
        (Parameter::String(_), _) | (_, 's') => return Err(Error::TypeMismatch(op)),
        (val, _) => format_number(val.integer(op)?, op, flags).into_bytes(),
    };
    let width = usize::from(flags.width);
    if width > s.len() {
        let n = width - s.len();
        if flags.left {
            s.extend(repeat_n(b' ', n));
        } else {
            let (fill, position) = if flags.zero && op != 's' && flags.precision.is_none() {
                (b'0', zero_padding_position(&s))
            } else {
                (b' ', 0)
            };
            let mut s_ = Vec::with_capacity(width);
            s_.extend_from_slice(&s[..position]);
            s_.extend(repeat_n(fill, n));
            s_.extend_from_slice(&s[position..]);
            s = s_;
        }
    }
    Ok(s)
}
