// Copyright 2025 Pavel Roskin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Looking up capabilities of a decoded terminfo entry

use crate::{
    expand::{self, ExpandContext, Parameter},
    names,
    parse::Terminfo,
};

/// Value of a capability, tagged with its kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability<'a> {
    Boolean(bool),
    Number(u16),
    String(&'a [u8]),
}

/// Errors reported when looking up or expanding a capability
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The terminal does not have the capability, or the name is unknown
    #[error("Capability not found: {0}")]
    NotFound(String),
    /// Only string capabilities can be expanded
    #[error("Not a string capability: {0}")]
    NotAString(String),
    #[error("Expansion failed")]
    Expand(#[from] expand::Error),
}

impl Terminfo {
    /// Look up a capability by its long name
    ///
    /// Booleans are checked first, then numbers, then strings.
    pub fn get(&self, name: &str) -> Result<Capability<'_>, Error> {
        if self.booleans().contains(name) {
            return Ok(Capability::Boolean(true));
        }
        if let Some(&value) = self.numbers().get(name) {
            return Ok(Capability::Number(value));
        }
        if let Some(value) = self.strings().get(name) {
            return Ok(Capability::String(value));
        }
        Err(Error::NotFound(name.to_owned()))
    }

    /// Look up a capability by its short alias, such as `cup` or `colors`
    pub fn get_by_alias(&self, alias: &str) -> Result<Capability<'_>, Error> {
        let Some(name) = names::long_name(alias) else {
            return Err(Error::NotFound(alias.to_owned()));
        };
        self.get(name)
    }

    /// Expand a string capability given by its long name or short alias
    pub fn expand(
        &self,
        context: &mut ExpandContext,
        name: &str,
        params: &[Parameter],
    ) -> Result<Vec<u8>, Error> {
        let capability = match self.get(name) {
            Err(Error::NotFound(_)) => self.get_by_alias(name)?,
            found => found?,
        };
        let Capability::String(cap) = capability else {
            return Err(Error::NotAString(name.to_owned()));
        };
        Ok(context.expand(cap, params)?)
    }
}
