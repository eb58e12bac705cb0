// Copyright 2025 Pavel Roskin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Decoder for compiled terminfo entries and evaluator for parameterized
//! capability strings

pub mod capability;
pub mod expand;
pub mod locate;
pub mod names;
pub mod parse;
pub mod template;

pub use capability::Capability;
pub use expand::{ExpandContext, Parameter};
pub use locate::{SearchPath, locate, open, open_env, search_directories};
pub use parse::{Terminfo, parse};
