// Copyright 2025 Pavel Roskin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Decoding compiled terminfo database files

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    io::{self, Read},
};

use tracing::debug;

use crate::names::{BOOLEANS, NUMBERS, STRINGS};

/// Magic number of the legacy format with 16-bit numbers (octal 0432)
const MAGIC: i16 = 0o432;

/// Numeric value meaning the capability is absent (octal 0377)
const ABSENT_NUMBER: i16 = 0o377;

/// Sections of the compiled format, in file order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Header,
    Names,
    Booleans,
    Alignment,
    Numbers,
    StringOffsets,
    StringTable,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Header => "header",
            Self::Names => "names",
            Self::Booleans => "booleans",
            Self::Alignment => "alignment padding",
            Self::Numbers => "numbers",
            Self::StringOffsets => "string offsets",
            Self::StringTable => "string table",
        };
        f.write_str(name)
    }
}

/// Errors reported when decoding a terminfo database
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The magic number is invalid or unsupported
    #[error("Unknown magic number {0:#o}")]
    BadMagic(i16),
    /// A section size in the header is negative
    #[error("Negative size of the {0} section")]
    NegativeSize(Section),
    /// The header declares more capabilities than the standard tables know
    #[error("More capabilities than known names")]
    TooManyCapabilities,
    /// The input ended before the section was complete
    #[error("Truncated {0} section")]
    Truncated(Section),
    /// A string offset does not lead to a NUL-terminated string
    #[error("String capability {0} without final NUL")]
    UnterminatedString(&'static str),
    /// The terminal names are not valid UTF-8
    #[error("Invalid UTF-8 string")]
    Utf8(#[from] std::str::Utf8Error),
    /// Input/output error other than a premature end of input
    #[error("I/O error")]
    IO(#[from] io::Error),
}

/// Decode a terminfo database from the supplied buffer
pub fn parse(buffer: &[u8]) -> Result<Terminfo, Error> {
    Terminfo::from_reader(buffer)
}

fn read_exact(reader: &mut impl Read, buffer: &mut [u8], section: Section) -> Result<(), Error> {
    reader.read_exact(buffer).map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::Truncated(section)
        } else {
            Error::IO(err)
        }
    })
}

fn read_bytes(reader: &mut impl Read, size: usize, section: Section) -> Result<Vec<u8>, Error> {
    let mut buffer = vec![0u8; size];
    read_exact(reader, &mut buffer, section)?;
    Ok(buffer)
}

fn read_le16_array(
    reader: &mut impl Read,
    count: usize,
    section: Section,
) -> Result<Vec<i16>, Error> {
    let buffer = read_bytes(reader, count * 2, section)?;
    Ok(buffer
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

fn check_size(value: i16, section: Section) -> Result<usize, Error> {
    usize::try_from(value).map_err(|_| Error::NegativeSize(section))
}

/// Find the NUL-terminated string starting at `offset`
fn get_string(
    string_table: &[u8],
    offset: usize,
    name: &'static str,
) -> Result<Vec<u8>, Error> {
    let Some(string_slice) = string_table.get(offset..) else {
        return Err(Error::UnterminatedString(name));
    };
    match string_slice.iter().position(|c| *c == b'\0') {
        Some(length) => Ok(string_slice[..length].to_vec()),
        None => Err(Error::UnterminatedString(name)),
    }
}

/// Section sizes from the file header
#[derive(Debug)]
struct Header {
    names_size: usize,
    bool_count: usize,
    num_count: usize,
    str_count: usize,
    str_size: usize,
}

impl Header {
    fn read(reader: &mut impl Read) -> Result<Self, Error> {
        let fields = read_le16_array(reader, 6, Section::Header)?;
        if fields[0] != MAGIC {
            return Err(Error::BadMagic(fields[0]));
        }
        let header = Self {
            names_size: check_size(fields[1], Section::Names)?,
            bool_count: check_size(fields[2], Section::Booleans)?,
            num_count: check_size(fields[3], Section::Numbers)?,
            str_count: check_size(fields[4], Section::StringOffsets)?,
            str_size: check_size(fields[5], Section::StringTable)?,
        };
        if header.bool_count > BOOLEANS.len()
            || header.num_count > NUMBERS.len()
            || header.str_count > STRINGS.len()
        {
            return Err(Error::TooManyCapabilities);
        }
        Ok(header)
    }
}

/// Decoded terminfo entry
///
/// Capabilities are keyed by their long names. Absent capabilities are not
/// stored: booleans hold only the capabilities that are set, numbers never hold
/// the absent marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Terminfo {
    names: Vec<String>,
    booleans: BTreeSet<&'static str>,
    numbers: BTreeMap<&'static str, u16>,
    strings: BTreeMap<&'static str, Vec<u8>>,
}

impl Terminfo {
    /// Decode a terminfo database from a byte stream
    ///
    /// Exactly the bytes of the legacy sections are consumed, anything after
    /// the string table is left in the reader.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, Error> {
        let reader = &mut reader;
        let header = Header::read(reader)?;
        debug!(?header, "decoding terminfo");

        let names = Self::read_names(reader, header.names_size)?;

        let bools = read_bytes(reader, header.bool_count, Section::Booleans)?;
        let booleans = BOOLEANS
            .iter()
            .zip(&bools)
            .filter(|&(_, &value)| value == 1)
            .map(|(entry, _)| entry.name)
            .collect();

        // An odd number of booleans is followed by one padding byte
        if !header.bool_count.is_multiple_of(2) {
            read_bytes(reader, 1, Section::Alignment)?;
        }

        let nums = read_le16_array(reader, header.num_count, Section::Numbers)?;
        let numbers = NUMBERS
            .iter()
            .zip(nums)
            .filter(|&(_, value)| value >= 0 && value != ABSENT_NUMBER)
            .map(|(entry, value)| (entry.name, value as u16))
            .collect();

        let str_offsets = read_le16_array(reader, header.str_count, Section::StringOffsets)?;
        let str_table = read_bytes(reader, header.str_size, Section::StringTable)?;
        let mut strings = BTreeMap::new();
        for (entry, offset) in STRINGS.iter().zip(str_offsets) {
            // Negative offsets mark absent or canceled capabilities
            let Ok(offset) = usize::try_from(offset) else {
                continue;
            };
            let value = get_string(&str_table, offset, entry.name)?;
            strings.insert(entry.name, value);
        }

        let terminfo = Self {
            names,
            booleans,
            numbers,
            strings,
        };
        debug!(
            name = terminfo.primary_name(),
            booleans = terminfo.booleans.len(),
            numbers = terminfo.numbers.len(),
            strings = terminfo.strings.len(),
            "decoded terminfo"
        );
        Ok(terminfo)
    }

    fn read_names(reader: &mut impl Read, size: usize) -> Result<Vec<String>, Error> {
        let raw = read_bytes(reader, size, Section::Names)?;
        let end = raw.iter().position(|c| *c == b'\0').unwrap_or(raw.len());
        let text = str::from_utf8(&raw[..end])?;
        Ok(text.split('|').map(String::from).collect())
    }

    /// Terminal names, the primary name first, then the aliases
    ///
    /// The last entry is usually a long description of the terminal.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The primary name of the terminal
    pub fn primary_name(&self) -> &str {
        self.names.first().map_or("", String::as_str)
    }

    /// Boolean capabilities that are set
    pub const fn booleans(&self) -> &BTreeSet<&'static str> {
        &self.booleans
    }

    /// Numeric capabilities that are present
    pub const fn numbers(&self) -> &BTreeMap<&'static str, u16> {
        &self.numbers
    }

    /// String capabilities that are present
    pub const fn strings(&self) -> &BTreeMap<&'static str, Vec<u8>> {
        &self.strings
    }
}
