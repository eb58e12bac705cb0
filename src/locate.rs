// Copyright 2025 Pavel Roskin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Finding and opening terminfo database files
//!
//! The decoder does not depend on this module, any source of bytes will do.

use std::{
    env,
    ffi::OsStr,
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::parse::{self, Terminfo};

const TERMINFO_DIRS: &[&str] = &[
    "/etc/terminfo",
    "/lib/terminfo",
    "/usr/share/terminfo",
    "/usr/lib/terminfo",
    "/boot/system/data/terminfo", // haiku
];

/// Errors reported when looking for a terminfo database file
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The name of the terminal is not valid
    #[error("InvalidTerminalName")]
    InvalidTerminalName,
    /// Terminfo file for the terminal could not be found
    #[error("File not found")]
    FileNotFound,
}

/// Errors reported when opening the terminfo entry for a terminal
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum OpenError {
    /// The `TERM` environment variable is unset or empty
    #[error("TERM is not set")]
    NoTerminal,
    #[error("Cannot locate terminfo file")]
    Locate(#[from] Error),
    #[error("Cannot read terminfo file")]
    IO(#[from] io::Error),
    #[error("Cannot decode terminfo file")]
    Parse(#[from] parse::Error),
}

/// Leaf directories that may hold the entry, both layouts are in use
fn leaf_directories(dir: &Path, first_byte: u8) -> [PathBuf; 2] {
    [
        // Standard layout - the first character of the terminal name.
        dir.join(char::from(first_byte).to_string()),
        // Non-case-sensitive filesystems (MacOS, Windows) - the first byte of
        // the terminal name in hexadecimal form.
        dir.join(format!("{first_byte:02x}")),
    ]
}

/// Ordered list of directories searched for terminfo files
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchPath {
    directories: Vec<PathBuf>,
}

impl SearchPath {
    /// Search only the given directories, ignoring the environment
    pub fn new<P: Into<PathBuf>>(directories: impl IntoIterator<Item = P>) -> Self {
        Self {
            directories: directories.into_iter().map(Into::into).collect(),
        }
    }

    /// Build the search path the way ncurses does
    ///
    /// `$TERMINFO` comes first, then `~/.terminfo`, then `$TERMINFO_DIRS`,
    /// then the system directories. The directories are not checked for
    /// existence.
    pub fn from_env() -> Self {
        let mut directories = vec![];

        // Lazily evaluated iterator, consumed at most once.
        let mut default_dirs = TERMINFO_DIRS.iter().map(PathBuf::from);

        if let Ok(dir) = env::var("TERMINFO") {
            directories.push(PathBuf::from(&dir));
        }

        if let Some(home_dir) = env::home_dir() {
            directories.push(home_dir.join(".terminfo"));
        }

        if let Ok(dirs) = env::var("TERMINFO_DIRS") {
            for dir in dirs.split(':') {
                if dir.is_empty() {
                    // Empty directory means search the default locations.
                    directories.extend(&mut default_dirs);
                } else {
                    directories.push(PathBuf::from(dir));
                }
            }
        }

        // Nothing is added if the defaults were used already.
        directories.extend(&mut default_dirs);

        Self { directories }
    }

    /// Directories in search order
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Find the terminfo file for the terminal name
    pub fn find(&self, term_name: impl AsRef<OsStr>) -> Result<PathBuf, Error> {
        let term_name = term_name.as_ref();
        let Some(&first_byte) = term_name.as_encoded_bytes().first() else {
            return Err(Error::InvalidTerminalName);
        };
        let found = self
            .directories
            .iter()
            .flat_map(|dir| leaf_directories(dir, first_byte))
            .map(|leaf| leaf.join(term_name))
            .find(|filename| filename.is_file());
        match found {
            Some(filename) => {
                debug!(file = %filename.display(), "found terminfo");
                Ok(filename)
            }
            None => Err(Error::FileNotFound),
        }
    }

    /// Find, read and decode the terminfo entry for the terminal name
    pub fn open(&self, term_name: impl AsRef<OsStr>) -> Result<Terminfo, OpenError> {
        let filename = self.find(term_name)?;
        let file = File::open(filename)?;
        Ok(Terminfo::from_reader(BufReader::new(file))?)
    }
}

/// Returns all directories that are searched for terminfo files
///
/// This function does not attempt to verify if the directories to be searched actually exist.
pub fn search_directories() -> Vec<PathBuf> {
    SearchPath::from_env().directories
}

/// Find terminfo database file for the terminal name
///
/// Returns the file path if it exist, an error otherwise.
pub fn locate(term_name: impl AsRef<OsStr>) -> Result<PathBuf, Error> {
    SearchPath::from_env().find(term_name)
}

/// Open the terminfo entry for the terminal name
pub fn open(term_name: impl AsRef<OsStr>) -> Result<Terminfo, OpenError> {
    SearchPath::from_env().open(term_name)
}

/// Open the terminfo entry for the terminal named by `$TERM`
pub fn open_env() -> Result<Terminfo, OpenError> {
    match env::var_os("TERM") {
        Some(term_name) if !term_name.is_empty() => open(term_name),
        _ => Err(OpenError::NoTerminal),
    }
}

#[cfg(test)]
mod test {
    use std::fs::{self, File, create_dir};

    use tempfile::tempdir;

    use super::*;

    const TERM_NAME: &str = "no-such-terminal-123";

    /// Minimal valid entry with `cols#80` and `bel=^G`, `cbt` is absent
    fn descriptor() -> Vec<u8> {
        let mut buffer = vec![];
        for field in [0o432i16, 8, 0, 1, 2, 2] {
            buffer.extend_from_slice(&field.to_le_bytes());
        }
        buffer.extend_from_slice(b"fixture\0");
        buffer.extend_from_slice(&80i16.to_le_bytes());
        buffer.extend_from_slice(&(-1i16).to_le_bytes());
        buffer.extend_from_slice(&0i16.to_le_bytes());
        buffer.extend_from_slice(b"\x07\0");
        buffer
    }

    #[test]
    fn empty_name() {
        assert_eq!(locate(""), Err(Error::InvalidTerminalName));
    }

    #[test]
    fn missing_file() {
        // Not using TERM_NAME to avoid race conditions - `temp_env::with_vars`
        // is serialized, but we are not using that function here.
        assert_eq!(locate("no-such-terminal-1"), Err(Error::FileNotFound));
    }

    #[test]
    fn explicit_search_path() {
        let temp_dir = tempdir().unwrap();
        let leaf_dir = temp_dir.path().join("n");
        let terminfo_file = leaf_dir.join(TERM_NAME);
        create_dir(leaf_dir).unwrap();
        File::create(&terminfo_file).unwrap();

        let search_path = SearchPath::new(["/no/such/dir", temp_dir.path().to_str().unwrap()]);
        assert_eq!(search_path.directories().len(), 2);
        assert_eq!(search_path.find(TERM_NAME), Ok(terminfo_file));
        assert_eq!(
            SearchPath::new(["/no/such/dir"]).find(TERM_NAME),
            Err(Error::FileNotFound)
        );
    }

    #[test]
    fn directory_is_not_a_file() {
        let temp_dir = tempdir().unwrap();
        let leaf_dir = temp_dir.path().join("n");
        create_dir(&leaf_dir).unwrap();
        create_dir(leaf_dir.join(TERM_NAME)).unwrap();

        let search_path = SearchPath::new([temp_dir.path()]);
        assert_eq!(search_path.find(TERM_NAME), Err(Error::FileNotFound));
    }

    #[test]
    fn found_standard_layout_terminfo_dirs() {
        let temp_dir = tempdir().unwrap();
        let temp_dir = temp_dir.path();
        let leaf_dir = temp_dir.join("n");
        let terminfo_file = leaf_dir.join(TERM_NAME);
        create_dir(leaf_dir).unwrap();
        File::create(&terminfo_file).unwrap();
        let terminfo_dirs = format!("foo:{}:bar", temp_dir.display());

        temp_env::with_vars(
            [("TERMINFO_DIRS", Some(terminfo_dirs)), ("TERMINFO", None)],
            || {
                assert_eq!(locate(TERM_NAME), Ok(terminfo_file));
            },
        );
    }

    #[test]
    fn found_hex_layout_terminfo_dirs() {
        let temp_dir = tempdir().unwrap();
        let temp_dir = temp_dir.path();
        let leaf_dir = temp_dir.join("6e");
        let terminfo_file = leaf_dir.join(TERM_NAME);
        create_dir(leaf_dir).unwrap();
        File::create(&terminfo_file).unwrap();
        let terminfo_dirs = format!("foo:{}:bar", temp_dir.display());

        temp_env::with_vars(
            [("TERMINFO_DIRS", Some(terminfo_dirs)), ("TERMINFO", None)],
            || {
                assert_eq!(locate(TERM_NAME), Ok(terminfo_file));
            },
        );
    }

    #[test]
    fn dot_terminfo_standard_layout() {
        let temp_dir = tempdir().unwrap();
        let temp_dir = temp_dir.path();
        let dot_terminfo = temp_dir.join(".terminfo");
        let leaf_dir = dot_terminfo.join("n");
        let terminfo_file = leaf_dir.join(TERM_NAME);
        create_dir(dot_terminfo).unwrap();
        create_dir(leaf_dir).unwrap();
        File::create(&terminfo_file).unwrap();

        temp_env::with_vars(
            [
                ("TERMINFO_DIRS", None),
                ("TERMINFO", None),
                ("HOME", Some(temp_dir)),
            ],
            || {
                assert_eq!(locate(TERM_NAME), Ok(terminfo_file));
            },
        );
    }

    #[test]
    fn open_from_terminfo_variable() {
        let temp_dir = tempdir().unwrap();
        let leaf_dir = temp_dir.path().join("f");
        create_dir(&leaf_dir).unwrap();
        fs::write(leaf_dir.join("fixture"), descriptor()).unwrap();

        temp_env::with_vars(
            [
                ("TERMINFO_DIRS", None),
                ("TERMINFO", Some(temp_dir.path())),
                ("TERM", Some(Path::new("fixture"))),
            ],
            || {
                let terminfo = open_env().unwrap();
                assert_eq!(terminfo.names(), ["fixture"]);
                assert_eq!(terminfo.numbers().get("columns"), Some(&80));
                assert_eq!(
                    terminfo.strings().get("bell"),
                    Some(&b"\x07".to_vec())
                );
            },
        );
    }

    #[test]
    fn open_corrupt_file() {
        let temp_dir = tempdir().unwrap();
        let leaf_dir = temp_dir.path().join("f");
        create_dir(&leaf_dir).unwrap();
        let mut buffer = descriptor();
        buffer.truncate(buffer.len() - 1);
        fs::write(leaf_dir.join("fixture"), buffer).unwrap();

        let result = SearchPath::new([temp_dir.path()]).open("fixture");
        assert!(matches!(
            result.unwrap_err(),
            OpenError::Parse(parse::Error::Truncated(parse::Section::StringTable))
        ));
    }

    #[test]
    fn open_without_term() {
        temp_env::with_var("TERM", None::<&str>, || {
            assert!(matches!(open_env().unwrap_err(), OpenError::NoTerminal));
        });
    }

    #[test]
    fn search_order() {
        let expected_dirs: Vec<PathBuf> = [
            "/my/terminfo",
            "/home/user/.terminfo",
            "/my/terminfo1",
            "/my/terminfo2",
            "/etc/terminfo",
            "/lib/terminfo",
            "/usr/share/terminfo",
            "/usr/lib/terminfo",
            "/boot/system/data/terminfo",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();

        temp_env::with_vars(
            [
                ("TERMINFO_DIRS", Some("/my/terminfo1:/my/terminfo2")),
                ("TERMINFO", Some("/my/terminfo")),
                ("HOME", Some("/home/user")),
            ],
            || {
                assert_eq!(search_directories(), expected_dirs);
            },
        );
    }

    #[test]
    fn search_order_with_empty_element() {
        let expected_dirs: Vec<PathBuf> = [
            "/my/terminfo",
            "/home/user/.terminfo",
            "/my/terminfo1",
            "/etc/terminfo",
            "/lib/terminfo",
            "/usr/share/terminfo",
            "/usr/lib/terminfo",
            "/boot/system/data/terminfo",
            "/my/terminfo2",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();

        temp_env::with_vars(
            [
                ("TERMINFO_DIRS", Some("/my/terminfo1::/my/terminfo2")),
                ("TERMINFO", Some("/my/terminfo")),
                ("HOME", Some("/home/user")),
            ],
            || {
                assert_eq!(SearchPath::from_env().directories(), expected_dirs);
            },
        );
    }
}
