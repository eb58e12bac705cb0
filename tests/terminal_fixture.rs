use std::{
    fs,
    sync::{Arc, Mutex},
    thread,
};

use tempfile::tempdir;
use terminfo_eval::{
    Capability, ExpandContext, Parameter, SearchPath, Terminfo,
    capability::Error,
    expand,
    names::{BOOLEANS, NUMBERS, STRINGS},
    open, parse,
};

const NAMES: &str = "xterm-test|test terminal with xterm capabilities";
const BOOLEAN_CAPS: &[&str] = &["auto_right_margin", "eat_newline_glitch"];
const NUMBER_CAPS: &[(&str, i16)] = &[("columns", 80), ("lines", 24), ("max_colors", 256)];
const STRING_CAPS: &[(&str, &[u8])] = &[
    ("bell", b"\x07"),
    ("cursor_address", b"\x1b[%i%p1%d;%p2%dH"),
    ("exit_attribute_mode", b"\x1b(B\x1b[m"),
    (
        "set_attributes",
        b"%?%p9%t\x1b(0%e\x1b(B%;\x1b[0%?%p6%t;1%;%?%p5%t;2%;%?%p2%t;4%;%?%p1%p3%|%t;7%;%?%p4%t;5%;%?%p7%t;8%;m",
    ),
    (
        "set_a_foreground",
        b"\x1b[%?%p1%{8}%<%t3%p1%d%e%p1%{16}%<%t9%p1%{8}%-%d%e38;5;%p1%d%;m",
    ),
];

fn index(table: &[terminfo_eval::names::CapabilityName], name: &str) -> usize {
    table.iter().position(|entry| entry.name == name).unwrap()
}

fn push_le16(buffer: &mut Vec<u8>, value: i16) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

/// Compile the fixture entry in the legacy format
fn descriptor() -> Vec<u8> {
    let bool_count = BOOLEAN_CAPS
        .iter()
        .map(|name| index(&BOOLEANS, name) + 1)
        .max()
        .unwrap();
    let num_count = NUMBER_CAPS
        .iter()
        .map(|(name, _)| index(&NUMBERS, name) + 1)
        .max()
        .unwrap();
    let str_count = STRING_CAPS
        .iter()
        .map(|(name, _)| index(&STRINGS, name) + 1)
        .max()
        .unwrap();

    let mut bools = vec![0u8; bool_count];
    for name in BOOLEAN_CAPS {
        bools[index(&BOOLEANS, name)] = 1;
    }
    let mut nums = vec![-1i16; num_count];
    for (name, value) in NUMBER_CAPS {
        nums[index(&NUMBERS, name)] = *value;
    }
    let mut offsets = vec![-1i16; str_count];
    let mut table = vec![];
    for (name, value) in STRING_CAPS {
        offsets[index(&STRINGS, name)] = table.len() as i16;
        table.extend_from_slice(value);
        table.push(0);
    }

    let mut buffer = vec![];
    for field in [
        0o432,
        NAMES.len() + 1,
        bool_count,
        num_count,
        str_count,
        table.len(),
    ] {
        push_le16(&mut buffer, field as i16);
    }
    buffer.extend_from_slice(NAMES.as_bytes());
    buffer.push(0);
    buffer.extend_from_slice(&bools);
    if !bool_count.is_multiple_of(2) {
        buffer.push(0);
    }
    for value in nums {
        push_le16(&mut buffer, value);
    }
    for value in offsets {
        push_le16(&mut buffer, value);
    }
    buffer.extend_from_slice(&table);
    buffer
}

fn terminfo() -> Terminfo {
    parse(&descriptor()).unwrap()
}

#[test]
fn decode_fixture() {
    let terminfo = terminfo();
    assert_eq!(
        terminfo.names(),
        ["xterm-test", "test terminal with xterm capabilities"]
    );
    assert_eq!(terminfo.primary_name(), "xterm-test");
    assert_eq!(terminfo.booleans().len(), BOOLEAN_CAPS.len());
    assert_eq!(terminfo.numbers().len(), NUMBER_CAPS.len());
    assert_eq!(terminfo.strings().len(), STRING_CAPS.len());
    assert_eq!(
        terminfo.get_by_alias("xenl"),
        Ok(Capability::Boolean(true))
    );
    assert_eq!(
        terminfo.get_by_alias("colors"),
        Ok(Capability::Number(256))
    );
    assert_eq!(
        terminfo.get_by_alias("bel"),
        Ok(Capability::String(b"\x07"))
    );
}

#[test]
fn cursor_address() {
    let terminfo = terminfo();
    let mut context = ExpandContext::new();
    let params = [Parameter::from(4), Parameter::from(9)];
    assert_eq!(
        terminfo.expand(&mut context, "cup", &params).unwrap(),
        b"\x1b[5;10H"
    );
    // Increment applies to a copy, the next call starts over
    assert_eq!(
        terminfo.expand(&mut context, "cup", &params).unwrap(),
        b"\x1b[5;10H"
    );
}

#[test]
fn foreground_colors() {
    let terminfo = terminfo();
    let mut context = ExpandContext::new();
    for (color, expected) in [
        (1, &b"\x1b[31m"[..]),
        (7, b"\x1b[37m"),
        (9, b"\x1b[91m"),
        (15, b"\x1b[97m"),
        (196, b"\x1b[38;5;196m"),
    ] {
        assert_eq!(
            terminfo
                .expand(&mut context, "setaf", &[Parameter::from(color)])
                .unwrap(),
            expected,
            "Failed for color {color}"
        );
    }
}

#[test]
fn set_attributes() {
    let terminfo = terminfo();
    let mut context = ExpandContext::new();
    // standout, underline, reverse, blink, dim, bold, invis, protect, altcharset
    let attributes = |values: [i32; 9]| values.map(Parameter::from);
    assert_eq!(
        terminfo
            .expand(&mut context, "sgr", &attributes([0, 1, 0, 0, 0, 1, 0, 0, 0]))
            .unwrap(),
        b"\x1b(B\x1b[0;1;4m"
    );
    assert_eq!(
        terminfo
            .expand(&mut context, "sgr", &attributes([1, 0, 0, 0, 0, 0, 0, 0, 1]))
            .unwrap(),
        b"\x1b(0\x1b[0;7m"
    );
    assert_eq!(
        terminfo
            .expand(&mut context, "sgr", &attributes([0; 9]))
            .unwrap(),
        b"\x1b(B\x1b[0m"
    );
}

#[test]
fn missing_capabilities() {
    let terminfo = terminfo();
    let mut context = ExpandContext::new();
    assert_eq!(
        terminfo.expand(&mut context, "clear", &[]),
        Err(Error::NotFound("clear_screen".to_owned()))
    );
    assert_eq!(
        terminfo.expand(&mut context, "cols", &[]),
        Err(Error::NotAString("cols".to_owned()))
    );
    assert_eq!(
        terminfo.expand(&mut context, "setaf", &[]),
        Err(Error::Expand(expand::Error::MissingParameter(1)))
    );
}

#[test]
fn static_variables_persist() {
    let mut context = ExpandContext::new();
    assert_eq!(context.expand(b"%p1%PA", &[Parameter::from(42)]), Ok(vec![]));
    assert_eq!(context.expand(b"%gA%d", &[]), Ok(b"42".to_vec()));

    // A separate context has its own variables
    let mut other = ExpandContext::new();
    assert_eq!(other.expand(b"%gA%d", &[]), Ok(b"0".to_vec()));
}

#[test]
fn shared_between_threads() {
    let terminfo = Arc::new(terminfo());
    let context = Arc::new(Mutex::new(ExpandContext::new()));
    let handles: Vec<_> = (0..4)
        .map(|row| {
            let terminfo = Arc::clone(&terminfo);
            let context = Arc::clone(&context);
            thread::spawn(move || {
                let mut context = context.lock().unwrap();
                let params = [Parameter::from(row), Parameter::from(0)];
                terminfo.expand(&mut context, "cup", &params).unwrap()
            })
        })
        .collect();
    for (row, handle) in handles.into_iter().enumerate() {
        let expected = format!("\x1b[{};1H", row + 1);
        assert_eq!(handle.join().unwrap(), expected.as_bytes());
    }
}

#[test]
fn open_from_directory() {
    let temp_dir = tempdir().unwrap();
    let leaf_dir = temp_dir.path().join("x");
    fs::create_dir(&leaf_dir).unwrap();
    fs::write(leaf_dir.join("xterm-test"), descriptor()).unwrap();

    let search_path = SearchPath::new([temp_dir.path()]);
    assert_eq!(search_path.open("xterm-test").unwrap(), terminfo());

    temp_env::with_vars(
        [
            ("TERMINFO", Some(temp_dir.path())),
            ("TERMINFO_DIRS", None),
        ],
        || {
            assert_eq!(open("xterm-test").unwrap(), terminfo());
        },
    );
}
