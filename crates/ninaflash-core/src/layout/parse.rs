//! Partition descriptor parsing
//!
//! Parses the comma-separated descriptor format:
//!
//! ```text
//! # Name,   Type, SubType, Offset,  Size,     Flags
//! nvs,      data, nvs,     0x9000,  0x6000,
//! phy_init, data, phy,     0xf000,  0x1000,
//! factory,  app,  factory, 0x10000, 1536K,
//! storage,  data, spiffs,  ,        -0x200000, encrypted
//! ```
//!
//! Missing trailing fields default to empty. `$NAME` and `${NAME}` are
//! expanded before the line is split.

use std::env;

use super::{PartitionEntry, PartitionFlags, PartitionKind, PartitionSize, PartitionTable};
use crate::error::{Error, ParseErrorKind};

type ParseResult<T> = std::result::Result<T, ParseErrorKind>;

const FIELD_COUNT: usize = 6;

impl PartitionTable {
    /// Parse a descriptor, expanding variables from the process environment
    pub fn from_descriptor(text: &str) -> Result<Self, Error> {
        Self::from_descriptor_with(text, |name| env::var(name).ok())
    }

    /// Parse a descriptor with an explicit variable lookup
    pub fn from_descriptor_with<F>(text: &str, lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut table = PartitionTable::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let at_line = |kind| Error::Parse {
                line: line_no,
                kind,
            };

            let expanded = expand_vars(raw, &lookup).map_err(at_line)?;
            let line = expanded.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let entry = parse_line(line).map_err(at_line)?;
            log::trace!("line {}: {}", line_no, entry);
            table
                .push(entry)
                .map_err(|dup| at_line(ParseErrorKind::DuplicateName(dup.name)))?;
        }

        Ok(table)
    }
}

/// Parse one non-comment descriptor line
fn parse_line(line: &str) -> ParseResult<PartitionEntry> {
    let mut fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < FIELD_COUNT {
        fields.resize(FIELD_COUNT, "");
    }

    let name = fields[0].to_string();
    let kind = parse_kind(fields[1])?;
    let subkind = parse_subkind(kind, fields[2])?;
    let offset = parse_offset(fields[3])?;
    let size = parse_size(fields[4])?;
    let flags = parse_flags(fields[5])?;

    Ok(PartitionEntry {
        name,
        kind,
        subkind,
        offset,
        size,
        flags,
    })
}

fn parse_kind(field: &str) -> ParseResult<PartitionKind> {
    if field.is_empty() {
        return Err(ParseErrorKind::EmptyField("type"));
    }
    let value = parse_int(field, PartitionKind::KEYWORDS)?;
    // 0xFF marks an erased record and can never be a partition type
    let value = u8::try_from(value)
        .ok()
        .filter(|&v| v != 0xFF)
        .ok_or(ParseErrorKind::OutOfRange {
            field: "type",
            value,
        })?;
    Ok(PartitionKind::from_u8(value))
}

fn parse_subkind(kind: PartitionKind, field: &str) -> ParseResult<u8> {
    if field.is_empty() {
        return Ok(0);
    }
    let keywords = kind.subkinds();
    let keywords: Vec<(&str, u8)> = keywords.iter().map(|(n, v)| (n.as_str(), *v)).collect();
    let value = parse_int(field, &keywords)?;
    u8::try_from(value).map_err(|_| ParseErrorKind::OutOfRange {
        field: "subtype",
        value,
    })
}

fn parse_offset(field: &str) -> ParseResult<Option<u32>> {
    if field.is_empty() {
        return Ok(None);
    }
    let value = parse_int(field, &[])?;
    u32::try_from(value)
        .map(Some)
        .map_err(|_| ParseErrorKind::OutOfRange {
            field: "offset",
            value,
        })
}

fn parse_size(field: &str) -> ParseResult<PartitionSize> {
    if field.is_empty() {
        return Err(ParseErrorKind::EmptyField("size"));
    }
    let value = parse_int(field, &[])?;
    let out_of_range = ParseErrorKind::OutOfRange {
        field: "size",
        value,
    };
    if value < 0 {
        let end = u32::try_from(-value).map_err(|_| out_of_range)?;
        Ok(PartitionSize::UpTo(end))
    } else {
        let size = u32::try_from(value).map_err(|_| out_of_range)?;
        Ok(PartitionSize::Bytes(size))
    }
}

fn parse_flags(field: &str) -> ParseResult<PartitionFlags> {
    let mut flags = PartitionFlags::empty();
    for token in field.split(':').map(str::trim).filter(|t| !t.is_empty()) {
        let (_, flag) = PartitionFlags::NAMES
            .iter()
            .find(|(name, _)| *name == token)
            .ok_or_else(|| ParseErrorKind::UnknownFlag(token.to_string()))?;
        flags |= *flag;
    }
    Ok(flags)
}

/// Parse an integer field
///
/// Accepts decimal, `0x`/`0o`/`0b` literals with an optional sign, and a
/// `k`/`m` suffix (x1024, x1024^2). Decimal literals other than zero may
/// not start with `0`. If the text is not numeric, it is
/// looked up (case-insensitively) in `keywords`.
pub fn parse_int(value: &str, keywords: &[(&str, u8)]) -> ParseResult<i64> {
    match parse_number(value) {
        Some(n) => Ok(n),
        None if keywords.is_empty() => Err(ParseErrorKind::InvalidNumber(value.to_string())),
        None => {
            let lower = value.to_ascii_lowercase();
            keywords
                .iter()
                .find(|(name, _)| *name == lower)
                .map(|&(_, v)| v as i64)
                .ok_or_else(|| ParseErrorKind::UnknownKeyword {
                    value: value.to_string(),
                    known: keywords
                        .iter()
                        .map(|(name, _)| *name)
                        .collect::<Vec<_>>()
                        .join(", "),
                })
        }
    }
}

fn parse_number(value: &str) -> Option<i64> {
    let lower = value.to_ascii_lowercase();
    for (suffix, multiplier) in [('k', 1024i64), ('m', 1024 * 1024)] {
        if let Some(rest) = lower.strip_suffix(suffix) {
            return parse_number(rest)?.checked_mul(multiplier);
        }
    }

    let (negative, digits) = match lower.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, lower.strip_prefix('+').unwrap_or(lower.as_str())),
    };

    let (radix, digits) = if let Some(hex) = digits.strip_prefix("0x") {
        (16, hex)
    } else if let Some(oct) = digits.strip_prefix("0o") {
        (8, oct)
    } else if let Some(bin) = digits.strip_prefix("0b") {
        (2, bin)
    } else {
        (10, digits)
    };

    let digits = digits.replace('_', "");
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    // no leading zeros on decimals, except for zero itself
    if radix == 10 && digits.starts_with('0') && !digits.trim_start_matches('0').is_empty() {
        return None;
    }
    let magnitude = i64::from_str_radix(&digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Expand `$NAME` / `${NAME}` references in a line
///
/// `\$` yields a literal `$`. An unknown variable is an error.
fn expand_vars<F>(line: &str, lookup: &F) -> ParseResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(line.len());
    let mut chars = line.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some((_, '$'))) => {
                chars.next();
                out.push('$');
            }
            '$' => {
                let rest = &line[pos + 1..];
                let (name, consumed) = match rest.strip_prefix('{') {
                    Some(inner) => match inner.find('}') {
                        Some(close) if is_var_name(&inner[..close]) => (&inner[..close], close + 2),
                        _ => {
                            out.push('$');
                            continue;
                        }
                    },
                    None => {
                        let len = var_name_len(rest);
                        if len == 0 {
                            out.push('$');
                            continue;
                        }
                        (&rest[..len], len)
                    }
                };

                let value =
                    lookup(name).ok_or_else(|| ParseErrorKind::UnknownVariable(name.to_string()))?;
                out.push_str(&value);

                // variable names are ASCII, so byte count == char count
                for _ in 0..consumed {
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

fn var_name_len(s: &str) -> usize {
    let mut len = 0;
    for (i, c) in s.char_indices() {
        let ok = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };
        if !ok {
            break;
        }
        len = i + 1;
    }
    len
}

fn is_var_name(s: &str) -> bool {
    !s.is_empty() && var_name_len(s) == s.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PartitionSize;

    fn no_vars(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("4096", &[]).unwrap(), 4096);
        assert_eq!(parse_int("0x1000", &[]).unwrap(), 0x1000);
        assert_eq!(parse_int("0X1000", &[]).unwrap(), 0x1000);
        assert_eq!(parse_int("4k", &[]).unwrap(), 4096);
        assert_eq!(parse_int("4K", &[]).unwrap(), 4096);
        assert_eq!(parse_int("2M", &[]).unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_int("0x10k", &[]).unwrap(), 0x10 * 1024);
        assert_eq!(parse_int("-0x200000", &[]).unwrap(), -0x200000);
        assert_eq!(parse_int("NVS", &[("nvs", 2)]).unwrap(), 2);
        assert_eq!(parse_int("0", &[]).unwrap(), 0);
        assert_eq!(parse_int("00", &[]).unwrap(), 0);
        assert_eq!(parse_int("0x010", &[]).unwrap(), 0x10);
    }

    #[test]
    fn test_parse_int_errors() {
        assert_eq!(
            parse_int("zz", &[]),
            Err(ParseErrorKind::InvalidNumber("zz".into()))
        );
        assert_eq!(
            parse_int("010", &[]),
            Err(ParseErrorKind::InvalidNumber("010".into()))
        );
        assert!(parse_int("0100k", &[]).is_err());
        assert_eq!(
            parse_int("zz", &[("app", 0), ("data", 1)]),
            Err(ParseErrorKind::UnknownKeyword {
                value: "zz".into(),
                known: "app, data".into(),
            })
        );
    }

    #[test]
    fn test_parse_descriptor() {
        let text = "\
# Name,   Type, SubType, Offset,  Size, Flags
nvs,      data, nvs,     0x9000,  0x6000,

phy_init, data, phy,     0xf000,  0x1000,
factory,  app,  factory, 0x10000, 1M,
ota_1,    app,  ota_1,   ,        1M, encrypted
raw,      0x40, 0x3,     ,        4k
storage,  data, spiffs,  ,        -0x200000
";
        let table = PartitionTable::from_descriptor_with(text, no_vars).unwrap();
        assert_eq!(table.len(), 6);

        let nvs = table.by_name("nvs").unwrap();
        assert_eq!(nvs.kind, PartitionKind::Data);
        assert_eq!(nvs.subkind, 0x02);
        assert_eq!(nvs.offset, Some(0x9000));
        assert_eq!(nvs.size, PartitionSize::Bytes(0x6000));

        let ota = table.by_name("ota_1").unwrap();
        assert_eq!(ota.subkind, 0x11);
        assert_eq!(ota.offset, None);
        assert!(ota.encrypted());

        let storage = table.last().unwrap();
        assert_eq!(storage.name, "storage");
        assert_eq!(storage.size, PartitionSize::UpTo(0x200000));
    }

    #[test]
    fn test_missing_size_and_type() {
        let err = PartitionTable::from_descriptor_with("nvs,data,nvs,0x9000", no_vars).unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                line: 1,
                kind: ParseErrorKind::EmptyField("size")
            }
        ));

        let err = PartitionTable::from_descriptor_with("# x\nnvs,,nvs,0x9000,4k", no_vars)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                line: 2,
                kind: ParseErrorKind::EmptyField("type")
            }
        ));
    }

    #[test]
    fn test_raw_kind_rejects_keyword_subtype() {
        let err = PartitionTable::from_descriptor_with("raw,0x40,nvs,,4k", no_vars).unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                kind: ParseErrorKind::InvalidNumber(_),
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_subtype_and_flag() {
        let err = PartitionTable::from_descriptor_with("a,app,nvs,,1M", no_vars).unwrap_err();
        match err {
            Error::Parse {
                line: 1,
                kind: ParseErrorKind::UnknownKeyword { value, known },
            } => {
                assert_eq!(value, "nvs");
                assert!(known.contains("factory"));
                assert!(known.contains("ota_15"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err =
            PartitionTable::from_descriptor_with("a,data,nvs,,4k,readonly", no_vars).unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                kind: ParseErrorKind::UnknownFlag(_),
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_name() {
        let text = "a,data,nvs,,4k\na,data,phy,,4k";
        let err = PartitionTable::from_descriptor_with(text, no_vars).unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                line: 2,
                kind: ParseErrorKind::DuplicateName(_)
            }
        ));
    }

    #[test]
    fn test_variable_expansion() {
        let lookup = |name: &str| match name {
            "APP_SIZE" => Some("0x180000".to_string()),
            "NVS" => Some("nvs".to_string()),
            _ => None,
        };
        let text = "$NVS,data,nvs,0x9000,0x6000\nfactory,app,factory,0x10000,${APP_SIZE}";
        let table = PartitionTable::from_descriptor_with(text, lookup).unwrap();
        assert!(table.by_name("nvs").is_some());
        assert_eq!(
            table.by_name("factory").unwrap().size,
            PartitionSize::Bytes(0x180000)
        );
    }

    #[test]
    fn test_unknown_variable() {
        let text = "nvs,data,nvs,0x9000,0x6000\n\nfactory,app,factory,0x10000,$APP_SIZE";
        let err = PartitionTable::from_descriptor_with(text, no_vars).unwrap_err();
        match err {
            Error::Parse { line, kind } => {
                assert_eq!(line, 3);
                assert_eq!(kind, ParseErrorKind::UnknownVariable("APP_SIZE".into()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_variable_in_comment() {
        // expansion happens before comment detection
        let err = PartitionTable::from_descriptor_with("# $MISSING", no_vars).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }

    #[test]
    fn test_escaped_dollar() {
        assert_eq!(expand_vars(r"a\$b", &no_vars).unwrap(), "a$b");
        assert_eq!(expand_vars("cost $5", &no_vars).unwrap(), "cost $5");
    }
}
