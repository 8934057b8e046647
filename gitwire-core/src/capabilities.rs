//! Parsing of capability lists and advertisement lines.
//!
//! v1 carries capabilities after the first NUL of the first advertised ref
//! line; v2 advertises them as dedicated `name[=value]` lines.

use bstr::{BStr, ByteSlice};
use gix_hash::ObjectId;

use crate::{Error, Result};

/// A single `name[=value]` capability token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability<'a> {
    /// The capability name.
    pub name: &'a BStr,
    /// The value after `=`, if any.
    pub value: Option<&'a BStr>,
}

/// Split a space-separated capability list into tokens.
pub fn parse_list(caps: &[u8]) -> impl Iterator<Item = Capability<'_>> {
    caps.fields().map(|token| match token.find_byte(b'=') {
        Some(at) => Capability {
            name: token[..at].as_bstr(),
            value: Some(token[at + 1..].as_bstr()),
        },
        None => Capability {
            name: token.as_bstr(),
            value: None,
        },
    })
}

/// An `OID NAME[\0capabilities]` advertisement line, split apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefLine<'a> {
    /// The advertised object id.
    pub oid: ObjectId,
    /// The refname, or `capabilities^{}` for an empty repository.
    pub name: &'a BStr,
    /// The capability list carried after the first NUL, if any.
    pub caps: Option<&'a BStr>,
}

/// Parse an advertisement line.
///
/// The capability list is split off at the first NUL only; any later NUL
/// bytes stay part of the capability field.
pub fn parse_ref_line(line: &[u8]) -> Result<RefLine<'_>> {
    let trimmed = trim_lf(line);
    let (before, caps) = match trimmed.find_byte(0) {
        Some(at) => (&trimmed[..at], Some(trimmed[at + 1..].as_bstr())),
        None => (trimmed, None),
    };
    let (oid_hex, name) = before
        .split_once_str(" ")
        .ok_or_else(|| invalid("ref advertisement", line))?;
    let oid = parse_oid(oid_hex).map_err(|_| invalid("ref advertisement", line))?;
    if name.is_empty() || name.contains(&b' ') {
        return Err(invalid("ref advertisement", line));
    }
    Ok(RefLine {
        oid,
        name: name.as_bstr(),
        caps,
    })
}

/// Extract the service name from a `# service=NAME\n` banner.
pub fn parse_service_banner(line: &[u8]) -> Option<&BStr> {
    let rest = trim_lf(line.strip_prefix(b"# service=")?);
    (!rest.is_empty()).then(|| rest.as_bstr())
}

/// Whether a line has the `name[=value]` shape of a v2 capability
/// advertisement entry. Values are free-form; names are plain tokens.
pub fn is_capability_line(line: &[u8]) -> bool {
    let line = trim_lf(line);
    match line.find_byte(b'=') {
        Some(at) => is_token(&line[..at]),
        None => is_token(line),
    }
}

/// Validate a hex object id, in whatever widths the hash crate accepts.
pub fn parse_oid(hex: &[u8]) -> Result<ObjectId> {
    ObjectId::from_hex(hex).map_err(|_| Error::InvalidLine {
        what: "object id",
        line: hex.into(),
    })
}

/// Strip one trailing LF if present; request lines match with or without it.
pub fn trim_lf(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\n").unwrap_or(line)
}

fn is_token(name: &[u8]) -> bool {
    !name.is_empty()
        && name
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn invalid(what: &'static str, line: &[u8]) -> Error {
    Error::InvalidLine {
        what,
        line: line.into(),
    }
}
