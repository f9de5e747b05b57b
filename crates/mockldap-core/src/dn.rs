//! Distinguished name parsing and naming-context helpers.
//!
//! The mock directory keys entries by their leading RDN and only serves names that sit beneath
//! its configured suffix, so besides parsing this module answers two questions: "what is the
//! store key of this name" and "is this name inside the naming context".

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::Error as CoreError;

/// Errors that can occur when parsing distinguished names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistinguishedNameError {
    /// The distinguished name was empty.
    #[error("distinguished name cannot be empty")]
    Empty,
    /// A component in the distinguished name was invalid.
    #[error("invalid distinguished name component: {0}")]
    InvalidComponent(String),
    /// A component was missing the attribute name to the left of the `=`.
    #[error("distinguished name component missing attribute: {0}")]
    MissingAttribute(String),
    /// A component was missing the value to the right of the `=`.
    #[error("distinguished name component missing value for attribute {0}")]
    MissingValue(String),
    /// The distinguished name ended with an escape character.
    #[error("distinguished name contains an unterminated escape sequence")]
    UnterminatedEscape,
}

impl From<DistinguishedNameError> for CoreError {
    fn from(err: DistinguishedNameError) -> Self {
        CoreError::InvalidDnSyntax(err.to_string())
    }
}

/// A single `attribute=value` assertion. Multi-valued RDNs hold several of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeDistinguishedName {
    attribute: String,
    value: String,
}

impl RelativeDistinguishedName {
    /// Create a new relative distinguished name.
    #[must_use]
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Attribute portion of the RDN (e.g. `cn`).
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Attribute value portion of the RDN (unescaped).
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Attribute names compare case-insensitively.
    #[must_use]
    pub fn matches_attribute(&self, attribute: &str) -> bool {
        self.attribute.eq_ignore_ascii_case(attribute)
    }

    fn same_as(&self, other: &Self) -> bool {
        self.matches_attribute(&other.attribute) && self.value.eq_ignore_ascii_case(&other.value)
    }
}

/// Parsed distinguished name.
///
/// Keeps a canonical string (no whitespace around separators, escapes normalised) next to the
/// parsed RDN sets, so `cn=bhacker, o=testultrax` and `cn=bhacker,o=testultrax` render the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedName {
    raw: String,
    rdns: Vec<Vec<RelativeDistinguishedName>>,
}

impl DistinguishedName {
    /// Parses a distinguished name from a string.
    ///
    /// # Errors
    ///
    /// Returns [`DistinguishedNameError`] if the name is empty or syntactically invalid.
    pub fn parse(input: impl AsRef<str>) -> std::result::Result<Self, DistinguishedNameError> {
        let raw = trim_unescaped(input.as_ref());
        if raw.is_empty() {
            return Err(DistinguishedNameError::Empty);
        }

        let rdns = split_unescaped(raw, ',')?
            .iter()
            .map(|component| {
                split_unescaped(component, '+')?
                    .iter()
                    .map(|assertion| parse_assertion(assertion))
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: render(&rdns),
            rdns,
        })
    }

    /// Borrows the canonical distinguished name string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Leading RDN set.
    #[must_use]
    pub fn leading_rdn(&self) -> &[RelativeDistinguishedName] {
        // parse() guarantees at least one RDN set
        &self.rdns[0]
    }

    /// Store key derived from the leading RDN: attribute names lowercased, values kept verbatim.
    ///
    /// `cn=BHacker,o=testultrax` and `CN=BHacker, o=other` share the key `cn=BHacker`.
    #[must_use]
    pub fn rdn_key(&self) -> String {
        self.leading_rdn()
            .iter()
            .map(|rdn| format!("{}={}", rdn.attribute().to_ascii_lowercase(), escape(rdn.value())))
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Compares two names the way a directory does: attribute names and values ignore ASCII case.
    #[must_use]
    pub fn equivalent(&self, other: &DistinguishedName) -> bool {
        self.rdns.len() == other.rdns.len() && ends_with(&self.rdns, &other.rdns)
    }

    /// True when `self` lies strictly beneath `suffix`.
    #[must_use]
    pub fn is_beneath(&self, suffix: &DistinguishedName) -> bool {
        self.rdns.len() > suffix.rdns.len() && ends_with(&self.rdns, &suffix.rdns)
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for DistinguishedName {
    type Err = DistinguishedNameError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DistinguishedName> for String {
    fn from(value: DistinguishedName) -> Self {
        value.raw
    }
}

fn ends_with(
    name: &[Vec<RelativeDistinguishedName>],
    suffix: &[Vec<RelativeDistinguishedName>],
) -> bool {
    if suffix.len() > name.len() {
        return false;
    }
    name[name.len() - suffix.len()..]
        .iter()
        .zip(suffix)
        .all(|(left, right)| {
            left.len() == right.len() && left.iter().zip(right).all(|(l, r)| l.same_as(r))
        })
}

/// Splits on `delimiter` outside of escapes. Escapes are kept so later stages can unescape.
fn split_unescaped(
    input: &str,
    delimiter: char,
) -> std::result::Result<Vec<String>, DistinguishedNameError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or(DistinguishedNameError::UnterminatedEscape)?;
                current.push('\\');
                current.push(escaped);
            }
            ch if ch == delimiter => parts.push(std::mem::take(&mut current)),
            ch => current.push(ch),
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .map(|part| {
            let trimmed = trim_unescaped(&part);
            if trimmed.is_empty() {
                Err(DistinguishedNameError::InvalidComponent(input.to_string()))
            } else {
                Ok(trimmed.to_string())
            }
        })
        .collect()
}

/// Trims surrounding whitespace, keeping a trailing space that is escaped.
fn trim_unescaped(input: &str) -> &str {
    let trimmed = input.trim_start();
    let mut end = trimmed.len();
    while let Some(ch) = trimmed[..end].chars().next_back() {
        if !ch.is_whitespace() {
            break;
        }
        let before = &trimmed[..end - ch.len_utf8()];
        let backslashes = before.chars().rev().take_while(|&c| c == '\\').count();
        if backslashes % 2 == 1 {
            break;
        }
        end -= ch.len_utf8();
    }
    &trimmed[..end]
}

fn parse_assertion(
    assertion: &str,
) -> std::result::Result<RelativeDistinguishedName, DistinguishedNameError> {
    // Attribute types never contain escapes, so the first `=` is the separator.
    let (attribute, value) = assertion
        .split_once('=')
        .ok_or_else(|| DistinguishedNameError::InvalidComponent(assertion.to_string()))?;
    let attribute = attribute.trim();
    let value = value.trim_start();

    if attribute.is_empty() {
        return Err(DistinguishedNameError::MissingAttribute(
            assertion.to_string(),
        ));
    }
    if value.is_empty() {
        return Err(DistinguishedNameError::MissingValue(attribute.to_string()));
    }

    Ok(RelativeDistinguishedName::new(attribute, unescape(value)?))
}

fn unescape(value: &str) -> std::result::Result<String, DistinguishedNameError> {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            result.push(
                chars
                    .next()
                    .ok_or(DistinguishedNameError::UnterminatedEscape)?,
            );
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn escape(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());

    for (idx, ch) in value.chars().enumerate() {
        let special = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (idx == 0 && matches!(ch, ' ' | '#'))
            || (idx == last && ch == ' ');
        if special {
            escaped.push('\\');
        }
        escaped.push(ch);
    }

    escaped
}

fn render(rdns: &[Vec<RelativeDistinguishedName>]) -> String {
    rdns.iter()
        .map(|set| {
            set.iter()
                .map(|rdn| format!("{}={}", rdn.attribute(), escape(rdn.value())))
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect::<Vec<_>>()
        .join(",")
}
