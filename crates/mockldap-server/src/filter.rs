//! Search filter evaluation against attribute maps.
//!
//! Attribute names match case-insensitively. Values compare exactly for equality and
//! substring assertions, lexicographically for ordering assertions, and ignoring ASCII case for
//! approximate matches. Extensible matches are not supported and never match.

use ldap3_proto::proto::{LdapFilter, LdapSubstringFilter};
use mockldap_core::AttributeMap;

/// True if `attributes` satisfies `filter`.
#[must_use]
pub fn matches(filter: &LdapFilter, attributes: &AttributeMap) -> bool {
    match filter {
        LdapFilter::And(filters) => filters.iter().all(|f| matches(f, attributes)),
        LdapFilter::Or(filters) => filters.iter().any(|f| matches(f, attributes)),
        LdapFilter::Not(inner) => !matches(inner, attributes),
        LdapFilter::Equality(name, value) => attributes.contains_value(name, value),
        LdapFilter::Substring(name, substring) => {
            any_value(attributes, name, |v| substring_matches(v, substring))
        }
        LdapFilter::GreaterOrEqual(name, bound) => {
            any_value(attributes, name, |v| v >= bound.as_str())
        }
        LdapFilter::LessOrEqual(name, bound) => {
            any_value(attributes, name, |v| v <= bound.as_str())
        }
        LdapFilter::Present(name) => attributes.contains(name),
        LdapFilter::Approx(name, value) => {
            any_value(attributes, name, |v| v.eq_ignore_ascii_case(value))
        }
        _ => false,
    }
}

fn any_value(attributes: &AttributeMap, name: &str, test: impl Fn(&str) -> bool) -> bool {
    attributes
        .get(name)
        .is_some_and(|values| values.iter().any(|value| test(value)))
}

fn substring_matches(value: &str, substring: &LdapSubstringFilter) -> bool {
    let mut rest = value;

    if let Some(initial) = &substring.initial {
        match rest.strip_prefix(initial.as_str()) {
            Some(tail) => rest = tail,
            None => return false,
        }
    }

    for part in &substring.any {
        match rest.find(part.as_str()) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }

    substring
        .final_
        .as_ref()
        .map_or(true, |final_| rest.ends_with(final_.as_str()))
}
