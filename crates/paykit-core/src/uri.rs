//! URI path formatting for REST calls
//!
//! Replaces `{name}` placeholders in a path pattern with values from a
//! parameter map and appends URL-encoded query parameters. Any placeholder
//! left unreplaced after substitution is a fatal formatting error.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Formats a URI path, substituting `{name}` placeholders from
/// `path_parameters` and appending `query_parameters` to the result.
pub fn format_uri_path(
    pattern: &str,
    path_parameters: &BTreeMap<String, String>,
    query_parameters: Option<&BTreeMap<String, String>>,
) -> Result<String> {
    let mut formatted = pattern.to_string();
    for (name, value) in path_parameters {
        let placeholder = format!("{{{}}}", name.trim());
        if formatted.contains(&placeholder) {
            formatted = formatted.replace(&placeholder, value.trim());
        }
    }

    if let Some(query) = query_parameters {
        let mut assembled = formatted.clone();
        if assembled.contains('?') {
            if !(assembled.ends_with('?') || assembled.ends_with('&')) {
                assembled.push('&');
            }
        } else {
            assembled.push('?');
        }
        for (name, value) in query {
            // Null/empty values are dropped rather than sent as dangling pairs.
            if value.is_empty() || value.eq_ignore_ascii_case("null") {
                continue;
            }
            assembled.push_str(&urlencoding::encode(name));
            assembled.push('=');
            assembled.push_str(&urlencoding::encode(value));
            assembled.push('&');
        }
        formatted = assembled.trim_end_matches(['&', '?']).to_string();
    }

    if formatted.contains('{') || formatted.contains('}') {
        return Err(Error::Config {
            message: format!(
                "unable to format URI path {formatted:?}: unreplaced placeholders remain"
            ),
            source: None,
        });
    }
    Ok(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_path_parameter_substitution() {
        let path =
            format_uri_path("/v1/payments/payment/{id}", &params(&[("id", "42")]), None).unwrap();
        assert_eq!(path, "/v1/payments/payment/42");
    }

    #[test]
    fn test_residual_placeholder_is_fatal() {
        let result = format_uri_path(
            "/v1/payments/payment/{id}/refund/{refund_id}",
            &params(&[("id", "42")]),
            None,
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_query_parameters_are_encoded_and_appended() {
        let path = format_uri_path(
            "/v1/invoices/search",
            &BTreeMap::new(),
            Some(&params(&[("page", "2"), ("term", "a b")])),
        )
        .unwrap();
        assert_eq!(path, "/v1/invoices/search?page=2&term=a%20b");
    }

    #[test]
    fn test_empty_and_null_query_values_are_dropped() {
        let path = format_uri_path(
            "/v1/invoices/search",
            &BTreeMap::new(),
            Some(&params(&[("empty", ""), ("page", "1"), ("skip", "null")])),
        )
        .unwrap();
        assert_eq!(path, "/v1/invoices/search?page=1");
    }

    #[test]
    fn test_existing_query_string_is_extended() {
        let path = format_uri_path(
            "/v1/invoices/search?sort=asc",
            &BTreeMap::new(),
            Some(&params(&[("page", "3")])),
        )
        .unwrap();
        assert_eq!(path, "/v1/invoices/search?sort=asc&page=3");
    }
}
