use std::collections::BTreeMap;

use url::Url;

use crate::common::defaults::DEFAULT_SLURMDBD_PORT;
use crate::validators::{ValidationFailure, Validator};

/// Storage parameters slurmdbd passes to the accounting database connection.
pub const SLURMDBD_STORAGE_PARAMETERS: [&str; 5] =
    ["SSL_CA", "SSL_CAPATH", "SSL_CERT", "SSL_CIPHER", "SSL_KEY"];

/// Scheme used only to let the URL parser split `host:port`.
const PLACEHOLDER_SCHEME: &str = "placeholder";

/// Checks the `host[:port]` URI of the accounting database.
pub struct DatabaseUriValidator;

impl Validator for DatabaseUriValidator {
    type Input = str;

    fn validate(&self, uri: &str) -> Vec<ValidationFailure> {
        if let Some(position) = uri.find("://") {
            return vec![ValidationFailure::error(format!(
                "Invalid URI specified. Please do not provide a scheme ('{}')",
                &uri[..position + 3]
            ))];
        }
        if uri.starts_with('/') {
            return vec![ValidationFailure::error(format!(
                "Invalid URI specified. Please remove any leading / at the beginning of the provided URI ('{uri}')"
            ))];
        }
        let invalid =
            || ValidationFailure::error(format!("Invalid URI specified. Please review the provided URI ('{uri}')"));
        if uri.is_empty() {
            return vec![invalid()];
        }

        match Url::parse(&format!("{PLACEHOLDER_SCHEME}://{uri}")) {
            Ok(url) if url.host_str().is_none_or(str::is_empty) => vec![invalid()],
            Ok(url) if url.port().is_none() => vec![ValidationFailure::warning(format!(
                "No port specified in the URI. Assuming the use of port {DEFAULT_SLURMDBD_PORT}"
            ))],
            Ok(_) => vec![],
            Err(url::ParseError::InvalidPort) => vec![ValidationFailure::error(
                "Invalid URI specified. Port out of range 0-65535",
            )],
            Err(_) => vec![invalid()],
        }
    }
}

/// Appends the default port to a URI that does not name one.
pub fn uri_with_default_port(uri: &str) -> String {
    match Url::parse(&format!("{PLACEHOLDER_SCHEME}://{uri}")) {
        Ok(url) if url.port().is_none() => format!("{uri}:{DEFAULT_SLURMDBD_PORT}"),
        _ => uri.to_string(),
    }
}

/// Checks the slurmdbd `StorageParameters` of the accounting database.
pub struct SlurmdbdStorageParametersValidator;

impl Validator for SlurmdbdStorageParametersValidator {
    type Input = BTreeMap<String, String>;

    fn validate(&self, parameters: &BTreeMap<String, String>) -> Vec<ValidationFailure> {
        if parameters.is_empty() {
            return vec![ValidationFailure::warning(
                "SlurmdbdStorageParameters not provided. This may prevent database server identity verification from slurmdbd daemon.",
            )];
        }

        let mut failures = vec![];
        if parameters
            .iter()
            .any(|(name, value)| name.contains(',') || value.contains(','))
        {
            failures.push(ValidationFailure::error(
                "Comma is not an acceptable character for Slurmdbd StorageParameters.",
            ));
        }
        for name in parameters.keys() {
            if !SLURMDBD_STORAGE_PARAMETERS.contains(&name.as_str()) {
                failures.push(ValidationFailure::warning(format!(
                    "'{name}' not available as Slurmdbd StorageParameter. The provided parameter will be ignored."
                )));
            }
        }
        if !parameters.contains_key("SSL_CA") {
            failures.push(ValidationFailure::warning(
                "'SSL_CA' Slurmdbd StorageParameter not provided. This may prevent database server identity verification from slurmdbd daemon.",
            ));
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::FailureLevel;

    fn messages(failures: Vec<ValidationFailure>) -> Vec<(FailureLevel, String)> {
        failures
            .into_iter()
            .map(|failure| (failure.level, failure.message))
            .collect()
    }

    fn check_uri(uri: &str, expected: Option<(FailureLevel, &str)>) {
        let failures = messages(DatabaseUriValidator.validate(uri));
        match expected {
            Some((level, message)) => assert_eq!(failures, vec![(level, message.to_string())]),
            None => assert!(failures.is_empty(), "{uri}: {failures:?}"),
        }
    }

    #[test]
    fn database_uri() {
        check_uri(
            "172.31.8.14:123456",
            Some((
                FailureLevel::Error,
                "Invalid URI specified. Port out of range 0-65535",
            )),
        );
        check_uri(
            "172.31.8.14",
            Some((
                FailureLevel::Warning,
                "No port specified in the URI. Assuming the use of port 3306",
            )),
        );
        check_uri("172.31.8.14:12345", None);
        check_uri("test.example.com:12345", None);
        check_uri(
            "/test.example.com:12345",
            Some((
                FailureLevel::Error,
                "Invalid URI specified. Please remove any leading / at the beginning of the provided URI ('/test.example.com:12345')",
            )),
        );
        check_uri(
            "test.example.com",
            Some((
                FailureLevel::Warning,
                "No port specified in the URI. Assuming the use of port 3306",
            )),
        );
        check_uri(
            "mysql://test.example.com",
            Some((
                FailureLevel::Error,
                "Invalid URI specified. Please do not provide a scheme ('mysql://')",
            )),
        );
        check_uri(
            "",
            Some((
                FailureLevel::Error,
                "Invalid URI specified. Please review the provided URI ('')",
            )),
        );
    }

    #[test]
    fn default_port() {
        assert_eq!(uri_with_default_port("172.31.8.14"), "172.31.8.14:3306");
        assert_eq!(uri_with_default_port("db.local:12345"), "db.local:12345");
    }

    fn parameters(items: &[(&str, &str)]) -> BTreeMap<String, String> {
        items
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    fn check_parameters(items: &[(&str, &str)], expected: Option<(FailureLevel, &str)>) {
        let failures = messages(SlurmdbdStorageParametersValidator.validate(&parameters(items)));
        match expected {
            Some((level, message)) => assert_eq!(failures, vec![(level, message.to_string())]),
            None => assert!(failures.is_empty(), "{failures:?}"),
        }
    }

    #[test]
    fn storage_parameters() {
        check_parameters(&[("SSL_CA", "/path/to/ssl_ca_cert")], None);
        check_parameters(
            &[("SSL_CAPATH", "/path/to/ssl_capath_cert")],
            Some((
                FailureLevel::Warning,
                "'SSL_CA' Slurmdbd StorageParameter not provided. This may prevent database server identity verification from slurmdbd daemon.",
            )),
        );
        check_parameters(
            &[("SSL_CA", "/path/to/ssl_ca_cert"), ("SSL_DUMMY", "dummy_parameter")],
            Some((
                FailureLevel::Warning,
                "'SSL_DUMMY' not available as Slurmdbd StorageParameter. The provided parameter will be ignored.",
            )),
        );
        check_parameters(
            &[("SSL_CA", "/path/to/ssl,_ca_cert")],
            Some((
                FailureLevel::Error,
                "Comma is not an acceptable character for Slurmdbd StorageParameters.",
            )),
        );
        check_parameters(
            &[],
            Some((
                FailureLevel::Warning,
                "SlurmdbdStorageParameters not provided. This may prevent database server identity verification from slurmdbd daemon.",
            )),
        );
    }
}
