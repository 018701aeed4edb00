use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors returned when validating a backend or redirect URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain http to anything but the local machine would leak the API key.
    #[error("Insecure URL {0}: HTTPS required (except localhost)")]
    Insecure(String),
    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Validate the base URL of the hosted backend.
///
/// Requires `https`, except for loopback hosts (`localhost`, `127.0.0.1`,
/// `::1`) where `http` is accepted for local development. A trailing slash is
/// removed from the path so endpoint paths can be appended directly.
///
/// ```
/// use apunto::util::validate_backend_url;
///
/// assert!(validate_backend_url("https://abc.supabase.co").is_ok());
/// assert!(validate_backend_url("http://localhost:54321").is_ok());
/// assert!(validate_backend_url("http://abc.supabase.co").is_err());
/// assert!(validate_backend_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_backend_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let mut url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "https" => {}
        "http" => {
            if !is_loopback_host(&url) {
                return Err(UrlValidationError::Insecure(url.to_string()));
            }
        }
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().is_none() {
        return Err(UrlValidationError::MissingHost(url.to_string()));
    }

    let trimmed = url.path().trim_end_matches('/').to_string();
    url.set_path(&trimmed);
    Ok(url)
}

/// Validate the page a password-reset mail should link back to.
///
/// Only the scheme is restricted; the host is whatever web front end the
/// user runs.
pub fn validate_redirect_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

fn is_loopback_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if host == "localhost" {
        return true;
    }

    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_accepted() {
        let url = validate_backend_url("https://abc.supabase.co/").unwrap();
        assert_eq!(url.as_str(), "https://abc.supabase.co/");
        assert_eq!(url.host_str(), Some("abc.supabase.co"));
    }

    #[test]
    fn test_trailing_slash_removed_from_path() {
        let url = validate_backend_url("https://example.com/proxy/").unwrap();
        assert_eq!(url.path(), "/proxy");
    }

    #[test]
    fn test_plain_http_only_for_loopback() {
        assert!(validate_backend_url("http://localhost:54321").is_ok());
        assert!(validate_backend_url("http://127.0.0.1:54321").is_ok());
        assert!(validate_backend_url("http://[::1]:54321").is_ok());
        assert!(matches!(
            validate_backend_url("http://example.com"),
            Err(UrlValidationError::Insecure(_))
        ));
        assert!(matches!(
            validate_backend_url("http://192.168.1.10"),
            Err(UrlValidationError::Insecure(_))
        ));
    }

    #[test]
    fn test_other_schemes_rejected() {
        assert!(matches!(
            validate_backend_url("ftp://example.com"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_backend_url("not a url").is_err());
    }

    #[test]
    fn test_redirect_url() {
        assert!(validate_redirect_url("http://notes.example.com/login/update").is_ok());
        assert!(validate_redirect_url("javascript:alert(1)").is_err());
    }
}
