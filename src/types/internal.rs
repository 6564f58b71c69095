//! Internal data structures
//!
//! Values extracted from the backend during a single login attempt.

use crate::{Error, Result};
use url::Url;

/// Handshake stage name used in protocol errors
const STAGE: &str = "initial_redirect";

/// Correlation tokens and referer taken from the backend's initial redirect.
///
/// Scoped to one authentication attempt; never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginParameters {
    /// Correlation tokens in the configured order, as `(name, value)`
    pub tokens: Vec<(String, String)>,
    /// Absolute URL of the redirect target, sent as `Referer` on the login POST
    pub referer: String,
}

impl LoginParameters {
    /// Parse the `Location` of the backend's initial redirect.
    ///
    /// The backend encodes the login parameters after the *last* `?` of the
    /// location, e.g. `/CookieAuth.dll?GetLogon?curl=Z2F&curlid=...&curlmode=0`.
    /// Every name in `names` must be present with a non-empty value.
    pub fn from_redirect(target_base: &Url, location: &str, names: &[String]) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(Error::protocol(STAGE, "'Location' header is empty"));
        }

        let query = match location.rsplit_once('?') {
            Some((_, query)) if !query.is_empty() => query,
            _ => {
                return Err(Error::protocol(
                    STAGE.to_string(),
                    format!("could not find a query string in location: {}", location),
                ));
            }
        };

        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        let mut tokens = Vec::with_capacity(names.len());
        for name in names {
            let value = pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    Error::protocol(
                        STAGE.to_string(),
                        format!("missing correlation parameter '{}' in location", name),
                    )
                })?;
            tokens.push((name.clone(), value));
        }

        let referer = target_base.join(location).map_err(|e| {
            Error::protocol(
                STAGE.to_string(),
                format!("invalid redirect target '{}': {}", location, e),
            )
        })?;

        Ok(Self {
            tokens,
            referer: referer.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn names() -> Vec<String> {
        vec!["curl".into(), "curlid".into(), "curlmode".into()]
    }

    fn token<'a>(params: &'a LoginParameters, name: &str) -> Option<&'a str> {
        params
            .tokens
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn base() -> Url {
        Url::parse("https://owa.example.org").unwrap()
    }

    #[test]
    fn test_parses_double_question_mark_location() {
        let location = "/CookieAuth.dll?GetLogon?curl=Z2Fowa&curlid=4f0c-11&curlmode=0";
        let params = LoginParameters::from_redirect(&base(), location, &names()).unwrap();

        assert_eq!(token(&params, "curl"), Some("Z2Fowa"));
        assert_eq!(token(&params, "curlid"), Some("4f0c-11"));
        assert_eq!(token(&params, "curlmode"), Some("0"));
        assert_eq!(
            params.referer,
            "https://owa.example.org/CookieAuth.dll?GetLogon?curl=Z2Fowa&curlid=4f0c-11&curlmode=0"
        );
    }

    #[test]
    fn test_keeps_configured_order() {
        let location = "/logon?curlmode=0&curlid=abc&curl=Z2F";
        let params = LoginParameters::from_redirect(&base(), location, &names()).unwrap();
        let order: Vec<&str> = params.tokens.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(order, vec!["curl", "curlid", "curlmode"]);
    }

    #[test]
    fn test_absolute_location_is_used_as_referer() {
        let location = "https://login.example.org/logon?curl=a&curlid=b&curlmode=c";
        let params = LoginParameters::from_redirect(&base(), location, &names()).unwrap();
        assert_eq!(params.referer, location);
    }

    #[test]
    fn test_percent_encoded_values_are_decoded() {
        let location = "/logon?curl=Z2F%2Fowa%2F&curlid=a%20b&curlmode=0";
        let params = LoginParameters::from_redirect(&base(), location, &names()).unwrap();
        assert_eq!(token(&params, "curl"), Some("Z2F/owa/"));
        assert_eq!(token(&params, "curlid"), Some("a b"));
    }

    #[rstest]
    #[case::empty("")]
    #[case::no_query("/CookieAuth.dll")]
    #[case::trailing_question_mark("/CookieAuth.dll?GetLogon?")]
    #[case::missing_curlid("/logon?curl=a&curlmode=0")]
    #[case::empty_value("/logon?curl=a&curlid=&curlmode=0")]
    fn test_malformed_locations_are_protocol_errors(#[case] location: &str) {
        let err = LoginParameters::from_redirect(&base(), location, &names()).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }), "got {:?}", err);
    }
}
