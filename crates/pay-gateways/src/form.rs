//! # Form Response Decoding
//!
//! Strict decoder for `key=value&key=value` response bodies (PayGate
//! PayWeb3). Every entry must contain exactly one `=`; anything else is
//! reported instead of guessed at.
//!
//! Values that themselves contain an unescaped `=` or `&` cannot be told
//! apart from malformed entries and are rejected.

use thiserror::Error;

/// Why a form-encoded response was rejected
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormDecodeError {
    #[error("response body is empty")]
    Empty,

    #[error("entry {index} ('{entry}') is not a single key=value pair")]
    MalformedEntry { index: usize, entry: String },

    #[error("entry {index} has an empty key")]
    EmptyKey { index: usize },

    #[error("key '{0}' appears more than once")]
    DuplicateKey(String),

    #[error("invalid percent-encoding in entry {index}")]
    InvalidEncoding { index: usize },
}

/// Decoded response, in received order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormResponse {
    pairs: Vec<(String, String)>,
}

impl FormResponse {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// Decode a form-encoded response body.
pub fn decode_form_response(body: &str) -> Result<FormResponse, FormDecodeError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(FormDecodeError::Empty);
    }

    let mut pairs: Vec<(String, String)> = Vec::new();

    for (index, entry) in body.split('&').enumerate() {
        let mut parts = entry.split('=');
        let (key, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => (key, value),
            _ => {
                return Err(FormDecodeError::MalformedEntry {
                    index,
                    entry: entry.to_string(),
                })
            }
        };

        let key = decode_component(key).ok_or(FormDecodeError::InvalidEncoding { index })?;
        let value = decode_component(value).ok_or(FormDecodeError::InvalidEncoding { index })?;

        if key.is_empty() {
            return Err(FormDecodeError::EmptyKey { index });
        }
        if pairs.iter().any(|(k, _)| *k == key) {
            return Err(FormDecodeError::DuplicateKey(key));
        }

        pairs.push((key, value));
    }

    Ok(FormResponse { pairs })
}

fn decode_component(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(|v| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_paygate_success() {
        let body = "PAYGATE_ID=10011072130&PAY_REQUEST_ID=23B785AE-C96C-32AF-4879-D2C9363DB6E8&REFERENCE=UAE-PAY-1&CHECKSUM=b41a77f83a275a849f23e30b4666e837\n";
        let response = decode_form_response(body).unwrap();

        assert_eq!(response.get("PAYGATE_ID"), Some("10011072130"));
        assert_eq!(
            response.get("PAY_REQUEST_ID"),
            Some("23B785AE-C96C-32AF-4879-D2C9363DB6E8")
        );
        assert_eq!(response.pairs().len(), 4);
        assert_eq!(response.pairs()[3].0, "CHECKSUM");
    }

    #[test]
    fn test_decode_error_response() {
        let response = decode_form_response("ERROR=DATA_CHK").unwrap();
        assert_eq!(response.get("ERROR"), Some("DATA_CHK"));
    }

    #[test]
    fn test_decodes_escapes() {
        let response = decode_form_response("RESULT_DESC=Auth+Done%21&EMPTY=").unwrap();
        assert_eq!(response.get("RESULT_DESC"), Some("Auth Done!"));
        assert_eq!(response.get("EMPTY"), Some(""));
    }

    #[test]
    fn test_rejects_malformed_entries() {
        assert_eq!(decode_form_response("  "), Err(FormDecodeError::Empty));
        assert!(matches!(
            decode_form_response("A=1&garbage"),
            Err(FormDecodeError::MalformedEntry { index: 1, .. })
        ));
        assert!(matches!(
            decode_form_response("A=1=2"),
            Err(FormDecodeError::MalformedEntry { index: 0, .. })
        ));
        assert!(matches!(
            decode_form_response("A=1&"),
            Err(FormDecodeError::MalformedEntry { index: 1, .. })
        ));
        assert_eq!(
            decode_form_response("=1"),
            Err(FormDecodeError::EmptyKey { index: 0 })
        );
        assert_eq!(
            decode_form_response("A=1&A=2"),
            Err(FormDecodeError::DuplicateKey("A".to_string()))
        );
    }

    #[test]
    fn test_rejects_html_error_page() {
        assert!(decode_form_response("<html><body>Bad Gateway</body></html>").is_err());
    }
}
