//! Bridge reply envelopes.
//!
//! Reads return a bare object or array. Writes and registration return an
//! array of `{"success": {...}}` and `{"error": {...}}` items.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// Error type the bridge reports for an unknown or revoked token.
pub const UNAUTHORIZED_USER: u16 = 1;
/// Error type the bridge reports when registration needs the link button.
pub const LINK_BUTTON_NOT_PRESSED: u16 = 101;

/// An `error` item of a bridge reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeError {
    #[serde(rename = "type")]
    pub error_type: u16,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
}

impl BridgeError {
    /// Map to the crate error taxonomy; `bridge` names the bridge that replied.
    pub fn into_error(self, bridge: &str) -> Error {
        match self.error_type {
            LINK_BUTTON_NOT_PRESSED => Error::LinkButtonPending {
                address: bridge.to_string(),
            },
            UNAUTHORIZED_USER => Error::authentication(bridge, &self.description),
            other => Error::protocol(other, &self.address, &self.description),
        }
    }
}

/// First error item of a reply, if any.
pub fn first_error(body: &Value) -> Option<BridgeError> {
    body.as_array()?
        .iter()
        .filter_map(|item| item.get("error"))
        .find_map(|err| serde_json::from_value(err.clone()).ok())
}

/// Pass `body` through unless it reports an error.
pub fn check(bridge: &str, body: Value) -> Result<Value> {
    match first_error(&body) {
        Some(err) => Err(err.into_error(bridge)),
        None => Ok(body),
    }
}

/// The first `success` item's `field`, e.g. the issued `username`.
pub fn success_field<'a>(body: &'a Value, field: &str) -> Option<&'a Value> {
    body.as_array()?
        .iter()
        .filter_map(|item| item.get("success"))
        .find_map(|success| success.get(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reads_pass_through() {
        let body = json!({"1": {"name": "Desk"}});
        assert_eq!(check("bridge", body.clone()).unwrap(), body);
        assert!(check("bridge", json!([{"success": {"/lights/1/state/on": true}}])).is_ok());
    }

    #[test]
    fn test_error_mapping() {
        let link = json!([{"error": {"type": 101, "address": "", "description": "link button not pressed"}}]);
        assert_eq!(
            check("10.0.0.2", link).unwrap_err(),
            Error::LinkButtonPending {
                address: "10.0.0.2".into()
            }
        );

        let unauthorized = json!([{"error": {"type": 1, "address": "/lights", "description": "unauthorized user"}}]);
        assert!(matches!(
            check("10.0.0.2", unauthorized).unwrap_err(),
            Error::Authentication { .. }
        ));

        let invalid = json!([
            {"success": {"/lights/1/state/on": true}},
            {"error": {"type": 7, "address": "/lights/1/state/bri", "description": "invalid value, 300, for parameter, bri"}}
        ]);
        assert_eq!(
            check("10.0.0.2", invalid).unwrap_err(),
            Error::protocol(7, "/lights/1/state/bri", "invalid value, 300, for parameter, bri")
        );
    }

    #[test]
    fn test_success_field() {
        let body = json!([{"success": {"username": "83b7780291a6ceffbe0bd049104df"}}]);
        assert_eq!(
            success_field(&body, "username").and_then(Value::as_str),
            Some("83b7780291a6ceffbe0bd049104df")
        );
        assert!(success_field(&json!({}), "username").is_none());
    }
}
