use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::{TransportError, TransportErrorKind};

/// `code` value the platform uses for success.
pub const SUCCESS: i64 = 0;

/// Response envelope shared by every OpenAPI endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// A body without a numeric `code` does not follow the protocol and is
    /// reported as a parse failure.
    pub fn parse(url: &str, body: &Value) -> Result<Self, TransportError> {
        Envelope::deserialize(body).map_err(|e| TransportError::new(TransportErrorKind::Parse, url, e))
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS
    }

    pub fn data_as<T: DeserializeOwned>(&self, url: &str) -> Result<T, TransportError> {
        T::deserialize(&self.data).map_err(|e| TransportError::new(TransportErrorKind::Parse, url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_success_envelope() {
        let env = Envelope::parse("u", &json!({"code": 0, "data": {"instance_code": "IC123"}})).unwrap();
        assert!(env.is_success());
        assert_eq!(env.msg, "");
        assert_eq!(env.data["instance_code"], "IC123");
    }

    #[test]
    fn test_missing_code_is_parse_error() {
        let err = Envelope::parse("u", &json!({"msg": "hello"})).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Parse);
    }

    #[test]
    fn test_data_as_reports_shape_mismatch() {
        #[derive(Debug, Deserialize)]
        struct Created {
            #[allow(dead_code)]
            instance_code: String,
        }
        let env = Envelope::parse("u", &json!({"code": 0, "data": {}})).unwrap();
        assert!(env.data_as::<Created>("u").is_err());
    }
}
