//! Wire models for the AEP management API
//!
//! Collections are arbitrarily nested documents and stay `serde_json::Value`
//! at the transport layer; only the pieces the provisioner inspects get a
//! typed view. Key names follow the device's camelCase.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// State of the admin-password-setting handshake at the `commissioning`
/// endpoint. Every field is optional: the device omits `aasType`/`aasMsg`
/// on quiet rounds, and a fresh probe may carry only the challenge id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommissioningState {
    #[serde(rename = "aasID", default)]
    pub aas_id: Option<String>,

    #[serde(rename = "aasType", default)]
    pub aas_type: Option<String>,

    #[serde(rename = "aasMsg", default)]
    pub aas_msg: Option<String>,

    #[serde(flatten)]
    pub extra: Value,
}

/// One round of the password handshake, POSTed to `commissioning`.
#[derive(Debug, Clone, Serialize)]
pub struct CommissioningAnswer {
    pub username: String,

    #[serde(rename = "aasID")]
    pub aas_id: String,

    #[serde(rename = "aasAnswer")]
    pub aas_answer: String,
}

/// The `ssh` sub-object of the `remoteAccess` collection. Read for the
/// needs-change predicate; mutations go back into the original document so
/// sibling keys survive the round trip.
#[derive(Debug, Clone, Deserialize)]
pub struct SshSettings {
    pub enabled: bool,
    pub lan: bool,
    pub wan: bool,
    pub port: u16,
}

/// Read-only view of the `system` collection.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemInfo {
    #[serde(rename = "productId", default)]
    pub product_id: Option<String>,

    #[serde(flatten)]
    pub extra: Value,
}

/// Identity derived from the device's `productId`, fixed for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductIdentity {
    pub product_id: String,
    pub product_type: String,
}

impl ProductIdentity {
    /// `"MTCDT-L4N1-247A"` → id `mtcdt-l4n1-247a`, type `mtcdt`.
    pub fn from_product_id(raw: &str) -> Self {
        let product_id = raw.to_lowercase();
        let product_type = product_id
            .split('-')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            product_id,
            product_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_identity_derivation() {
        let id = ProductIdentity::from_product_id("mtcdt-l4n1-247a");
        assert_eq!(id.product_type, "mtcdt");
        assert_eq!(id.product_id, "mtcdt-l4n1-247a");
    }

    #[test]
    fn product_identity_casefolds() {
        let id = ProductIdentity::from_product_id("MTCDT-L4N1-247A");
        assert_eq!(id.product_type, "mtcdt");
        assert_eq!(id.product_id, "mtcdt-l4n1-247a");
    }

    #[test]
    fn product_identity_without_dash() {
        let id = ProductIdentity::from_product_id("mtcap");
        assert_eq!(id.product_type, "mtcap");
        assert_eq!(id.product_id, "mtcap");
    }

    #[test]
    fn commissioning_state_uses_device_key_casing() {
        let state: CommissioningState = serde_json::from_value(json!({
            "aasID": "challenge-1",
            "aasType": "info",
            "aasMsg": "password accepted",
            "somethingElse": 42
        }))
        .unwrap();
        assert_eq!(state.aas_id.as_deref(), Some("challenge-1"));
        assert_eq!(state.aas_type.as_deref(), Some("info"));
        assert_eq!(state.aas_msg.as_deref(), Some("password accepted"));
    }

    #[test]
    fn commissioning_answer_serializes_device_keys() {
        let answer = CommissioningAnswer {
            username: "mtadm".into(),
            aas_id: "challenge-1".into(),
            aas_answer: "secret".into(),
        };
        let doc = serde_json::to_value(&answer).unwrap();
        assert_eq!(
            doc,
            json!({"username": "mtadm", "aasID": "challenge-1", "aasAnswer": "secret"})
        );
    }

    #[test]
    fn ssh_settings_parse_from_remote_access() {
        let ssh: SshSettings = serde_json::from_value(json!({
            "enabled": true, "lan": true, "wan": false, "port": 22, "via": "lan"
        }))
        .unwrap();
        assert!(ssh.enabled && ssh.lan && !ssh.wan);
        assert_eq!(ssh.port, 22);
    }
}
