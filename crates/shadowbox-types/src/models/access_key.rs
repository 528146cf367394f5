//! Access key model: the credential an end user redeems via a SIP002 URL.

use serde::{Deserialize, Serialize};

/// The only cipher issued to newly created keys. Legacy values loaded from
/// disk are preserved verbatim, so this is not an exhaustive
/// enum of ciphers the proxy can run — just the one this server writes.
pub const DEFAULT_ENCRYPTION_METHOD: &str = "chacha20-ietf-poly1305";

/// A data-transfer cap, in bytes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataLimit {
    pub bytes: u64,
}

/// An access key as persisted in `shadowbox_config.json`.
///
/// Invariants (enforced by the repository, not by this type): `id` is unique
/// and never reused; `metrics_id` is unique and stable for the key's
/// lifetime and never derivable from `id`; `port` never changes once chosen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessKey {
    pub id: String,
    pub metrics_id: String,
    pub name: String,
    pub password: String,
    pub port: u16,
    pub encryption_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_limit: Option<DataLimit>,
}

impl AccessKey {
    /// Build the SIP002 `ss://` URI for this key, tagged `outline=1`.
    ///
    /// `ss://base64(method:password)@host:port/?outline=1#name`
    pub fn access_url(&self, hostname: &str) -> String {
        use base64::Engine as _;
        use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

        let userinfo = format!("{}:{}", self.encryption_method, self.password);
        let encoded = base64::engine::general_purpose::STANDARD_NO_PAD.encode(userinfo);
        let name = utf8_percent_encode(&self.name, NON_ALPHANUMERIC);
        format!("ss://{encoded}@{hostname}:{port}/?outline=1#{name}", port = self.port)
    }
}

/// The access-key document persisted to `shadowbox_config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessKeyDocument {
    #[serde(default)]
    pub access_keys: Vec<AccessKey>,
    #[serde(default)]
    pub next_id: u64,
}
