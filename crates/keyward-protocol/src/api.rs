use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of every non-2xx daemon response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Returned by `GET /v1/version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
}

// ---------------------------------------------------------------------------
// Keypairs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeypairKind {
    Signing,
    Encryption,
}

impl KeypairKind {
    pub const ALL: [KeypairKind; 2] = [KeypairKind::Signing, KeypairKind::Encryption];
}

impl fmt::Display for KeypairKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeypairKind::Signing => write!(f, "signing"),
            KeypairKind::Encryption => write!(f, "encryption"),
        }
    }
}

/// Body of `POST /v1/keypairs/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateKeypairsRequest {
    pub org_id: String,
}

/// Public half of a freshly generated keypair (base64 SEC1 encoding).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeypair {
    pub kind: KeypairKind,
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedKeypairs {
    pub org_id: String,
    pub keypairs: Vec<PublicKeypair>,
}
