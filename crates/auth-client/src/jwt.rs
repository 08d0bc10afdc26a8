//! Access-token claim decoding.
//!
//! Tokens are decoded, not verified: the payload segment is base64url JSON
//! and the signature is left to the servers that consume the token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

/// Claims namespace used by Hasura.
pub const HASURA_CLAIMS_NAMESPACE: &str = "https://hasura.io/jwt/claims";

const HASURA_CLAIM_PREFIX: &str = "x-hasura-";

/// Decoded JWT payload.
pub type JwtClaims = Map<String, Value>;

/// Decode the payload of `token`. Returns `None` for anything that is not a
/// three-segment JWT with a JSON object payload.
pub fn decode_claims(token: &str) -> Option<JwtClaims> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    // Some issuers pad their segments
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}

/// Hasura claims object inside decoded `claims`.
pub fn hasura_claims(claims: &JwtClaims) -> Option<&JwtClaims> {
    claims.get(HASURA_CLAIMS_NAMESPACE)?.as_object()
}

/// Full claim name, adding the `x-hasura-` prefix when missing.
pub fn hasura_claim_name(name: &str) -> String {
    if name.starts_with(HASURA_CLAIM_PREFIX) {
        name.to_string()
    } else {
        format!("{}{}", HASURA_CLAIM_PREFIX, name)
    }
}

/// Value of a Hasura claim as carried in the token: a string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HasuraClaim {
    Single(String),
    Many(Vec<String>),
}

impl HasuraClaim {
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(HasuraClaim::Single(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(HasuraClaim::Many),
            // Hasura claims are strings; anything else is rendered as JSON
            Value::Null => None,
            other => Some(HasuraClaim::Single(other.to_string())),
        }
    }
}
