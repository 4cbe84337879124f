//! Token signing for the Tinkoff Acquiring API.
//!
//! Every request to the gateway, and every notification it sends back, carries a `Token`
//! derived from a subset of the message's top-level fields plus the terminal password:
//!
//! 1. Select the sign-relevant fields for the operation (see [`SignOperation`]).
//! 2. Add the password as a same-level field named `Password`.
//! 3. Sort by field name (byte-wise) and concatenate the *values* with no separator.
//! 4. SHA-256 the UTF-8 bytes and render as lowercase hex.
//!
//! `Token` itself never participates, so re-signing an already signed message reproduces the
//! same digest.
//!
//! ```
//! use tourpay::payments::signature::{self, FieldValue, SignOperation};
//!
//! let token = signature::sign(
//!     SignOperation::GetState,
//!     [("TerminalKey", FieldValue::from("TK1")), ("PaymentId", FieldValue::from(42_i64))],
//!     "pwd",
//! )
//! .unwrap();
//! assert_eq!(token.len(), 64);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Name of the signature field in requests and notifications.
pub const TOKEN_FIELD: &str = "Token";

/// Name under which the terminal password joins the signed fields.
pub const PASSWORD_FIELD: &str = "Password";

/// A scalar field value as it takes part in signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Bool(bool),
}

impl FieldValue {
    /// Convert a JSON scalar. Objects, arrays and nulls do not take part in signing.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::Number(n) => Some(n.as_i64().map(FieldValue::Integer).unwrap_or_else(|| FieldValue::Text(n.to_string()))),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Gateway operation whose sign-relevant field set should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignOperation {
    /// `POST /Init`
    Init,
    /// `POST /GetState`
    GetState,
    /// `POST /Cancel`
    Cancel,
    /// Inbound payment status notification
    Notification,
}

#[derive(Debug, Clone, Copy)]
struct SignField {
    name: &'static str,
    required: bool,
}

const fn required(name: &'static str) -> SignField {
    SignField { name, required: true }
}

const fn optional(name: &'static str) -> SignField {
    SignField { name, required: false }
}

const INIT_FIELDS: &[SignField] = &[required("Amount"), required("Description"), required("OrderId"), required("TerminalKey")];
const GET_STATE_FIELDS: &[SignField] = &[required("PaymentId"), required("TerminalKey")];
const CANCEL_FIELDS: &[SignField] = &[optional("Amount"), required("PaymentId"), required("TerminalKey")];

enum FieldSelection {
    /// Only the listed fields are signed.
    Listed(&'static [SignField]),
    /// Every top-level scalar field is signed.
    AllScalars,
}

impl SignOperation {
    fn selection(self) -> FieldSelection {
        match self {
            SignOperation::Init => FieldSelection::Listed(INIT_FIELDS),
            SignOperation::GetState => FieldSelection::Listed(GET_STATE_FIELDS),
            SignOperation::Cancel => FieldSelection::Listed(CANCEL_FIELDS),
            SignOperation::Notification => FieldSelection::AllScalars,
        }
    }

    /// Whether a field with this name takes part in the signature.
    pub fn signs(self, name: &str) -> bool {
        if name == TOKEN_FIELD || name == PASSWORD_FIELD {
            return false;
        }
        match self.selection() {
            FieldSelection::Listed(fields) => fields.iter().any(|f| f.name == name),
            FieldSelection::AllScalars => true,
        }
    }

    fn required_fields(self) -> impl Iterator<Item = &'static str> {
        let listed: &'static [SignField] = match self.selection() {
            FieldSelection::Listed(fields) => fields,
            FieldSelection::AllScalars => &[],
        };
        listed.iter().filter(|f| f.required).map(|f| f.name)
    }
}

impl fmt::Display for SignOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignOperation::Init => "Init",
            SignOperation::GetState => "GetState",
            SignOperation::Cancel => "Cancel",
            SignOperation::Notification => "Notification",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("{operation} signature requires field {field}")]
    MissingField { operation: SignOperation, field: &'static str },
}

/// Compute the token for `fields` under `operation`.
///
/// Fields outside the operation's sign-relevant set are dropped, as are any `Token` or
/// `Password` entries supplied by the caller. Iteration order of `fields` is irrelevant.
pub fn sign<K, I>(operation: SignOperation, fields: I, password: &str) -> Result<String, SignatureError>
where
    K: AsRef<str>,
    I: IntoIterator<Item = (K, FieldValue)>,
{
    let mut selected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in fields {
        let name = name.as_ref();
        if operation.signs(name) {
            selected.insert(name.to_string(), value.to_string());
        }
    }

    if let Some(field) = operation.required_fields().find(|f| !selected.contains_key(*f)) {
        return Err(SignatureError::MissingField { operation, field });
    }

    selected.insert(PASSWORD_FIELD.to_string(), password.to_string());

    let mut hasher = Sha256::new();
    for value in selected.values() {
        hasher.update(value.as_bytes());
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compute the token over the top-level scalar fields of a JSON object.
pub fn sign_json(operation: SignOperation, object: &Map<String, Value>, password: &str) -> Result<String, SignatureError> {
    let fields = object
        .iter()
        .filter_map(|(name, value)| FieldValue::from_json(value).map(|v| (name.as_str(), v)));
    sign(operation, fields, password)
}

/// Compare a supplied token to the expected one in constant time.
pub fn tokens_match(expected: &str, supplied: &str) -> bool {
    let (a, b) = (expected.as_bytes(), supplied.as_bytes());
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
