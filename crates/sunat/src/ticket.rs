//! Ticket status envelope returned by the submissions endpoint.
//!
//! Field names on the wire are SUNAT's Spanish contract (`codRespuesta`,
//! `arcCdr`, ...); everything above the serde layer uses the crate's own
//! vocabulary.

use serde::{Deserialize, Serialize};

/// Classification of the `codRespuesta` field.
///
/// SUNAT documents three codes; anything else is carried through verbatim
/// as [`ResponseCode::Other`] so new server-side codes surface to the
/// caller instead of failing the decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseCode {
    /// "0" - processing finished, the receipt was accepted.
    Success,
    /// "98" - the ticket is still being processed.
    Processing,
    /// "99" - processing finished with an error.
    Error,
    /// Any other code, kept verbatim.
    Other(String),
}

impl From<String> for ResponseCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "0" => Self::Success,
            "98" => Self::Processing,
            "99" => Self::Error,
            _ => Self::Other(code),
        }
    }
}

impl From<ResponseCode> for String {
    fn from(code: ResponseCode) -> Self {
        match code {
            ResponseCode::Success => "0".to_string(),
            ResponseCode::Processing => "98".to_string(),
            ResponseCode::Error => "99".to_string(),
            ResponseCode::Other(raw) => raw,
        }
    }
}

/// Error block attached to a ticket that resolved with `codRespuesta` "99".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketError {
    #[serde(rename = "numError")]
    pub code: String,
    #[serde(rename = "desError")]
    pub detail: String,
}

/// Immutable status envelope for a submitted receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStatus {
    #[serde(rename = "codRespuesta")]
    pub response_code: ResponseCode,

    /// Present only on error outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TicketError>,

    /// Base64-encoded zip holding the CDR document, when one was generated.
    #[serde(default, rename = "arcCdr", skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,

    #[serde(
        default,
        rename = "indCdrGenerado",
        skip_serializing_if = "Option::is_none"
    )]
    pub cdr_generated: Option<bool>,
}

impl TicketStatus {
    pub fn is_success(&self) -> bool {
        self.response_code == ResponseCode::Success
    }

    pub fn is_processing(&self) -> bool {
        self.response_code == ResponseCode::Processing
    }

    pub fn is_error(&self) -> bool {
        self.response_code == ResponseCode::Error
    }

    /// True once further polling cannot change the outcome.
    pub fn is_terminal(&self) -> bool {
        !self.is_processing()
    }
}
