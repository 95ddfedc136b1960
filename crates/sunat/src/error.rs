//! Error kinds for the submission pipeline.

use std::path::PathBuf;

/// Failures surfaced while packaging, submitting, or resolving a receipt.
///
/// Every kind is terminal for the operation that raised it; nothing here is
/// retried internally. A ticket that is still processing is not an error,
/// it is a [`crate::resolver::PollOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Token exchange rejected or unreachable. Raised before anything is
    /// submitted. Transport causes are stripped of their request URL so the
    /// client id embedded in the token path stays out of logs.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The receipt file could not be read or archived.
    #[error("failed to package {}: {message}", .path.display())]
    Packaging { path: PathBuf, message: String },

    /// Digest or base64 rendering of the packaged archive failed.
    /// Distinct from [`Error::Packaging`] because it can occur after the
    /// archive itself was produced.
    #[error("failed to hash or encode packaged archive: {message}")]
    Hashing { message: String },

    /// Submission rejected, unreachable, or the response lacked a ticket
    /// number. Carries whatever body text the server sent; SUNAT embeds its
    /// diagnostics there.
    #[error("submission of {name} failed: {message}")]
    Submission { name: String, message: String },

    /// Ticket status request failed at the transport or HTTP layer.
    #[error("status request for ticket {ticket} failed: {message}")]
    StatusFetch { ticket: String, message: String },

    /// Ticket status arrived but the body does not match the envelope.
    /// Keeps the raw text so contract drift can be inspected; a decode
    /// failure on a 2xx response means the API changed, not the network.
    #[error("could not decode status for ticket {ticket}: {message}; raw response: {body}")]
    StatusParse {
        ticket: String,
        message: String,
        body: String,
    },
}

impl Error {
    /// Whether the failure happened before a ticket was created, so the
    /// caller knows nothing reached the remote queue.
    pub fn before_submission(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::Packaging { .. } | Self::Hashing { .. }
        )
    }
}
