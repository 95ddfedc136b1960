//! # Sunat
//!
//! A client for SUNAT's REST API for electronic receipts (CPE/GRE).
//!
//! Sunat packages an XML receipt the way the ingestion endpoint expects it,
//! submits it, and resolves the resulting ticket, saving the CDR proof or
//! the rejection detail that comes back. It is the plumbing between a file
//! on disk and a terminal answer from the tax authority.
//!
//! ## Features
//!
//! - **Deterministic packaging** — A receipt becomes a single-entry zip with
//!   a SHA-256 digest and base64 payload; the same file always produces the
//!   same bytes, so submissions are reproducible.
//! - **SOL authentication** — The OAuth2 password grant with the taxpayer's
//!   client pair and SOL user. Secret values never reach `Debug` output,
//!   logs, or error messages.
//! - **Ticket resolution** — Polling with a configurable attempt budget.
//!   Running out of attempts is an outcome, not an error.
//! - **Artifact persistence** — The CDR zip is verified (exactly one entry,
//!   no path traversal) before its content lands in the output directory;
//!   rejections are written as `{name}_error.txt`.
//! - **Layered configuration** — `~/.sunat/config.toml`, `SUNAT_*`
//!   environment variables, and CLI flags, later sources winning per value.
//!
//! ## Pipeline
//!
//! The core flow is **package → submit → resolve → persist**:
//!
//! 1. [`package::package`] turns the XML file into a [`package::PackagedReceipt`].
//! 2. [`client::ReceiptClient::connect`] authenticates and
//!    [`client::ReceiptClient::submit`] returns a ticket number.
//! 3. [`resolver::resolve`] polls the ticket under a [`poll::PollPolicy`]
//!    budget until it leaves the processing state.
//! 4. [`artifacts::ArtifactPersister`] extracts the CDR or records the
//!    rejection detail.
//!
//! ## Example
//!
//! ```ignore
//! use std::path::Path;
//!
//! use sunat::artifacts::ArtifactPersister;
//! use sunat::client::ReceiptClient;
//! use sunat::config::SunatConfig;
//! use sunat::report::SilentReporter;
//! use sunat::resolver::{self, PollOutcome};
//!
//! let config = SunatConfig::load()?.unwrap_or_default();
//! let client = ReceiptClient::connect(&config.endpoints(), &config.require_credentials()?)?;
//!
//! let receipt = sunat::package::package(Path::new("factura_001.xml"))?;
//! let ticket = client.submit(&receipt)?;
//!
//! let mut reporter = SilentReporter;
//! match resolver::resolve(&client, &ticket, &config.poll, &mut reporter)? {
//!     PollOutcome::Resolved(status) => {
//!         ArtifactPersister::new(".", None).save_certificate(&status, &mut reporter)?;
//!     }
//!     PollOutcome::StillProcessing { .. } => println!("check again later: {ticket}"),
//! }
//! ```
//!
//! ## Key Types
//!
//! - `PackagedReceipt` — Archive bytes plus digest and payload, ready to submit
//! - `ReceiptClient` — Authenticated session over the ingestion API
//! - `TicketStatus` — Decoded status envelope (`codRespuesta`, error, CDR)
//! - `PollOutcome` — `Resolved` or `StillProcessing` after polling
//! - `SunatConfig` — File, environment, and flag configuration merged per value
//! - `Error` — Pipeline error kinds, split by the phase that failed
//!
//! ## Modules
//!
//! - [`package`] — Zip, hash, and encode a receipt file
//! - [`auth`] — SOL credentials and token acquisition
//! - [`client`] — HTTP client for submission and status fetch
//! - [`ticket`] — Wire types for the status envelope
//! - [`resolver`] — Polling loop over the attempt budget
//! - [`artifacts`] — CDR extraction and error-detail persistence
//! - [`config`] — Config file loading, env overrides, and validation
//! - [`report`] — `Reporter` trait for human-facing diagnostics
//! - [`error`] — Typed error kinds for the pipeline
//!
//! ## CLI Usage
//!
//! For command-line usage, see the [sunat-cli crate](https://crates.io/crates/sunat-cli).

/// CDR extraction and error-detail persistence.
pub mod artifacts;

/// SOL credentials and token acquisition.
pub mod auth;

/// HTTP client for submission and status fetch.
pub mod client;

/// Config file loading, env overrides, and validation.
pub mod config;

/// Typed error kinds for the pipeline.
pub mod error;

/// Zip, hash, and encode a receipt file.
pub mod package;

/// Polling schedules and attempt budgets.
/// Re-exported from the sunat-poll microcrate.
pub use sunat_poll as poll;

/// `Reporter` trait for human-facing diagnostics.
pub mod report;

/// Polling loop over the attempt budget.
pub mod resolver;

/// Wire types for the status envelope.
pub mod ticket;

pub use error::Error;
