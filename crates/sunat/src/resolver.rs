//! Ticket resolution by polling.
//!
//! SUNAT processes submissions asynchronously, so a ticket has to be checked
//! until it leaves state `98`. [`resolve`] runs that loop under a
//! [`PollPolicy`] budget. Running out of attempts is an ordinary outcome,
//! not an error; only transport and decode failures abort the loop.

use std::thread;

use sunat_poll::PollPolicy;

use crate::client::ReceiptClient;
use crate::error::Error;
use crate::report::Reporter;
use crate::ticket::TicketStatus;

/// What polling ended with.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The ticket reached a terminal state.
    Resolved(TicketStatus),
    /// The ticket was still processing when polling stopped.
    StillProcessing {
        status: TicketStatus,
        /// True when the attempt budget ran out; false for a single check
        /// done outside the loop.
        attempts_exhausted: bool,
    },
}

impl PollOutcome {
    /// Classifies a status fetched once, outside the polling loop.
    pub fn from_single_check(status: TicketStatus) -> Self {
        if status.is_processing() {
            PollOutcome::StillProcessing {
                status,
                attempts_exhausted: false,
            }
        } else {
            PollOutcome::Resolved(status)
        }
    }

    /// The last status observed, terminal or not.
    pub fn status(&self) -> &TicketStatus {
        match self {
            PollOutcome::Resolved(status) => status,
            PollOutcome::StillProcessing { status, .. } => status,
        }
    }
}

/// Polls `ticket` until it resolves or the policy's budget runs out.
///
/// Sleeps `initial_delay` before the first check and `interval` between the
/// rest. At least one check happens even under a zero budget, so a ticket
/// that already resolved is always noticed.
pub fn resolve(
    client: &ReceiptClient,
    ticket: &str,
    policy: &PollPolicy,
    reporter: &mut dyn Reporter,
) -> Result<PollOutcome, Error> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let status = client.fetch_status(ticket)?;
        if status.is_terminal() {
            return Ok(PollOutcome::Resolved(status));
        }

        if !policy.allows(attempt + 1) {
            reporter.warn(&format!(
                "ticket {ticket} still processing after {attempt} checks; stopping"
            ));
            return Ok(PollOutcome::StillProcessing {
                status,
                attempts_exhausted: true,
            });
        }

        reporter.info(&format!(
            "ticket {ticket} still processing (check {attempt}/{})",
            policy.max_attempts
        ));
    }
}
