//! Action runner - executes actions released by a confirmed save

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{AccountState, Action, MailboxEnvelope};
use crate::ports::MailboxPool;

/// A single action that failed without aborting the run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionFailure {
    pub action: &'static str,
    pub error: String,
}

/// Summary of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionReport {
    pub executed: usize,
    pub envelopes_sent: usize,
    pub failures: Vec<ActionFailure>,
}

/// Runs actions in queue order and posts what they dispatch
pub struct ActionRunner<'a> {
    mailbox: &'a dyn MailboxPool,
}

impl<'a> ActionRunner<'a> {
    pub fn new(mailbox: &'a dyn MailboxPool) -> Self {
        Self { mailbox }
    }

    /// Run every action once, purging each afterwards.
    ///
    /// A failure inside one action is recorded and the run continues. A
    /// failure of the mailbox itself aborts the run with `Fatal`.
    pub fn run<S: AccountState>(&self, actions: Vec<Box<dyn Action<S>>>) -> Result<ActionReport> {
        let mut report = ActionReport::default();

        for mut action in actions {
            let label = action.label();
            let outcome = self.run_one(action.as_mut(), &mut report);
            action.purge();

            match outcome {
                Ok(()) => report.executed += 1,
                Err(Error::AdapterFailure(msg)) => {
                    return Err(Error::fatal(format!("mailbox failed while running {label}: {msg}")));
                }
                Err(e) => {
                    warn!(action = label, error = %e, "action failed");
                    report.failures.push(ActionFailure {
                        action: label,
                        error: e.to_string(),
                    });
                }
            }
        }

        debug!(
            executed = report.executed,
            envelopes = report.envelopes_sent,
            failed = report.failures.len(),
            "actions run"
        );
        Ok(report)
    }

    fn run_one<S: AccountState>(
        &self,
        action: &mut dyn Action<S>,
        report: &mut ActionReport,
    ) -> Result<()> {
        action.process();
        for dispatch in action.dispatches()? {
            let envelope = MailboxEnvelope::wrap(&dispatch.influence, &dispatch.address)?;
            self.mailbox.add_envelope(envelope, &dispatch.address)?;
            report.envelopes_sent += 1;
        }
        Ok(())
    }
}
