//! Interactive read loop
//!
//! Reads one line at a time, stops on `exit` (any letter case) or end of
//! input, and dispatches every other line as a single query against a
//! fixed session. A blank line reaches the dispatcher as an empty query and
//! gets its "no queries" notice.

use std::io::{BufRead, Write};

use anyhow::Result;

use super::console::Console;
use crate::dispatcher::SessionDispatcher;

/// Input that ends the loop
pub const EXIT_COMMAND: &str = "exit";

/// Counters for one interactive run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplSummary {
    /// Lines dispatched to the runtime
    pub turns: usize,
    /// Lines skipped because the session could not be resolved
    pub failed_resolutions: usize,
}

/// Check whether a line is the exit sentinel
pub fn is_exit(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(EXIT_COMMAND)
}

/// Run the read-dispatch loop until `exit` or end of input.
///
/// Session resolution failures are reported and the loop keeps reading.
/// Runtime failures end the loop with an error.
pub async fn run_repl<R, W>(
    input: R,
    console: &mut Console<W>,
    dispatcher: &SessionDispatcher,
    session_id: &str,
) -> Result<ReplSummary>
where
    R: BufRead,
    W: Write + Send,
{
    let mut lines = input.lines();
    let mut summary = ReplSummary::default();

    loop {
        console.prompt()?;

        let Some(line) = lines.next() else {
            console.println()?;
            break;
        };
        let line = line?;
        let query = line.trim();

        if is_exit(query) {
            console.print_system("Ending conversation")?;
            break;
        }

        let session = match dispatcher.resolve_session(session_id).await {
            Ok(session) => session,
            Err(e) => {
                console.print_system(&e.to_string())?;
                summary.failed_resolutions += 1;
                continue;
            }
        };

        let dispatched = dispatcher.dispatch(&session, query, console).await?;
        if dispatched.submitted > 0 {
            summary.turns += 1;
        }
    }

    tracing::info!(
        "Interactive loop finished after {} turns ({} failed resolutions)",
        summary.turns,
        summary.failed_resolutions
    );

    Ok(summary)
}
