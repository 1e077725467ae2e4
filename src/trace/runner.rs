use anyhow::{anyhow, bail, Context, Result};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::lookup::GeoLookup;
use crate::trace::parser::{Dialect, GeoLookupFn};
use crate::trace::session::{CompleteFn, HopFn};

/// Runs the platform trace utility and streams parsed hops as they arrive
pub struct CommandRunner {
    dialect: Dialect,
}

impl CommandRunner {
    /// Runner for the build platform's trace utility
    pub fn native() -> Self {
        Self {
            dialect: Dialect::native(),
        }
    }

    /// Runner for an explicit dialect
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Spawn the trace utility for `target` and forward each parsed hop.
    ///
    /// The header line resolves the destination address used to flag the
    /// final hop; unparsable lines are skipped. Cancellation kills the
    /// child and suppresses the completion callback. A failed exit is
    /// reported with the captured stderr appended.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        target: &str,
        geo: Option<&GeoLookup>,
        on_hop: &HopFn,
        on_complete: CompleteFn,
    ) -> Result<()> {
        let dialect = self.dialect;

        let mut child = Command::new(dialect.command())
            .args(dialect.args())
            .arg(target)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start {} for {target}", dialect.command()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout pipe unavailable"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr pipe unavailable"))?;
        let mut lines = BufReader::new(stdout).lines();

        let lookup = geo.map(|g| move |ip: &str| g.locate(ip));
        let lookup_fn: Option<GeoLookupFn> = match &lookup {
            Some(f) => Some(f),
            None => None,
        };

        let mut destination_ip = String::new();
        let mut hop_count = 0usize;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Stop the child promptly; any remaining output is dropped
                    let _ = child.kill().await;
                    bail!("trace cancelled");
                }
                line = lines.next_line() => {
                    let Some(line) = line.context("failed to read trace output")? else {
                        break;
                    };

                    if line.starts_with(dialect.header_prefix()) {
                        destination_ip = dialect.parse_destination(&line);
                        continue;
                    }
                    if dialect.is_noise(&line) {
                        continue;
                    }

                    if let Some(hop) = dialect.parse_hop_line(&line, &destination_ip, lookup_fn) {
                        hop_count += 1;
                        on_hop(hop);
                    }
                }
            }
        }

        // Stdout is closed, so the child is exiting; collect diagnostics
        let mut diagnostics = String::new();
        let _ = stderr.read_to_string(&mut diagnostics).await;

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                bail!("trace cancelled");
            }
            status = child.wait() => {
                status.with_context(|| format!("failed to wait for {}", dialect.command()))?
            }
        };

        if !status.success() {
            let diagnostics = diagnostics.trim();
            if diagnostics.is_empty() {
                bail!("{} failed: {status}", dialect.command());
            }
            bail!("{} failed: {status}: {diagnostics}", dialect.command());
        }

        on_complete(hop_count);
        Ok(())
    }
}
