// bcli/src/driver.rs

//! The serialized request dispatcher.
//!
//! Every request - warm-up probe included - flows through a single
//! `mpsc` channel consumed by one Tokio task running a plain
//! `while let Some(req) = rx.recv().await` loop. That loop *is* the
//! single-flight, FIFO-ordered queue: there is never more than one
//! `bitcoin-cli` child alive at a time, and nothing but the channel's
//! own ordering decides who goes next, so there's no separate queue
//! data structure or running-flag to keep in sync with it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use bcli_config::Config;

use crate::anchor::{Anchor, WeakAnchor};
use crate::db::{Database, NoopDatabase};
use crate::error::BcliError;
use crate::parse;
use crate::spawn;
use wire::BlockId;

/// One dispatched unit of work: the argv to run, the anchor that must
/// still be live for the result to matter, and the closure that turns
/// raw [`spawn::ChildOutput`] into the caller's typed result.
struct PendingRequest {
    command: String,
    args: Vec<String>,
    anchor: WeakAnchor,
    finish: Box<dyn FnOnce(Result<spawn::ChildOutput, BcliError>) + Send>,
    /// Retry the same request (accumulating toward the error-streak
    /// window) on a non-zero exit instead of delivering it straight to
    /// the caller. `true` for operations the spec marks "allow nonzero
    /// exit: no" (`estimatesmartfee`, `getblockcount`, the plain-form
    /// `getblock`) - a non-zero exit there is always a transient fault,
    /// never a meaningful result. `false` for `sendrawtransaction`,
    /// `getblockhash`, and the verbose `getblock`/`gettxout` pair used
    /// by `get_output`, where a non-zero exit is itself the answer
    /// ("rejected", "no such block", "no such output").
    retry_on_nonzero: bool,
}

/// Shared state behind every clone of a [`BcliDriver`]. `shutdown_flag`
/// is set either explicitly (`BcliDriver::shutdown`) or implicitly, the
/// moment the last clone goes out of scope.
struct Inner {
    tx: mpsc::UnboundedSender<PendingRequest>,
    shutdown_flag: Arc<AtomicBool>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
    }
}

/// Handle to the running dispatch loop. Cloning it is cheap; every
/// clone shares the same single-flight queue. Once every clone is
/// dropped (or [`BcliDriver::shutdown`] is called), the dispatch loop
/// stops picking up new work and suppresses delivery of whatever was
/// already in flight.
#[derive(Clone)]
pub struct BcliDriver {
    inner: Arc<Inner>,
}

impl BcliDriver {
    /// Spawn the dispatch task and probe `bitcoin-cli` for
    /// availability before returning. The probe runs `echo` in a loop:
    /// exit code 28 ("still warming up") is retried after
    /// `retry_interval_ms`, logged once on first occurrence; any other
    /// non-zero exit is fatal, since it means the binary or its
    /// arguments are wrong and no amount of waiting will fix that.
    ///
    /// Every delivered result fires inside a no-op [`NoopDatabase`]
    /// bracket. Hosts with real storage to keep in sync should use
    /// [`BcliDriver::start_with_database`] instead.
    pub async fn start(config: Config) -> Result<Self, BcliError> {
        Self::start_with_database(config, Arc::new(NoopDatabase)).await
    }

    /// Like [`BcliDriver::start`], but every delivered result is
    /// wrapped in `database.begin_transaction()` /
    /// `database.commit_transaction()`, so a host with its own storage
    /// can keep it consistent with what the driver hands back.
    pub async fn start_with_database(
        config: Config,
        database: Arc<dyn Database>,
    ) -> Result<Self, BcliError> {
        let binary = config.chain.cli_binary.clone();
        let base_args = base_args(&config);
        let retry_interval = Duration::from_millis(config.driver.retry_interval_ms);
        let initial_capacity = config.driver.initial_output_capacity;

        probe_warm_up(&binary, &base_args, retry_interval, initial_capacity).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        tokio::spawn(dispatch_loop(
            rx,
            binary,
            base_args,
            Duration::from_secs(config.driver.error_window_secs),
            retry_interval,
            initial_capacity,
            shutdown_flag.clone(),
            database,
        ));

        Ok(BcliDriver {
            inner: Arc::new(Inner { tx, shutdown_flag }),
        })
    }

    /// Stop accepting new work. Queued-but-undispatched requests
    /// resolve to `BcliError::Cancelled`; whatever request is currently
    /// in flight still runs its child to completion and is reaped
    /// normally, but its result is discarded rather than delivered.
    /// Every clone of this handle shares the same flag, so calling this
    /// on one clone shuts the whole driver down.
    pub fn shutdown(&self) {
        self.inner.shutdown_flag.store(true, Ordering::SeqCst);
    }

    /// Estimate the feerate, in sat/kw, needed to confirm within each of
    /// `targets[i]` blocks under `modes[i]`. One logical request chains
    /// `targets.len()` serial `estimatesmartfee` invocations - the
    /// caller sees a single result covering every target, in order.
    /// A target with no estimate yet reports `0` for that slot.
    ///
    /// `anchor` is taken by value, like a `CancellationToken`: pass
    /// `anchor.clone()` to keep your own copy alive elsewhere. Each
    /// chained call only needs it long enough to register a weak
    /// reference with the dispatch loop, so dropping every other copy
    /// of the anchor cancels the whole chain the next time it's polled.
    pub async fn estimate_fees(
        &self,
        anchor: Anchor,
        targets: &[u32],
        modes: &[parse::EstimateMode],
    ) -> Result<Vec<u64>, BcliError> {
        let mut results = Vec::with_capacity(targets.len());
        for (&target, &mode) in targets.iter().zip(modes.iter()) {
            let sat_per_kw = self
                .call(
                    anchor.clone(),
                    "estimatesmartfee",
                    vec![target.to_string(), mode.as_arg().to_string()],
                    true,
                    |out| parse::process_estimatefee("estimatesmartfee", &out.output),
                )
                .await?;
            results.push(sat_per_kw);
        }
        Ok(results)
    }

    /// Broadcast a raw transaction. The node's exit status and whatever
    /// it printed are both handed back unmodified - a rejection is
    /// reported via non-zero exit, not retried, and not turned into an
    /// error: it's the normal way a relay rejection reaches the caller.
    pub async fn send_rawtx(
        &self,
        anchor: Anchor,
        raw_tx_hex: String,
    ) -> Result<parse::SendRawTxOutcome, BcliError> {
        self.call(
            anchor,
            "sendrawtransaction",
            vec![raw_tx_hex],
            false,
            |out| {
                Ok(parse::SendRawTxOutcome {
                    exit_code: out.exit_code,
                    output: out.output.trim().to_string(),
                })
            },
        )
        .await
    }

    /// Look up the block hash at `height`. A non-zero exit (height past
    /// the tip) is not an error - it's Core's way of saying "no such
    /// block", reported here as `Ok(None)`.
    pub async fn get_block_hash(&self, anchor: Anchor, height: u32) -> Result<Option<BlockId>, BcliError> {
        self.call(
            anchor,
            "getblockhash",
            vec![height.to_string()],
            false,
            |out| {
                if out.exit_code != 0 {
                    return Ok(None);
                }
                parse::process_getblockhash("getblockhash", &out.output).map(Some)
            },
        )
        .await
    }

    /// The current chain height.
    pub async fn get_block_count(&self, anchor: Anchor) -> Result<u32, BcliError> {
        self.call(anchor, "getblockcount", vec![], true, |out| {
            parse::process_getblockcount("getblockcount", &out.output)
        })
        .await
    }

    /// The raw transaction bytes of an on-chain transaction, via a
    /// block lookup rather than the wallet-indexed `gettransaction`.
    pub async fn get_raw_block(&self, anchor: Anchor, block: &BlockId) -> Result<bitcoin::Block, BcliError> {
        let hash_hex = block_hash_hex(block);
        let hex_out = self
            .call(
                anchor,
                "getblock",
                vec![hash_hex, "0".to_string()],
                true,
                |out| Ok(out.output.trim().to_string()),
            )
            .await?;
        let bytes = hex::decode(&hex_out).map_err(|e| BcliError::Protocol {
            command: "getblock".to_string(),
            detail: format!("bad block hex: {e}"),
        })?;
        bitcoin::consensus::deserialize(&bytes).map_err(|e| BcliError::Protocol {
            command: "getblock".to_string(),
            detail: format!("failed to decode block: {e}"),
        })
    }

    /// Look up a still-unspent output by walking `height` -> block
    /// hash -> the block's transaction list -> the output itself.
    /// Any of the three steps reporting "not found" is reported back
    /// as `Ok(None)` rather than an error, since a spent or
    /// never-existed output is an expected outcome, not a bug.
    pub async fn get_output(
        &self,
        anchor: Anchor,
        height: u32,
        tx_index: usize,
        vout: u32,
    ) -> Result<Option<parse::TxOut>, BcliError> {
        let Some(block_hash) = self.get_block_hash(anchor.clone(), height).await? else {
            return Ok(None);
        };
        let hash_hex = block_hash_hex(&block_hash);

        let txid = self
            .call(
                anchor.clone(),
                "getblock",
                vec![hash_hex, "1".to_string()],
                false,
                move |out| {
                    if out.exit_code != 0 {
                        return Ok(None);
                    }
                    parse::process_getblock_tx("getblock", &out.output, tx_index)
                },
            )
            .await?;
        let Some(txid) = txid else {
            return Ok(None);
        };

        let result = self
            .call(
                anchor,
                "gettxout",
                vec![txid, vout.to_string()],
                false,
                |out| {
                    if out.exit_code != 0 || out.output.trim() == "null" || out.output.trim().is_empty() {
                        return Ok(None);
                    }
                    parse::process_gettxout("gettxout", &out.output).map(Some)
                },
            )
            .await?;
        Ok(result)
    }

    /// Build and enqueue one request. This is deliberately synchronous:
    /// it only needs `anchor` to take a weak snapshot of it, which
    /// drops `anchor` itself the moment that snapshot is taken. So the
    /// returned receiver carries no borrow of (or even a strong ref
    /// to) the anchor at all - whatever copies the caller kept
    /// elsewhere are the only thing keeping the request "live" from
    /// the dispatch loop's point of view.
    fn dispatch<T, F>(
        &self,
        anchor: Anchor,
        command: &str,
        args: Vec<String>,
        retry_on_nonzero: bool,
        finish: F,
    ) -> oneshot::Receiver<Result<T, BcliError>>
    where
        T: Send + 'static,
        F: FnOnce(spawn::ChildOutput) -> Result<T, BcliError> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let request = PendingRequest {
            command: command.to_string(),
            args,
            anchor: anchor.weak(),
            finish: Box::new(move |raw| {
                let mapped = raw.and_then(|out| finish(out));
                let _ = result_tx.send(mapped);
            }),
            retry_on_nonzero,
        };

        // An error here means the dispatch task is gone (driver shut
        // down); the receiver is simply dropped with nothing ever
        // sent, which `result_rx.await` below turns into `Cancelled`.
        let _ = self.inner.tx.send(request);

        result_rx
    }

    /// Dispatch one request and await its completion. `retry_on_nonzero`
    /// controls whether a non-zero, uncaptured exit is treated as
    /// transient (retried until the error-streak window elapses) or
    /// delivered straight to the caller as the command's result.
    async fn call<T, F>(
        &self,
        anchor: Anchor,
        command: &str,
        args: Vec<String>,
        retry_on_nonzero: bool,
        finish: F,
    ) -> Result<T, BcliError>
    where
        T: Send + 'static,
        F: FnOnce(spawn::ChildOutput) -> Result<T, BcliError> + Send + 'static,
    {
        let result_rx = self.dispatch(anchor, command, args, retry_on_nonzero, finish);
        result_rx.await.unwrap_or(Err(BcliError::Cancelled))
    }
}

fn base_args(config: &Config) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(network) = config.chain.network_arg() {
        args.push(network);
    }
    if let Some(datadir) = config.chain.datadir_arg() {
        args.push(datadir);
    }
    args
}

fn block_hash_hex(block: &BlockId) -> String {
    let mut bytes = *block.as_bytes();
    bytes.reverse();
    hex::encode(bytes)
}

async fn probe_warm_up(
    binary: &PathBuf,
    base_args: &[String],
    retry_interval: Duration,
    initial_capacity: usize,
) -> Result<(), BcliError> {
    let mut logged = false;
    loop {
        let mut args = base_args.to_vec();
        args.push("echo".to_string());
        let out = spawn::run(binary, &args, initial_capacity).await?;
        match out.exit_code {
            0 => return Ok(()),
            28 => {
                if !logged {
                    tracing::info!("bitcoin-cli is still warming up, waiting");
                    logged = true;
                }
                tokio::time::sleep(retry_interval).await;
            }
            code => {
                return Err(BcliError::Exec {
                    command: "echo".to_string(),
                    reason: format!("warm-up probe failed with exit code {code}: {}", out.output),
                });
            }
        }
    }
}

async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<PendingRequest>,
    binary: PathBuf,
    base_args: Vec<String>,
    error_window: Duration,
    retry_interval: Duration,
    initial_capacity: usize,
    shutdown_flag: Arc<AtomicBool>,
    database: Arc<dyn Database>,
) {
    let mut streak_started: Option<Instant> = None;
    let mut streak_attempts: u32 = 0;

    // Every completion reaches its caller inside this bracket. Shutdown
    // suppresses the bracket along with the delivery it would have wrapped.
    let deliver = |request: PendingRequest, result: Result<spawn::ChildOutput, BcliError>| {
        database.begin_transaction();
        (request.finish)(result);
        database.commit_transaction();
    };

    while let Some(request) = rx.recv().await {
        if shutdown_flag.load(Ordering::SeqCst) {
            // Shutting down: drop the request without ever sending on
            // its oneshot channel, so the caller's awaited `call` sees
            // `Cancelled` rather than hanging.
            continue;
        }
        if !request.anchor.is_live() {
            // Caller already gone; still nothing to run, so just drop
            // the request without touching the streak state.
            continue;
        }

        let mut args = base_args.clone();
        args.push(request.command.clone());
        args.extend(request.args.iter().cloned());

        loop {
            let outcome = spawn::run(&binary, &args, initial_capacity).await;
            bcli_metrics::record_request(&request.command);

            let out = match outcome {
                Ok(out) => out,
                Err(err) => {
                    bcli_metrics::record_failure(&request.command);
                    if !shutdown_flag.load(Ordering::SeqCst) {
                        deliver(request, Err(err));
                    }
                    break;
                }
            };

            if shutdown_flag.load(Ordering::SeqCst) {
                // The child already ran to completion and was reaped
                // above; shutting down only suppresses delivery.
                break;
            }

            if out.exit_code == 0 {
                streak_started = None;
                streak_attempts = 0;
                bcli_metrics::set_error_streak_seconds(0);
                deliver(request, Ok(out));
                break;
            }

            bcli_metrics::record_failure(&request.command);

            if !request.retry_on_nonzero {
                deliver(request, Ok(out));
                break;
            }

            let started = *streak_started.get_or_insert_with(Instant::now);
            streak_attempts += 1;
            let elapsed = started.elapsed();
            bcli_metrics::set_error_streak_seconds(elapsed.as_secs());

            if elapsed >= error_window {
                let err = BcliError::ErrorStreak {
                    command: request.command.clone(),
                    exit_code: out.exit_code,
                    streak_secs: elapsed.as_secs(),
                    attempts: streak_attempts,
                    stdout_tail: tail(&out.output, 256),
                };
                deliver(request, Err(err));
                break;
            }

            tokio::time::sleep(retry_interval).await;
        }
    }
}

fn tail(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        s[s.len() - max_len..].to_string()
    }
}
