use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use feedline::DispatcherConfig;

/// Runtime configuration for the `feedline-server` binary.
///
/// Every value can be given as a CLI flag or an environment variable (a
/// `.env` file in the working directory is loaded first). Fan-out defaults
/// match [`DispatcherConfig::default`], except the worker count which is
/// derived from the available cores when not set.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "feedline-server",
    version,
    about = "An HTTP feed service with background follower fan-out"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Number of fan-out worker tasks. Defaults to the number of cores,
    /// capped at 16.
    ///
    /// Environment variable: `FANOUT_WORKERS`
    #[arg(long, env = "FANOUT_WORKERS")]
    pub fanout_workers: Option<usize>,

    /// Batches each worker can hold before new fan-out is shed.
    ///
    /// Environment variable: `FANOUT_QUEUE_CAPACITY`
    #[arg(long, env = "FANOUT_QUEUE_CAPACITY", default_value_t = 1024)]
    pub fanout_queue_capacity: usize,

    /// Followers per fan-out batch.
    ///
    /// Environment variable: `FANOUT_BATCH_SIZE`
    #[arg(long, env = "FANOUT_BATCH_SIZE", default_value_t = 50)]
    pub fanout_batch_size: usize,

    /// Attempts per fan-out job, including the first.
    ///
    /// Environment variable: `FANOUT_MAX_ATTEMPTS`
    #[arg(long, env = "FANOUT_MAX_ATTEMPTS", default_value_t = 3)]
    pub fanout_max_attempts: u32,

    /// Upper bound for a single fan-out attempt, in milliseconds.
    ///
    /// Environment variable: `FANOUT_JOB_TIMEOUT_MS`
    #[arg(long, env = "FANOUT_JOB_TIMEOUT_MS", default_value_t = 5_000)]
    pub fanout_job_timeout_ms: u64,

    /// Delay before the first retry, in milliseconds. Doubles per retry.
    ///
    /// Environment variable: `FANOUT_BACKOFF_BASE_MS`
    #[arg(long, env = "FANOUT_BACKOFF_BASE_MS", default_value_t = 100)]
    pub fanout_backoff_base_ms: u64,

    /// Ceiling for the retry delay, in milliseconds.
    ///
    /// Environment variable: `FANOUT_BACKOFF_MAX_MS`
    #[arg(long, env = "FANOUT_BACKOFF_MAX_MS", default_value_t = 2_000)]
    pub fanout_backoff_max_ms: u64,

    /// How long shutdown waits for queued fan-out before dropping it.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Emit logs as JSON lines instead of the human-readable format.
    ///
    /// Environment variable: `LOG_JSON`
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub log_json: bool,
    pub dispatcher: DispatcherConfig,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.fanout_workers == Some(0) {
            bail!("FANOUT_WORKERS must be greater than 0");
        }
        if args.fanout_batch_size == 0 {
            bail!("FANOUT_BATCH_SIZE must be greater than 0");
        }
        if args.fanout_max_attempts == 0 {
            bail!("FANOUT_MAX_ATTEMPTS must be greater than 0");
        }
        if args.fanout_backoff_base_ms > args.fanout_backoff_max_ms {
            bail!(
                "FANOUT_BACKOFF_BASE_MS ({}) exceeds FANOUT_BACKOFF_MAX_MS ({})",
                args.fanout_backoff_base_ms,
                args.fanout_backoff_max_ms
            );
        }

        let defaults = DispatcherConfig::default();
        let dispatcher = DispatcherConfig {
            num_workers: args.fanout_workers.unwrap_or(defaults.num_workers),
            queue_capacity: args.fanout_queue_capacity,
            batch_size: args.fanout_batch_size,
            max_attempts: args.fanout_max_attempts,
            job_timeout: Duration::from_millis(args.fanout_job_timeout_ms),
            backoff_base: Duration::from_millis(args.fanout_backoff_base_ms),
            backoff_max: Duration::from_millis(args.fanout_backoff_max_ms),
            drain_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        };
        // Catches what the checks above don't (zero capacity, zero timeout)
        dispatcher.validate()?;

        Ok(Self {
            server_addr: args.server_addr,
            log_json: args.log_json,
            dispatcher,
        })
    }
}
