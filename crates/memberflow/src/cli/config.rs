use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use memberflow::PipelineConfig;

/// Runtime configuration for the `memberflow` binary.
///
/// Each flag drives one knob of a single pipeline run against a simulated
/// store. All values are parsed from CLI arguments or environment variables
/// (a `.env` file is loaded first when present).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "memberflow",
    version,
    about = "Drive a bounded-concurrency member write pipeline against a simulated store"
)]
pub struct CliArgs {
    /// Number of members to create (`uid-1 ..= uid-N`).
    ///
    /// Environment variable: `TOTAL_REQUESTS`
    #[arg(long, env = "TOTAL_REQUESTS", default_value_t = 100_000)]
    pub total: u64,

    /// Maximum number of create calls in flight at once.
    ///
    /// Environment variable: `CONCURRENCY_BOUND`
    #[arg(long, env = "CONCURRENCY_BOUND", default_value_t = 256)]
    pub concurrency: usize,

    /// How many requests are pulled from the source per batch.
    ///
    /// Environment variable: `PREFETCH_WINDOW`
    #[arg(long, env = "PREFETCH_WINDOW", default_value_t = 256)]
    pub prefetch: usize,

    /// Off-load create calls to a pool of this many workers. Unset runs each
    /// call on its own runtime task.
    ///
    /// Environment variable: `WORKER_POOL_SIZE`
    #[arg(long, env = "WORKER_POOL_SIZE")]
    pub workers: Option<usize>,

    /// Fixed latency of every simulated create, in milliseconds.
    ///
    /// Environment variable: `PERSIST_LATENCY_MS`
    #[arg(long, env = "PERSIST_LATENCY_MS", default_value_t = 10)]
    pub latency_ms: u64,

    /// Upper bound of the random extra latency added per create, in
    /// milliseconds.
    ///
    /// Environment variable: `PERSIST_JITTER_MS`
    #[arg(long, env = "PERSIST_JITTER_MS", default_value_t = 0)]
    pub jitter_ms: u64,

    /// Fail every request whose sequence number is a multiple of N.
    ///
    /// Environment variable: `FAIL_EVERY`
    #[arg(long, env = "FAIL_EVERY")]
    pub fail_every: Option<u64>,

    /// Give up waiting for the drain after this many seconds.
    ///
    /// Environment variable: `DRAIN_TIMEOUT_SECS`
    #[arg(long, env = "DRAIN_TIMEOUT_SECS", default_value_t = 3000)]
    pub drain_timeout_secs: u64,

    /// Print the final counts as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub total: u64,
    pub pipeline: PipelineConfig,
    pub latency: Duration,
    pub jitter: Duration,
    pub fail_every: Option<u64>,
    pub json: bool,
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.concurrency == 0 {
            bail!("CONCURRENCY_BOUND must be greater than 0");
        }
        if args.prefetch == 0 {
            bail!("PREFETCH_WINDOW must be greater than 0");
        }
        if args.workers == Some(0) {
            bail!("WORKER_POOL_SIZE must be greater than 0 when set");
        }
        if args.fail_every == Some(0) {
            bail!("FAIL_EVERY must be greater than 0 when set");
        }
        if args.drain_timeout_secs == 0 {
            bail!("DRAIN_TIMEOUT_SECS must be greater than 0");
        }

        let mut pipeline = PipelineConfig::new(args.concurrency, args.prefetch)
            .with_drain_timeout(Duration::from_secs(args.drain_timeout_secs));
        if let Some(workers) = args.workers {
            pipeline = pipeline.with_worker_pool(workers);
        }
        pipeline.validate()?;

        Ok(Self {
            total: args.total,
            pipeline,
            latency: Duration::from_millis(args.latency_ms),
            jitter: Duration::from_millis(args.jitter_ms),
            fail_every: args.fail_every,
            json: args.json,
        })
    }
}
