//! # `memberflow` load driver
//!
//! Streams `uid-1 ..= uid-N` create requests through a bounded-concurrency
//! pipeline into a simulated store and reports the drain result.
//!
//! ```bash
//! cargo run --bin memberflow --release -- --total 100000 --workers 20
//! ```

mod cli;

use clap::Parser;
use cli::{
    config::{CliArgs, RunConfig},
    telemetry::init_telemetry,
};
use core::time::Duration;
use memberflow::{DrainResult, Pipeline, SimulatedStore, UidSource, WorkerPool};
use std::sync::Arc;
use tokio::{signal, time::Instant};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    let providers = init_telemetry()?;
    let outcome = drive(&config).await;
    providers.shutdown();

    let (result, elapsed) = outcome?;
    report(&config, &result, elapsed)?;

    result.into_result(config.pipeline.drain_timeout)?;
    Ok(())
}

async fn drive(config: &RunConfig) -> anyhow::Result<(DrainResult, Duration)> {
    let mut store = SimulatedStore::in_memory(config.latency).with_jitter(config.jitter);
    if let Some(n) = config.fail_every {
        store = store.with_fail_every(n);
    }

    let mut pipeline = Pipeline::new(store);
    let pool = match config.pipeline.worker_pool_size {
        Some(size) => {
            let pool = Arc::new(WorkerPool::spawn(size, config.pipeline.concurrency_bound)?);
            pipeline = pipeline.with_worker_pool(Arc::clone(&pool));
            Some(pool)
        }
        None => None,
    };

    log_startup_info(config);

    let started = Instant::now();
    let handle = pipeline.submit(UidSource::new(config.total), config.pipeline.clone())?;

    let result = tokio::select! {
        result = handle.wait() => result,
        () = shutdown_signal() => {
            #[cfg(feature = "tracing")]
            tracing::info!("Interrupted, reporting partial progress");
            handle.join(Duration::ZERO).await
        }
    };
    let elapsed = started.elapsed();

    if let Some(pool) = pool {
        if let Err(_e) = pool.shutdown().await {
            #[cfg(feature = "tracing")]
            tracing::error!("Error during worker pool shutdown: {:?}", _e);
        }
    }

    Ok((result, elapsed))
}

fn log_startup_info(_config: &RunConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!("Starting pipeline run with full config: {:#?}", _config);
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting pipeline run of {} members (bound {}, prefetch {}, workers {:?})",
            _config.total,
            _config.pipeline.concurrency_bound,
            _config.pipeline.prefetch_window,
            _config.pipeline.worker_pool_size
        );
    }
}

fn report(config: &RunConfig, result: &DrainResult, elapsed: Duration) -> anyhow::Result<()> {
    if config.json {
        println!("{}", serde_json::to_string(result)?);
        return Ok(());
    }

    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        result.settled() as f64 / secs
    } else {
        0.0
    };
    println!(
        "submitted={} succeeded={} failed={} timed_out={} elapsed={secs:.3}s rate={rate:.0}/s",
        result.submitted, result.succeeded, result.failed, result.timed_out
    );
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Failed to install SIGTERM handler: {_e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(_e) = signal::ctrl_c().await {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to install Ctrl+C handler: {_e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received SIGTERM signal");
        },
    }
}
