use core::{hint::black_box, time::Duration};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use memberflow::{
    CreateRequest, Member, MemberStore, Pipeline, PipelineConfig, Result, SimulatedStore,
    UidSource, WorkerPool,
};
use std::sync::Arc;
use tokio::runtime::Builder;

const REQUESTS: u64 = 10_000;

/// Accepts every request without touching storage.
struct NoopStore;

impl MemberStore for NoopStore {
    async fn create(&self, request: CreateRequest) -> Result<Member> {
        Ok(Member::existing(request.uid))
    }
}

#[derive(Clone, Copy, Debug)]
struct PipelineBenchParams {
    concurrency: usize,
    prefetch: usize,
    workers: Option<usize>,
}

fn pipeline_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    let mut group = c.benchmark_group("pipeline/noop");
    group.throughput(Throughput::Elements(REQUESTS));

    for params in [
        PipelineBenchParams {
            concurrency: 64,
            prefetch: 64,
            workers: None,
        },
        PipelineBenchParams {
            concurrency: 256,
            prefetch: 256,
            workers: None,
        },
        PipelineBenchParams {
            concurrency: 1024,
            prefetch: 1024,
            workers: None,
        },
        PipelineBenchParams {
            concurrency: 256,
            prefetch: 256,
            workers: Some(20),
        },
    ] {
        let name = format!(
            "bound_{}/prefetch_{}/workers_{}",
            params.concurrency,
            params.prefetch,
            params.workers.unwrap_or(0)
        );

        let pipeline = rt.block_on(async {
            let pipeline = Pipeline::new(NoopStore);
            match params.workers {
                Some(size) => pipeline.with_worker_pool(Arc::new(
                    WorkerPool::spawn(size, params.concurrency).expect("failed to spawn pool"),
                )),
                None => pipeline,
            }
        });
        let mut config = PipelineConfig::new(params.concurrency, params.prefetch);
        if let Some(size) = params.workers {
            config = config.with_worker_pool(size);
        }

        group.bench_function(name, |b| {
            b.to_async(&rt).iter(|| {
                let pipeline = pipeline.clone();
                let config = config.clone();
                async move {
                    let handle = pipeline
                        .submit(UidSource::new(REQUESTS), config)
                        .expect("invalid config");
                    black_box(handle.join(Duration::from_secs(60)).await)
                }
            });
        });
    }

    group.finish();
}

fn simulated_latency_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    let mut group = c.benchmark_group("pipeline/simulated_1ms");
    group.sample_size(10);
    group.throughput(Throughput::Elements(REQUESTS));

    for concurrency in [256, 1024] {
        group.bench_function(format!("bound_{concurrency}"), |b| {
            b.to_async(&rt).iter(|| async move {
                let store = SimulatedStore::in_memory(Duration::from_millis(1));
                let handle = Pipeline::new(store)
                    .submit(
                        UidSource::new(REQUESTS),
                        PipelineConfig::new(concurrency, concurrency),
                    )
                    .expect("invalid config");
                black_box(handle.join(Duration::from_secs(60)).await)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, pipeline_bench, simulated_latency_bench);
criterion_main!(benches);
