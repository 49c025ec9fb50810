//! Registers a few metrics, updates them from worker threads and journals them.
//!
//! Writer lifecycle events are printed to stderr via `tracing-subscriber`.
#![allow(
    clippy::arithmetic_side_effects,
    clippy::modulo_arithmetic,
    reason = "this is example code that doesn't need production-level safety"
)]

use std::error::Error;
use std::{env, fs, thread};
use std::time::Duration;

use metrics_journal::{
    Capability, Cardinality, CodeTime, CpuUsage, MetricsRegistry, PercentileLatency, RateCounter,
};
use tracing::Level;

const ENDPOINTS: [&str; 4] = ["/", "/login", "/api", "/health"];

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let path = env::temp_dir().join("metrics_journal_readme.log");
    let registry = MetricsRegistry::new(&path)?;

    let rps = registry.create_metric(RateCounter::new());
    let latency = registry.create_metric(PercentileLatency::new());
    let cpu = registry.create_metric(CpuUsage::new());
    let endpoints = registry.create_metric(Cardinality::new(3));
    let batch_time = registry.create_metric(CodeTime::with_generated_name(registry.names()));

    thread::scope(|s| {
        for worker in 0..4_u64 {
            let rps = rps.clone();
            let latency = latency.clone();
            let endpoints = endpoints.clone();

            s.spawn(move || {
                for (request, endpoint) in (0..250_u64).zip(ENDPOINTS.iter().cycle()) {
                    rps.increment();
                    latency.observe(Duration::from_micros(100 + (request * worker) % 900));
                    endpoints.observe(*endpoint);
                }
            });
        }

        batch_time.measure(|| thread::sleep(Duration::from_millis(20)));
    });

    // Logging by index evaluates first, so this reports processor usage since creation.
    registry.log(cpu.index())?;

    registry.log_tagged(Capability::Server);
    registry.log_all();
    registry.close();

    println!("Journal written to {}:", path.display());
    print!("{}", fs::read_to_string(&path)?);

    Ok(())
}
