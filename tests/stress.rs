//! Stress tests for rtlwatch
//!
//! Run with: cargo test --release stress -- --ignored

use rtlwatch::*;
use std::time::Instant;

fn quiet_pipeline() -> IngestionPipeline {
    IngestionPipeline::new(WatchConfig {
        log_accepted: false,
        ..WatchConfig::utc()
    })
    .unwrap()
}

#[test]
#[ignore] // Run manually with --ignored
fn stress_test_parse_and_ingest() {
    let mut pipeline = quiet_pipeline();

    let iterations = 200_000u64;
    let payloads: Vec<Vec<u8>> = (0..iterations)
        .map(|i| {
            // One record every 3s, alternating between two sensors
            let secs = i * 3;
            serde_json::json!({
                "time": format!(
                    "2023-03-{:02} {:02}:{:02}:{:02}",
                    2 + secs / 86_400,
                    (secs / 3600) % 24,
                    (secs / 60) % 60,
                    secs % 60
                ),
                "model": "Acurite-Tower",
                "id": i % 2,
                "snr": 10.0 + (i as f64 * 0.01).sin() * 5.0,
            })
            .to_string()
            .into_bytes()
        })
        .collect();

    let start = Instant::now();
    for payload in &payloads {
        pipeline.ingest(payload);
    }
    let elapsed = start.elapsed();
    let rate = iterations as f64 / elapsed.as_secs_f64();

    println!("Ingested {} payloads in {:?}", iterations, elapsed);
    println!("Rate: {:.0} payloads/second", rate);

    assert_eq!(pipeline.session().totals().total_accepted, iterations);
    assert!(
        rate > 50_000.0,
        "Should ingest at least 50k payloads/s, got {:.0}",
        rate
    );
}

#[test]
#[ignore]
fn stress_test_many_devices() {
    let mut pipeline = quiet_pipeline();

    let num_devices = 10_000;
    let rounds = 20;
    let start = Instant::now();

    let mut t = 1_677_751_200.0;
    for round in 0..rounds {
        for device in 0..num_devices {
            let event = Event::new(format!("Sensor {}", device), t, (round + device % 7) as f64);
            pipeline.ingest_event(event);
            t += 3.0;
        }
    }

    let elapsed = start.elapsed();
    let total = (num_devices * rounds) as f64;
    let rate = total / elapsed.as_secs_f64();

    println!("Processed {} events across {} devices in {:?}", total, num_devices, elapsed);
    println!("Rate: {:.0} events/second", rate);

    let query = pipeline.query();
    let start = Instant::now();
    let rows = query.by_mean_snr();
    println!("Sorted {} devices in {:?}", rows.len(), start.elapsed());

    assert_eq!(rows.len(), num_devices);
    assert!(rows.iter().all(|r| r.stats.count == rounds as u64));
    assert!(
        rate > 100_000.0,
        "Should process at least 100k events/s, got {:.0}",
        rate
    );
}

#[test]
#[ignore]
fn stress_test_accumulator() {
    let iterations = 10_000_000;
    let mut acc = StatAccumulator::new(0.0);
    let start = Instant::now();

    for i in 1..iterations {
        acc.append((i as f64 * 0.001).sin() * 20.0);
    }

    let elapsed = start.elapsed();
    let snap = acc.snapshot();
    println!("Accumulated {} values in {:?}", iterations, elapsed);
    println!(
        "count={} mean={:.4} stddev={:.4} min={:.2} max={:.2}",
        snap.count, snap.mean, snap.stddev, snap.min, snap.max
    );

    assert_eq!(snap.count, iterations as u64);
    assert!(snap.min >= -20.0 && snap.max <= 20.0);
    assert!(snap.stddev > 0.0 && snap.stddev < 20.0);
}
