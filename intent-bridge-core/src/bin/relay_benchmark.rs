fn main() {
    if let Err(e) = run() {
        eprintln!("relay benchmark failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    use intent_bridge_core::engine::{
        IntentRecognitionResult, PhraseListGrammar, RecognitionEvents,
    };
    use intent_bridge_core::{
        BridgeConfig, EngineError, EngineFactory, HostContext, RecognitionEngine, SessionBridge,
    };
    use parking_lot::{Mutex, RwLock};
    use serde::Serialize;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[derive(Debug)]
    struct Args {
        events: usize,
        threads: usize,
        timeout_secs: u64,
        output: Option<PathBuf>,
    }

    #[derive(Debug, Clone, Serialize)]
    struct Summary {
        threads: usize,
        events_per_thread: usize,
        fired: usize,
        delivered: usize,
        fifo_violations: usize,
        wall_ms: f64,
        p50_latency_ms: f64,
        p95_latency_ms: f64,
        avg_latency_ms: f64,
        max_latency_ms: f64,
    }

    /// Engine with no recognizer behind it: the benchmark fires events itself.
    #[derive(Default)]
    struct ScriptedEngine {
        receiver: RwLock<Option<Arc<dyn RecognitionEvents>>>,
    }

    struct NoGrammar;

    impl PhraseListGrammar for NoGrammar {
        fn add_phrase(&self, _phrase: &str) {}
        fn clear(&self) {}
    }

    impl RecognitionEngine for ScriptedEngine {
        fn start_continuous_async(&self) {}
        fn stop_continuous_async(&self) {}
        fn add_intent(&self, _phrase: &str, _intent_id: &str) {}
        fn phrase_grammar(&self) -> Arc<dyn PhraseListGrammar> {
            Arc::new(NoGrammar)
        }
        fn connect(&self, events: Arc<dyn RecognitionEvents>) {
            *self.receiver.write() = Some(events);
        }
        fn disconnect(&self) {
            *self.receiver.write() = None;
        }
    }

    struct ScriptedFactory(Arc<ScriptedEngine>);

    impl EngineFactory for ScriptedFactory {
        fn create(
            &self,
            _config: &BridgeConfig,
        ) -> Result<Arc<dyn RecognitionEngine>, EngineError> {
            Ok(self.0.clone())
        }
    }

    fn parse_args() -> Result<Args, String> {
        let mut events: usize = 10_000;
        let mut threads: usize = 4;
        let mut timeout_secs: u64 = 30;
        let mut output: Option<PathBuf> = None;

        let mut it = std::env::args().skip(1);
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "--events" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --events".into());
                    };
                    events = v
                        .parse::<usize>()
                        .map_err(|_| "invalid value for --events".to_string())?
                        .max(1);
                }
                "--threads" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --threads".into());
                    };
                    threads = v
                        .parse::<usize>()
                        .map_err(|_| "invalid value for --threads".to_string())?
                        .clamp(1, 64);
                }
                "--timeout" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --timeout".into());
                    };
                    timeout_secs = v
                        .parse::<u64>()
                        .map_err(|_| "invalid value for --timeout".to_string())?;
                }
                "--output" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --output".into());
                    };
                    output = Some(PathBuf::from(v));
                }
                "--help" | "-h" => {
                    println!(
                        "Usage: cargo run -p intent-bridge-core --bin relay-benchmark -- \\
  [--events <per-thread>] [--threads <n>] [--timeout <secs>] [--output <file.json>]"
                    );
                    std::process::exit(0);
                }
                other => {
                    return Err(format!("unknown argument: {other}"));
                }
            }
        }

        Ok(Args {
            events,
            threads,
            timeout_secs,
            output,
        })
    }

    fn percentile(values: &[f64], p: f64) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    let args = parse_args()?;
    let total = args.events * args.threads;

    println!(
        "Running relay benchmark: {} threads x {} recognized events",
        args.threads, args.events
    );

    let host = HostContext::new();
    let engine = Arc::new(ScriptedEngine::default());
    let config = BridgeConfig::new("benchmark", "local").map_err(|e| e.to_string())?;
    let bridge = SessionBridge::new(&config, &ScriptedFactory(engine.clone()), host.handle())
        .map_err(|e| e.to_string())?;

    // Text is "<thread>:<seq>:<micros since epoch>"; delivery parses it back.
    let epoch = Instant::now();
    let latencies = Arc::new(Mutex::new(Vec::with_capacity(total)));
    let last_seq: Arc<Mutex<HashMap<usize, usize>>> = Arc::new(Mutex::new(HashMap::new()));
    let fifo_violations = Arc::new(Mutex::new(0usize));
    {
        let latencies = Arc::clone(&latencies);
        let last_seq = Arc::clone(&last_seq);
        let fifo_violations = Arc::clone(&fifo_violations);
        bridge.on_recognized(move |payload| {
            let mut parts = payload.text.split(':').map(str::parse::<u128>);
            let (Some(Ok(thread)), Some(Ok(seq)), Some(Ok(fired_us))) =
                (parts.next(), parts.next(), parts.next())
            else {
                return;
            };
            let now_us = epoch.elapsed().as_micros();
            latencies
                .lock()
                .push(now_us.saturating_sub(fired_us) as f64 / 1000.0);

            let (thread, seq) = (thread as usize, seq as usize);
            if let Some(prev) = last_seq.lock().insert(thread, seq) {
                if seq <= prev {
                    *fifo_violations.lock() += 1;
                }
            }
        });
    }

    let receiver = engine
        .receiver
        .read()
        .clone()
        .ok_or_else(|| "bridge did not connect its handlers".to_string())?;

    let started = Instant::now();
    let producers = (0..args.threads)
        .map(|t| {
            let receiver = Arc::clone(&receiver);
            let events = args.events;
            std::thread::Builder::new()
                .name(format!("bench-engine-{t}"))
                .spawn(move || {
                    for n in 0..events {
                        let fired_us = epoch.elapsed().as_micros();
                        receiver.recognized(&IntentRecognitionResult::text_only(format!(
                            "{t}:{n}:{fired_us}"
                        )));
                    }
                })
                .map_err(|e| e.to_string())
        })
        .collect::<Result<Vec<_>, _>>()?;

    let finished = host.run_until(
        || latencies.lock().len() >= total,
        Duration::from_secs(args.timeout_secs),
    );
    let wall_ms = started.elapsed().as_secs_f64() * 1000.0;
    for p in producers {
        p.join().map_err(|_| "producer thread panicked".to_string())?;
    }
    if !finished {
        eprintln!("timed out before every event was delivered");
    }
    drop(receiver);
    drop(bridge);

    let latencies = latencies.lock().clone();
    let summary = Summary {
        threads: args.threads,
        events_per_thread: args.events,
        fired: total,
        delivered: latencies.len(),
        fifo_violations: *fifo_violations.lock(),
        wall_ms,
        p50_latency_ms: percentile(&latencies, 0.50),
        p95_latency_ms: percentile(&latencies, 0.95),
        avg_latency_ms: if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        },
        max_latency_ms: latencies.iter().copied().fold(0.0, f64::max),
    };

    println!(
        "Done. delivered={}/{} p50={:.3}ms p95={:.3}ms fifo_violations={}",
        summary.delivered,
        summary.fired,
        summary.p50_latency_ms,
        summary.p95_latency_ms,
        summary.fifo_violations
    );

    let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
    if let Some(out) = args.output {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&out, json).map_err(|e| e.to_string())?;
        println!("Wrote benchmark report: {}", out.display());
    } else {
        println!("{json}");
    }

    if summary.fifo_violations > 0 {
        return Err(format!("{} FIFO violations", summary.fifo_violations));
    }
    Ok(())
}
