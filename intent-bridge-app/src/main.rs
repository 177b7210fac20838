//! intent-bridge command-line host.
//!
//! ## Runtime note
//!
//! The host loop runs on a current-thread Tokio runtime. `HostContext` is
//! `!Send`, so every callback registered below runs on this one thread when
//! the drain tick fires, never on the recognizer's threads.

mod commands;
mod settings;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use commands::{CommandTable, Dispatch};
use intent_bridge_core::{HostContext, SessionBridge, SimulatedEngine, SimulatedEngineFactory};
use settings::{default_settings_path, load_settings, save_settings, AppSettings};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DRAIN_INTERVAL: Duration = Duration::from_millis(10);
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

struct Args {
    settings_path: PathBuf,
    init: bool,
}

fn parse_args() -> Result<Args> {
    let mut settings_path: Option<PathBuf> = None;
    let mut init = false;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--settings" => {
                let v = it.next().context("missing value for --settings")?;
                settings_path = Some(PathBuf::from(v));
            }
            "--init" => init = true,
            "--help" | "-h" => {
                println!(
                    "Usage: intent-bridge [--settings <file.json>] [--init]\n\n\
                     Commands on stdin: start, stop, status, quit.\n\
                     Any other line is spoken to the recognizer."
                );
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    Ok(Args {
        settings_path: settings_path.unwrap_or_else(default_settings_path),
        init,
    })
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Start,
    Stop,
    Status,
    Quit,
    Speak(String),
    Empty,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "" => Input::Empty,
        "start" => Input::Start,
        "stop" => Input::Stop,
        "status" => Input::Status,
        "quit" | "exit" => Input::Quit,
        _ => Input::Speak(line.to_string()),
    }
}

fn register(bridge: &SessionBridge, settings: &AppSettings) {
    for intent in &settings.intents {
        bridge.add_intent(&intent.phrase, &intent.intent_id);
    }
    for phrase in &settings.phrases {
        bridge.add_phrase(phrase);
    }
    info!(
        intents = settings.intents.len(),
        phrases = settings.phrases.len(),
        commands = settings.commands.len(),
        "vocabulary registered"
    );

    bridge.on_started(|p| println!("[started] {}", p.session_id));
    bridge.on_stopped(|p| println!("[stopped] {}", p.session_id));
    bridge.on_cancelled(|p| match p.error_code {
        Some(code) => println!("[cancelled] {code}: {}", p.error_details),
        None => println!("[cancelled] {}", p.error_details),
    });
    bridge.on_recognizing(|p| println!("[recognizing] {}", p.text));

    let table = CommandTable::new(settings.commands.clone());
    bridge.on_recognized(move |p| match table.dispatch(&p) {
        Dispatch::Command { command, .. } => println!("[command] {command}"),
        Dispatch::Intent {
            intent_id,
            entities,
            numbers,
        } => println!("[intent] {intent_id} {entities:?} {numbers:?}"),
        Dispatch::Unmatched(text) => println!("[text] {text}"),
    });
}

async fn run_host_loop(
    host: &HostContext,
    bridge: &SessionBridge,
    engine: &SimulatedEngine,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut drain = tokio::time::interval(DRAIN_INTERVAL);
    drain.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = drain.tick() => {
                host.run_pending();
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    info!("stdin closed");
                    break;
                };
                match parse_input(&line) {
                    Input::Start => bridge.start_continuous_recognition(),
                    Input::Stop => bridge.stop_continuous_recognition(),
                    Input::Status => println!(
                        "session {}",
                        if bridge.has_session_started() { "active" } else { "idle" }
                    ),
                    Input::Quit => break,
                    Input::Speak(text) => {
                        if !bridge.has_session_started() {
                            warn!("no active session; type `start` first");
                        }
                        engine.speak(text);
                    }
                    Input::Empty => {}
                }
            }
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
                info!("interrupted");
                break;
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = parse_args()?;
    if args.init {
        save_settings(&args.settings_path, &AppSettings::default()).with_context(|| {
            format!("failed to write {}", args.settings_path.display())
        })?;
        println!("Wrote default settings: {}", args.settings_path.display());
        return Ok(());
    }
    let settings = load_settings(&args.settings_path);

    // ── Tracing ───────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new(settings::DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(settings = %args.settings_path.display(), "intent-bridge starting");

    let config = settings.bridge_config().context(
        "no credentials: set SUBSCRIPTION_KEY and REGION, or key/region in the settings file",
    )?;

    let host = HostContext::new();
    let factory = SimulatedEngineFactory::new();
    let bridge = SessionBridge::new(&config, &factory, host.handle())?;
    let engine = factory
        .last_engine()
        .context("engine factory returned no engine")?;
    register(&bridge, &settings);

    run_host_loop(&host, &bridge, &engine).await?;

    bridge.stop_continuous_recognition();
    host.run_until(|| !bridge.has_session_started(), SHUTDOWN_GRACE);
    drop(bridge);
    info!("intent-bridge stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_words_are_case_insensitive() {
        assert_eq!(parse_input(" START "), Input::Start);
        assert_eq!(parse_input("stop"), Input::Stop);
        assert_eq!(parse_input("Status"), Input::Status);
        assert_eq!(parse_input("exit"), Input::Quit);
        assert_eq!(parse_input("   "), Input::Empty);
    }

    #[test]
    fn other_lines_are_spoken_verbatim() {
        assert_eq!(
            parse_input("  Go to line 12 "),
            Input::Speak("Go to line 12".into())
        );
    }

    #[test]
    fn default_vocabulary_resolves_through_a_simulated_session() {
        let host = HostContext::new();
        let factory = SimulatedEngineFactory::new();
        let config = intent_bridge_core::BridgeConfig::new("k", "r").unwrap();
        let bridge = SessionBridge::new(&config, &factory, host.handle()).unwrap();
        let engine = factory.last_engine().unwrap();
        let settings = AppSettings::default();
        for intent in &settings.intents {
            bridge.add_intent(&intent.phrase, &intent.intent_id);
        }

        let table = CommandTable::new(settings.commands.clone());
        let outcomes = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&outcomes);
        bridge.on_recognized(move |p| sink.lock().push(table.resolve(&p)));

        bridge.start_continuous_recognition();
        engine.speak("Format document.");
        engine.speak("go to line 7");
        engine.speak("move cursor to line seven");
        assert!(host.run_until(|| outcomes.lock().len() == 3, Duration::from_secs(2)));

        let outcomes = outcomes.lock();
        assert_eq!(
            outcomes[0],
            Dispatch::Command {
                utterance: "format document".into(),
                command: "editor.action.formatDocument".into(),
            }
        );
        assert!(matches!(
            &outcomes[1],
            Dispatch::Intent { intent_id, entities, .. }
                if intent_id == "Voice.Positioning" && entities["lineNumber"] == "7"
        ));
        assert!(matches!(
            &outcomes[2],
            Dispatch::Intent { intent_id, numbers, .. }
                if intent_id == "Voice.Positioning" && numbers.get("lineNumber") == Some(&7)
        ));
    }
}
