//! CogLoom CLI - 命令行交互接口
//!
//! 引擎控制环跑在后台线程，REPL 通过 EngineHandle 封送指令。

use std::io::{self, BufRead, Write};
use std::thread;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cg_core::CogLoomConfig;
use cg_engine::{CognitiveSynergyEngine, EngineHandle};

fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cogloom_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CogLoomConfig {
        cognitive_tick_ms: 100,
        ..CogLoomConfig::default()
    };
    let mut engine = CognitiveSynergyEngine::with_task_queue_hosts(config);
    engine
        .initialize()
        .map_err(|e| anyhow::anyhow!("engine initialize failed: {e}"))?;
    let handle = engine.handle();

    let loop_thread = thread::spawn(move || engine.run());

    println!("CogLoom CLI v0.1.0");
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("cg> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        let command = parts[0];

        match command {
            "help" => {
                println!("Available commands:");
                println!("  help                - Show this help message");
                println!("  status              - Show engine status and metrics");
                println!("  isolates            - List registered isolates");
                println!("  create <id>         - Create an isolate");
                println!("  destroy <id>        - Destroy an isolate");
                println!("  sti <id> [value]    - Get or set STI");
                println!("  lti <id> [value]    - Get or set LTI");
                println!("  json                - Dump isolate snapshots as JSON");
                println!("  clear               - Clear the screen");
                println!("  quit / exit         - Stop the engine and exit");
            }
            "status" => match (handle.isolate_count(), handle.metrics()) {
                (Ok(count), Ok(metrics)) => {
                    println!("Engine Status:");
                    println!("  Running: {}", handle.is_running());
                    println!("  Isolates: {count}");
                    println!("  Iterations: {}", metrics.iterations);
                    println!("  Slices: {} ({} failed)", metrics.slices, metrics.slice_failures);
                    println!("  Cognitive ticks: {}", metrics.ticks);
                }
                _ => println!("Engine is not responding"),
            },
            "isolates" => match handle.snapshots() {
                Ok(snapshots) if snapshots.is_empty() => println!("Isolates: (none)"),
                Ok(snapshots) => {
                    for snap in snapshots {
                        println!(
                            "  {:<16} sti={:>8.2} lti={:>8.2} mem={:>8}B slices={} failures={}",
                            snap.id,
                            snap.sti,
                            snap.lti,
                            snap.memory_bytes,
                            snap.slices_run,
                            snap.slice_failures
                        );
                    }
                }
                Err(e) => println!("Error: {e}"),
            },
            "create" => match parts.get(1) {
                Some(id) => match handle.create_isolate(*id) {
                    Ok(()) => println!("Isolate '{id}' created"),
                    Err(e) => println!("Error: {e}"),
                },
                None => println!("Usage: create <id>"),
            },
            "destroy" => match parts.get(1) {
                Some(id) => match handle.destroy_isolate(*id) {
                    Ok(()) => println!("Isolate '{id}' destroyed (if it existed)"),
                    Err(e) => println!("Error: {e}"),
                },
                None => println!("Usage: destroy <id>"),
            },
            "sti" => handle_attention(&handle, &parts, "sti"),
            "lti" => handle_attention(&handle, &parts, "lti"),
            "json" => match handle.snapshots() {
                Ok(snapshots) => match serde_json::to_string_pretty(&snapshots) {
                    Ok(json) => println!("{json}"),
                    Err(e) => println!("Error: {e}"),
                },
                Err(e) => println!("Error: {e}"),
            },
            "clear" => {
                print!("\x1B[2J\x1B[1;1H");
            }
            "quit" | "exit" => {
                println!("Stopping engine...");
                break;
            }
            _ => {
                println!("Unknown command: {command}");
                println!("Type 'help' for available commands.");
            }
        }
    }

    handle.stop();
    match loop_thread.join() {
        Ok(Ok(code)) => println!("Engine exited with code {code}. Goodbye!"),
        Ok(Err(e)) => println!("Engine exited with error: {e}"),
        Err(_) => println!("Engine thread panicked"),
    }

    Ok(())
}

/// sti/lti 子命令：双参数查询，三参数设置
fn handle_attention(handle: &EngineHandle, parts: &[&str], kind: &str) {
    let Some(id) = parts.get(1) else {
        println!("Usage: {kind} <id> [value]");
        return;
    };

    match parts.get(2) {
        None => {
            let value = if kind == "sti" {
                handle.get_sti(*id)
            } else {
                handle.get_lti(*id)
            };
            match value {
                Ok(v) => println!("{kind}({id}) = {v:.3}"),
                Err(e) => println!("Error: {e}"),
            }
        }
        Some(raw) => match raw.parse::<f64>() {
            Ok(v) => {
                let result = if kind == "sti" {
                    handle.set_sti(*id, v)
                } else {
                    handle.set_lti(*id, v)
                };
                match result {
                    Ok(()) => println!("{kind}({id}) set to {v:.3}"),
                    Err(e) => println!("Error: {e}"),
                }
            }
            Err(_) => println!("Invalid value: {raw}"),
        },
    }
}
