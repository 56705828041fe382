//! Glowterm Run - PTY session without a window
//!
//! Starts a session running a shell or command, relays stdin to it and
//! prints the final screen once the child exits.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use glowterm::app::init_logging;
use glowterm::{Config, Session, SessionEvent};

fn main() -> ExitCode {
    init_logging("info");

    let args: Vec<String> = std::env::args().collect();

    let mut cols: Option<u16> = None;
    let mut rows: Option<u16> = None;
    let mut shell: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut command: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--cols" | "-r" | "--rows" => {
                let flag = args[i].clone();
                i += 1;
                let value = match args.get(i).map(|v| v.parse::<u16>()) {
                    Some(Ok(n)) => n,
                    _ => {
                        tracing::error!("{} requires a number", flag);
                        return ExitCode::FAILURE;
                    }
                };
                if flag == "-c" || flag == "--cols" {
                    cols = Some(value);
                } else {
                    rows = Some(value);
                }
            }
            "-s" | "--shell" => {
                i += 1;
                match args.get(i) {
                    Some(s) => shell = Some(s.clone()),
                    None => {
                        tracing::error!("--shell requires a path");
                        return ExitCode::FAILURE;
                    }
                }
            }
            "--config" => {
                i += 1;
                match args.get(i) {
                    Some(p) => config_path = Some(PathBuf::from(p)),
                    None => {
                        tracing::error!("--config requires a path");
                        return ExitCode::FAILURE;
                    }
                }
            }
            "-e" | "--exec" => {
                command = args[i + 1..].to_vec();
                if command.is_empty() {
                    tracing::error!("-e requires a command");
                    return ExitCode::FAILURE;
                }
                break;
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            other => {
                tracing::error!("Unknown argument: {}", other);
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    let mut config = match &config_path {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::load_or_default(),
    };
    if let Some(cols) = cols {
        config.window.columns = cols;
    }
    if let Some(rows) = rows {
        config.window.rows = rows;
    }
    if shell.is_some() {
        config.shell = shell;
    }

    let started = match command.split_first() {
        Some((program, rest)) => {
            let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
            Session::spawn(&config, program, &rest)
        }
        None => Session::start(&config),
    };
    let session = match started {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Failed to start session: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        "Session running in {}x{}, child PID: {}",
        config.window.columns,
        config.window.rows,
        session.child_pid()
    );

    // Stdin is read on its own thread and handed over through a channel
    let (input_tx, input_rx) = mpsc::channel::<Vec<u8>>();
    thread::spawn(move || {
        let mut stdin = io::stdin();
        let mut buf = [0u8; 1024];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if input_tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });

    let code = loop {
        if let Some(SessionEvent::Exited { code }) = session.wait_event(Duration::from_millis(50))
        {
            break code;
        }
        while let Ok(bytes) = input_rx.try_recv() {
            if let Err(e) = session.write(&bytes) {
                tracing::warn!("Dropping input: {}", e);
            }
        }
    };

    let text = session.snapshot().to_text();
    let mut stdout = io::stdout().lock();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();

    match code {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => {
            tracing::info!("Child exited with code: {}", code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
        None => ExitCode::FAILURE,
    }
}

fn print_help() {
    println!("Glowterm Run - PTY session without a window");
    println!();
    println!("Usage: glowterm-run [OPTIONS] [-e COMMAND [ARGS...]]");
    println!();
    println!("Options:");
    println!("  -c, --cols <N>       Set terminal width (default: from config, 80)");
    println!("  -r, --rows <N>       Set terminal height (default: from config, 24)");
    println!("  -s, --shell <PATH>   Shell to spawn (default: $SHELL or /bin/sh)");
    println!("      --config <PATH>  Load configuration from PATH");
    println!("  -e, --exec <CMD>...  Run CMD instead of the shell");
    println!("  -h, --help           Show this help message");
    println!();
    println!("Stdin is relayed to the child. When the child exits the final");
    println!("screen is printed as text.");
}
