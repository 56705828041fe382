//! Glowterm Headless Terminal Runner
//!
//! Feeds a recorded byte stream through the terminal and prints the final
//! screen as a JSON snapshot or as text. Useful for testing and automation.

use std::io::{self, Read, Write};
use std::process::ExitCode;

use glowterm::app::init_logging;
use glowterm::{Config, Terminal};

fn main() -> ExitCode {
    init_logging("warn");

    let args: Vec<String> = std::env::args().collect();

    let mut config = Config::default();
    let mut input_file: Option<String> = None;
    let mut output_file: Option<String> = None;
    let mut output_format = OutputFormat::Json;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--cols" => match parse_next(&args, &mut i) {
                Some(cols) => config.window.columns = cols,
                None => return ExitCode::FAILURE,
            },
            "-r" | "--rows" => match parse_next(&args, &mut i) {
                Some(rows) => config.window.rows = rows,
                None => return ExitCode::FAILURE,
            },
            "-i" | "--input" => match next_value(&args, &mut i) {
                Some(path) => input_file = Some(path.to_string()),
                None => return ExitCode::FAILURE,
            },
            "-o" | "--output" => match next_value(&args, &mut i) {
                Some(path) => output_file = Some(path.to_string()),
                None => return ExitCode::FAILURE,
            },
            "-t" | "--text" => output_format = OutputFormat::Text,
            "--legacy-erase" => config.terminal.legacy_erase_in_line = true,
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

    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        return ExitCode::FAILURE;
    }

    // Read input
    let input_data = match &input_file {
        Some(path) => match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Error reading file '{}': {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut data = Vec::new();
            if let Err(e) = io::stdin().read_to_end(&mut data) {
                tracing::error!("Error reading stdin: {}", e);
                return ExitCode::FAILURE;
            }
            data
        }
    };

    let mut terminal = Terminal::from_config(&config);
    terminal.ingest(&input_data);
    let snapshot = terminal.snapshot();

    let rendered = match output_format {
        OutputFormat::Text => snapshot.to_text(),
        OutputFormat::Json => match snapshot.to_json() {
            Ok(json) => json + "\n",
            Err(e) => {
                tracing::error!("Error serializing snapshot: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    let written = match &output_file {
        Some(path) => std::fs::write(path, rendered.as_bytes()),
        None => io::stdout().lock().write_all(rendered.as_bytes()),
    };
    if let Err(e) = written {
        tracing::error!("Error writing output: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[derive(Clone, Copy)]
enum OutputFormat {
    Text,
    Json,
}

fn next_value<'a>(args: &'a [String], i: &mut usize) -> Option<&'a str> {
    let flag = &args[*i];
    *i += 1;
    let value = args.get(*i).map(String::as_str);
    if value.is_none() {
        tracing::error!("{} requires a value", flag);
    }
    value
}

fn parse_next(args: &[String], i: &mut usize) -> Option<u16> {
    let flag = args[*i].clone();
    let value = next_value(args, i)?;
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::error!("Invalid value for {}: {}", flag, value);
            None
        }
    }
}

fn print_help() {
    println!("Glowterm Headless Terminal Runner");
    println!();
    println!("Usage: glowterm-headless [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -i, --input <PATH>   Read the byte stream from a file (default: stdin)");
    println!("  -o, --output <PATH>  Write the result to a file (default: stdout)");
    println!("  -t, --text           Print screen text instead of a JSON snapshot");
    println!("  -c, --cols <N>       Set terminal width (default: 80)");
    println!("  -r, --rows <N>       Set terminal height (default: 24)");
    println!("      --legacy-erase   Make CSI K erase to the end of the display");
    println!("  -h, --help           Show this help message");
    println!();
    println!("Examples:");
    println!("  printf 'ab\\r\\ncd' | glowterm-headless -t -c 4 -r 2");
    println!("  glowterm-headless -i session.bin -o snapshot.json");
}
