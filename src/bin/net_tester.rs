//! CLI entry point: parse a session configuration file (or stdin), one
//! session per line, and run them all via the orchestrator. Ported
//! from the top-level driver in `Executable.cpp::parse`.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use structopt::StructOpt;
use tracing::error;

use net_tester::config::parse_session_line;
use net_tester::range::Ranges;

#[derive(Debug, StructOpt)]
#[structopt(name = "net-tester")]
struct Opt {
    /// Session configuration file, one session per line (`#`-prefixed
    /// lines and blank lines are ignored). Reads stdin when omitted.
    #[structopt(long = "configuration-file", short = "c", parse(from_os_str))]
    configuration_file: Option<PathBuf>,

    /// CPU core ids to pin reactor threads to, e.g. "0-3,7" — one
    /// reactor thread per listed core. Defaults to a single unpinned
    /// reactor thread.
    #[structopt(long = "cpus", short = "x")]
    cpus: Option<Ranges<u32>>,
}

fn main() -> ExitCode {
    let opt = Opt::from_args();
    tracing_subscriber::fmt::init();

    let text = match read_configuration(&opt.configuration_file) {
        Ok(text) => text,
        Err(e) => {
            error!("failed to read configuration: {}", e);
            return ExitCode::from(10);
        }
    };

    let mut configs = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_session_line(line) {
            Ok(config) => configs.push(config),
            Err(e) => {
                error!("configuration line {}: {}", lineno + 1, e);
                return ExitCode::from(10);
            }
        }
    }

    if configs.is_empty() {
        error!("no sessions configured");
        return ExitCode::from(10);
    }

    let cpu_ids = opt
        .cpus
        .as_ref()
        .map(Ranges::as_sequence)
        .unwrap_or_default();
    let reactor_count = if cpu_ids.is_empty() { 1 } else { cpu_ids.len() };

    let code = net_tester::orchestrator::run(configs, reactor_count, &cpu_ids);
    ExitCode::from(code as u8)
}

fn read_configuration(path: &Option<PathBuf>) -> io::Result<String> {
    match path {
        Some(p) => fs::read_to_string(p),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}
