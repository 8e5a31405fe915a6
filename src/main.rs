//! Entry point: parses CLI flags, wires up logging, builds the link set and
//! output fan-out, then runs the Protocol Engine. Argument parsing happens
//! first since it controls logging, then the layered `tracing_subscriber`
//! setup, then handoff to the async work.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, prelude::*, Layer};

use gcproxy::cli::Args;
use gcproxy::engine::{Engine, EngineConfig, OutputLink};
use gcproxy::journal::JournalWorker;
use gcproxy::link::{Link, LinkSet};
use gcproxy::logging::ColorizedFormatter;
use gcproxy::override_rc::SitlOutput;
use gcproxy::transport::{ChildTransport, MasterUri, SerialTransport, TcpTransport, Transport, UdpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let guard;
    let detailed_log_layer;
    if let Some("stderr") = args.log_file.as_deref() {
        detailed_log_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(log_level)
            .boxed();
        guard = None;
    } else {
        let file_appender = match args.log_file.as_deref() {
            Some(path_str) => {
                let log_path = std::path::Path::new(path_str);
                let log_dir = log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
                let log_filename = log_path
                    .file_name()
                    .unwrap_or_else(|| std::ffi::OsStr::new("gcproxy.log"));
                tracing_appender::rolling::daily(log_dir, log_filename)
            }
            None => tracing_appender::rolling::daily(".", "gcproxy.log"),
        };
        let (non_blocking_writer, file_guard) = tracing_appender::non_blocking(file_appender);
        detailed_log_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_filter(log_level)
            .boxed();
        guard = Some(file_guard);
    }

    let stdout_log = if !args.quiet {
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .event_format(ColorizedFormatter)
                .with_filter(log_level),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(detailed_log_layer)
        .with(stdout_log)
        .init();
    let _log_guard = guard;

    info!("starting ground-control proxy");

    let mut links = Vec::new();
    for (link_num, uri) in args.master.iter().enumerate() {
        let transport = open_master(uri, &args).await?;
        links.push(Link::new(link_num, transport));
    }
    let link_set = LinkSet::new(links, 1);

    let mut outputs = Vec::new();
    for addr in &args.out {
        let transport = UdpTransport::bind(addr, true)
            .await
            .with_context(|| format!("connecting output link {addr}"))?;
        outputs.push(OutputLink::new(Box::new(transport)));
    }

    let sitl = match &args.sitl {
        Some(addr) => Some(
            SitlOutput::connect(addr)
                .await
                .with_context(|| format!("connecting sitl sink {addr}"))?,
        ),
        None => None,
    };

    let journal = match build_journal(&args) {
        Ok((handle, worker)) => {
            tokio::spawn(run_journal(worker));
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "failed to open log files, continuing without a journal");
            None
        }
    };

    let mut engine = Engine::new(
        EngineConfig {
            source_system: args.source_system as u8,
            source_component: 0,
            aircraft: args.aircraft.clone(),
            mav10: args.mav10,
            quadcopter: args.quadcopter,
        },
        link_set,
        outputs,
        sitl,
        journal,
    );
    engine.settings.streamrate = args.streamrate;
    engine.settings.streamrate2 = args.streamrate;
    engine.settings.numcells = args.num_cells;
    engine.status.setup_mode = args.setup;
    engine.status.target_system = args.target_system as i32;
    engine.status.target_component = args.target_component as i32;

    let (operator_tx, operator_rx) = tokio::sync::mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if operator_tx.send(line.trim_end().to_string()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    engine.run(operator_rx).await
}

async fn open_master(uri: &str, args: &Args) -> Result<Box<dyn Transport>> {
    Ok(match MasterUri::parse(uri) {
        MasterUri::Tcp { host, port } => Box::new(TcpTransport::connect(&host, port).await?),
        MasterUri::Udp { addr } => Box::new(UdpTransport::bind(&addr, false).await?),
        MasterUri::Child { path } => Box::new(ChildTransport::spawn(&path)?),
        MasterUri::Serial { path } => {
            Box::new(SerialTransport::open(&path, args.baudrate, !args.nodtr)?)
        }
    })
}

/// Logging defaults on (§6): `--logfile` picks an explicit path, `--aircraft`
/// picks a dated flight directory, and giving neither still logs to
/// `mav.log` in the working directory rather than silently disabling the
/// journal.
fn build_journal(args: &Args) -> Result<(gcproxy::journal::JournalHandle, JournalWorker)> {
    let base = match (&args.logfile, &args.aircraft) {
        (Some(path), _) => std::path::PathBuf::from(path),
        (None, Some(aircraft)) => {
            let today = chrono::Local::now().format("%Y-%m-%d").to_string();
            let dir = gcproxy::journal::next_flight_dir(std::path::Path::new(aircraft), &today)?;
            dir.join("mav.log")
        }
        (None, None) => std::path::PathBuf::from("mav.log"),
    };
    let raw = base.with_extension("log.raw");
    let status = base.with_file_name("status.txt");
    let (handle, worker) = JournalWorker::open(&base, &raw, &status, args.append_log)?;
    Ok((handle, worker))
}

async fn run_journal(mut worker: JournalWorker) {
    while worker.drain_once().await {}
}
