use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::process;

use clap::{ArgGroup, Parser};
use tracing::{debug, error};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use sip_call_scanner::types::{CallRecord, Direction, LogTimestamp};
use sip_call_scanner::{CallIndex, LogScanner, ScanConfig, ScanStats, Selection};

#[derive(Parser)]
#[command(
    name = "sip-call-scanner",
    about = "Reconstruct SIP call flows from telephony switch logs",
    group(ArgGroup::new("selection").required(true).args(["call_id", "number"]))
)]
struct Cli {
    /// Log files to scan (- for stdin, default: stdin)
    files: Vec<String>,

    /// Keep calls whose raw Call-ID matches REGEX
    #[arg(short = 'c', long = "call-id", value_name = "REGEX")]
    call_id: Option<String>,

    /// Keep calls whose From or To header contains DIGITS
    #[arg(short = 'n', long = "number", value_name = "DIGITS")]
    number: Option<String>,

    /// Use the plain DID header even when the cross-domain DID header is present
    #[arg(long)]
    ignore_alt_did: bool,

    /// Header carrying the dialed number
    #[arg(long, value_name = "NAME", default_value = sip_call_scanner::filter::DEFAULT_DID_HEADER)]
    did_header: String,

    /// Cross-domain header carrying the dialed number
    #[arg(long, value_name = "NAME", default_value = sip_call_scanner::filter::DEFAULT_ALT_DID_HEADER)]
    alt_did_header: String,

    /// Show the message flow of every matched call
    #[arg(long, group = "output_mode")]
    flow: bool,

    /// Show scan statistics
    #[arg(long, group = "output_mode")]
    stats: bool,

    /// Narrate skip/match decisions (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn build_config(cli: &Cli) -> ScanConfig {
    let selection = match (&cli.call_id, &cli.number) {
        (Some(pattern), _) => match Selection::call_id(pattern) {
            Ok(sel) => sel,
            Err(e) => {
                eprintln!("{pattern}: {e}");
                process::exit(2);
            }
        },
        (None, Some(number)) => Selection::number(number.as_str()),
        (None, None) => {
            eprintln!("one of --call-id or --number is required");
            process::exit(2);
        }
    };
    ScanConfig {
        selection: Some(selection),
        ignore_alt_did: cli.ignore_alt_did,
        did_header: cli.did_header.clone(),
        alt_did_header: cli.alt_did_header.clone(),
    }
}

/// One named input. `-` is stdin.
struct Input {
    label: String,
    reader: Box<dyn Read>,
}

fn open_inputs(files: &[String]) -> Result<Vec<Input>, (String, io::Error)> {
    if files.is_empty() {
        return Ok(vec![Input {
            label: "-".to_owned(),
            reader: Box::new(io::stdin().lock()),
        }]);
    }
    files
        .iter()
        .map(|path| {
            let reader: Box<dyn Read> = if path == "-" {
                Box::new(io::stdin().lock())
            } else {
                Box::new(File::open(path).map_err(|e| (path.clone(), e))?)
            };
            Ok(Input {
                label: path.clone(),
                reader,
            })
        })
        .collect()
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn format_ts(ts: Option<LogTimestamp>) -> String {
    ts.map_or_else(|| "-".to_owned(), |t| t.to_string())
}

fn format_party(name: Option<&str>, number: Option<&str>) -> String {
    match (name, number) {
        (Some(name), Some(number)) => format!("\"{name}\" {number}"),
        (None, Some(number)) => number.to_owned(),
        (Some(name), None) => format!("\"{name}\""),
        (None, None) => "-".to_owned(),
    }
}

fn format_summary(rec: &CallRecord) -> String {
    format!(
        "{} {} {} -> {} dialed={} [{}]",
        format_ts(rec.first_timestamp()),
        rec.call_id,
        format_party(rec.caller_name.as_deref(), rec.caller_number.as_deref()),
        format_party(rec.callee_name.as_deref(), rec.callee_number.as_deref()),
        rec.dialed_number.as_deref().unwrap_or("-"),
        rec.method_summary(),
    )
}

fn output_flow(rec: &CallRecord) {
    println!("call {}", rec.call_id);
    println!(
        "  caller: {} ({})",
        format_party(rec.caller_name.as_deref(), rec.caller_number.as_deref()),
        rec.origin_agent.as_deref().unwrap_or("unknown agent"),
    );
    println!(
        "  callee: {} ({})",
        format_party(rec.callee_name.as_deref(), rec.callee_number.as_deref()),
        rec.dest_agent.as_deref().unwrap_or("unknown agent"),
    );
    if let Some(dialed) = &rec.dialed_number {
        println!("  dialed: {dialed}");
    }
    for pkt in rec.packets() {
        let arrow = match pkt.direction {
            Direction::Outbound => "-->",
            Direction::Inbound => "<--",
        };
        let contact = pkt
            .contact
            .as_deref()
            .map(|c| format!(" contact={c}"))
            .unwrap_or_default();
        println!(
            "  {} {arrow} {} {}{contact}",
            format_ts(pkt.timestamp),
            pkt.address,
            pkt.message_type.label(),
        );
    }
    println!(
        "  first: {}  last: {}",
        format_ts(rec.first_timestamp()),
        format_ts(rec.last_timestamp()),
    );
    println!();
}

fn output_stats(index: &CallIndex, stats: &ScanStats) {
    println!("lines: {}", stats.lines);
    println!("blocks: {}", stats.blocks);
    println!("committed: {}", stats.committed);
    println!("rejected by selection: {}", stats.rejected);
    if stats.discarded > 0 {
        println!("discarded: {}", stats.discarded);
    }
    if stats.abandoned > 0 {
        println!("unterminated: {}", stats.abandoned);
    }
    if stats.removed_calls > 0 {
        println!("removed calls: {}", stats.removed_calls);
    }
    println!("calls: {}", index.len());

    let mut method_counts: HashMap<String, usize> = HashMap::new();
    for rec in index.iter() {
        for pkt in rec.packets() {
            *method_counts.entry(pkt.message_type.label()).or_default() += 1;
        }
    }
    let mut methods: Vec<_> = method_counts.into_iter().collect();
    methods.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if !methods.is_empty() {
        println!("\nmessages:");
        for (label, count) in &methods {
            println!("  {label}: {count}");
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = build_config(&cli);
    let inputs = match open_inputs(&cli.files) {
        Ok(inputs) => inputs,
        Err((path, e)) => {
            eprintln!("{path}: {e}");
            process::exit(1);
        }
    };

    // one run per input so a block cut off at the end of a file never
    // continues into the next one
    let mut scanner = LogScanner::new(config);
    for input in inputs {
        debug!(input = %input.label, "scanning");
        if let Err(e) = scanner.run(input.reader) {
            error!("{}: scan failed: {e}", input.label);
            process::exit(1);
        }
    }
    let stats = scanner.stats();
    let index = scanner.into_index();

    if cli.stats {
        output_stats(&index, &stats);
        return;
    }

    for rec in index.into_records() {
        if cli.flow {
            output_flow(&rec);
        } else {
            println!("{}", format_summary(&rec));
        }
    }
}
