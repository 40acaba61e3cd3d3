use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use samscan::chunk::{MAX_CHUNK, QUEUE_CAPACITY};
use samscan::collect::Collector;
use samscan::collectors::{FlagstatCollector, GcContentCollector};
use samscan::pipeline::{self, ScanConfig};
use samscan::reference::{FastaResolver, ReferenceResolver};
use samscan::source::SamReader;

#[derive(Parser)]
#[command(name = "samscan")]
#[command(about = "Single-pass scan over a coordinate-sorted SAM stream", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CollectorKind {
    /// Flag-field tallies (mapped/unmapped, pairing, duplicates)
    Flagstat,
    /// GC content of the reference window under each record
    GcContent,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a SAM file once and run the selected collectors over it
    Scan {
        /// Input SAM file (.sam, .sam.gz or BGZF)
        #[arg(value_name = "INPUT.SAM")]
        input: PathBuf,

        /// Reference FASTA used to annotate mapped records
        #[arg(short = 'R', long, value_name = "REF.FA")]
        reference: Option<PathBuf>,

        /// Assume coordinate order even if the header disagrees
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set, value_name = "BOOL")]
        assume_sorted: bool,

        /// Stop after processing N records, mainly for debugging (0 = unbounded)
        #[arg(long, value_name = "INT", default_value_t = 0)]
        stop_after: u64,

        /// Records per chunk
        #[arg(long, value_name = "INT", default_value_t = MAX_CHUNK)]
        chunk_size: usize,

        /// Chunks each stage handoff may hold
        #[arg(long, value_name = "INT", default_value_t = QUEUE_CAPACITY)]
        queue_capacity: usize,

        /// Collectors to run, in registration order
        #[arg(long = "collect", value_enum, value_name = "NAME", default_values = ["flagstat"])]
        collectors: Vec<CollectorKind>,

        /// Prefix for report files (default: reports go to stdout)
        #[arg(short = 'o', long, value_name = "PREFIX")]
        output: Option<PathBuf>,

        /// Verbose level: 1=error, 2=warning, 3=message, 4+=debugging
        #[arg(short = 'v', long, value_name = "INT", default_value = "3")]
        verbosity: i32,
    },
}

fn report_path(prefix: Option<&PathBuf>, suffix: &str) -> Option<PathBuf> {
    prefix.map(|p| {
        let mut name = p.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    })
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            input,
            reference,
            assume_sorted,
            stop_after,
            chunk_size,
            queue_capacity,
            collectors,
            output,
            verbosity,
        } => {
            let log_level = match verbosity {
                v if v <= 1 => log::LevelFilter::Error,
                2 => log::LevelFilter::Warn,
                3 => log::LevelFilter::Info,
                4 => log::LevelFilter::Debug,
                _ => log::LevelFilter::Trace,
            };
            env_logger::Builder::from_default_env()
                .filter_level(log_level)
                .format_timestamp(None)
                .format_target(false)
                .init();

            log::info!("Scanning {}", input.display());

            let source = match SamReader::open(&input) {
                Ok(source) => Box::new(source),
                Err(e) => {
                    log::error!("Cannot open input: {e:#}");
                    std::process::exit(1);
                }
            };

            let resolver: Option<Box<dyn ReferenceResolver>> = match &reference {
                Some(path) => match FastaResolver::open(path) {
                    Ok(resolver) => {
                        log::info!("Using reference {}", path.display());
                        Some(Box::new(resolver))
                    }
                    Err(e) => {
                        log::error!("Cannot open reference: {e:#}");
                        std::process::exit(1);
                    }
                },
                None => None,
            };

            let registered: Vec<Box<dyn Collector>> = collectors
                .iter()
                .map(|kind| -> Box<dyn Collector> {
                    match kind {
                        CollectorKind::Flagstat => Box::new(FlagstatCollector::new(report_path(
                            output.as_ref(),
                            ".flagstat.txt",
                        ))),
                        CollectorKind::GcContent => Box::new(GcContentCollector::new(
                            report_path(output.as_ref(), ".gc.txt"),
                        )),
                    }
                })
                .collect();

            let config = ScanConfig {
                assume_sorted,
                stop_after,
                chunk_size,
                queue_capacity,
                ..ScanConfig::default()
            };

            if let Err(e) = pipeline::run(source, resolver, &config, registered) {
                log::error!("Scan failed: {e}");
                std::process::exit(1);
            }
            log::info!("Scan complete");
        }
    }
}
