use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio::task;
use tracing::{error, info};

use blkparse::decoder::{BlockDecoder, DecoderConfig, Network, WitnessDetection};
use blkparse::file_reader::FileReader;
use blkparse::logging::{init_tracing, LogFormat};
use blkparse::processing::scan_files;
use blkparse::report;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Block headers plus every transaction
    Text,
    /// Block headers only
    Summary,
    /// One JSON object per block
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum NetworkArg {
    Mainnet,
    Testnet3,
    Regtest,
    Signet,
}

impl From<NetworkArg> for Network {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Mainnet => Network::Mainnet,
            NetworkArg::Testnet3 => Network::Testnet3,
            NetworkArg::Regtest => Network::Regtest,
            NetworkArg::Signet => Network::Signet,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Parser)]
#[command(name = "blkparse")]
#[command(about = "Decode Bitcoin blk*.dat block files")]
struct Cli {
    /// Directory containing blk*.dat files
    #[arg(env = "BLOCKS_PATH", value_name = "BLOCKS_DIR")]
    blocks_dir: PathBuf,

    /// Reject records whose magic does not belong to this network
    #[arg(short, long, value_enum)]
    network: Option<NetworkArg>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
    format: OutputFormat,

    /// Stop after this many blocks
    #[arg(short, long)]
    limit: Option<usize>,

    /// Decode this many files concurrently and print per-file totals
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Also read witness stacks when input/output scripts suggest them
    #[arg(long)]
    heuristic_witness: bool,

    /// Abort on the first decode error instead of moving to the next file
    #[arg(long)]
    fail_fast: bool,

    #[arg(long, value_enum, default_value_t = LogFormatArg::Pretty)]
    log_format: LogFormatArg,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_format.into(), "info")?;

    let mut config = cli
        .network
        .map(|network| DecoderConfig::for_network(network.into()))
        .unwrap_or_default();
    if cli.heuristic_witness {
        config.witness_detection = WitnessDetection::Heuristic;
    }
    let decoder = BlockDecoder::new(config);

    let reader = FileReader::new(&cli.blocks_dir)
        .map_err(|e| format!("cannot read {}: {}", cli.blocks_dir.display(), e))?;
    info!(dir = %reader.path().display(), files = reader.file_paths.len(), "found block files");

    match cli.jobs {
        Some(jobs) => scan_parallel(reader, decoder, jobs, cli.format).await,
        None => decode_sequential(&reader, decoder, &cli),
    }
}

fn decode_sequential(
    reader: &FileReader,
    decoder: BlockDecoder,
    cli: &Cli,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = reader.blocks(decoder);
    let mut block_counter = 0usize;
    let mut start_time = Instant::now();

    while let Some(result) = stream.next() {
        let block = match result {
            Ok(block) => block,
            Err(e) => {
                error!(source = stream.current_source().unwrap_or("-"), error = %e, "decode failed");
                if cli.fail_fast {
                    return Err(e.into());
                }
                continue;
            }
        };

        match cli.format {
            OutputFormat::Json => println!("{}", report::json_line(&block)?),
            OutputFormat::Summary => print!("{}", report::block_summary(&block)?),
            OutputFormat::Text => {
                print!("{}", report::block_summary(&block)?);
                for tx in &block.transactions {
                    print!("{}", report::transaction_detail(tx)?);
                }
            }
        }

        block_counter += 1;
        if block_counter % 1000 == 0 {
            info!(blocks = block_counter, elapsed = ?start_time.elapsed(), "decoded 1000 blocks");
            start_time = Instant::now();
        }
        if cli.limit.map_or(false, |limit| block_counter >= limit) {
            break;
        }
    }

    info!(blocks = block_counter, "all blocks processed");
    Ok(())
}

async fn scan_parallel(
    reader: FileReader,
    decoder: BlockDecoder,
    jobs: usize,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, mut rx) = mpsc::channel(100);
    let handle = task::spawn(scan_files(reader.file_paths, decoder, jobs, tx));

    let mut blocks = 0usize;
    while let Some(summary) = rx.recv().await {
        blocks += summary.blocks;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string(&summary)?),
            _ => println!("{}", report::file_summary_line(&summary)),
        }
    }

    handle.await?;
    info!(blocks, "all files processed");
    Ok(())
}
