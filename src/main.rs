use anyhow::Context;
use clap::Parser;
use huffcode::codec::{codebook_path_for, compress_file, decompress_file, DecompressOptions};
use huffcode::{CodeTree, DecodeStatus};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use tracing::{info, warn, Level};

#[derive(Debug, Clone, clap::Args)]
struct CompressArgs {
    input_path: PathBuf,
    output_path: PathBuf,
    /// Where to write the codebook. Defaults to the output path with `.code`
    /// appended.
    #[arg(long)]
    codebook: Option<PathBuf>,
}

#[derive(Debug, Clone, clap::Args)]
struct DecompressArgs {
    input_path: PathBuf,
    output_path: PathBuf,
    /// Codebook of the compressed file. Defaults to the input path with
    /// `.code` appended.
    #[arg(long)]
    codebook: Option<PathBuf>,
    /// Accept codebooks that are not a valid prefix code.
    #[arg(long)]
    lenient: bool,
    /// Keep the partial output of a stream that ends before the
    /// end-of-stream code. Without it the output file is removed and the
    /// command fails.
    #[arg(long)]
    allow_truncated: bool,
}

#[derive(Debug, Clone, clap::Args)]
struct CodesArgs {
    input_path: PathBuf,
}

#[derive(Debug, Clone, clap::Subcommand)]
enum Operation {
    /// Compress a file into a bit stream and a codebook.
    Compress(CompressArgs),
    /// Restore a file from its bit stream and codebook.
    Decompress(DecompressArgs),
    /// Print the codebook a file would be compressed with.
    Codes(CodesArgs),
}

#[derive(Debug, clap::Parser)]
#[command(version, about = "Huffman compression of files")]
struct Args {
    /// More log output, repeat for more.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    op: Operation,
}

fn init_logging(args: &Args) {
    let level = if args.quiet {
        Level::ERROR
    } else {
        match args.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn compress(args: CompressArgs) -> anyhow::Result<()> {
    let codebook_path = args
        .codebook
        .unwrap_or_else(|| codebook_path_for(&args.output_path));

    let summary = compress_file(&args.input_path, &args.output_path, &codebook_path)
        .with_context(|| format!("compressing {}", args.input_path.display()))?;

    info!(
        input_bytes = summary.input_bytes,
        output_bytes = summary.output_bits.div_ceil(8),
        symbols = summary.codebook_entries,
        crc32 = format_args!("{:08x}", summary.crc32),
        codebook = %codebook_path.display(),
        "compressed"
    );

    Ok(())
}

fn decompress(args: DecompressArgs) -> anyhow::Result<()> {
    let codebook_path = args
        .codebook
        .unwrap_or_else(|| codebook_path_for(&args.input_path));

    let options = DecompressOptions {
        validate_codebook: !args.lenient,
        allow_truncated: args.allow_truncated,
    };

    let summary = decompress_file(&args.input_path, &codebook_path, &args.output_path, options)
        .with_context(|| format!("decompressing {}", args.input_path.display()))?;

    info!(
        output_bytes = summary.output_bytes,
        crc32 = format_args!("{:08x}", summary.crc32),
        "decompressed"
    );

    if let DecodeStatus::Truncated { pending_bits } = summary.status {
        warn!(
            pending_bits,
            output = %args.output_path.display(),
            "compressed stream ended before the end-of-stream code, kept partial output"
        );
    }

    Ok(())
}

fn codes(args: CodesArgs) -> anyhow::Result<()> {
    let file = File::open(&args.input_path)
        .with_context(|| format!("opening {}", args.input_path.display()))?;
    let stats = huffcode::frequency::count_bytes(&mut BufReader::new(file))?;

    let tree = CodeTree::build(&stats, huffcode::EOF_SYMBOL)?;
    tree.codebook().write_to(io::stdout().lock())?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    match args.op {
        Operation::Compress(args) => compress(args),
        Operation::Decompress(args) => decompress(args),
        Operation::Codes(args) => codes(args),
    }
}
