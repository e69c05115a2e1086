//! CLI for bitmix: throw a bit finalizer at a statistical battery and see what sticks.

mod commands;
mod table;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bitmix")]
#[command(about = "bitmix: avalanche and statistical quality testing for 64-bit bit finalizers")]
#[command(version = bitmix_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Finalizer and base sequence selection, shared by the generating commands.
#[derive(Args, Clone, Debug, Default)]
pub struct SourceArgs {
    /// Finalizer name (see `bitmix list`); default is the built-in wyhash
    #[arg(long)]
    hash: Option<String>,

    /// Base sequence: weyl (low entropy), lcg (medium), pcg (high)
    #[arg(long, default_value = "weyl", value_parser = ["weyl", "lcg", "pcg"])]
    sequence: String,

    /// Weyl increment (odd; an even value is forced odd). Accepts 0x.. and 0.. forms
    #[arg(long)]
    increment: Option<String>,

    /// Shorthand for --increment 0x9e3779b97f4a7c15
    #[arg(long, conflicts_with = "increment")]
    phi: bool,

    /// Initial counter / state. Accepts 0x.. and 0.. forms
    #[arg(long)]
    counter: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the selectable finalizers
    List {
        /// One per line with shifts and multipliers
        #[arg(long)]
        params: bool,
    },

    /// Print a finalizer as a Rust function
    Show {
        /// Finalizer name
        name: String,
    },

    /// Write SAC or hashed-sequence data to a file
    Makedata {
        /// Output file
        file: String,

        /// Output size in KiB
        #[arg(long, conflicts_with_all = ["mb", "gb"])]
        kb: Option<String>,

        /// Output size in MiB
        #[arg(long, conflicts_with = "gb")]
        mb: Option<String>,

        /// Output size in GiB
        #[arg(long)]
        gb: Option<String>,

        /// Fill strategy: sac (strict avalanche rows, default) or seq (hashed sequence)
        #[arg(long, default_value = "sac", value_parser = ["sac", "seq"])]
        fill: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Stream generated data to stdout (pipe-friendly)
    Stream {
        /// Total bytes (0 = infinite). Accepts 0x.. and 0.. forms
        #[arg(long)]
        bytes: Option<String>,

        /// Fill strategy: sac or seq (default, the hashed sequence)
        #[arg(long, default_value = "seq", value_parser = ["sac", "seq"])]
        fill: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Run the statistical battery on a finalizer or a data file
    Test {
        /// Data file to test instead of a live finalizer
        file: Option<String>,

        /// Battery: bits (default) or full
        #[arg(long, default_value = "bits", value_parser = ["bits", "full"])]
        battery: String,

        /// Battery size in 64-bit blocks (at least 8); default 32000 bits
        #[arg(long)]
        blocks: Option<String>,

        /// Number of trials (live runs only; file runs do one)
        #[arg(long)]
        trials: Option<String>,

        /// Display threshold on min(p, 1-p)
        #[arg(long)]
        pshow: Option<String>,

        /// Suspicious threshold on min(p, 1-p)
        #[arg(long)]
        psus: Option<String>,

        /// Failure threshold on min(p, 1-p)
        #[arg(long)]
        pfail: Option<String>,

        /// Show every row, not just new worst results
        #[arg(long)]
        no_trim: bool,

        /// Which 32 bits of each word the battery sees: lo, hi, reversed
        #[arg(long, default_value = "lo", value_parser = ["lo", "hi", "reversed"])]
        sample: String,

        /// Plain ASCII tables without colour
        #[arg(long)]
        ascii: bool,

        /// Maximum battery passes per trial (inconclusive results double the size)
        #[arg(long)]
        refine_limit: Option<String>,

        /// Write the final report as JSON
        #[arg(long)]
        output: Option<String>,

        #[command(flatten)]
        source: SourceArgs,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List { params } => {
            commands::list::run(params);
            Ok(())
        }
        Commands::Show { name } => commands::show::run(&name),
        Commands::Makedata {
            file,
            kb,
            mb,
            gb,
            fill,
            source,
        } => commands::makedata::run(commands::makedata::MakedataCommandConfig {
            path: &file,
            kb: kb.as_deref(),
            mb: mb.as_deref(),
            gb: gb.as_deref(),
            fill: &fill,
            source: &source,
        }),
        Commands::Stream {
            bytes,
            fill,
            source,
        } => commands::stream::run(bytes.as_deref(), &fill, &source),
        Commands::Test {
            file,
            battery,
            blocks,
            trials,
            pshow,
            psus,
            pfail,
            no_trim,
            sample,
            ascii,
            refine_limit,
            output,
            source,
        } => commands::test::run(commands::test::TestCommandConfig {
            file: file.as_deref(),
            battery: &battery,
            blocks: blocks.as_deref(),
            trials: trials.as_deref(),
            pshow: pshow.as_deref(),
            psus: psus.as_deref(),
            pfail: pfail.as_deref(),
            trim: !no_trim,
            sample: &sample,
            ascii,
            refine_limit: refine_limit.as_deref(),
            output_path: output.as_deref(),
            source: &source,
        }),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
