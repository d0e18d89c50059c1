#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::uninlined_format_args)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use packr_bundle::MANIFEST_FILE;
use packr_core::{PackOptions, DEFAULT_RADIX};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "packr")]
#[command(author, version, about = "Compact and pack JavaScript", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Join scripts and pack them into one file
    Pack {
        /// Input scripts, joined in the order given
        #[arg(required = true, value_name = "INPUT")]
        inputs: Vec<PathBuf>,

        /// Output file; the source map is written next to it
        #[arg(short, long, value_name = "OUTPUT")]
        output: PathBuf,

        /// Rename local variables and parameters
        #[arg(long)]
        shrink_vars: bool,

        /// Rename _private identifiers across all inputs
        #[arg(long)]
        private: bool,

        /// Encode the result as a self-decoding base62 payload
        #[arg(long)]
        base62: bool,

        /// Names never to rename (comma-separated)
        #[arg(long, value_delimiter = ',', value_name = "NAME")]
        protect: Vec<String>,

        /// Text written above the packed code
        #[arg(long)]
        header: Option<String>,

        /// Radix of base62 word codes (2-62)
        #[arg(long, default_value_t = DEFAULT_RADIX)]
        radix: u32,
    },

    /// Build every bundle listed in a manifest
    Build {
        /// Manifest file (defaults to packr.json in the working directory)
        manifest: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Pack {
            inputs,
            output,
            shrink_vars,
            private,
            base62,
            protect,
            header,
            radix,
        }) => {
            let span = tracing::info_span!("packr", cmd = "pack", cwd = %cwd.display());
            let _guard = span.enter();

            let options = PackOptions::new()
                .with_shrink_vars(shrink_vars)
                .with_private(private)
                .with_base62(base62)
                .with_protected_names(protect)
                .with_radix(radix);
            let action = commands::pack::PackAction {
                cwd: cwd.clone(),
                inputs,
                output,
                header,
                options,
            };
            commands::pack::run(action, cli.json)
        }
        Some(Commands::Build { manifest }) => {
            let span = tracing::info_span!("packr", cmd = "build", cwd = %cwd.display());
            let _guard = span.enter();

            let manifest = cwd.join(manifest.unwrap_or_else(|| PathBuf::from(MANIFEST_FILE)));
            commands::build::run(manifest, cli.json)
        }
    }
}
