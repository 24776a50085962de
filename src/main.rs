use fsdouble::cli::commands::{CliArgs, Commands};
use fsdouble::cli::handlers::{handle_capture, handle_cat, handle_ls, handle_tree};
use fsdouble::util::logging::{init_logging, parse_level, LoggingConfig};
use fsdouble::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};

fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("fsdouble v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Tree(tree_args) => handle_tree(tree_args),
        Commands::Ls(ls_args) => handle_ls(ls_args),
        Commands::Cat(cat_args) => handle_cat(cat_args),
        Commands::Capture(capture_args) => handle_capture(capture_args, args.quiet),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("FSDOUBLE_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
        parse_level(&level_str)
    };

    init_logging(LoggingConfig::with_level(level).stderr());
}
