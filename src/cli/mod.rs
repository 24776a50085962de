pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CaptureArgs, CatArgs, CliArgs, Commands, LsArgs, ManifestFormatArg, TreeArgs};
pub use output::{format_listing, format_manifest, render_tree, OutputFormat};
