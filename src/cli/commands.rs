use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Inspect and capture in-memory file system fixtures
#[derive(Parser, Debug)]
#[command(
    name = "fsdouble",
    about = "Inspect and capture in-memory file system fixtures",
    version,
    author,
    long_about = "fsdouble loads seed manifests into the in-memory file system and lets you \
                  browse them, or captures a real directory into a manifest that tests can \
                  seed from."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Print the tree seeded from a manifest",
        long_about = "Loads a manifest into a fresh in-memory file system and prints it as a tree.\n\n\
                      Examples:\n  \
                      fsdouble tree fixture.yaml\n  \
                      fsdouble tree fixture.yaml --path /repo/src"
    )]
    Tree(TreeArgs),

    #[command(
        about = "List entries matching a pattern",
        long_about = "Enumerates a directory of the seeded file system.\n\n\
                      Examples:\n  \
                      fsdouble ls fixture.yaml /repo\n  \
                      fsdouble ls fixture.yaml /repo -p '*.rs' -r --files"
    )]
    Ls(LsArgs),

    #[command(about = "Print a file from the seeded file system")]
    Cat(CatArgs),

    #[command(
        about = "Capture a real directory as a manifest",
        long_about = "Walks a directory on disk and prints it as a seed manifest.\n\n\
                      Examples:\n  \
                      fsdouble capture ./fixtures/app\n  \
                      fsdouble capture ./fixtures/app -f json -o app.json"
    )]
    Capture(CaptureArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
    #[arg(value_name = "MANIFEST", help = "Seed manifest (.yaml or .json)")]
    pub manifest: PathBuf,

    #[arg(long, value_name = "PATH", help = "Directory to start from (defaults to /)")]
    pub path: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct LsArgs {
    #[arg(value_name = "MANIFEST", help = "Seed manifest (.yaml or .json)")]
    pub manifest: PathBuf,

    #[arg(
        value_name = "PATH",
        help = "Directory to list (defaults to the manifest's current directory)"
    )]
    pub path: Option<String>,

    #[arg(short = 'p', long, default_value = "*", help = "File-name pattern")]
    pub pattern: String,

    #[arg(short = 'r', long, help = "Include all descendants")]
    pub recursive: bool,

    #[arg(long, conflicts_with = "dirs", help = "Only list files")]
    pub files: bool,

    #[arg(long, help = "Only list directories")]
    pub dirs: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CatArgs {
    #[arg(value_name = "MANIFEST", help = "Seed manifest (.yaml or .json)")]
    pub manifest: PathBuf,

    #[arg(value_name = "PATH", help = "File to print")]
    pub path: String,
}

#[derive(Args, Debug, Clone)]
pub struct CaptureArgs {
    #[arg(value_name = "DIR", help = "Directory to capture (defaults to current directory)")]
    pub directory: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "yaml",
        help = "Output format"
    )]
    pub format: ManifestFormatArg,

    #[arg(long, default_value = "*", help = "Only capture files matching this pattern")]
    pub pattern: String,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write output to file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormatArg {
    Yaml,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_ls() {
        let args = CliArgs::parse_from([
            "fsdouble", "ls", "seed.yaml", "/repo", "-p", "*.rs", "-r", "--files",
        ]);
        match args.command {
            Commands::Ls(ls) => {
                assert_eq!(ls.path.as_deref(), Some("/repo"));
                assert_eq!(ls.pattern, "*.rs");
                assert!(ls.recursive);
                assert!(ls.files);
                assert!(!ls.dirs);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_capture_defaults() {
        let args = CliArgs::parse_from(["fsdouble", "capture"]);
        match args.command {
            Commands::Capture(capture) => {
                assert!(capture.directory.is_none());
                assert_eq!(capture.format, ManifestFormatArg::Yaml);
                assert_eq!(capture.pattern, "*");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["fsdouble", "cat", "seed.yaml", "/a.txt", "--verbose"]);
        assert!(args.verbose);
        assert!(!args.quiet);

        let err = CliArgs::try_parse_from(["fsdouble", "cat", "s.yaml", "/a", "-v", "-q"]);
        assert!(err.is_err());
    }
}
