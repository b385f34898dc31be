use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "hzpack")]
#[command(version)]
#[command(about = "Bundle files into a '.hz' archive and extract them", long_about = None)]
#[command(after_help = "Examples:\n  \
  hzpack bundle.hz -m ./docs -r      create bundle.hz from docs/, recursively\n  \
  hzpack bundle.hz -l                list the entries of bundle.hz\n  \
  hzpack bundle.hz a.txt -d out -o   extract a.txt into out/, overwriting")]
pub struct Cli {
    /// Archive path (created when it does not exist yet)
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    /// Entry names to extract (default: all)
    #[arg(value_name = "NAMES")]
    pub names: Vec<String>,

    /// Merge the files of DIR into the archive
    #[arg(short = 'm', value_name = "DIR")]
    pub merge_dir: Option<String>,

    /// Recurse into subdirectories when merging
    #[arg(short = 'r')]
    pub recursive: bool,

    /// Skip files too large for the format instead of failing the merge
    #[arg(short = 'B')]
    pub tolerate_oversized: bool,

    /// List entries (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List entries verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract entries into DIR
    #[arg(short = 'd', value_name = "DIR")]
    pub dest_dir: Option<String>,

    /// Overwrite existing files when extracting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Quiet mode
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }
}
