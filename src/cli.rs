use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pkginfo")]
#[command(version)]
#[command(about = "Show name, bundle id, version, build and icon of an .apk or .ipa", long_about = None)]
#[command(after_help = "Examples:\n  \
  pkginfo app.apk                    print identity fields\n  \
  pkginfo --json App.ipa             print identity as JSON\n  \
  pkginfo app.apk --icon icon.png    also save the launcher icon")]
pub struct Cli {
    /// Package file (.apk or .ipa)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Write the icon as PNG to this path
    #[arg(long, value_name = "PATH")]
    pub icon: Option<PathBuf>,

    /// More log output (-vv for trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (-qq => no log output)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    /// Log level from the `-v`/`-q` counts; warnings are shown by default.
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose as i16 - self.quiet as i16 {
            i16::MIN..=-2 => LevelFilter::Off,
            -1 => LevelFilter::Error,
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
