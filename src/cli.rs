use clap::Parser;
use std::time::Duration;

use crate::io::HttpConfig;

#[derive(Parser, Debug)]
#[command(name = "partialzip")]
#[command(version)]
#[command(about = "Download single files from remote ZIP archives using HTTP Range requests", long_about = None)]
#[command(after_help = "Examples:\n  \
  partialzip -l https://example.com/archive.zip              list files in a remote ZIP\n  \
  partialzip -p https://example.com/archive.zip readme.txt   print one file to stdout\n  \
  partialzip -d out https://example.com/archive.zip a b      download two files into out/")]
pub struct Cli {
    /// ZIP archive URL or local path
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    /// Files to download (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Write file contents to stdout, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Download files into DIR
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Overwrite existing files
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode
    #[arg(short = 'q')]
    pub quiet: bool,

    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// User-Agent header sent with every request
    #[arg(long, value_name = "AGENT")]
    pub user_agent: Option<String>,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.archive.starts_with("http://") || self.archive.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet || self.pipe
    }

    pub fn http_config(&self) -> HttpConfig {
        let mut config = HttpConfig {
            timeout: Duration::from_secs(self.timeout),
            ..HttpConfig::default()
        };
        if let Some(agent) = &self.user_agent {
            config.user_agent = agent.clone();
        }
        config
    }
}
