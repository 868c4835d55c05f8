use clap::Parser;
use colored::Colorize;
use miette::IntoDiagnostic;
use prose_md::config::DEFAULT_CONFIG_PATH;
use prose_md::{ConversionConfig, ConversionResult, Converter};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Default)]
#[command(name = "prose-md")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(disable_version_flag = true)]
#[command(after_help = "# Examples:\n\n\
    ## To convert ./content into ./markdown:\n\
    prose-md\n\n\
    ## To use explicit directories:\n\
    prose-md -s ./posts -o ./docs\n\n\
    ## To write a starter config file:\n\
    prose-md --init")]
#[command(
    about = "prose-md converts prose documents embedded in JSON files into Markdown.",
    long_about = None
)]
pub struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory scanned for JSON files
    #[arg(short, long, value_name = "DIR")]
    source: Option<PathBuf>,

    /// Directory Markdown files are written to
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Print version
    #[arg(short = 'v', long)]
    version: bool,

    /// Write the default configuration and exit
    #[arg(long)]
    init: bool,

    /// Print the resolved configuration and log progress
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    pub fn run(&self) -> miette::Result<ExitCode> {
        if self.version {
            println!("prose-md {}", env!("CARGO_PKG_VERSION"));
            return Ok(ExitCode::SUCCESS);
        }

        self.init_tracing();

        if self.init {
            let path = self
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
            ConversionConfig::write_default(&path)?;
            println!("Wrote default configuration to {}", path.display());
            return Ok(ExitCode::SUCCESS);
        }

        let config = self.resolve_config()?;

        if self.verbose {
            println!("{}", config.to_json_pretty()?);
        }

        let mut converter = Converter::new(config).with_observer(print_result);
        let report = converter.convert_directory()?;

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        report.write_summary(&mut handle).into_diagnostic()?;
        handle.flush().into_diagnostic()?;

        if report.failed_conversions > 0 {
            Ok(ExitCode::FAILURE)
        } else {
            Ok(ExitCode::SUCCESS)
        }
    }

    fn resolve_config(&self) -> miette::Result<ConversionConfig> {
        let mut config = ConversionConfig::load(self.config.as_deref())?;
        if let Some(source) = &self.source {
            config.source_dir = source.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        config.validate()?;
        Ok(config)
    }

    fn init_tracing(&self) {
        let default_level = if self.verbose { "info" } else { "warn" };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(false)
            .try_init();
    }
}

fn print_result(result: &ConversionResult) {
    if result.success {
        let destination = result
            .destination_path
            .as_deref()
            .map(Path::display)
            .map(|d| d.to_string())
            .unwrap_or_default();
        println!(
            "{} {} -> {}",
            "✓".green(),
            result.source_path,
            destination.dimmed()
        );
    } else {
        println!(
            "{} {}: {}",
            "✗".red(),
            result.source_path,
            result.error.as_deref().unwrap_or_default().red()
        );
    }
}
