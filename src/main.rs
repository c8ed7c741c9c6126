//! Card-number redaction CLI.
//!
//! Splits documents into page images for an external analysis service,
//! replays that service's recorded responses to redact card numbers, and
//! scans plain text for card numbers.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pan_redactor::domain::{CardNumberMatcher, PatternMatcher};
use pan_redactor::pages::MIN_SCALE;
use pan_redactor::{
    PageSplitter, PipelineConfig, RecordedAnalyzer, RedactionPipeline, RedactionService,
    RenderOptions, SourceDocument,
};

/// Payment-card number redaction tool
///
/// Finds card numbers in OCR'd documents and covers them in place.
#[derive(Parser)]
#[command(name = "pan-redactor")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Redact card numbers using recorded analysis responses
    Redact {
        /// Input PDF or image
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output path (same format as the input)
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Directory holding page-<n>.json analysis responses
        #[arg(short, long, value_name = "DIR")]
        analysis_dir: PathBuf,

        /// Document type recorded in the result
        #[arg(long, default_value = "document")]
        document_type: String,

        /// Write the JSON result here instead of stdout
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// Per-page analysis timeout in seconds (0 disables)
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,

        /// Rasterization scale (at least 2.0)
        #[arg(long, default_value_t = MIN_SCALE)]
        scale: f32,

        /// Padding around each redaction box, in page units
        #[arg(long, default_value_t = 2.0)]
        padding: f32,

        /// Distinct digit groups a word must hold to be located by group
        #[arg(long, default_value_t = 1)]
        min_group_hits: usize,

        /// Only cover content instead of also erasing it (PDF)
        #[arg(long)]
        no_secure: bool,

        /// Replace card numbers in the reported text with masked labels
        #[arg(long)]
        mask_text: bool,
    },

    /// Render each page to page-<n>.png for submission to an analysis service
    Split {
        /// Input PDF or image
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// Rasterization scale (at least 2.0)
        #[arg(long, default_value_t = MIN_SCALE)]
        scale: f32,
    },

    /// Print masked labels for card numbers found in text
    #[command(group(ArgGroup::new("source").required(true).args(["text", "input"])))]
    Scan {
        /// Text to scan
        #[arg(short, long)]
        text: Option<String>,

        /// Text file to scan
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,
    },
}

/// Settings for one `redact` invocation.
struct RedactArgs<'a> {
    input: &'a Path,
    output: &'a Path,
    analysis_dir: &'a Path,
    document_type: &'a str,
    report: Option<&'a Path>,
    mask_text: bool,
    config: PipelineConfig,
    options: RenderOptions,
}

/// Command handler.
struct RedactionHandler {
    verbose: bool,
}

impl RedactionHandler {
    fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Runs the full pipeline and writes the redacted document and result.
    fn redact(&self, args: RedactArgs<'_>) -> Result<()> {
        if !args.input.exists() {
            anyhow::bail!("Input file does not exist: {}", args.input.display());
        }
        if !args.analysis_dir.is_dir() {
            anyhow::bail!(
                "Analysis directory does not exist: {}",
                args.analysis_dir.display()
            );
        }

        // stdout may carry the JSON report
        if self.verbose {
            eprintln!("Input:    {}", args.input.display());
            eprintln!("Output:   {}", args.output.display());
            eprintln!("Analysis: {}", args.analysis_dir.display());
        }

        let analyzer = Arc::new(RecordedAnalyzer::new(args.analysis_dir));
        let pipeline = RedactionPipeline::new(analyzer)
            .with_config(args.config)
            .with_context(|| "Invalid pipeline configuration")?
            .with_observer(|status: &str, current: usize, total: usize| {
                debug!(current, total, "{}", status);
            });
        let service = RedactionService::new(pipeline).with_options(args.options);

        let mut result = service.redact_to_result(args.input, args.output, args.document_type);
        if args.mask_text {
            result = result.with_masked_text();
        }
        let json =
            serde_json::to_string_pretty(&result).with_context(|| "Failed to encode result")?;

        match args.report {
            Some(path) => std::fs::write(path, &json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?,
            None => println!("{}", json),
        }

        if !result.success {
            anyhow::bail!(
                "Redaction failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            );
        }

        if self.verbose {
            if let Some(render) = &result.render {
                eprintln!("\nRedaction Summary:");
                eprintln!("  Pages processed: {}", render.pages_processed);
                eprintln!("  Pages modified:  {}", render.pages_modified);
                eprintln!("  Rectangles:      {}", render.rectangles_drawn);
                eprintln!("  Placeholders:    {}", render.placeholders);
                eprintln!(
                    "  Secure: {}",
                    if render.secure {
                        "Yes"
                    } else {
                        "No (visual only)"
                    }
                );
            }
        }

        let failed = result.pages.iter().filter(|p| !p.success).count();
        if failed > 0 {
            eprintln!(
                "⚠ {} of {} page(s) could not be analyzed",
                failed,
                result.pages.len()
            );
        }

        if result.extracted_fields.is_empty() {
            eprintln!("⚠ No card numbers found to redact");
        } else {
            eprintln!(
                "✓ Redacted {} card number(s) → {}",
                result.extracted_fields.len(),
                args.output.display()
            );
        }

        Ok(())
    }

    /// Writes one PNG per page.
    fn split(&self, input: &Path, output: &Path, scale: f32) -> Result<()> {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {}", input.display());
        }

        let splitter = PageSplitter::new()
            .with_scale(scale)
            .with_context(|| "Invalid scale")?;
        let source = SourceDocument::open(input)
            .with_context(|| format!("Failed to open {}", input.display()))?;
        let pages = splitter
            .split(&source)
            .with_context(|| "Page splitting failed")?;

        std::fs::create_dir_all(output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
        for page in &pages {
            let path = output.join(format!("page-{}.png", page.number()));
            std::fs::write(&path, &page.png)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if self.verbose {
                println!(
                    "  {} ({}x{})",
                    path.display(),
                    page.pixel_width,
                    page.pixel_height
                );
            }
        }

        println!("✓ Split {} page(s) → {}", pages.len(), output.display());
        Ok(())
    }

    /// Prints the masked label of every card number in the text.
    fn scan(&self, text: Option<&str>, input: Option<&Path>) -> Result<()> {
        let text = match (text, input) {
            (Some(text), _) => text.to_string(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
            (None, None) => anyhow::bail!("Either --text or --input is required"),
        };

        let matches = CardNumberMatcher::new().find_matches(&text);
        if matches.is_empty() {
            println!("⚠ No card numbers found");
            return Ok(());
        }

        for m in &matches {
            if self.verbose {
                println!("{} ({} digits)", m.label, m.digits.len());
            } else {
                println!("{}", m.label);
            }
        }
        Ok(())
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let handler = RedactionHandler::new(cli.verbose);

    match &cli.command {
        Commands::Redact {
            input,
            output,
            analysis_dir,
            document_type,
            report,
            timeout_secs,
            scale,
            padding,
            min_group_hits,
            no_secure,
            mask_text,
        } => {
            let timeout = (*timeout_secs > 0).then(|| Duration::from_secs(*timeout_secs));
            handler.redact(RedactArgs {
                input,
                output,
                analysis_dir,
                document_type,
                report: report.as_deref(),
                mask_text: *mask_text,
                config: PipelineConfig::default()
                    .with_scale(*scale)
                    .with_page_timeout(timeout)
                    .with_min_group_hits(*min_group_hits),
                options: RenderOptions::default()
                    .with_padding(*padding)
                    .with_secure_erase(!no_secure),
            })?;
        }
        Commands::Split {
            input,
            output,
            scale,
        } => handler.split(input, output, *scale)?,
        Commands::Scan { text, input } => handler.scan(text.as_deref(), input.as_deref())?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_redact_defaults() {
        let cli = Cli::try_parse_from([
            "pan-redactor",
            "redact",
            "-i",
            "in.pdf",
            "-o",
            "out.pdf",
            "-a",
            "responses",
        ])
        .unwrap();

        match cli.command {
            Commands::Redact {
                timeout_secs,
                scale,
                min_group_hits,
                no_secure,
                mask_text,
                document_type,
                ..
            } => {
                assert_eq!(timeout_secs, 60);
                assert_eq!(scale, MIN_SCALE);
                assert_eq!(min_group_hits, 1);
                assert!(!no_secure);
                assert!(!mask_text);
                assert_eq!(document_type, "document");
            }
            _ => panic!("expected redact"),
        }
    }

    #[test]
    fn test_scan_requires_a_source() {
        assert!(Cli::try_parse_from(["pan-redactor", "scan"]).is_err());
        assert!(Cli::try_parse_from(["pan-redactor", "scan", "--text", "x"]).is_ok());
    }
}
