//! Cognition CLI - Command-line interface for Synheart Cognition
//!
//! Commands:
//! - process: Compute metrics for a full submission document
//! - section: Compute metrics for a single raw (possibly compressed) payload
//! - validate: Check that a raw payload decodes into its schema
//! - config: Print the default engine configuration

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use synheart_cognition::cognitive::{score_graph_test, score_span_test, score_sustained_attention};
use synheart_cognition::payload::{normalize_with_outcome, DecodeOutcome};
use synheart_cognition::{
    parse_payload, CognitionEngine, ComputeError, EngineConfig, KeyboardCalculator, PayloadKind,
    PointerCalculator, RawPayload, SubmissionDocument, COGNITION_VERSION,
};

/// Cognition - deterministic interaction and cognitive-test metrics
#[derive(Parser)]
#[command(name = "cognition")]
#[command(author = "Synheart AI Inc")]
#[command(version = COGNITION_VERSION)]
#[command(about = "Turn assessment telemetry into derived metrics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute metrics for a submission document
    Process {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },

    /// Compute metrics for one raw payload
    Section {
        /// Payload kind (pointer, keyboard, sustained_attention, graph_test, span_test)
        #[arg(short, long, value_parser = parse_kind)]
        kind: PayloadKind,

        /// Input file path (use - for stdin); gzip/zlib accepted
        #[arg(short, long)]
        input: PathBuf,

        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a raw payload against its schema
    Validate {
        /// Payload kind (pointer, keyboard, sustained_attention, graph_test, span_test)
        #[arg(short, long, value_parser = parse_kind)]
        kind: PayloadKind,

        /// Input file path (use - for stdin); gzip/zlib accepted
        #[arg(short, long)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default engine configuration
    Config,
}

fn parse_kind(s: &str) -> Result<PayloadKind, String> {
    s.parse::<PayloadKind>().map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so stdout stays machine-readable. `RUST_LOG` overrides the
/// default `warn` level.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CognitionCliError> {
    match cli.command {
        Commands::Process {
            input,
            output,
            config,
            pretty,
        } => cmd_process(&input, &output, config.as_deref(), pretty),

        Commands::Section {
            kind,
            input,
            config,
            pretty,
        } => cmd_section(kind, &input, config.as_deref(), pretty),

        Commands::Validate { kind, input, json } => cmd_validate(kind, &input, json),

        Commands::Config => {
            println!("{}", EngineConfig::default().to_json()?);
            Ok(())
        }
    }
}

fn cmd_process(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    pretty: bool,
) -> Result<(), CognitionCliError> {
    let engine = load_engine(config)?;
    let input_data = read_input(input)?;
    let text = String::from_utf8(input_data).map_err(|_| CognitionCliError::NotUtf8)?;

    let document = SubmissionDocument::from_json(&text)?;
    let report = engine.process_document(&document)?;

    let rendered = if pretty {
        report.to_json_pretty()?
    } else {
        report.to_json()?
    };
    write_output(output, &rendered)
}

fn cmd_section(
    kind: PayloadKind,
    input: &Path,
    config: Option<&Path>,
    pretty: bool,
) -> Result<(), CognitionCliError> {
    let engine = load_engine(config)?;
    let input_data = read_input(input)?;
    let payload = parse_payload(kind, &input_data)?;
    let config = engine.config();

    let result = match payload {
        RawPayload::Pointer(telemetry) => {
            serde_json::to_value(PointerCalculator::new(config).compute(&telemetry))?
        }
        RawPayload::Keyboard(telemetry) => {
            serde_json::to_value(KeyboardCalculator::new(config).compute(&telemetry))?
        }
        RawPayload::SustainedAttention(raw) => {
            serde_json::to_value(score_sustained_attention(&raw, config))?
        }
        RawPayload::GraphTest(raw) => serde_json::to_value(score_graph_test(&raw, config))?,
        RawPayload::SpanTest(raw) => {
            serde_json::to_value(score_span_test(&raw, config))?
        }
    };

    let section = SectionOutput {
        kind: kind.to_string(),
        attempted: !result.is_null(),
        result,
    };
    let rendered = if pretty {
        serde_json::to_string_pretty(&section)?
    } else {
        serde_json::to_string(&section)?
    };
    write_output(Path::new("-"), &rendered)
}

fn cmd_validate(kind: PayloadKind, input: &Path, json: bool) -> Result<(), CognitionCliError> {
    let input_data = read_input(input)?;
    let (_, outcome) = normalize_with_outcome(&input_data);

    let report = match parse_payload(kind, &input_data) {
        Ok(payload) => ValidationReport {
            kind: kind.to_string(),
            bytes: input_data.len(),
            encoding: encoding_label(outcome).to_string(),
            valid: true,
            records: payload.record_count(),
            window: payload.window().map(|w| w.describe()),
            error: None,
        },
        Err(e) => ValidationReport {
            kind: kind.to_string(),
            bytes: input_data.len(),
            encoding: encoding_label(outcome).to_string(),
            valid: false,
            records: 0,
            window: None,
            error: Some(e.to_string()),
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Kind:     {}", report.kind);
        println!("Bytes:    {}", report.bytes);
        println!("Encoding: {}", report.encoding);
        println!("Records:  {}", report.records);
        if let Some(window) = &report.window {
            println!("Window:   {}", window);
        }
        match &report.error {
            Some(error) => println!("Status:   invalid\n\nError: {}", error),
            None => println!("Status:   valid"),
        }
    }

    if report.valid {
        Ok(())
    } else {
        Err(CognitionCliError::ValidationFailed(report.kind))
    }
}

fn encoding_label(outcome: DecodeOutcome) -> &'static str {
    match outcome {
        DecodeOutcome::Decompressed => "compressed",
        DecodeOutcome::Passthrough => "plain",
        DecodeOutcome::FallbackAfterError => "corrupt-compressed (read as plain)",
    }
}

fn load_engine(config: Option<&Path>) -> Result<CognitionEngine, CognitionCliError> {
    let config = match config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Ok(CognitionEngine::new(config)?)
}

fn read_input(input: &Path) -> Result<Vec<u8>, CognitionCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(CognitionCliError::NoInput);
        }
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read(input)?)
    }
}

fn write_output(output: &Path, content: &str) -> Result<(), CognitionCliError> {
    if output.to_string_lossy() == "-" {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", content)?;
    } else {
        fs::write(output, format!("{}\n", content))?;
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum CognitionCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoInput,
    NotUtf8,
    ValidationFailed(String),
}

impl From<io::Error> for CognitionCliError {
    fn from(e: io::Error) -> Self {
        CognitionCliError::Io(e)
    }
}

impl From<ComputeError> for CognitionCliError {
    fn from(e: ComputeError) -> Self {
        CognitionCliError::Compute(e)
    }
}

impl From<serde_json::Error> for CognitionCliError {
    fn from(e: serde_json::Error) -> Self {
        CognitionCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CognitionCliError> for CliError {
    fn from(e: CognitionCliError) -> Self {
        match e {
            CognitionCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CognitionCliError::Compute(e) if e.is_contract_violation() => CliError {
                code: "INTERNAL_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("This is a bug; please report it with the input".to_string()),
            },
            CognitionCliError::Compute(ComputeError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'cognition config' to see the expected shape".to_string()),
            },
            CognitionCliError::Compute(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'cognition validate' on the failing section".to_string()),
            },
            CognitionCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CognitionCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "stdin is a terminal, nothing to read".to_string(),
                hint: Some("Pipe a payload in or pass a file with --input".to_string()),
            },
            CognitionCliError::NotUtf8 => CliError {
                code: "ENCODING_ERROR".to_string(),
                message: "Submission document is not valid UTF-8".to_string(),
                hint: Some("Use 'cognition section' for compressed payloads".to_string()),
            },
            CognitionCliError::ValidationFailed(kind) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} payload failed validation", kind),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct SectionOutput {
    kind: String,
    attempted: bool,
    result: serde_json::Value,
}

#[derive(serde::Serialize)]
struct ValidationReport {
    kind: String,
    bytes: usize,
    encoding: String,
    valid: bool,
    records: usize,
    window: Option<String>,
    error: Option<String>,
}
