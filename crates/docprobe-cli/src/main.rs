use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use docprobe::{
    Config, Dtd, EvaluationMode, Inspector, JsonDocument, JsonSchema, RelaxNgSchema, Validate,
    ValidationOutcome, XmlDocument, XsdSchema,
};

#[derive(Debug, Parser)]
#[command(
    name = "docprobe",
    version,
    about = "Inspect, query and validate JSON/XML documents"
)]
struct Cli {
    /// TOML file with `evaluation_mode` and `pretty` settings
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Path dialect for JSON expressions (overrides the config file)
    #[arg(long, global = true)]
    mode: Option<EvaluationMode>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Work with JSON documents
    #[command(subcommand)]
    Json(JsonCommand),
    /// Work with XML documents
    #[command(subcommand)]
    Xml(XmlCommand),
}

#[derive(Debug, Subcommand)]
enum JsonCommand {
    /// Print the value an expression resolves to
    Read {
        /// Input file, `-` for stdin
        file: PathBuf,
        /// Path expression such as `root.items[0]`
        expression: String,
    },
    /// Re-encode a document
    Fmt {
        /// Input file (defaults to stdin)
        file: Option<PathBuf>,
        #[arg(long)]
        compact: bool,
    },
    /// Validate against a JSON Schema
    Validate {
        /// Input file (defaults to stdin)
        file: Option<PathBuf>,
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum XmlCommand {
    /// Print the string value of every matched node
    Query {
        /// Input file, `-` for stdin
        file: PathBuf,
        xpath: String,
    },
    /// Re-serialize a document with indentation
    Fmt {
        /// Input file (defaults to stdin)
        file: Option<PathBuf>,
    },
    /// List declared namespaces as `prefix=uri`
    Namespaces {
        /// Input file (defaults to stdin)
        file: Option<PathBuf>,
    },
    /// Validate against a grammar; the internal DTD by default
    Validate(XmlValidateArgs),
}

#[derive(Debug, Args)]
struct XmlValidateArgs {
    /// Input file (defaults to stdin)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,
    /// XML Schema file
    #[arg(long, value_name = "FILE", conflicts_with_all = ["rng", "dtd"])]
    xsd: Option<PathBuf>,
    /// RelaxNG grammar file (XML syntax)
    #[arg(long, value_name = "FILE", conflicts_with = "dtd")]
    rng: Option<PathBuf>,
    /// Internal DTD subset
    #[arg(long)]
    dtd: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

/// `Ok(false)` when a document failed validation
fn run(cli: Cli) -> Result<bool> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(mode) = cli.mode {
        config = config.with_evaluation_mode(mode);
    }
    debug!(?config, "effective configuration");

    match cli.command {
        Command::Json(command) => run_json(command, &config),
        Command::Xml(command) => run_xml(command),
    }
}

fn run_json(command: JsonCommand, config: &Config) -> Result<bool> {
    match command {
        JsonCommand::Read { file, expression } => {
            let doc = parse_json(Some(&file))?;
            let inspector = Inspector::from_config(config);
            let value = inspector.evaluate(&doc, &expression)?;
            let text = JsonDocument::from_value(value.clone()).encode(config.pretty)?;
            write_line(&text)?;
            Ok(true)
        }
        JsonCommand::Fmt { file, compact } => {
            let doc = parse_json(file.as_deref())?;
            write_line(&doc.encode(config.pretty && !compact)?)?;
            Ok(true)
        }
        JsonCommand::Validate { file, schema } => {
            let doc = parse_json(file.as_deref())?;
            let schema = JsonSchema::from_path(&schema)
                .with_context(|| format!("failed to load schema {}", schema.display()))?;
            report(&schema.check(&doc)?)
        }
    }
}

fn run_xml(command: XmlCommand) -> Result<bool> {
    match command {
        XmlCommand::Query { file, xpath } => {
            let doc = parse_xml(Some(&file))?;
            let nodes = doc.try_query(&xpath)?;
            info!(count = nodes.len(), "nodes matched");
            for value in nodes.string_values() {
                write_line(&value)?;
            }
            Ok(true)
        }
        XmlCommand::Fmt { file } => {
            let doc = parse_xml(file.as_deref())?;
            write_out(&doc.serialize())?;
            Ok(true)
        }
        XmlCommand::Namespaces { file } => {
            let doc = parse_xml(file.as_deref())?;
            for (prefix, uri) in &doc.namespaces() {
                write_line(&format!("{prefix}={uri}"))?;
            }
            Ok(true)
        }
        XmlCommand::Validate(args) => validate_xml(args),
    }
}

fn validate_xml(args: XmlValidateArgs) -> Result<bool> {
    let doc = parse_xml(args.file.as_deref())?;
    let document = doc.document();

    let outcome = if let Some(path) = &args.xsd {
        XsdSchema::parse(&read_file(path)?)?.check(document)?
    } else if let Some(path) = &args.rng {
        RelaxNgSchema::parse(&read_file(path)?)?.check(document)?
    } else {
        match Dtd::from_document(document)? {
            Some(dtd) => dtd.check(document)?,
            None => {
                warn!("document has no DOCTYPE, nothing to validate");
                ValidationOutcome::valid()
            }
        }
    };
    report(&outcome)
}

fn report(outcome: &ValidationOutcome) -> Result<bool> {
    if outcome.is_valid() {
        write_line("valid")?;
        return Ok(true);
    }
    for error in &outcome.errors {
        write_line(&error.to_string())?;
    }
    Ok(false)
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = read_file(path)?;
    toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
}

fn parse_json(path: Option<&Path>) -> Result<JsonDocument> {
    let text = String::from_utf8(read_input(path)?).context("JSON input is not UTF-8")?;
    Ok(JsonDocument::parse(&text)?)
}

fn parse_xml(path: Option<&Path>) -> Result<XmlDocument> {
    Ok(XmlDocument::parse_bytes(&read_input(path)?)?)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// `None` and `-` read stdin
fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => {
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
        }
        _ => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("failed to read stdin")?;
            if buffer.trim_ascii().is_empty() {
                bail!("no input provided on stdin");
            }
            Ok(buffer)
        }
    }
}

fn write_out(text: &str) -> Result<()> {
    io::stdout()
        .write_all(text.as_bytes())
        .context("failed to write stdout")
}

fn write_line(text: &str) -> Result<()> {
    write_out(text)?;
    write_out("\n")
}
