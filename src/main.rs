mod report;

use chrono::Utc;
use docfill::{
    DocumentPackage, FillMode, FillRequest, Options, Representation, derive_representations, descriptors_from_value,
    extract, fields_from_value, fill_markers_only, normalize_package,
};
use serde_json::Value;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "DOCFILL_LOG";

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    init_logging();

    if let Err(err) = run(config) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(io::stderr).init();
}

enum Command {
    Scan { file: PathBuf, repr: Option<Representation> },
    Normalize { file: PathBuf, descriptors: PathBuf, out: Option<PathBuf> },
    Fill { file: PathBuf, fields: PathBuf, mode: FillMode, out: Option<PathBuf>, html: Option<PathBuf> },
}

struct CliConfig {
    command: Command,
    options: Options,
    color: bool,
}

fn run(config: CliConfig) -> Result<(), String> {
    let CliConfig { command, options, color } = config;
    match command {
        Command::Scan { file, repr } => {
            let package = open_package(&file, &options)?;
            let reps = derive_representations(package.markup()).map_err(|err| err.to_string())?;
            let which = repr.map(|r| vec![r]).unwrap_or_else(|| Representation::ALL.to_vec());
            for representation in which {
                let slots = extract(reps.get(representation), representation, &options);
                report::print_scan(&file.display().to_string(), representation, &slots, color);
            }
        }
        Command::Normalize { file, descriptors, out } => {
            let descriptors = descriptors_from_value(&read_json(&descriptors)?);
            let bytes = read_bytes(&file)?;
            let document = normalize_package(bytes, &descriptors, &options).map_err(|err| err.to_string())?;
            let out = out.unwrap_or_else(|| sibling(&file, "normalized"));
            write_file(&out, &document.package)?;
            report::print_normalize(&document.report, color);
            println!("wrote {}", out.display());
        }
        Command::Fill { file, fields, mode, out, html } => {
            let fields = fields_from_value(&read_json(&fields)?);
            let package = open_package(&file, &options)?;
            let reps = derive_representations(package.markup()).map_err(|err| err.to_string())?;
            let request = FillRequest {
                package: Some(package.bytes().to_vec()),
                styled_markup: Some(reps.styled_markup),
                plain_text: None,
                fields: Some(fields),
                mode,
            };
            let output = fill_markers_only(request, &options).map_err(|err| err.to_string())?;

            let mut written = Vec::new();
            if let Some(bytes) = &output.package {
                let out = out.unwrap_or_else(|| PathBuf::from(format!("filled-{}.docx", Utc::now().timestamp_millis())));
                write_file(&out, bytes)?;
                written.push(out.display().to_string());
            }
            if let Some(markup) = &output.styled_markup {
                match html {
                    Some(path) => {
                        write_file(&path, markup.as_bytes())?;
                        written.push(path.display().to_string());
                    }
                    None => println!("{markup}"),
                }
            }
            report::print_fill(&output.report, &written, color);
        }
    }
    Ok(())
}

fn open_package(path: &Path, options: &Options) -> Result<DocumentPackage, String> {
    DocumentPackage::open(read_bytes(path)?, &options.document_part)
        .map_err(|err| format!("{}: {err}", path.display()))
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|err| format!("failed to read {}: {err}", path.display()))
}

fn read_json(path: &Path) -> Result<Value, String> {
    let raw = std::fs::read_to_string(path).map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    serde_json::from_str(&raw).map_err(|err| format!("{} is not valid JSON: {err}", path.display()))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), String> {
    std::fs::write(path, bytes).map_err(|err| format!("failed to write {}: {err}", path.display()))
}

/// `contract.docx` -> `contract.<tag>.docx` next to the input.
fn sibling(path: &Path, tag: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("document");
    path.with_file_name(format!("{stem}.{tag}.docx"))
}

fn parse_args() -> Result<CliConfig, String> {
    let mut args = std::env::args().skip(1);
    let mut color = io::stdout().is_terminal();
    let mut options = Options::default();

    let mut subcommand: Option<String> = None;
    let mut file: Option<PathBuf> = None;
    let mut repr: Option<Representation> = None;
    let mut descriptors: Option<PathBuf> = None;
    let mut fields: Option<PathBuf> = None;
    let mut mode = FillMode::default();
    let mut out: Option<PathBuf> = None;
    let mut html: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| -> Result<String, String> {
            match inline.clone() {
                Some(v) => Ok(v),
                None => args.next().ok_or_else(|| format!("error: {name} expects a value")),
            }
        };

        match flag.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("docfill {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--config" => {
                let path = value("--config")?;
                options = Options::load(&path).map_err(|err| format!("error: {path}: {err}"))?;
            }
            "--repr" => {
                repr = Some(value("--repr")?.parse().map_err(|err| format!("error: {err}"))?);
            }
            "--descriptors" => descriptors = Some(PathBuf::from(value("--descriptors")?)),
            "--fields" => fields = Some(PathBuf::from(value("--fields")?)),
            "--mode" => mode = value("--mode")?.parse().map_err(|err| format!("error: {err}"))?,
            "--out" | "-o" => out = Some(PathBuf::from(value("--out")?)),
            "--html" => html = Some(PathBuf::from(value("--html")?)),
            _ if flag.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ if subcommand.is_none() => subcommand = Some(arg),
            _ if file.is_none() => file = Some(PathBuf::from(arg)),
            _ => return Err(format!("error: unexpected argument '{arg}'")),
        }
    }

    let subcommand = subcommand.ok_or_else(|| format!("error: no command given\n\n{}", help_text()))?;
    let file = file.ok_or_else(|| format!("error: {subcommand} expects a .docx file"))?;

    let command = match subcommand.as_str() {
        "scan" => Command::Scan { file, repr },
        "normalize" => Command::Normalize {
            file,
            descriptors: descriptors.ok_or_else(|| "error: normalize requires --descriptors <json>".to_string())?,
            out,
        },
        "fill" => Command::Fill {
            file,
            fields: fields.ok_or_else(|| "error: fill requires --fields <json>".to_string())?,
            mode,
            out,
            html,
        },
        other => return Err(format!("error: unknown command '{other}'\n\n{}", help_text())),
    };

    Ok(CliConfig { command, options, color })
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "docfill {version}

Placeholder normalization and template fill for .docx documents.

Usage:
  docfill scan <file.docx> [--repr text|html|xml]
  docfill normalize <file.docx> --descriptors <placeholders.json> [--out <file.docx>]
  docfill fill <normalized.docx> --fields <fields.json> [--mode preview|download|both]
               [--out <file.docx>] [--html <file.html>]

Options:
  --repr <name>              Only scan one representation.
  --descriptors <file>       Placeholder descriptors, as a JSON array or {{\"placeholders\": [...]}}.
  --fields <file>            Field values, as a JSON array or {{\"fields\": [...]}}.
  --mode <mode>              Outputs to produce. Default: both
  -o, --out <file>           Output package. Default: <input>.normalized.docx for normalize,
                             filled-<unix-ms>.docx for fill.
  --html <file>              Write the filled preview here instead of stdout.
  --config <file>            JSON options file (batch sizes, timeouts, windows).
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Environment:
  {log_env}                 Log filter, e.g. docfill=debug. Default: warn

Exit codes:
  0  Success.
  1  Processing error.
  2  Invalid arguments or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
        log_env = LOG_ENV
    )
}
