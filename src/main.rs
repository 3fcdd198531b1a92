use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pdf_resize::config::request::{CompressionProfile, ResizeRequest, ScaleFactor, ScalingStrategy};
use pdf_resize::config::settings::Settings;
use pdf_resize::config;
use pdf_resize::error::ResizeError;
use pdf_resize::pipeline::orchestrator::{OUTPUT_FILE_NAME, Pipeline};

const USAGE: &str = "\
Usage: pdf_resize [OPTIONS] <input.pdf> <output.pdf|output-dir>
  Scale every page of a PDF and optionally compress the result.
  An existing directory as output receives resized.pdf.

Options:
  --zoom <F>           Scale factor, e.g. 0.5 for 50% (default from settings: 0.5)
  --compression <P>    none | screen | ebook | printer (default: none)
  --strategy <S>       vector | raster (default from settings: vector)
  --settings <FILE>    Settings YAML (default: settings.yaml next to the input)
  --json               Report failures as a JSON line on stderr
  -h, --help           Show this help
  -V, --version        Show version";

/// Parsed command line.
struct CliArgs {
    input: PathBuf,
    output: PathBuf,
    zoom: Option<String>,
    compression: Option<String>,
    strategy: Option<String>,
    settings: Option<PathBuf>,
    json: bool,
}

fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("{USAGE}");
        return if args.is_empty() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("pdf_resize {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let json = args.iter().any(|a| a == "--json");
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => return report_error(&e, json),
    };

    match run(&cli) {
        Ok((pages, destination)) => {
            eprintln!(
                "OK: {} -> {} ({} pages)",
                cli.input.display(),
                destination.display(),
                pages
            );
            ExitCode::SUCCESS
        }
        Err(e) => report_error(&e, cli.json),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_args(args: &[String]) -> Result<CliArgs, ResizeError> {
    let mut positional: Vec<&String> = Vec::new();
    let mut zoom = None;
    let mut compression = None;
    let mut strategy = None;
    let mut settings = None;
    let mut json = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value_for = |flag: &str| {
            iter.next().cloned().ok_or_else(|| {
                ResizeError::invalid_input(format!("{flag} requires a value"))
            })
        };
        match arg.as_str() {
            "--zoom" => zoom = Some(value_for("--zoom")?),
            "--compression" => compression = Some(value_for("--compression")?),
            "--strategy" => strategy = Some(value_for("--strategy")?),
            "--settings" => settings = Some(PathBuf::from(value_for("--settings")?)),
            "--json" => json = true,
            flag if flag.starts_with("--") => {
                return Err(ResizeError::invalid_input(format!("unknown option {flag}")));
            }
            _ => positional.push(arg),
        }
    }

    let [input, output] = positional.as_slice() else {
        return Err(ResizeError::invalid_input(
            "expected exactly one input and one output path",
        ));
    };

    Ok(CliArgs {
        input: PathBuf::from(input.as_str()),
        output: PathBuf::from(output.as_str()),
        zoom,
        compression,
        strategy,
        settings,
        json,
    })
}

fn load_settings(cli: &CliArgs) -> Result<Settings, ResizeError> {
    let mut settings = match &cli.settings {
        Some(path) => Settings::from_file(path)?,
        None => config::load_settings_for_input(&cli.input)?,
    };
    if let Some(strategy) = &cli.strategy {
        settings.strategy = strategy.parse::<ScalingStrategy>()?;
    }
    Ok(settings)
}

/// Output file for `path`: an existing directory receives [`OUTPUT_FILE_NAME`].
fn output_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(OUTPUT_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}

fn run(cli: &CliArgs) -> Result<(usize, PathBuf), ResizeError> {
    let settings = load_settings(cli)?;

    let scale = match &cli.zoom {
        Some(z) => z.parse::<ScaleFactor>()?,
        None => ScaleFactor::new(settings.default_zoom)?,
    };
    // The command line is strict about profile names, unlike form input
    let compression = match &cli.compression {
        Some(c) => c.parse::<CompressionProfile>()?,
        None => CompressionProfile::None,
    };

    let pdf = read_input(&cli.input)?;
    let request = ResizeRequest::new(pdf, scale, compression);

    let output = Pipeline::new(settings).run(&request)?;
    let destination = output_path(&cli.output);
    std::fs::write(&destination, &output.pdf)?;
    Ok((output.page_count, destination))
}

fn read_input(path: &Path) -> Result<Vec<u8>, ResizeError> {
    std::fs::read(path).map_err(|e| {
        ResizeError::invalid_input(format!("failed to read {}: {e}", path.display()))
    })
}

fn report_error(e: &ResizeError, json: bool) -> ExitCode {
    if json {
        match serde_json::to_string(&e.report()) {
            Ok(line) => eprintln!("{line}"),
            Err(_) => eprintln!("ERROR: {e}"),
        }
    } else {
        eprintln!("ERROR: {e}");
    }
    ExitCode::FAILURE
}
