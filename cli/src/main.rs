use std::error::Error;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use jsonrt::decode::comments::strip_comments;
use jsonrt::decode::nav::{count_array_items, find_path};
use jsonrt::decode::split::{split_object, SplitOptions, ValueKind};
use jsonrt::{Indent, ParseOptions, SaveOptions, Syntax, Writer};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "jsonrt", version, about = "In-place JSON scanning tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Io {
    /// Input file path. Omit or use '-' to read from stdin.
    input: Option<String>,

    /// Output file path (prints to stdout if omitted).
    #[arg(short, long, value_name = "file")]
    output: Option<String>,

    /// Accept unquoted or single-quoted names, trailing commas and comments.
    #[arg(short, long)]
    tolerant: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the input holds exactly one well-formed value.
    Validate {
        #[command(flatten)]
        io: Io,
    },
    /// Blank out comments and trailing commas. Offsets are preserved.
    Strip {
        #[command(flatten)]
        io: Io,
    },
    /// Print the raw value at a dotted path such as `items.0.name`.
    Get {
        path: String,
        #[command(flatten)]
        io: Io,
    },
    /// Print the number of items of the root array.
    Count {
        #[command(flatten)]
        io: Io,
    },
    /// Pick members out of a flat object, e.g. `split id,name`.
    Split {
        #[arg(value_delimiter = ',', num_args = 1, required = true, action = clap::ArgAction::Set)]
        names: Vec<String>,
        #[command(flatten)]
        io: Io,
    },
    /// Re-emit the input as compact JSON.
    Minify {
        /// Indent nested blocks by this many spaces instead.
        #[arg(long, value_name = "number")]
        indent: Option<usize>,
        #[command(flatten)]
        io: Io,
    },
}

impl Command {
    fn io(&self) -> &Io {
        match self {
            Command::Validate { io }
            | Command::Strip { io }
            | Command::Get { io, .. }
            | Command::Count { io }
            | Command::Split { io, .. }
            | Command::Minify { io, .. } => io,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Command::Validate { .. } => "Validated",
            Command::Strip { .. } => "Stripped",
            Command::Get { .. } => "Extracted",
            Command::Count { .. } => "Counted",
            Command::Split { .. } => "Split",
            Command::Minify { .. } => "Minified",
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("ERROR  {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let io = cli.command.io();
    let mut input = read_input(io.input.as_deref())?;
    let options = if io.tolerant {
        ParseOptions::tolerant()
    } else {
        ParseOptions::strict()
    };

    let output = match &cli.command {
        Command::Validate { .. } => {
            jsonrt::validate(&input, &options).map_err(|err| located(err, &input))?;
            b"valid".to_vec()
        }
        Command::Strip { .. } => {
            strip_comments(&mut input);
            input
        }
        Command::Get { path, .. } => {
            let syntax = prepare(&mut input, io.tolerant);
            find_path(&input, path, syntax)
                .ok_or_else(|| format!("path not found: {path}"))?
                .to_vec()
        }
        Command::Count { .. } => {
            let syntax = prepare(&mut input, io.tolerant);
            let count = count_array_items(&input, syntax)
                .map_err(|err| located(err.into(), &input))?;
            count.to_string().into_bytes()
        }
        Command::Split { names, .. } => {
            let syntax = prepare(&mut input, io.tolerant);
            split_names(&mut input, names, syntax)?
        }
        Command::Minify { indent, .. } => {
            let options = options.with_allow_double_in_variant(true);
            let value: Value = jsonrt::from_slice_with_options(&mut input.clone(), &options)
                .map_err(|err| located(err, &input))?;
            let save = match indent {
                Some(spaces) => SaveOptions::human().with_indent(Indent::spaces(*spaces)),
                None => SaveOptions::default(),
            };
            jsonrt::to_vec_with_options(&value, &save)?
        }
    };

    write_output(io.output.as_deref(), &output)?;
    if let Some(path) = io.output.as_deref().filter(|path| *path != "-") {
        report_status(cli.command.verb(), io.input.as_deref(), path);
    }
    Ok(())
}

/// Strip comments when tolerant, and pick the matching navigation dialect.
fn prepare(input: &mut [u8], tolerant: bool) -> Syntax {
    if tolerant {
        strip_comments(input);
        Syntax::Extended
    } else {
        Syntax::Strict
    }
}

fn split_names(input: &mut [u8], names: &[String], syntax: Syntax) -> Result<Vec<u8>, Box<dyn Error>> {
    let patterns: Vec<&str> = names.iter().map(String::as_str).collect();
    let options = SplitOptions {
        syntax,
        normalize_bool: false,
    };
    let values = split_object(input, &patterns, options)?;
    let mut writer = Writer::new(&SaveOptions::default());
    writer.begin_object();
    for (name, value) in patterns.iter().zip(values) {
        let Some(value) = value else {
            continue;
        };
        writer.write_key(name.trim_end_matches('*'));
        match value.kind {
            ValueKind::String => writer.write_quoted_bytes(value.text),
            _ => writer.write_raw(value.text),
        }
    }
    writer.end_object();
    Ok(writer.finish_bytes())
}

fn located(err: jsonrt::Error, input: &[u8]) -> Box<dyn Error> {
    match err.location_in(input) {
        Some(at) => format!("{err} (line {}, column {})", at.line, at.column).into(),
        None => err.into(),
    }
}

fn read_input(input: Option<&str>) -> Result<Vec<u8>, Box<dyn Error>> {
    match input {
        None | Some("-") => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(fs::read(path)?),
    }
}

fn write_output(path: Option<&str>, data: &[u8]) -> Result<(), Box<dyn Error>> {
    match path {
        Some(path) if path != "-" => fs::write(path, data)?,
        _ => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(data)?;
            handle.flush()?;
        }
    }
    Ok(())
}

fn report_status(verb: &str, input: Option<&str>, output_path: &str) {
    let input_label = match input {
        None | Some("-") => "stdin".to_string(),
        Some(path) => display_path(path),
    };
    let output_label = display_path(output_path);
    println!("✔ {verb} {input_label} → {output_label}");
}

fn display_path(path: &str) -> String {
    let path = Path::new(path);
    let Ok(cwd) = std::env::current_dir() else {
        return path.to_string_lossy().into_owned();
    };
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    let rel = diff_paths(&abs, &cwd).unwrap_or(abs);
    rel.to_string_lossy().into_owned()
}

fn diff_paths(path: &Path, base: &Path) -> Option<PathBuf> {
    let path_components: Vec<_> = path.components().collect();
    let base_components: Vec<_> = base.components().collect();

    if path_components.first()? != base_components.first()? {
        return None;
    }

    let mut common = 0;
    while common < path_components.len()
        && common < base_components.len()
        && path_components[common] == base_components[common]
    {
        common += 1;
    }

    let mut result = PathBuf::new();
    for _ in common..base_components.len() {
        result.push("..");
    }
    for component in &path_components[common..] {
        result.push(component.as_os_str());
    }

    Some(result)
}
