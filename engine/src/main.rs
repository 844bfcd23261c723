//! Serieskit CLI - Import delimited data and transform datasets
//!
//! # Main Commands
//!
//! ```bash
//! serieskit import data.csv                      # Import and dump datasets as JSON
//! serieskit transforms                           # List the transform catalog
//! serieskit apply data.csv --y y MulY 10         # Import, transform, dump slots
//! ```
//!
//! # Transform Arguments
//!
//! ```bash
//! serieskit apply data.csv --x t --y v Clip y minv=0 maxv=10
//! serieskit apply data.csv --y v AddY @offset    # @name refers to an imported dataset
//! serieskit apply data.csv --y v SubY 1,2,3      # comma list is an array operand
//! serieskit apply data.csv --y v ApplyY fn:sqrt  # fn:<name> is a built-in function
//! ```

use clap::{Args, Parser, Subcommand};
use serieskit::{
    Arg, CsvImport, DatasetStore, Document, Error, ImportOptions, Registry, Role, Slots,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "serieskit")]
#[command(about = "Import delimited data and transform datasets with error bars", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ImportArgs {
    /// Read the file column by column
    #[arg(long)]
    rows: bool,

    /// Field delimiter, or "auto" to detect it
    #[arg(short, long, env = "SERIESKIT_DELIMITER", default_value = ",")]
    delimiter: String,

    /// Quote character
    #[arg(long, env = "SERIESKIT_QUOTE", default_value = "\"")]
    quote: char,

    /// Text encoding, or "auto" to detect it
    #[arg(short, long, env = "SERIESKIT_ENCODING", default_value = "utf-8")]
    encoding: String,

    /// Prefix for every dataset name
    #[arg(long, env = "SERIESKIT_PREFIX", default_value = "")]
    prefix: String,

    /// Suffix for every dataset name
    #[arg(long, env = "SERIESKIT_SUFFIX", default_value = "")]
    suffix: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a delimited file and output its datasets as JSON
    Import {
        /// Input file
        input: PathBuf,

        #[command(flatten)]
        import: ImportArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available transforms
    Transforms {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import a file, bind datasets to slots and run one transform
    Apply {
        /// Input file
        input: PathBuf,

        #[command(flatten)]
        import: ImportArgs,

        /// Dataset for the x slot
        #[arg(long)]
        x: Option<String>,

        /// Dataset for the y slot
        #[arg(long)]
        y: Option<String>,

        /// Dataset for the label slot
        #[arg(long)]
        label: Option<String>,

        /// Dataset for the size slot
        #[arg(long)]
        size: Option<String>,

        /// Dataset for the color slot
        #[arg(long)]
        color: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Transform name
        transform: String,

        /// Transform arguments: values, key=value, @dataset, a,b,c or fn:name
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import { input, import, output } => cmd_import(&input, import, output.as_deref()),

        Commands::Transforms { json } => cmd_transforms(json),

        Commands::Apply {
            input,
            import,
            x,
            y,
            label,
            size,
            color,
            output,
            transform,
            args,
        } => {
            let bindings = [(Role::X, x), (Role::Y, y), (Role::Label, label), (Role::Size, size), (Role::Color, color)];
            cmd_apply(&input, import, &bindings, &transform, &args, output.as_deref())
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

impl ImportArgs {
    fn options(self) -> Result<ImportOptions, Box<dyn std::error::Error>> {
        let delimiter = match self.delimiter.as_str() {
            "auto" => None,
            "\\t" | "tab" => Some('\t'),
            d => {
                let mut chars = d.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => return Err(format!("delimiter must be one character, got '{}'", d).into()),
                }
            }
        };
        Ok(ImportOptions {
            read_rows: self.rows,
            delimiter,
            text_delimiter: self.quote,
            encoding: self.encoding,
            prefix: self.prefix,
            suffix: self.suffix,
        })
    }
}

fn read_document(input: &Path, import: ImportArgs) -> Result<Document, Box<dyn std::error::Error>> {
    eprintln!("📄 Importing: {}", input.display());

    let options = import.options()?;
    let mut reader = CsvImport::new(options);
    reader.read_file(input)?;

    let mut doc = Document::new();
    let names = reader.set_data(&mut doc);
    eprintln!("✅ Imported {} datasets: {}", names.len(), names.join(", "));
    Ok(doc)
}

fn cmd_import(
    input: &Path,
    import: ImportArgs,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = read_document(input, import)?;

    let datasets: BTreeMap<&String, serieskit::Dataset> =
        doc.iter().map(|(name, h)| (name, h.borrow().clone())).collect();
    let json = serde_json::to_string_pretty(&datasets)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_transforms(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::builtin()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&registry.list_transforms())?);
    } else {
        println!("{}", registry.describe());
    }
    Ok(())
}

fn cmd_apply(
    input: &Path,
    import: ImportArgs,
    bindings: &[(Role, Option<String>)],
    transform: &str,
    raw_args: &[String],
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = read_document(input, import)?;
    let registry = Registry::builtin()?;

    let mut slots = Slots::new();
    for (role, name) in bindings {
        if let Some(name) = name {
            let dataset = doc
                .get_data(name)
                .ok_or_else(|| Error::UnknownDataset(name.clone()))?;
            slots.set(*role, Some(dataset));
        }
    }

    let mut positional = Vec::new();
    let mut named = Vec::new();
    for raw in raw_args {
        match split_named(raw) {
            Some((key, value)) => named.push((key.to_string(), parse_arg(value, &doc)?)),
            None => positional.push(parse_arg(raw, &doc)?),
        }
    }

    let bound = registry.bind(transform, slots)?;
    eprintln!("⚙️  {}", bound.spec().signature());
    bound.call_with(positional, named)?;

    let updated: BTreeMap<&str, serieskit::Dataset> = bound
        .slots()
        .iter()
        .map(|(role, h)| (role.as_str(), h.borrow().clone()))
        .collect();
    let json = serde_json::to_string_pretty(&updated)?;
    write_output(&json, output)?;

    Ok(())
}

/// `key=value` with an identifier key.
fn split_named(raw: &str) -> Option<(&str, &str)> {
    let (key, value) = raw.split_once('=')?;
    let is_ident = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    is_ident.then_some((key, value))
}

fn parse_arg(raw: &str, doc: &Document) -> Result<Arg, Box<dyn std::error::Error>> {
    if let Some(name) = raw.strip_prefix('@') {
        let dataset = doc
            .get_data(name)
            .ok_or_else(|| Error::UnknownDataset(name.to_string()))?;
        return Ok(Arg::Dataset(dataset));
    }
    if let Some(name) = raw.strip_prefix("fn:") {
        return builtin_function(name).ok_or_else(|| format!("unknown function '{}'", name).into());
    }

    let arg = match raw {
        "true" | "True" => Arg::Bool(true),
        "false" | "False" => Arg::Bool(false),
        "none" | "None" => Arg::None,
        _ => match raw.parse::<f64>() {
            Ok(v) => Arg::Number(v),
            Err(_) if raw.contains(',') => {
                let values: Result<Vec<f64>, _> = raw.split(',').map(|v| v.trim().parse::<f64>()).collect();
                match values {
                    Ok(values) => Arg::Array(values),
                    Err(_) => Arg::Text(raw.to_string()),
                }
            }
            Err(_) => Arg::Text(raw.to_string()),
        },
    };
    Ok(arg)
}

fn builtin_function(name: &str) -> Option<Arg> {
    let f: fn(f64) -> f64 = match name {
        "sqrt" => f64::sqrt,
        "abs" => f64::abs,
        "sin" => f64::sin,
        "cos" => f64::cos,
        "tan" => f64::tan,
        "exp" => f64::exp,
        "ln" => f64::ln,
        "log10" => f64::log10,
        "square" => |v: f64| v * v,
        "recip" => f64::recip,
        _ => return None,
    };
    Some(Arg::function(f))
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
