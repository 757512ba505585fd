use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use saferec::compiler::{CompilationOutput, CompilationPipeline, CompilationState};
use saferec::lexer::{format_tokens, Lexer};
use saferec::runtime::{self, parse_value, RunOutcome, Value, DEFAULT_MAX_CALL_DEPTH};

#[derive(Parser)]
#[command(name = "saferec")]
#[command(author, version, about = "Rewrites recursive functions into stack-safe trampolines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmitFormat {
    /// Source-like listing (default)
    #[value(name = "text")]
    Text,
    /// Generated units as JSON
    #[value(name = "json")]
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform a source file and print the generated units
    Emit {
        /// The source file to transform
        input: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: EmitFormat,

        /// Dump the AST to stdout
        #[arg(long)]
        dump_ast: bool,

        /// Dump tokens to stdout
        #[arg(long)]
        dump_tokens: bool,
    },

    /// Check a source file for errors without emitting anything
    Check {
        /// The source file to check
        input: PathBuf,
    },

    /// Run a function, through its generated entry point by default
    Run {
        /// The source file to run
        input: PathBuf,

        /// Function (or generated entry point) to call
        function: String,

        /// Arguments as value literals: 42, -3, true, "s", [1, 2]
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,

        /// Run the original function with native recursion
        #[arg(long)]
        direct: bool,

        /// Call depth limit for direct runs, capped at `MAX_DIRECT_CALL_DEPTH`
        #[arg(long, default_value_t = DEFAULT_MAX_CALL_DEPTH)]
        max_depth: usize,
    },
}

fn main() -> Result<()> {
    // Initialize logger before parsing CLI args
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbose flag
    if cli.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }

    let result = match cli.command {
        Commands::Emit {
            input,
            output,
            format,
            dump_ast,
            dump_tokens,
        } => emit(&input, output.as_deref(), format, dump_ast, dump_tokens),
        Commands::Check { input } => check(&input),
        Commands::Run {
            input,
            function,
            args,
            direct,
            max_depth,
        } => run(&input, &function, &args, direct, max_depth),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

/// Runs the pipeline, reports diagnostics and fails on front-end errors.
fn transform(input: &Path) -> Result<(CompilationPipeline, CompilationOutput)> {
    let state = CompilationState::new(input).with_context(|| format!("Failed to load {:?}", input))?;
    let mut pipeline = CompilationPipeline::new(state);
    let output = pipeline.run()?;
    match output {
        Some(output) => Ok((pipeline, output)),
        None => bail!("{:?} has errors", input),
    }
}

fn emit(input: &Path, output: Option<&Path>, format: EmitFormat, dump_ast: bool, dump_tokens: bool) -> Result<()> {
    if dump_tokens {
        let source = fs::read_to_string(input).with_context(|| format!("Failed to read source file: {:?}", input))?;
        println!("{}", "=== Tokens ===".blue().bold());
        println!("{}", format_tokens(&Lexer::new(&source).collect_tokens()));
    }

    let (pipeline, result) = transform(input)?;

    if dump_ast {
        println!("{}", "=== AST ===".blue().bold());
        println!("{}", serde_json::to_string_pretty(&result.program)?);
    }

    let rendered = match format {
        EmitFormat::Text => result
            .units
            .iter()
            .map(|unit| unit.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
        EmitFormat::Json => serde_json::to_string_pretty(&result.units)?,
    };

    match output {
        Some(path) => {
            write_atomically(path, &rendered)?;
            println!("{}: Wrote {} unit(s) to {:?}", "success".green().bold(), result.units.len(), path);
        }
        None => println!("{}", rendered),
    }

    if pipeline.state().has_errors() {
        bail!("{} group(s) could not be transformed", pipeline.state().error_count());
    }
    Ok(())
}

/// Writes through a temporary file in the target directory so a failed run
/// never leaves a truncated output behind.
fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir).context("Failed to create temporary file")?;
    file.write_all(contents.as_bytes())?;
    file.persist(path)
        .map_err(|e| anyhow!("Failed to write {:?}: {}", path, e.error))?;
    Ok(())
}

fn check(input: &Path) -> Result<()> {
    let (pipeline, result) = transform(input)?;
    let collector = pipeline.diagnostics();

    if collector.has_errors() {
        bail!("{} error(s) found", collector.error_count());
    }

    let entry_points: usize = result.units.iter().map(|unit| unit.entry_points.len()).sum();
    println!(
        "{}: {} group(s), {} entry point(s), {} warning(s)",
        "success".green().bold(),
        result.units.len(),
        entry_points,
        collector.warning_count()
    );
    Ok(())
}

fn run(input: &Path, function: &str, raw_args: &[String], direct: bool, max_depth: usize) -> Result<()> {
    let args = raw_args
        .iter()
        .map(|raw| parse_value(raw))
        .collect::<Result<Vec<Value>, _>>()?;

    let (_pipeline, result) = transform(input)?;

    let outcome: RunOutcome = if direct {
        runtime::run_direct(&result.program, function, args, max_depth)?
    } else {
        // Accepts both the original name and the generated entry point name
        runtime::run_generated(&result.program, &result.units, function, args)?
    };

    for line in &outcome.effects.output {
        println!("{}", line);
    }
    if let Some(stats) = outcome.stats {
        log::info!("{} call(s), max depth {}", stats.calls, stats.max_depth);
    }
    match outcome.value {
        Some(value) => println!("{}: {}", "result".green(), value),
        None => println!("{}", "done".green()),
    }
    Ok(())
}
