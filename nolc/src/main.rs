//! nolol compiler CLI

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use nolc::printer::print_program;
use nolc::source::{DiskFileProvider, JsonTreeParser, SourceParser};
use nolc::{CompileError, CompilerConfig, Converter};

#[derive(Parser)]
#[command(name = "nolc", version, about = "nolol to yolol compiler")]
struct Cli {
    /// Log pipeline stages (overrides NOLC_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a nolol program tree (JSON) to yolol
    Compile {
        /// Program tree to compile
        file: PathBuf,
        /// Keep spaces between tokens
        #[arg(long)]
        spaces: bool,
        /// Configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// nolol source the tree was parsed from, used to render errors
        #[arg(long)]
        source: Option<PathBuf>,
        /// Print the table of shortened variable names
        #[arg(long)]
        names: bool,
        /// Write the program here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Parse a program tree and dump it as JSON (debug)
    Dump {
        /// Program tree to dump
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Compile {
            file,
            spaces,
            config,
            source,
            names,
            output,
        } => compile_file(&file, spaces, config.as_deref(), names, output.as_deref())
            .map_err(|e| (e, source)),
        Command::Dump { file } => dump_file(&file).map_err(|e| (e, None)),
    };

    if let Err((e, source)) = result {
        report(&e, source.as_deref());
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("NOLC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(error: &CompileError, source: Option<&Path>) {
    if let Some(path) = source
        && let Ok(text) = std::fs::read_to_string(path)
    {
        nolc::error::report_error(&path.display().to_string(), &text, error);
        return;
    }
    eprintln!("Error: {error}");
}

fn compile_file(
    path: &Path,
    spaces: bool,
    config: Option<&Path>,
    names: bool,
    output: Option<&Path>,
) -> nolc::Result<()> {
    let mut config = match config {
        Some(file) => CompilerConfig::load(file)?,
        None => CompilerConfig::default(),
    };
    if spaces {
        config = config.spaces(true);
    }

    let files = DiskFileProvider::for_file(path);
    let main = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CompileError::io_error(format!("{} is not a file", path.display())))?;

    let mut converter = Converter::new(config);
    let program = converter.convert_file(&main, &files, &JsonTreeParser)?;
    let yolol = print_program(&program, converter.config().print_mode())?;

    match output {
        Some(out) => std::fs::write(out, &yolol)?,
        None => print!("{yolol}"),
    }

    if names {
        let mut table: Vec<_> = converter.variable_translations().into_iter().collect();
        table.sort();
        for (short, original) in table {
            eprintln!("{short} = {original}");
        }
    }
    Ok(())
}

fn dump_file(path: &Path) -> nolc::Result<()> {
    let source = std::fs::read_to_string(path)?;
    let program = JsonTreeParser.parse(&path.display().to_string(), &source)?;
    let json = serde_json::to_string_pretty(&program)
        .map_err(|e| CompileError::internal(format!("cannot serialize tree: {e}")))?;
    println!("{json}");
    Ok(())
}
