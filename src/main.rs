//! Sprig CLI
//!
//! Usage:
//!   sprig [OPTIONS] [FILE]
//!
//! Options:
//!   -o, --output <FILE>      Output file (stdout if not provided)
//!   -c, --config <FILE>      Options file (TOML format)
//!   -r, --root <DIR>         Template root directory (repeatable)
//!   --env-module <PATH>      Path to the runtime environment module
//!   --production             Generate production keys (SHA-256 digests)
//!   --html-comments          Wrap output in HTML source markers
//!   --deps                   Print resolved dependency paths instead
//!   -h, --help               Print help

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sprig::{compile_str, CompileError, CompileOptions, FilesystemLoader, KeyMode};

#[derive(Parser)]
#[command(name = "sprig")]
#[command(about = "Compiles Twig-style templates into self-contained JavaScript modules")]
struct Cli {
    /// Input template (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Output file (writes to stdout if not provided)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Options file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Template root directory (repeatable)
    #[arg(short, long = "root")]
    roots: Vec<PathBuf>,

    /// Path to the runtime environment module the emitted code requires
    #[arg(long)]
    env_module: Option<String>,

    /// Generate production keys (SHA-256 digests)
    #[arg(long)]
    production: bool,

    /// Wrap output in HTML source markers
    #[arg(long)]
    html_comments: bool,

    /// Print resolved dependency paths, one per line, instead of the module
    #[arg(long)]
    deps: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // If no input file and stdin is a terminal (interactive), show intro help
    if cli.input.is_none() && io::stdin().is_terminal() {
        print_intro();
        return;
    }

    // Assemble options: config file first, flags override
    let mut options = match &cli.config {
        Some(path) => match CompileOptions::from_file(path) {
            Ok(options) => options,
            Err(e) => {
                eprintln!("Error loading options '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => match &cli.env_module {
            Some(env_module) => CompileOptions::new(env_module),
            None => {
                eprintln!("Error: --env-module or --config is required");
                std::process::exit(1);
            }
        },
    };
    if let Some(env_module) = &cli.env_module {
        options.environment_module_path = env_module.clone();
    }
    if cli.production {
        options = options.with_mode(KeyMode::Production);
    }
    if cli.html_comments {
        options = options.with_html_comments(true);
    }

    // Read input
    let (source, resource_path, display_name) = match &cli.input {
        Some(path) => {
            let source = match fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    eprintln!("Error reading file '{}': {}", path.display(), e);
                    std::process::exit(1);
                }
            };
            let resource_path = match fs::canonicalize(path) {
                Ok(resolved) => resolved,
                Err(e) => {
                    eprintln!("Error resolving file '{}': {}", path.display(), e);
                    std::process::exit(1);
                }
            };
            (source, resource_path, path.display().to_string())
        }
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => (buffer, PathBuf::from("stdin"), "stdin".to_string()),
                Err(e) => {
                    eprintln!("Error reading from stdin: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    let mut loader = FilesystemLoader::new();
    for root in &cli.roots {
        loader = loader.with_root(root);
    }

    match compile_str(&source, &resource_path, &loader, &options).await {
        Ok(module) => {
            if cli.deps {
                for dependency in &module.dependencies {
                    println!("{}", dependency.display());
                }
                return;
            }
            match &cli.output {
                Some(path) => {
                    if let Err(e) = fs::write(path, &module.code) {
                        eprintln!("Error writing '{}': {}", path.display(), e);
                        std::process::exit(1);
                    }
                }
                None => {
                    println!("{}", module.code);
                }
            }
        }
        Err(CompileError::Parse(errors)) => {
            for error in &errors {
                eprintln!("{}", error.format(&source, &display_name));
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_intro() {
    println!(
        r#"Sprig - compiles Twig-style templates into self-contained JS modules

USAGE:
    sprig [OPTIONS] [FILE]
    cat template.twig | sprig --env-module ./runtime/env.js

OPTIONS:
    -o, --output <FILE>   Output file (stdout if not provided)
    -c, --config <FILE>   Options file (TOML format)
    -r, --root <DIR>      Template root directory (repeatable)
    --env-module <PATH>   Runtime environment module the output requires
    --production          Generate production keys (SHA-256 digests)
    --html-comments       Wrap output in HTML source markers
    --deps                Print resolved dependency paths instead
    -h, --help            Print help

QUICK START:
    sprig index.twig -r templates --env-module ./runtime/env.js > index.js

Every template referenced by include/import/extends/embed is resolved
ahead of time; the emitted module requires each one before registering
itself, so the runtime registry is complete before the first render."#
    );
}
