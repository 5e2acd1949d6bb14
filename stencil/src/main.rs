//! `stencil` CLI -- renders a template file against a JSON data file, with
//! debug subcommands for inspecting each pipeline stage.
//!
//! Uses clap for argument parsing and dispatches to the command handlers
//! in [`commands`].

mod commands;
mod config;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{ast::AstArgs, disasm::DisasmArgs, render::RenderArgs, tokens::TokensArgs};
use config::Config;
use error::Result;

/// Stencil - a small Liquid/Jinja-style text-template engine.
///
/// Renders `{{ … }}` output expressions and `{% if/for %}` control tags
/// against a JSON data binding. The `tokens`/`ast`/`disasm` subcommands
/// expose the lexer, parser, and compiler stages for debugging.
#[derive(Parser, Debug)]
#[command(name = "stencil")]
#[command(author = "Stencil Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A small Liquid/Jinja-style text-template engine", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true, env = "STENCIL_VERBOSE")]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "STENCIL_CONFIG")]
    config: Option<PathBuf>,

    /// Disable color output
    #[arg(long, global = true, env = "STENCIL_NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a template file against an optional JSON data file
    Render(RenderCommand),

    /// Dump the lexer's token stream for a template file
    Tokens(TokensCommand),

    /// Dump the parsed AST for a template file
    Ast(AstCommand),

    /// Dump the compiled bytecode for a template file, one instruction per line
    Disasm(DisasmCommand),
}

#[derive(Parser, Debug)]
struct RenderCommand {
    /// Template file to render
    template: PathBuf,

    /// JSON file supplying the data binding (defaults to an empty object)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Raise `UndefinedVariable` instead of rendering missing names as empty
    #[arg(long)]
    strict_undefined: bool,
}

#[derive(Parser, Debug)]
struct TokensCommand {
    /// Template file to tokenize
    template: PathBuf,
}

#[derive(Parser, Debug)]
struct AstCommand {
    /// Template file to parse
    template: PathBuf,
}

#[derive(Parser, Debug)]
struct DisasmCommand {
    /// Template file to compile
    template: PathBuf,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.no_color)?;
    let config = load_config(cli.config.as_deref())?;

    execute_command(cli.command, cli.verbose, config)
}

fn init_logging(verbose: bool, no_color: bool) -> Result<()> {
    let filter = if verbose { EnvFilter::new("debug") } else { EnvFilter::new("info") };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(!no_color)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .try_init()
        .map_err(|e| error::CliError::Config(format!("failed to initialize logging: {e}")))?;

    Ok(())
}

fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

fn execute_command(command: Commands, verbose: bool, config: Config) -> Result<()> {
    match command {
        Commands::Render(args) => commands::render::run(
            RenderArgs {
                template: args.template,
                data: args.data,
                strict_undefined: args.strict_undefined,
                verbose,
            },
            &config,
        ),
        Commands::Tokens(args) => commands::tokens::run(TokensArgs { template: args.template, verbose }),
        Commands::Ast(args) => commands::ast::run(AstArgs { template: args.template, verbose }),
        Commands::Disasm(args) => commands::disasm::run(DisasmArgs { template: args.template, verbose }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_render_subcommand() {
        let cli = Cli::parse_from(["stencil", "render", "template.liquid"]);
        assert!(matches!(cli.command, Commands::Render(_)));
    }

    #[test]
    fn parses_render_with_data_and_strict_flag() {
        let cli = Cli::parse_from([
            "stencil",
            "render",
            "template.liquid",
            "--data",
            "data.json",
            "--strict-undefined",
        ]);
        match cli.command {
            Commands::Render(args) => {
                assert_eq!(args.data, Some(PathBuf::from("data.json")));
                assert!(args.strict_undefined);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_tokens_subcommand() {
        let cli = Cli::parse_from(["stencil", "tokens", "template.liquid"]);
        assert!(matches!(cli.command, Commands::Tokens(_)));
    }

    #[test]
    fn parses_ast_subcommand() {
        let cli = Cli::parse_from(["stencil", "ast", "template.liquid"]);
        assert!(matches!(cli.command, Commands::Ast(_)));
    }

    #[test]
    fn parses_disasm_subcommand() {
        let cli = Cli::parse_from(["stencil", "disasm", "template.liquid"]);
        assert!(matches!(cli.command, Commands::Disasm(_)));
    }

    #[test]
    fn parses_global_verbose_before_subcommand() {
        let cli = Cli::parse_from(["stencil", "--verbose", "render", "template.liquid"]);
        assert!(cli.verbose);
    }

    #[test]
    fn parses_global_config_flag() {
        let cli = Cli::parse_from(["stencil", "--config", "/path/stencil.toml", "render", "t.liquid"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/stencil.toml")));
    }

    #[test]
    fn parses_global_no_color_flag() {
        let cli = Cli::parse_from(["stencil", "--no-color", "render", "t.liquid"]);
        assert!(cli.no_color);
    }
}
