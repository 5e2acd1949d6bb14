//! `stencil tokens` -- dumps the lexer's token stream for a template file.

use std::path::PathBuf;

use crate::error::{CliError, Result};

#[derive(Debug, Clone)]
pub struct TokensArgs {
    pub template: PathBuf,
    pub verbose: bool,
}

pub fn run(args: TokensArgs) -> Result<()> {
    let source = std::fs::read_to_string(&args.template)
        .map_err(|e| CliError::FileOperation(format!("reading {}: {e}", args.template.display())))?;

    tracing::debug!(template = %args.template.display(), "tokenizing template");

    let tokens = stencil::tokenize(&source)?;
    for token in &tokens {
        println!(
            "{:>4}..{:<4} {:?}{}",
            token.span.start,
            token.span.end,
            token.kind,
            token
                .payload
                .as_deref()
                .map(|p| format!(" {p:?}"))
                .unwrap_or_default(),
        );
    }
    Ok(())
}
