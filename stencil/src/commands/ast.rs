//! `stencil ast` -- dumps the parsed AST for a template file, debug-formatted.

use std::path::PathBuf;

use crate::error::{CliError, Result};

#[derive(Debug, Clone)]
pub struct AstArgs {
    pub template: PathBuf,
    pub verbose: bool,
}

pub fn run(args: AstArgs) -> Result<()> {
    let source = std::fs::read_to_string(&args.template)
        .map_err(|e| CliError::FileOperation(format!("reading {}: {e}", args.template.display())))?;

    tracing::debug!(template = %args.template.display(), "parsing template");

    let template = stencil::parse(&source)?;
    for node in template.nodes() {
        println!("{node:#?}");
    }
    Ok(())
}
