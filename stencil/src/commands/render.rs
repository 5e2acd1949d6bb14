//! `stencil render` -- renders a template file against a JSON data file.

use std::path::PathBuf;

use stencil::{Bindings, DefaultSerializer, Permissive, Sentinel, Strict, UndefinedPolicy};

use crate::config::{Config, UndefinedPolicyKind};
use crate::error::{CliError, Result};

#[derive(Debug, Clone)]
pub struct RenderArgs {
    pub template: PathBuf,
    pub data: Option<PathBuf>,
    pub strict_undefined: bool,
    pub verbose: bool,
}

pub fn run(args: RenderArgs, config: &Config) -> Result<()> {
    let source = std::fs::read_to_string(&args.template)
        .map_err(|e| CliError::FileOperation(format!("reading {}: {e}", args.template.display())))?;

    let bindings = match &args.data {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| CliError::FileOperation(format!("reading {}: {e}", path.display())))?;
            let json: serde_json::Value = serde_json::from_str(&content)?;
            Bindings::from_json(json).map_err(CliError::InvalidData)?
        }
        None => Bindings::new(),
    };

    let strict = args.strict_undefined || config.undefined_policy == UndefinedPolicyKind::Strict;
    let sentinel = config.undefined_sentinel.clone();

    tracing::debug!(template = %args.template.display(), strict, "rendering template");

    let policy: Box<dyn UndefinedPolicy> = if strict {
        Box::new(Strict)
    } else if let Some(text) = sentinel {
        Box::new(Sentinel(text))
    } else {
        Box::new(Permissive)
    };

    let output = stencil::render_with(&source, &bindings, &DefaultSerializer, policy.as_ref())?;
    print!("{output}");
    Ok(())
}
