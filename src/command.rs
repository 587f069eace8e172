//! Command synthesis
//!
//! Turns a merged option set and a build request into the exact argv the
//! external tool is launched with. Every value becomes tokens according
//! to its schema family; no shell is involved, so nothing is quoted.
//! Synthesis is all-or-nothing: a value that does not fit its family
//! fails the whole vector.

use crate::options::{expand_from_format, EffectiveOptions, Family, OptionValue, VarValue};
use crate::options::schema::{family_of, infer_family};
use crate::request::BuildRequest;
use crate::resolver::Resolver;

/// Name of the external converter binary.
pub const PROGRAM: &str = "pandoc";

/// A fully synthesized command line. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentVector(Vec<String>);

impl ArgumentVector {
    /// Build a vector directly from a program and its arguments. Normal
    /// builds go through [`synthesize`]; this exists for tooling that
    /// supervises arbitrary commands.
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = String>) -> Self {
        let mut tokens = vec![program.into()];
        tokens.extend(args);
        Self(tokens)
    }

    pub fn program(&self) -> &str {
        &self.0[0]
    }

    pub fn args(&self) -> &[String] {
        &self.0[1..]
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// Single-line rendering for logs and the dry-run display.
    pub fn display_line(&self) -> String {
        self.0.join(" ")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("option {option} does not fit its {family:?} family")]
    FamilyMismatch { option: String, family: Family },
}

/// Build the argv for one request.
///
/// Delivery flags come first, merged options next in their canonical
/// order, and the input file is always the final token. In window mode
/// the `--output`, `--to`, and `--from` tokens are suppressed so the
/// tool writes the default format to stdout.
pub fn synthesize(
    effective: &EffectiveOptions,
    request: &BuildRequest,
    resolver: &Resolver,
) -> Result<ArgumentVector, SynthesisError> {
    let mut argv = vec![PROGRAM.to_string()];

    if !request.to_window {
        if let Some(output) = request.output_path() {
            argv.push(format!("--output={}", output.display()));
        }
        argv.push(format!("--to={}", request.to.format));
        argv.push(format!(
            "--from={}",
            expand_from_format(&request.from, &effective.extensions)
        ));
    }

    for (name, value) in &effective.arguments {
        let family = family_of(name).unwrap_or_else(|| infer_family(value));
        emit_option(&mut argv, name, value, family, resolver)?;
    }

    argv.push(request.input_path().display().to_string());
    Ok(ArgumentVector(argv))
}

fn emit_option(
    argv: &mut Vec<String>,
    name: &str,
    value: &OptionValue,
    family: Family,
    resolver: &Resolver,
) -> Result<(), SynthesisError> {
    let mismatch = || SynthesisError::FamilyMismatch {
        option: name.to_string(),
        family,
    };

    match value {
        OptionValue::Flag(false) => {}
        // A bare `true` on a value-taking numeric option has no sane
        // rendering, so it stays inert.
        OptionValue::Flag(true) => {
            if family != Family::Numeric {
                argv.push(format!("--{name}"));
            }
        }
        OptionValue::Str(s) if s.is_empty() => {}
        OptionValue::Str(s) => match family {
            Family::PathScalar => argv.push(resolver.resolve_arg(s, &format!("--{name}="))),
            Family::VariableMap | Family::CommaList | Family::PathList => return Err(mismatch()),
            _ => argv.push(format!("--{name}={s}")),
        },
        OptionValue::Int(i) => match family {
            Family::VariableMap | Family::CommaList | Family::PathList => return Err(mismatch()),
            _ => argv.push(format!("--{name}={i}")),
        },
        OptionValue::List(items) if items.is_empty() => {}
        OptionValue::List(items) => match family {
            Family::CommaList => argv.push(format!("--{name}={}", items.join(","))),
            Family::PathList => {
                for item in items {
                    argv.push(resolver.resolve_arg(item, &format!("--{name}=")));
                }
            }
            _ => return Err(mismatch()),
        },
        OptionValue::Map(entries) => {
            if family != Family::VariableMap {
                return Err(mismatch());
            }
            // The flag is always the singular --variable, whatever the
            // option is called in the configuration.
            for (key, var) in entries {
                match var {
                    VarValue::Str(s) => argv.push(format!("--variable={key}:{s}")),
                    VarValue::List(items) => {
                        for item in items {
                            argv.push(format!("--variable={key}:{item}"));
                        }
                    }
                    VarValue::Bool(false) => {}
                    VarValue::Bool(true) => argv.push(format!("--variable={key}:true")),
                }
            }
        }
    }

    Ok(())
}
