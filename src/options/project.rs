//! Project configuration file
//!
//! `pandoc-config.json` is JSON-with-comments: `//` and `/* */` comments
//! are stripped before parsing. The file is optional; parse failures
//! abort the current build with a descriptive error, never the host.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::{ConfigError, Layer, LayerOrigin};

/// File name the resolver searches for.
pub const PROJECT_CONFIG_FILENAME: &str = "pandoc-config.json";

/// Load and parse a project config file into a merge layer, recording
/// the file path and a SHA-256 digest of the raw bytes for provenance.
pub fn load(path: &Path) -> Result<Layer, ConfigError> {
    let bytes = fs::read(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let digest = hex::encode(Sha256::digest(&bytes));

    let text = String::from_utf8(bytes).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: format!("invalid UTF-8: {e}"),
    })?;

    let value: serde_json::Value =
        serde_json::from_str(&strip_comments(&text)).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let mut layer = Layer::from_value(LayerOrigin::ProjectConfig, &value)?;
    layer.path = Some(path.to_path_buf());
    layer.digest = Some(digest);
    Ok(layer)
}

/// Strip `//` and `/* */` comments from a JSON source, leaving string
/// contents untouched and preserving newlines so parse errors keep
/// meaningful line numbers.
pub fn strip_comments(source: &str) -> String {
    enum State {
        Normal,
        InString,
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut state = State::Normal;

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '"' => {
                    state = State::InString;
                    out.push(c);
                }
                '/' => match chars.peek() {
                    Some('/') => {
                        chars.next();
                        state = State::LineComment;
                    }
                    Some('*') => {
                        chars.next();
                        state = State::BlockComment;
                    }
                    _ => out.push(c),
                },
                _ => out.push(c),
            },
            State::InString => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == '"' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Normal;
                } else if c == '\n' {
                    out.push('\n');
                }
            }
        }
    }

    out
}
