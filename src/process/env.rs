//! Child environment construction
//!
//! The child's environment is the host environment overlaid with
//! configured overrides. Every value may reference other variables as
//! `$NAME` or `${NAME}`; references resolve against the merged map, and
//! unknown ones pass through literally. Configured tool directories are
//! prepended to `PATH` so the converter and a TeX distribution are
//! found without shell profiles.

use std::collections::HashMap;
use std::path::Path;

/// Platform separator for `PATH` entries.
const PATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Build the full environment for one child process from the host
/// process environment.
pub fn build_environment(
    overrides: &HashMap<String, String>,
    install_path: Option<&Path>,
    texbin_path: Option<&Path>,
) -> HashMap<String, String> {
    merge_environment(std::env::vars().collect(), overrides, install_path, texbin_path)
}

/// Overlay overrides onto an inherited environment, expand references,
/// and prepend the tool directories to `PATH`.
pub fn merge_environment(
    inherited: HashMap<String, String>,
    overrides: &HashMap<String, String>,
    install_path: Option<&Path>,
    texbin_path: Option<&Path>,
) -> HashMap<String, String> {
    let mut env = inherited;
    for (key, value) in overrides {
        env.insert(key.clone(), value.clone());
    }

    let expanded: HashMap<String, String> = env
        .iter()
        .map(|(key, value)| (key.clone(), expand_references(value, &env)))
        .collect();
    let mut env = expanded;

    let mut path = env.remove("PATH").unwrap_or_default();
    for dir in [texbin_path, install_path].into_iter().flatten() {
        path = if path.is_empty() {
            dir.display().to_string()
        } else {
            format!("{}{PATH_SEPARATOR}{path}", dir.display())
        };
    }
    env.insert("PATH".to_string(), path);

    env
}

/// Expand `$NAME` and `${NAME}` references in one value. Unknown names
/// and a trailing bare `$` are kept literal.
fn expand_references(value: &str, env: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                match env.get(&name) {
                    Some(resolved) if closed => out.push_str(resolved),
                    _ => {
                        out.push_str("${");
                        out.push_str(&name);
                        if closed {
                            out.push('}');
                        }
                    }
                }
            }
            Some(c) if c.is_ascii_alphanumeric() || *c == '_' => {
                let mut name = String::new();
                while let Some(c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || *c == '_' {
                        name.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match env.get(&name) {
                    Some(resolved) => out.push_str(resolved),
                    None => {
                        out.push('$');
                        out.push_str(&name);
                    }
                }
            }
            _ => out.push('$'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn pairs(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_overrides_win_over_inherited() {
        let env = merge_environment(
            pairs(&[("EDITOR", "vi")]),
            &pairs(&[("EDITOR", "emacs")]),
            None,
            None,
        );
        assert_eq!(env["EDITOR"], "emacs");
    }

    #[test]
    fn test_references_expand_against_merged_map() {
        let env = merge_environment(
            pairs(&[("BASE", "/opt/tool")]),
            &pairs(&[("DATA", "$BASE/share"), ("LIB", "${BASE}/lib")]),
            None,
            None,
        );
        assert_eq!(env["DATA"], "/opt/tool/share");
        assert_eq!(env["LIB"], "/opt/tool/lib");
    }

    #[test]
    fn test_unknown_references_stay_literal() {
        let env = merge_environment(
            HashMap::new(),
            &pairs(&[("RAW", "$NO_SUCH_VAR and ${ALSO_NOT} and $")]),
            None,
            None,
        );
        assert_eq!(env["RAW"], "$NO_SUCH_VAR and ${ALSO_NOT} and $");
    }

    #[test]
    fn test_tool_dirs_prepend_to_path() {
        let env = merge_environment(
            pairs(&[("PATH", "/usr/bin")]),
            &HashMap::new(),
            Some(&PathBuf::from("/opt/pandoc/bin")),
            Some(&PathBuf::from("/Library/TeX/texbin")),
        );
        let sep = PATH_SEPARATOR;
        assert_eq!(
            env["PATH"],
            format!("/opt/pandoc/bin{sep}/Library/TeX/texbin{sep}/usr/bin")
        );
    }

    #[test]
    fn test_build_environment_inherits_the_host() {
        // Every test process has a PATH; the child map must carry one.
        let env = build_environment(&HashMap::new(), None, None);
        assert!(env.contains_key("PATH"));
    }
}
