//! Configuration merge
//!
//! Three layers, in precedence order Defaults < Invocation < ProjectConfig.
//! Scalars and switches override layer by layer; the variables map is a
//! key-wise overlay; the designated accumulating list options concatenate
//! across all layers and are never truncated. Each merge records the
//! contributing sources with digests for file-backed layers.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::{json_type_name, schema, ConfigError, OptionSet, OptionValue};

/// Origin of one merge layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerOrigin {
    Defaults,
    Invocation,
    ProjectConfig,
}

/// A contributing configuration source with provenance.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSource {
    pub origin: LayerOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// One unmerged configuration layer.
///
/// Layers carry the original `pandoc_arguments` shape: a
/// `command_arguments` object and an optional `markdown_extensions`
/// object. Either may be absent.
#[derive(Debug, Clone)]
pub struct Layer {
    pub origin: LayerOrigin,
    pub arguments: serde_json::Map<String, Value>,
    pub extensions: serde_json::Map<String, Value>,
    pub path: Option<PathBuf>,
    pub digest: Option<String>,
}

impl Layer {
    /// Build a layer from a JSON object. A nested `pandoc_arguments` key
    /// is unwrapped; otherwise the object itself is the layer.
    pub fn from_value(origin: LayerOrigin, value: &Value) -> Result<Self, ConfigError> {
        let outer = value.as_object().ok_or_else(|| ConfigError::NotAnObject {
            section: "configuration".to_string(),
        })?;

        let inner = match outer.get("pandoc_arguments") {
            Some(nested) => nested.as_object().ok_or_else(|| ConfigError::NotAnObject {
                section: "pandoc_arguments".to_string(),
            })?,
            None => outer,
        };

        let arguments = match inner.get("command_arguments") {
            Some(args) => args
                .as_object()
                .ok_or_else(|| ConfigError::NotAnObject {
                    section: "command_arguments".to_string(),
                })?
                .clone(),
            None => serde_json::Map::new(),
        };

        let extensions = match inner.get("markdown_extensions") {
            Some(exts) => exts
                .as_object()
                .ok_or_else(|| ConfigError::NotAnObject {
                    section: "markdown_extensions".to_string(),
                })?
                .clone(),
            None => serde_json::Map::new(),
        };

        Ok(Self {
            origin,
            arguments,
            extensions,
            path: None,
            digest: None,
        })
    }

    fn source(&self) -> ConfigSource {
        ConfigSource {
            origin: self.origin,
            path: self
                .path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            digest: self.digest.clone(),
        }
    }
}

/// The fully merged configuration for one build.
#[derive(Debug, Clone)]
pub struct EffectiveOptions {
    /// Merged option set, in canonical (schema, then first-seen) order.
    pub arguments: OptionSet,
    /// Merged markdown-extensions map.
    pub extensions: IndexMap<String, bool>,
    /// Contributing sources in precedence order.
    pub sources: Vec<ConfigSource>,
}

/// Merge the three configuration layers into one effective option set.
///
/// `defaults` is the schema defaults layer (see [`schema::defaults`]);
/// callers pass it explicitly so merges never depend on process-wide
/// state.
pub fn merge(
    defaults: OptionSet,
    invocation: Option<&Layer>,
    project: Option<&Layer>,
) -> Result<EffectiveOptions, ConfigError> {
    let mut arguments = defaults;
    let mut extensions = IndexMap::new();
    let mut sources = vec![ConfigSource {
        origin: LayerOrigin::Defaults,
        path: None,
        digest: None,
    }];

    for layer in [invocation, project].into_iter().flatten() {
        apply_layer(&mut arguments, &mut extensions, layer)?;
        sources.push(layer.source());
    }

    Ok(EffectiveOptions {
        arguments,
        extensions,
        sources,
    })
}

fn apply_layer(
    arguments: &mut OptionSet,
    extensions: &mut IndexMap<String, bool>,
    layer: &Layer,
) -> Result<(), ConfigError> {
    for (name, raw) in &layer.arguments {
        let value = OptionValue::from_json(name, raw)?;
        // Only the schema's named accumulating options concatenate;
        // unknown keys override like any scalar, whatever their shape.
        match schema::family_of(name) {
            Some(family) if family.is_accumulating() => {
                accumulate(arguments, name, raw, value)?;
            }
            _ => {
                arguments.insert(name.clone(), value);
            }
        }
    }

    for (name, raw) in &layer.extensions {
        let enabled = raw.as_bool().ok_or_else(|| ConfigError::TypeMismatch {
            option: name.clone(),
            expected: "boolean",
            found: json_type_name(raw),
        })?;
        extensions.insert(name.clone(), enabled);
    }

    Ok(())
}

fn accumulate(
    arguments: &mut OptionSet,
    name: &str,
    raw: &Value,
    value: OptionValue,
) -> Result<(), ConfigError> {
    match value {
        OptionValue::List(items) => match arguments.get_mut(name) {
            Some(OptionValue::List(existing)) => existing.extend(items),
            _ => {
                arguments.insert(name.to_string(), OptionValue::List(items));
            }
        },
        OptionValue::Map(entries) => match arguments.get_mut(name) {
            Some(OptionValue::Map(existing)) => {
                for (key, var) in entries {
                    existing.insert(key, var);
                }
            }
            _ => {
                arguments.insert(name.to_string(), OptionValue::Map(entries));
            }
        },
        _ => {
            return Err(ConfigError::TypeMismatch {
                option: name.to_string(),
                expected: "list or map",
                found: json_type_name(raw),
            })
        }
    }
    Ok(())
}

/// Expand a `markdown` from-format with the merged extension flags:
/// `markdown+footnotes-pipe_tables`, in extension-map iteration order.
/// Any other from-format passes through unchanged.
pub fn expand_from_format(from: &str, extensions: &IndexMap<String, bool>) -> String {
    if from != "markdown" {
        return from.to_string();
    }
    let mut out = String::from("markdown");
    for (name, enabled) in extensions {
        out.push(if *enabled { '+' } else { '-' });
        out.push_str(name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer(origin: LayerOrigin, value: Value) -> Layer {
        Layer::from_value(origin, &value).unwrap()
    }

    #[test]
    fn test_defaults_only() {
        let merged = merge(schema::defaults(), None, None).unwrap();
        assert_eq!(merged.sources.len(), 1);
        assert_eq!(merged.sources[0].origin, LayerOrigin::Defaults);
        assert_eq!(
            merged.arguments["standalone"],
            OptionValue::Flag(false)
        );
    }

    #[test]
    fn test_scalar_precedence_project_wins() {
        let invocation = layer(
            LayerOrigin::Invocation,
            json!({"command_arguments": {"highlight-style": "kate"}}),
        );
        let project = layer(
            LayerOrigin::ProjectConfig,
            json!({"command_arguments": {"highlight-style": "pygments"}}),
        );
        let merged = merge(schema::defaults(), Some(&invocation), Some(&project)).unwrap();
        assert_eq!(
            merged.arguments["highlight-style"],
            OptionValue::Str("pygments".to_string())
        );
    }

    #[test]
    fn test_scalar_invocation_when_project_silent() {
        let invocation = layer(
            LayerOrigin::Invocation,
            json!({"command_arguments": {"toc-depth": 4}}),
        );
        let merged = merge(schema::defaults(), Some(&invocation), None).unwrap();
        assert_eq!(merged.arguments["toc-depth"], OptionValue::Int(4));
    }

    #[test]
    fn test_accumulating_lists_concatenate_in_layer_order() {
        let invocation = layer(
            LayerOrigin::Invocation,
            json!({"command_arguments": {"css": ["inv.css"]}}),
        );
        let project = layer(
            LayerOrigin::ProjectConfig,
            json!({"command_arguments": {"css": ["proj-a.css", "proj-b.css"]}}),
        );
        let merged = merge(schema::defaults(), Some(&invocation), Some(&project)).unwrap();
        assert_eq!(
            merged.arguments["css"],
            OptionValue::List(vec![
                "inv.css".to_string(),
                "proj-a.css".to_string(),
                "proj-b.css".to_string(),
            ])
        );
    }

    #[test]
    fn test_accumulating_lists_keep_duplicates() {
        let invocation = layer(
            LayerOrigin::Invocation,
            json!({"command_arguments": {"include-in-header": ["h.tex"]}}),
        );
        let project = layer(
            LayerOrigin::ProjectConfig,
            json!({"command_arguments": {"include-in-header": ["h.tex"]}}),
        );
        let merged = merge(schema::defaults(), Some(&invocation), Some(&project)).unwrap();
        assert_eq!(
            merged.arguments["include-in-header"],
            OptionValue::List(vec!["h.tex".to_string(), "h.tex".to_string()])
        );
    }

    #[test]
    fn test_variables_union_later_value_wins() {
        let invocation = layer(
            LayerOrigin::Invocation,
            json!({"command_arguments": {"variables": {"geometry": "margin=1in", "fontsize": "10pt"}}}),
        );
        let project = layer(
            LayerOrigin::ProjectConfig,
            json!({"command_arguments": {"variables": {"fontsize": "12pt"}}}),
        );
        let merged = merge(schema::defaults(), Some(&invocation), Some(&project)).unwrap();
        let OptionValue::Map(vars) = &merged.arguments["variables"] else {
            panic!("variables should be a map");
        };
        assert_eq!(vars["geometry"], super::super::VarValue::Str("margin=1in".to_string()));
        assert_eq!(vars["fontsize"], super::super::VarValue::Str("12pt".to_string()));
        // First-insertion position is kept for overridden keys.
        let keys: Vec<_> = vars.keys().collect();
        assert_eq!(keys, vec!["geometry", "fontsize"]);
    }

    #[test]
    fn test_wrong_type_for_accumulating_option() {
        let project = layer(
            LayerOrigin::ProjectConfig,
            json!({"command_arguments": {"css": "style.css"}}),
        );
        let result = merge(schema::defaults(), None, Some(&project));
        assert!(matches!(
            result,
            Err(ConfigError::TypeMismatch { ref option, .. }) if option == "css"
        ));
    }

    #[test]
    fn test_pandoc_arguments_unwrapping() {
        let wrapped = layer(
            LayerOrigin::ProjectConfig,
            json!({"pandoc_arguments": {"command_arguments": {"standalone": true}}}),
        );
        let bare = layer(
            LayerOrigin::ProjectConfig,
            json!({"command_arguments": {"standalone": true}}),
        );
        for l in [wrapped, bare] {
            let merged = merge(schema::defaults(), None, Some(&l)).unwrap();
            assert_eq!(merged.arguments["standalone"], OptionValue::Flag(true));
        }
    }

    #[test]
    fn test_extensions_overlay() {
        let invocation = layer(
            LayerOrigin::Invocation,
            json!({"markdown_extensions": {"footnotes": true, "pipe_tables": true}}),
        );
        let project = layer(
            LayerOrigin::ProjectConfig,
            json!({"markdown_extensions": {"pipe_tables": false}}),
        );
        let merged = merge(schema::defaults(), Some(&invocation), Some(&project)).unwrap();
        assert_eq!(merged.extensions["footnotes"], true);
        assert_eq!(merged.extensions["pipe_tables"], false);
    }

    #[test]
    fn test_expand_from_format() {
        let mut extensions = IndexMap::new();
        extensions.insert("footnotes".to_string(), true);
        extensions.insert("pipe_tables".to_string(), false);
        assert_eq!(
            expand_from_format("markdown", &extensions),
            "markdown+footnotes-pipe_tables"
        );
        assert_eq!(expand_from_format("rst", &extensions), "rst");
    }

    #[test]
    fn test_unknown_options_carried_through() {
        let project = layer(
            LayerOrigin::ProjectConfig,
            json!({"command_arguments": {"some-future-flag": true}}),
        );
        let merged = merge(schema::defaults(), None, Some(&project)).unwrap();
        assert_eq!(
            merged.arguments["some-future-flag"],
            OptionValue::Flag(true)
        );
    }

    #[test]
    fn test_unknown_list_option_overrides_across_layers() {
        let invocation = layer(
            LayerOrigin::Invocation,
            json!({"command_arguments": {"filter": ["invocation.py"]}}),
        );
        let project = layer(
            LayerOrigin::ProjectConfig,
            json!({"command_arguments": {"filter": ["project.py"]}}),
        );
        let merged = merge(schema::defaults(), Some(&invocation), Some(&project)).unwrap();
        assert_eq!(
            merged.arguments["filter"],
            OptionValue::List(vec!["project.py".to_string()])
        );
    }

    #[test]
    fn test_sources_record_precedence_order() {
        let invocation = layer(LayerOrigin::Invocation, json!({}));
        let mut project = layer(LayerOrigin::ProjectConfig, json!({}));
        project.path = Some(PathBuf::from("/p/pandoc-config.json"));
        project.digest = Some("abc123".to_string());

        let merged = merge(schema::defaults(), Some(&invocation), Some(&project)).unwrap();
        let origins: Vec<_> = merged.sources.iter().map(|s| s.origin).collect();
        assert_eq!(
            origins,
            vec![
                LayerOrigin::Defaults,
                LayerOrigin::Invocation,
                LayerOrigin::ProjectConfig,
            ]
        );
        assert_eq!(merged.sources[2].digest.as_deref(), Some("abc123"));
    }
}
