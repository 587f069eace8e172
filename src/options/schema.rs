//! The recognized pandoc option set
//!
//! This is the default configuration resource: every option the command
//! synthesizer knows about, with its serialization family and an inert
//! baseline value (switches off, scalars empty, lists empty). It is
//! loaded fresh per build as the lowest-precedence merge layer.

use indexmap::IndexMap;

use super::{Family, OptionSet, OptionValue};

/// One recognized option and its serialization family.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub name: &'static str,
    pub family: Family,
}

/// The full recognized option set, in canonical emission order.
///
/// The family is fixed here, once; synthesis never re-infers it from a
/// value. The `Numeric` entries are exactly the options that must never
/// be treated as boolean switches.
pub const SCHEMA: &[OptionSpec] = &[
    // Reader behavior
    OptionSpec { name: "parse-raw", family: Family::Switch },
    OptionSpec { name: "smart", family: Family::Switch },
    OptionSpec { name: "old-dashes", family: Family::Switch },
    OptionSpec { name: "normalize", family: Family::Switch },
    OptionSpec { name: "preserve-tabs", family: Family::Switch },
    OptionSpec { name: "tab-stop", family: Family::Numeric },
    OptionSpec { name: "indented-code-classes", family: Family::CommaList },
    // General writer behavior
    OptionSpec { name: "standalone", family: Family::Switch },
    OptionSpec { name: "template", family: Family::PathScalar },
    OptionSpec { name: "variables", family: Family::VariableMap },
    OptionSpec { name: "no-highlight", family: Family::Switch },
    OptionSpec { name: "highlight-style", family: Family::Scalar },
    OptionSpec { name: "include-in-header", family: Family::PathList },
    OptionSpec { name: "include-before-body", family: Family::PathList },
    OptionSpec { name: "include-after-body", family: Family::PathList },
    OptionSpec { name: "table-of-contents", family: Family::Switch },
    OptionSpec { name: "toc-depth", family: Family::Numeric },
    OptionSpec { name: "base-header-level", family: Family::Numeric },
    OptionSpec { name: "number-sections", family: Family::Switch },
    OptionSpec { name: "number-offset", family: Family::CommaList },
    OptionSpec { name: "section-divs", family: Family::Switch },
    OptionSpec { name: "columns", family: Family::Scalar },
    OptionSpec { name: "data-dir", family: Family::Scalar },
    // HTML and EPUB
    OptionSpec { name: "self-contained", family: Family::Switch },
    OptionSpec { name: "html-q-tags", family: Family::Switch },
    OptionSpec { name: "ascii", family: Family::Switch },
    OptionSpec { name: "css", family: Family::PathList },
    OptionSpec { name: "id-prefix", family: Family::Scalar },
    OptionSpec { name: "title-prefix", family: Family::Scalar },
    OptionSpec { name: "email-obfuscation", family: Family::Scalar },
    OptionSpec { name: "epub-stylesheet", family: Family::Scalar },
    OptionSpec { name: "epub-cover-image", family: Family::Scalar },
    OptionSpec { name: "epub-metadata", family: Family::Scalar },
    OptionSpec { name: "epub-embed-font", family: Family::Scalar },
    // Markdown writer
    OptionSpec { name: "atx-headers", family: Family::Switch },
    OptionSpec { name: "reference-links", family: Family::Switch },
    // Slides
    OptionSpec { name: "incremental", family: Family::Switch },
    OptionSpec { name: "slide-level", family: Family::Numeric },
    // LaTeX and PDF
    OptionSpec { name: "chapters", family: Family::Switch },
    OptionSpec { name: "no-tex-ligatures", family: Family::Switch },
    OptionSpec { name: "listings", family: Family::Switch },
    OptionSpec { name: "latex-engine", family: Family::Scalar },
    // Math rendering
    OptionSpec { name: "mathml", family: Family::Switch },
    OptionSpec { name: "mathjax", family: Family::Scalar },
    OptionSpec { name: "webtex", family: Family::Scalar },
    OptionSpec { name: "gladtex", family: Family::Switch },
    // Citations
    OptionSpec { name: "bibliography", family: Family::Scalar },
    OptionSpec { name: "csl", family: Family::Scalar },
    OptionSpec { name: "citation-abbreviations", family: Family::Scalar },
    OptionSpec { name: "natbib", family: Family::Switch },
    OptionSpec { name: "biblatex", family: Family::Switch },
];

/// Look up the family of a recognized option.
pub fn family_of(name: &str) -> Option<Family> {
    SCHEMA.iter().find(|spec| spec.name == name).map(|s| s.family)
}

/// Family for option names not in the schema, decided once from the
/// shape the layer supplied. Unknown names are carried through; the
/// external tool owns the final vocabulary.
pub fn infer_family(value: &OptionValue) -> Family {
    match value {
        OptionValue::Flag(_) => Family::Switch,
        OptionValue::Str(_) | OptionValue::Int(_) => Family::Scalar,
        OptionValue::List(_) => Family::PathList,
        OptionValue::Map(_) => Family::VariableMap,
    }
}

fn inert_value(family: Family) -> OptionValue {
    match family {
        Family::Switch | Family::Numeric => OptionValue::Flag(false),
        Family::Scalar | Family::PathScalar => OptionValue::Str(String::new()),
        Family::CommaList | Family::PathList => OptionValue::List(Vec::new()),
        Family::VariableMap => OptionValue::Map(IndexMap::new()),
    }
}

/// Build the defaults layer: every recognized option at its inert value,
/// in schema order.
pub fn defaults() -> OptionSet {
    SCHEMA
        .iter()
        .map(|spec| (spec.name.to_string(), inert_value(spec.family)))
        .collect()
}
