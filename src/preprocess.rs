//! CriticMarkup preprocessing
//!
//! Rewrites CriticMarkup annotations (additions, deletions,
//! substitutions, comments, highlights) into the HTML that survives
//! markdown conversion, writing the result to a snapshot file the build
//! reads instead of the original. Output naming still follows the
//! original document.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use regex_lite::{Captures, Regex};

use crate::request::SnapshotFile;

struct Patterns {
    deletion: Regex,
    addition: Regex,
    comment: Regex,
    mark: Regex,
    substitution: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        deletion: Regex::new(r"(?s)\{--(?P<value>.*?)--[ \t]*(\[(?P<meta>.*?)\])?[ \t]*\}")
            .unwrap(),
        addition: Regex::new(r"(?s)\{\+\+(?P<value>.*?)\+\+[ \t]*(\[(?P<meta>.*?)\])?[ \t]*\}")
            .unwrap(),
        comment: Regex::new(r"(?s)\{>>(?P<value>.*?)<<\}").unwrap(),
        mark: Regex::new(r"(?s)\{\{(?P<value>.*?)\}\}").unwrap(),
        substitution: Regex::new(r"(?s)\{~~(?P<original>.*?)~>(?P<new>.*?)~~\}").unwrap(),
    })
}

fn deletion(caps: &Captures) -> String {
    let value = &caps["value"];
    if value == "\n\n" {
        "<del>&nbsp;</del>".to_string()
    } else {
        format!("<del>{}</del>", value.replace("\n\n", "&nbsp;"))
    }
}

fn addition(caps: &Captures) -> String {
    let value = &caps["value"];
    let inline = value.replace('\n', " ");
    if value == "\n\n" {
        // A lone paragraph break.
        "\n\n<ins class='critic break'>&nbsp;</ins>\n\n".to_string()
    } else if value.starts_with("\n\n") {
        format!("\n\n<ins class='critic' break>&nbsp;</ins>\n\n<ins>{inline}</ins>")
    } else if value.ends_with("\n\n") {
        format!("<ins>{inline}</ins>\n\n<ins class='critic break'>&nbsp;</ins>\n\n")
    } else {
        format!("<ins>{inline}</ins>")
    }
}

fn comment(caps: &Captures) -> String {
    format!(
        "<span class=\"critic comment\">{}</span>",
        caps["value"].replace('\n', " ")
    )
}

fn mark(caps: &Captures) -> String {
    format!("<mark>{}</mark>", &caps["value"])
}

fn substitution(caps: &Captures) -> String {
    format!(
        "<del>{}</del><ins>{}</ins>",
        &caps["original"], &caps["new"]
    )
}

/// Rewrite the annotations in one text.
pub fn rewrite_critic(text: &str) -> String {
    let p = patterns();
    let text = p.deletion.replace_all(text, |c: &Captures| deletion(c));
    let text = p.addition.replace_all(&text, |c: &Captures| addition(c));
    let text = p.comment.replace_all(&text, |c: &Captures| comment(c));
    let text = p.mark.replace_all(&text, |c: &Captures| mark(c));
    let text = p.substitution.replace_all(&text, |c: &Captures| substitution(c));
    text.into_owned()
}

/// Preprocess a source file into a snapshot the build can read.
pub fn preprocess_critic(input: &Path) -> io::Result<SnapshotFile> {
    let text = fs::read_to_string(input)?;
    let extension = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "md".to_string());
    SnapshotFile::from_text(&rewrite_critic(&text), &extension)
}
