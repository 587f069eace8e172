//! pandrive CLI
//!
//! Entry point for the `pandrive` command-line tool.

use clap::{Args, Parser, Subcommand};
use pandrive::options::{schema, Layer, LayerOrigin};
use pandrive::pipeline::{BuildDriver, BuildSettings};
use pandrive::process::listener::{BuildOutcome, OutputDispatcher, OutputSink};
use pandrive::request::{BuildRequest, TargetFormat};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{self, Command, Stdio};

#[derive(Parser)]
#[command(name = "pandrive")]
#[command(about = "Layered-config pandoc build driver", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a document, streaming pandoc's output
    Build {
        #[command(flatten)]
        args: BuildArgs,
    },

    /// Print the command line a build would run, without running it
    ShowCommand {
        #[command(flatten)]
        args: BuildArgs,
    },

    /// Print the built-in default configuration as JSON
    Defaults,

    /// Write a commented starter pandoc-config.json
    TouchConfig {
        /// Directory to write into (default: current directory)
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Args)]
struct BuildArgs {
    /// Input document
    input: PathBuf,

    /// Target as writer:extension, e.g. "html:.html" or "latex:.pdf"
    #[arg(long, short = 't', default_value = "html:.html")]
    to: String,

    /// Reader format; "markdown" picks up extension flags from config
    #[arg(long, short = 'f', default_value = "markdown")]
    from: String,

    /// Stream output to stdout instead of writing the output file
    #[arg(long)]
    to_window: bool,

    /// Open the output file when the build succeeds
    #[arg(long)]
    open: bool,

    /// Rewrite CriticMarkup annotations before converting
    #[arg(long)]
    critic: bool,

    /// Invocation-layer option as name=value (value parsed as JSON,
    /// else taken as a string); repeatable
    #[arg(long = "arg", short = 'a', value_name = "NAME=VALUE")]
    args: Vec<String>,

    /// Markdown extension toggle as name=true|false; repeatable
    #[arg(long = "ext", short = 'e', value_name = "NAME=BOOL")]
    extensions: Vec<String>,

    /// Extra directory for resolving templates, stylesheets, includes;
    /// repeatable
    #[arg(long = "include-path", short = 'I')]
    include_paths: Vec<PathBuf>,

    /// Folder marking the top of the project hierarchy; repeatable
    #[arg(long = "project-root")]
    project_roots: Vec<PathBuf>,

    /// Directory holding the pandoc binary, prepended to PATH
    #[arg(long)]
    install_path: Option<PathBuf>,

    /// TeX distribution binary directory, prepended to PATH
    #[arg(long)]
    texbin_path: Option<PathBuf>,

    /// Environment override for the child as KEY=VALUE; repeatable
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { args } => {
            run_build(args);
        }
        Commands::ShowCommand { args } => {
            run_show_command(args);
        }
        Commands::Defaults => {
            run_defaults();
        }
        Commands::TouchConfig { dir } => {
            run_touch_config(&dir);
        }
    }
}

/// Streams build output to stdout and a summary line to stderr.
struct StdoutSink;

impl OutputSink for StdoutSink {
    fn append(&mut self, text: &str) {
        print!("{}", text);
        let _ = std::io::stdout().flush();
    }

    fn finished(&mut self, outcome: &BuildOutcome) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        if outcome.killed {
            eprintln!(
                "\n[{stamp}] Build cancelled after {:.1}s",
                outcome.elapsed.as_secs_f64()
            );
        } else if outcome.success() {
            eprintln!(
                "\n[{stamp}] Build finished in {:.1}s",
                outcome.elapsed.as_secs_f64()
            );
        } else {
            match outcome.exit_code {
                Some(code) => eprintln!(
                    "\n[{stamp}] Build failed with exit code {} after {:.1}s",
                    code,
                    outcome.elapsed.as_secs_f64()
                ),
                None => eprintln!("\n[{stamp}] Build failed without an exit code"),
            }
        }
    }
}

fn run_build(args: BuildArgs) {
    let (request, invocation, settings) = match assemble(&args) {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let open_after_build = args.open;

    let mut driver = BuildDriver::new();
    let prepared = match driver.prepare(request, invocation.as_ref(), &settings) {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let mut sink = StdoutSink;
    let (listener, dispatcher) = OutputDispatcher::channel();
    let child = match driver.launch(&prepared, listener) {
        Ok(child) => child,
        Err(e) => {
            // A missing binary or bad PATH is the usual cause; show the
            // spawn context alongside the error.
            sink.append(&format!("Error: {}\n{}", e, prepared.diagnostics()));
            sink.finished(&BuildOutcome {
                exit_code: None,
                killed: false,
                elapsed: std::time::Duration::ZERO,
            });
            process::exit(1);
        }
    };

    // Ctrl-C kills the child; the dispatcher then drains and reports.
    let handle = child.clone();
    if let Err(e) = ctrlc::set_handler(move || handle.kill()) {
        eprintln!("Warning: could not install interrupt handler: {}", e);
    }

    let outcome = dispatcher.run(&mut sink, &child);

    if outcome.success() {
        if open_after_build {
            if let Some(output) = prepared.request.output_path() {
                open_file(&output);
            }
        }
        process::exit(0);
    }
    process::exit(1);
}

fn run_show_command(args: BuildArgs) {
    let (request, invocation, settings) = match assemble(&args) {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let driver = BuildDriver::new();
    match driver.prepare(request, invocation.as_ref(), &settings) {
        Ok(prepared) => {
            println!("{}", prepared.argv.display_line());
            for source in &prepared.effective.sources {
                match (&source.path, &source.digest) {
                    (Some(path), Some(digest)) => {
                        eprintln!("  layer {:?}: {} ({})", source.origin, path, digest)
                    }
                    _ => eprintln!("  layer {:?}", source.origin),
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_defaults() {
    let mut arguments = serde_json::Map::new();
    for (name, value) in schema::defaults() {
        arguments.insert(name, value.to_json());
    }
    let defaults = serde_json::json!({
        "pandoc_arguments": {
            "command_arguments": arguments,
            "markdown_extensions": {},
        }
    });
    match serde_json::to_string_pretty(&defaults) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing defaults: {}", e);
            process::exit(1);
        }
    }
}

const STARTER_CONFIG: &str = r#"{
    // Project configuration. Options here override invocation arguments
    // and the built-in defaults. List options (css, include-in-header,
    // include-before-body, include-after-body, indented-code-classes,
    // number-offset) and the variables map accumulate across layers.
    "pandoc_arguments": {
        "command_arguments": {
            // "standalone": true,
            // "template": "letter.latex",
            // "css": ["style.css"],
            // "variables": {"geometry": "margin=1in"}
        },
        "markdown_extensions": {
            // "pipe_tables": true
        }
    }
}
"#;

fn run_touch_config(dir: &PathBuf) {
    let path = dir.join(pandrive::options::project::PROJECT_CONFIG_FILENAME);
    if path.exists() {
        eprintln!("{} already exists; leaving it alone", path.display());
        process::exit(1);
    }
    match std::fs::write(&path, STARTER_CONFIG) {
        Ok(()) => println!("Wrote {}", path.display()),
        Err(e) => {
            eprintln!("Error writing {}: {}", path.display(), e);
            process::exit(1);
        }
    }
}

type Assembled = (BuildRequest, Option<Layer>, BuildSettings);

fn assemble(args: &BuildArgs) -> Result<Assembled, String> {
    let to = parse_target(&args.to)?;
    let mut request = BuildRequest::from_file(&args.input, to, args.from.clone());
    request.to_window = args.to_window;
    request.open_after_build = args.open;

    let invocation = invocation_layer(&args.args, &args.extensions)?;

    let settings = BuildSettings {
        includes_paths: args.include_paths.clone(),
        project_roots: args.project_roots.clone(),
        install_path: args.install_path.clone(),
        texbin_path: args.texbin_path.clone(),
        build_env: parse_pairs(&args.env)?,
        preprocess_critic: args.critic,
    };

    Ok((request, invocation, settings))
}

/// Parse "writer:.ext" (or bare "writer", which borrows the writer name
/// as its extension).
fn parse_target(spec: &str) -> Result<TargetFormat, String> {
    match spec.split_once(':') {
        Some((format, extension)) if !format.is_empty() && extension.starts_with('.') => {
            Ok(TargetFormat::new(format, extension))
        }
        Some(_) => Err(format!(
            "invalid target '{}'; expected writer:.ext, e.g. html:.html",
            spec
        )),
        None if !spec.is_empty() => Ok(TargetFormat::new(spec, format!(".{}", spec))),
        None => Err("empty target".to_string()),
    }
}

fn invocation_layer(
    args: &[String],
    extensions: &[String],
) -> Result<Option<Layer>, String> {
    if args.is_empty() && extensions.is_empty() {
        return Ok(None);
    }

    let mut command_arguments = serde_json::Map::new();
    for pair in args {
        let (name, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("invalid --arg '{}'; expected name=value", pair))?;
        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        command_arguments.insert(name.to_string(), value);
    }

    let mut markdown_extensions = serde_json::Map::new();
    for pair in extensions {
        let (name, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("invalid --ext '{}'; expected name=true|false", pair))?;
        let enabled: bool = raw
            .parse()
            .map_err(|_| format!("invalid --ext '{}'; expected name=true|false", pair))?;
        markdown_extensions.insert(name.to_string(), serde_json::Value::Bool(enabled));
    }

    let value = serde_json::json!({
        "command_arguments": command_arguments,
        "markdown_extensions": markdown_extensions,
    });
    Layer::from_value(LayerOrigin::Invocation, &value).map(Some).map_err(|e| e.to_string())
}

fn parse_pairs(pairs: &[String]) -> Result<HashMap<String, String>, String> {
    let mut map = HashMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("invalid --env '{}'; expected KEY=VALUE", pair))?;
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}

/// Best-effort open of the finished output with the platform handler.
fn open_file(path: &std::path::Path) {
    let (program, args): (&str, Vec<String>) = if cfg!(target_os = "macos") {
        ("open", vec![path.display().to_string()])
    } else if cfg!(windows) {
        ("cmd", vec!["/C".to_string(), "start".to_string(), path.display().to_string()])
    } else {
        ("xdg-open", vec![path.display().to_string()])
    };

    let result = Command::new(program)
        .args(&args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    if let Err(e) = result {
        eprintln!("Could not open {}: {}", path.display(), e);
    }
}
