//! Build pipeline
//!
//! Orchestrates one conversion end to end: resolve the project config,
//! merge the option layers, synthesize the command line, and launch the
//! supervised child. The driver tracks one active build per target so a
//! re-trigger kills the predecessor instead of racing it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::command::{self, ArgumentVector, SynthesisError};
use crate::options::{self, schema, ConfigError, EffectiveOptions, Layer};
use crate::process::env::build_environment;
use crate::process::{ChildProcess, ProcessListener, SpawnError};
use crate::request::BuildRequest;
use crate::resolver::Resolver;

/// Host-level settings that shape every build, as opposed to the
/// per-document configuration layers.
#[derive(Debug, Clone, Default)]
pub struct BuildSettings {
    /// Extra directories the resolver searches.
    pub includes_paths: Vec<PathBuf>,
    /// Folders marking project tops for the upward walk.
    pub project_roots: Vec<PathBuf>,
    /// Directory holding the converter binary, prepended to `PATH`.
    pub install_path: Option<PathBuf>,
    /// TeX distribution binary directory, prepended to `PATH`.
    pub texbin_path: Option<PathBuf>,
    /// Environment overrides for the child.
    pub build_env: HashMap<String, String>,
    /// Rewrite CriticMarkup annotations before converting.
    pub preprocess_critic: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("could not preprocess {path}: {message}")]
    Preprocess { path: String, message: String },
}

/// Everything needed to launch one build, before any process exists.
/// This is the dry-run product: the show-command display and the tests
/// stop here.
pub struct PreparedBuild {
    pub request: BuildRequest,
    pub argv: ArgumentVector,
    pub effective: EffectiveOptions,
    pub working_dir: Option<PathBuf>,
    pub environment: HashMap<String, String>,
}

impl PreparedBuild {
    /// Spawn-context lines for diagnostics when a launch fails.
    pub fn diagnostics(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("command: {}\n", self.argv.display_line()));
        out.push_str(&format!(
            "working directory: {}\n",
            self.working_dir
                .as_deref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "(inherited)".to_string())
        ));
        out.push_str(&format!(
            "PATH: {}\n",
            self.environment.get("PATH").map(String::as_str).unwrap_or("")
        ));
        out
    }
}

/// Drives builds and tracks the active child per target.
#[derive(Default)]
pub struct BuildDriver {
    active: HashMap<PathBuf, ChildProcess>,
}

impl BuildDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve, merge, and synthesize without launching anything.
    pub fn prepare(
        &self,
        mut request: BuildRequest,
        invocation: Option<&Layer>,
        settings: &BuildSettings,
    ) -> Result<PreparedBuild, BuildError> {
        if settings.preprocess_critic {
            let input = request.input_path().to_path_buf();
            let snapshot = crate::preprocess::preprocess_critic(&input).map_err(|e| {
                BuildError::Preprocess {
                    path: input.display().to_string(),
                    message: e.to_string(),
                }
            })?;
            request = request.with_preprocessed(snapshot);
        }

        let working_dir = request.working_dir().map(Path::to_path_buf);
        let resolver = Resolver::new(
            working_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        )
        .with_project_roots(settings.project_roots.clone())
        .with_search_paths(settings.includes_paths.clone());

        let project = match resolver.find_project_config() {
            Some(path) => Some(options::project::load(&path)?),
            None => None,
        };

        let effective = options::merge(schema::defaults(), invocation, project.as_ref())?;
        let argv = command::synthesize(&effective, &request, &resolver)?;

        let environment = build_environment(
            &settings.build_env,
            settings.install_path.as_deref(),
            settings.texbin_path.as_deref(),
        );

        Ok(PreparedBuild {
            request,
            argv,
            effective,
            working_dir,
            environment,
        })
    }

    /// Launch a prepared build. A still-running build for the same
    /// target is killed first.
    pub fn launch(
        &mut self,
        prepared: &PreparedBuild,
        listener: Arc<dyn ProcessListener>,
    ) -> Result<ChildProcess, BuildError> {
        let target = prepared
            .request
            .output_path()
            .unwrap_or_else(|| prepared.request.input_path().to_path_buf());

        if let Some(previous) = self.active.get(&target) {
            if previous.poll() {
                previous.kill();
            }
        }

        let child = ChildProcess::launch(
            &prepared.argv,
            &prepared.environment,
            prepared.working_dir.as_deref(),
            listener,
        )?;
        self.active.insert(target, child.clone());
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::TargetFormat;
    use std::fs;
    use tempfile::TempDir;

    fn html() -> TargetFormat {
        TargetFormat::new("html", ".html")
    }

    #[test]
    fn test_prepare_without_project_config() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("doc.md");
        fs::write(&input, "# hi\n").unwrap();

        let driver = BuildDriver::new();
        let request = BuildRequest::from_file(&input, html(), "markdown");
        let prepared = driver
            .prepare(request, None, &BuildSettings::default())
            .unwrap();

        assert_eq!(prepared.effective.sources.len(), 1);
        assert_eq!(prepared.argv.program(), "pandoc");
        assert_eq!(
            prepared.working_dir.as_deref(),
            Some(dir.path())
        );
    }

    #[test]
    fn test_prepare_picks_up_project_config() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("doc.md");
        fs::write(&input, "# hi\n").unwrap();
        fs::write(
            dir.path().join("pandoc-config.json"),
            r#"{"pandoc_arguments": {"command_arguments": {"standalone": true}}}"#,
        )
        .unwrap();

        let driver = BuildDriver::new();
        let request = BuildRequest::from_file(&input, html(), "markdown");
        let prepared = driver
            .prepare(request, None, &BuildSettings::default())
            .unwrap();

        assert_eq!(prepared.effective.sources.len(), 2);
        assert!(prepared
            .argv
            .args()
            .contains(&"--standalone".to_string()));
    }

    #[test]
    fn test_prepare_fails_on_broken_config() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("doc.md");
        fs::write(&input, "# hi\n").unwrap();
        fs::write(dir.path().join("pandoc-config.json"), "{ nope").unwrap();

        let driver = BuildDriver::new();
        let request = BuildRequest::from_file(&input, html(), "markdown");
        let result = driver.prepare(request, None, &BuildSettings::default());

        assert!(matches!(
            result,
            Err(BuildError::Config(ConfigError::Parse { .. }))
        ));
    }

    #[test]
    fn test_prepare_with_critic_preprocessing() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("doc.md");
        fs::write(&input, "keep {--drop--}\n").unwrap();

        let driver = BuildDriver::new();
        let request = BuildRequest::from_file(&input, html(), "markdown");
        let settings = BuildSettings {
            preprocess_critic: true,
            ..BuildSettings::default()
        };
        let prepared = driver.prepare(request, None, &settings).unwrap();

        // The build reads the rewritten snapshot but still names its
        // output after the original document.
        assert_ne!(prepared.request.input_path(), input.as_path());
        let text = fs::read_to_string(prepared.request.input_path()).unwrap();
        assert_eq!(text, "keep <del>drop</del>\n");
        assert_eq!(
            prepared.request.output_path(),
            Some(dir.path().join("doc.html"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_relaunch_kills_the_previous_build() {
        use crate::process::listener::OutputDispatcher;

        let dir = TempDir::new().unwrap();
        let input = dir.path().join("doc.md");
        fs::write(&input, "# hi\n").unwrap();

        let prepared = |script: &str| {
            let mut request = BuildRequest::from_file(&input, html(), "markdown");
            request.to_window = true;
            PreparedBuild {
                request,
                argv: ArgumentVector::new("sh", ["-c".to_string(), script.to_string()]),
                effective: crate::options::merge(schema::defaults(), None, None).unwrap(),
                working_dir: None,
                environment: std::env::vars().collect(),
            }
        };

        let mut driver = BuildDriver::new();
        let (listener_a, _dispatcher_a) = OutputDispatcher::channel();
        let first = driver.launch(&prepared("sleep 30"), listener_a).unwrap();
        assert!(first.poll());

        let (listener_b, dispatcher_b) = OutputDispatcher::channel();
        let second = driver.launch(&prepared("printf ok"), listener_b).unwrap();
        assert!(first.was_killed());

        struct Discard;
        impl crate::process::listener::OutputSink for Discard {
            fn append(&mut self, _text: &str) {}
            fn finished(&mut self, _outcome: &crate::process::listener::BuildOutcome) {}
        }
        let outcome = dispatcher_b.run(&mut Discard, &second);
        assert!(outcome.success());
    }

    #[test]
    fn test_diagnostics_name_command_and_path() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("doc.md");
        fs::write(&input, "# hi\n").unwrap();

        let driver = BuildDriver::new();
        let request = BuildRequest::from_file(&input, html(), "markdown");
        let prepared = driver
            .prepare(request, None, &BuildSettings::default())
            .unwrap();

        let text = prepared.diagnostics();
        assert!(text.starts_with("command: pandoc "));
        assert!(text.contains("working directory: "));
        assert!(text.contains("PATH: "));
    }
}
