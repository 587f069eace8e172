//! pandrive: a pandoc build engine
//!
//! Merges layered configuration into an effective option set, turns it
//! into an exact pandoc command line, and supervises the conversion as
//! an asynchronous child process with streamed output.
//!
//! The pieces compose in pipeline order:
//!
//! - [`options`]: option model, schema, three-layer merge, project config
//! - [`resolver`]: file-reference resolution against the build context
//! - [`request`]: what to convert, to what, delivered where
//! - [`command`]: argv synthesis
//! - [`process`]: child supervision, output streaming, environment
//! - [`preprocess`]: CriticMarkup rewriting
//! - [`pipeline`]: the driver tying it all together

pub mod command;
pub mod options;
pub mod pipeline;
pub mod preprocess;
pub mod process;
pub mod request;
pub mod resolver;

pub use command::{synthesize, ArgumentVector, SynthesisError};
pub use options::{merge, ConfigError, EffectiveOptions, Layer, LayerOrigin, OptionValue};
pub use pipeline::{BuildDriver, BuildError, BuildSettings, PreparedBuild};
pub use process::listener::{BuildOutcome, OutputDispatcher, OutputSink};
pub use process::{ChildProcess, ProcessListener, SpawnError, StreamId};
pub use request::{BuildRequest, SnapshotFile, SourceDocument, TargetFormat};
pub use resolver::Resolver;
