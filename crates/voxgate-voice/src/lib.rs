//! Speech synthesis through external command-line tools.
//!
//! A validated [`voxgate_types::SynthesisRequest`] goes through three steps:
//! reference audio is staged to a unique file ([`stage`]), an argument vector
//! is built for the configured tool ([`command`]), and the tool is run as a
//! child process whose output is relayed to the log ([`invoke`], [`relay`]).
//! The result is either a non-empty WAV file owned by the caller or a
//! [`SynthesisError`].
//!
//! Every temporary file is tied to a drop guard ([`file::EphemeralFile`]), and
//! children are killed when the future running them is dropped, so an aborted
//! request leaves nothing behind.

pub mod command;
pub mod config;
pub mod error;
pub mod file;
pub mod invoke;
pub mod relay;
pub mod service;
pub mod stage;

pub use command::{build_command, SynthesisCommand};
pub use config::{ExecutableConfig, SynthesizerConfig};
pub use error::SynthesisError;
pub use file::EphemeralFile;
pub use invoke::{InvocationState, SynthesisInvoker, SynthesisOutput};
pub use service::SynthesisService;
pub use stage::{AudioStager, StagedAudioFile};
