use crate::command::build_command;
use crate::config::SynthesizerConfig;
use crate::error::SynthesisError;
use crate::invoke::{SynthesisInvoker, SynthesisOutput};
use crate::stage::AudioStager;
use voxgate_types::{SynthesisRequest, VoiceSelection};

/// Stages input, runs the right synthesis tool and returns its output.
#[derive(Debug, Clone)]
pub struct SynthesisService {
    config: SynthesizerConfig,
    stager: AudioStager,
    invoker: SynthesisInvoker,
}

impl SynthesisService {
    pub fn new(config: SynthesizerConfig) -> Self {
        Self {
            stager: AudioStager::new(&config.staging_dir),
            invoker: SynthesisInvoker::new(config.timeout()),
            config,
        }
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// Creates the staging and output directories. Idempotent; run once at
    /// startup. Requests recreate them on demand if they vanish later.
    ///
    /// # Errors
    ///
    /// Returns `SynthesisError::Storage` naming the directory that could not
    /// be created.
    pub async fn prepare_workspace(&self) -> Result<(), SynthesisError> {
        for dir in [&self.config.staging_dir, &self.config.output_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| SynthesisError::Storage {
                    path: dir.clone(),
                    source: e,
                })?;
        }
        tracing::info!(
            staging_dir = %self.config.staging_dir.display(),
            output_dir = %self.config.output_dir.display(),
            "synthesis workspace ready"
        );
        Ok(())
    }

    /// Synthesizes `request` into a WAV file.
    ///
    /// Reference audio, if any, is staged first and deleted once the tool has
    /// exited, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Any [`SynthesisError`]; nothing is retried.
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesisOutput, SynthesisError> {
        let executable = match request.voice {
            VoiceSelection::Prebuilt(_) => &self.config.simple,
            VoiceSelection::Clone(_) => &self.config.clone,
        };

        let staged = match &request.reference_audio {
            Some(audio) => Some(self.stager.stage(audio).await?),
            None => None,
        };

        let output_dir = &self.config.output_dir;
        if let Err(e) = tokio::fs::create_dir_all(output_dir).await {
            if let Some(staged) = staged {
                staged.discard().await;
            }
            return Err(SynthesisError::Storage {
                path: output_dir.clone(),
                source: e,
            });
        }

        let command = build_command(
            executable,
            request,
            staged.as_ref().map(|s| s.path()),
            output_dir,
        );
        let result = self.invoker.run(command).await;

        if let Some(staged) = staged {
            staged.discard().await;
        }
        result
    }
}
