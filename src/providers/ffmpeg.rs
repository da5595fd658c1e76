use super::process::run_bounded;
use super::Extractor;
use crate::config::ExtractorSettings;
use crate::error::{PressError, PressResult};
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{ResourceRegistry, TempArtifact};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use uuid::Uuid;

/// Extracts a mono WAV track with ffmpeg
pub struct FfmpegExtractor {
    ffmpeg_path: String,
    sample_rate: u32,
    timeout: Duration,
    work_dir: PathBuf,
}

impl FfmpegExtractor {
    pub fn new(ffmpeg_path: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        let defaults = ExtractorSettings::default();
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            sample_rate: defaults.sample_rate,
            timeout: Duration::from_secs(defaults.timeout_secs),
            work_dir: work_dir.into(),
        }
    }

    pub fn from_settings(settings: &ExtractorSettings) -> Self {
        Self {
            ffmpeg_path: settings.ffmpeg_path.clone(),
            sample_rate: settings.sample_rate,
            timeout: Duration::from_secs(settings.timeout_secs),
            work_dir: settings.work_dir(),
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Unique output path for one extraction
    fn output_path(&self, source: &Path, run_id: &str) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let short_run: String = run_id.chars().take(8).collect();
        self.work_dir.join(format!(
            "{}-{}-{}.wav",
            stem,
            short_run,
            Uuid::new_v4().simple()
        ))
    }

    fn build_command(&self, source: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.ffmpeg_path);
        command
            .arg("-y")
            .arg("-hide_banner")
            .arg("-i")
            .arg(source)
            .arg("-vn")
            .args(["-ac", "1"])
            .arg("-ar")
            .arg(self.sample_rate.to_string())
            .arg(output);
        command
    }
}

#[async_trait]
impl Extractor for FfmpegExtractor {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        !self.ffmpeg_path.trim().is_empty() && self.sample_rate > 0
    }

    async fn extract(&self, source: &Path, resources: &ResourceRegistry) -> PressResult<PathBuf> {
        tokio::fs::create_dir_all(&self.work_dir).await?;

        let output = self.output_path(source, resources.run_id());
        resources.register(TempArtifact::new(&output))?;

        LOGGER.log(
            LogLevel::Debug,
            &format!(
                "Running {} -> {} (run: {})",
                self.ffmpeg_path,
                output.display(),
                resources.run_id()
            ),
            "providers::ffmpeg",
        );

        run_bounded("ffmpeg", self.build_command(source, &output), self.timeout).await?;

        let written = tokio::fs::metadata(&output).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(PressError::provider(
                "ffmpeg",
                format!("no audio written to {}", output.display()),
            ));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_command_arguments() {
        let extractor = FfmpegExtractor::new("ffmpeg", "/tmp/work").with_sample_rate(22050);
        let command = extractor.build_command(
            Path::new("/media/talk.mp4"),
            Path::new("/tmp/work/out.wav"),
        );

        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-y",
                "-hide_banner",
                "-i",
                "/media/talk.mp4",
                "-vn",
                "-ac",
                "1",
                "-ar",
                "22050",
                "/tmp/work/out.wav"
            ]
        );
    }

    #[test]
    fn test_output_paths_are_unique() {
        let extractor = FfmpegExtractor::new("ffmpeg", "/tmp/work");
        let a = extractor.output_path(Path::new("/media/talk.mp4"), "0123456789");
        let b = extractor.output_path(Path::new("/media/talk.mp4"), "0123456789");

        assert_ne!(a, b);
        assert!(a.starts_with("/tmp/work"));
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("talk-01234567-"));
        assert!(name.ends_with(".wav"));
    }

    #[test]
    fn test_availability() {
        assert!(FfmpegExtractor::new("ffmpeg", "/tmp").is_available());
        assert!(!FfmpegExtractor::new("  ", "/tmp").is_available());
        assert!(!FfmpegExtractor::new("ffmpeg", "/tmp").with_sample_rate(0).is_available());
    }

    #[tokio::test]
    async fn test_missing_binary_keeps_registration() {
        let temp_dir = TempDir::new().unwrap();
        let extractor = FfmpegExtractor::new("mediapress-no-such-ffmpeg", temp_dir.path());
        let registry = ResourceRegistry::new("run-1");

        let err = extractor
            .extract(Path::new("/media/talk.mp4"), &registry)
            .await
            .unwrap_err();

        assert!(matches!(err, PressError::ToolSpawnFailed { .. }));
        assert_eq!(registry.live_count(), 1);
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_failure_maps_to_tool_error() {
        let temp_dir = TempDir::new().unwrap();
        let binary = fake_ffmpeg(temp_dir.path(), "echo 'moov atom not found' >&2\nexit 1");
        let work_dir = temp_dir.path().join("work");
        let extractor = FfmpegExtractor::new(binary.to_string_lossy(), work_dir);
        let registry = ResourceRegistry::new("run-1");

        let err = extractor
            .extract(Path::new("/media/broken.mp4"), &registry)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::ToolInvocationError);
        assert!(err.to_string().contains("moov atom not found"));
        assert_eq!(registry.live_count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_writes_registered_file() {
        let temp_dir = TempDir::new().unwrap();
        // The output path is the last argument
        let binary = fake_ffmpeg(temp_dir.path(), "for last; do :; done\necho RIFF > \"$last\"");
        let work_dir = temp_dir.path().join("work");
        let extractor = FfmpegExtractor::new(binary.to_string_lossy(), work_dir);
        let registry = ResourceRegistry::new("run-1");

        let audio = extractor
            .extract(Path::new("/media/talk.mp4"), &registry)
            .await
            .unwrap();

        assert!(audio.exists());
        registry.release_all();
        assert!(!audio.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let temp_dir = TempDir::new().unwrap();
        let binary = fake_ffmpeg(temp_dir.path(), "sleep 5");
        let extractor = FfmpegExtractor::new(binary.to_string_lossy(), temp_dir.path().join("work"))
            .with_timeout(Duration::from_millis(100));
        let registry = ResourceRegistry::new("run-1");

        let err = extractor
            .extract(Path::new("/media/talk.mp4"), &registry)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::TimeoutError);
    }
}
