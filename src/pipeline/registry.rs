use crate::app_log;
use crate::error::{PressError, PressResult};
use crate::logger::LogLevel;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// What happened when a handle was released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    Released,
    /// The resource was already gone (removed by someone else)
    AlreadyGone,
}

/// A transient resource owned by a pipeline run
pub trait Disposable: Send + fmt::Debug {
    /// Short description for logs and warnings
    fn describe(&self) -> String;

    /// Release the resource. Called at most once.
    fn release(&mut self) -> PressResult<ReleaseStatus>;
}

/// Temporary file or directory created by a stage
#[derive(Debug, Clone)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Disposable for TempArtifact {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn release(&mut self) -> PressResult<ReleaseStatus> {
        let removed = if self.path.is_dir() {
            std::fs::remove_dir_all(&self.path)
        } else {
            std::fs::remove_file(&self.path)
        };

        match removed {
            Ok(()) => Ok(ReleaseStatus::Released),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ReleaseStatus::AlreadyGone),
            Err(e) => Err(PressError::Io(e)),
        }
    }
}

/// Summary of a release pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    pub released: usize,
    pub already_gone: usize,
    /// Non-fatal problems, one per handle
    pub warnings: Vec<String>,
}

impl ReleaseReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Per-run registry of disposable handles.
///
/// Handles are released exactly once, newest first. Whatever is still
/// registered when the registry is dropped is released then, so an abandoned
/// run does not leak its temporary files.
#[derive(Debug)]
pub struct ResourceRegistry {
    run_id: String,
    handles: Mutex<Vec<Box<dyn Disposable>>>,
}

impl ResourceRegistry {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Run this registry belongs to
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Register a handle for release at the end of the run
    pub fn register(&self, handle: impl Disposable + 'static) -> PressResult<()> {
        let description = handle.describe();
        self.handles.lock()?.push(Box::new(handle));

        app_log!(
            LogLevel::Debug,
            "pipeline::registry",
            "Registered {} (run: {})",
            description,
            self.run_id
        );
        Ok(())
    }

    /// Register a temporary path
    pub fn register_path(&self, path: impl Into<PathBuf>) -> PressResult<()> {
        self.register(TempArtifact::new(path))
    }

    /// Number of handles not yet released
    pub fn live_count(&self) -> usize {
        match self.handles.lock() {
            Ok(handles) => handles.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Release every registered handle, newest first.
    ///
    /// Never fails: problems are returned as warnings.
    pub fn release_all(&self) -> ReleaseReport {
        let handles = match self.handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        Self::release_handles(&self.run_id, handles)
    }

    fn release_handles(run_id: &str, handles: Vec<Box<dyn Disposable>>) -> ReleaseReport {
        let mut report = ReleaseReport::default();

        for mut handle in handles.into_iter().rev() {
            let description = handle.describe();
            match handle.release() {
                Ok(ReleaseStatus::Released) => {
                    report.released += 1;
                    app_log!(
                        LogLevel::Debug,
                        "pipeline::registry",
                        "Released {} (run: {})",
                        description,
                        run_id
                    );
                }
                Ok(ReleaseStatus::AlreadyGone) => {
                    report.already_gone += 1;
                    let warning = format!("{} was already removed", description);
                    app_log!(
                        LogLevel::Warn,
                        "pipeline::registry",
                        "{} (run: {})",
                        warning,
                        run_id
                    );
                    report.warnings.push(warning);
                }
                Err(e) => {
                    let warning = format!("Failed to release {}: {}", description, e);
                    app_log!(
                        LogLevel::Warn,
                        "pipeline::registry",
                        "{} (run: {})",
                        warning,
                        run_id
                    );
                    report.warnings.push(warning);
                }
            }
        }

        report
    }
}

impl Drop for ResourceRegistry {
    fn drop(&mut self) {
        let handles = match self.handles.get_mut() {
            Ok(handles) => std::mem::take(handles),
            Err(poisoned) => std::mem::take(poisoned.into_inner()),
        };

        if !handles.is_empty() {
            app_log!(
                LogLevel::Warn,
                "pipeline::registry",
                "Releasing {} handle(s) left behind by an abandoned run (run: {})",
                handles.len(),
                self.run_id
            );
            Self::release_handles(&self.run_id, handles);
        }
    }
}
