//! Stage adapters for the media-to-article workflow
//!
//! Each stage is a thin shim over one capability provider:
//! 1. ExtractStage - Pull a mono audio track out of the source media
//! 2. TranscribeStage - Speech to text
//! 3. GenerateStage - Draft an article from the transcript
//! 4. EvaluateStage - Review and finalize the draft
//! 5. PublishStage - Send the final text to the content host

pub mod evaluate;
pub mod extract;
pub mod generate;
pub mod publish;
pub mod transcribe;

// Re-export stages
pub use evaluate::EvaluateStage;
pub use extract::ExtractStage;
pub use generate::GenerateStage;
pub use publish::PublishStage;
pub use transcribe::TranscribeStage;

/// Stage identifiers of the standard pipeline
pub const EXTRACT: &str = "extract";
pub const TRANSCRIBE: &str = "transcribe";
pub const GENERATE: &str = "generate";
pub const EVALUATE: &str = "evaluate";
pub const PUBLISH: &str = "publish";
