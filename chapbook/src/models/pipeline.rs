//! Pipeline configuration models
//!
//! A pipeline is rendered as
//!
//! ```text
//! pipeline:
//!   - common.YAMLReader: {}
//!   - users.alice.userprocessor.UserProcessor: {}
//!   - common.PrintProcessor: {}
//!   - common.YAMLWriter: {}
//! ```

use std::fmt;

/// Default module name of generated user code
pub const DEFAULT_MODULE: &str = "userprocessor";

/// Default class name of generated user processors
pub const DEFAULT_PROCESSOR: &str = "UserProcessor";

/// Supported data formats for reader and writer stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Yaml,
    Nexus,
}

impl DataFormat {
    /// Parse a user selection, ignoring case. Unknown formats yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "yaml" => Some(DataFormat::Yaml),
            "nexus" => Some(DataFormat::Nexus),
            _ => None,
        }
    }

    fn reader(&self) -> &'static str {
        match self {
            DataFormat::Yaml => "common.YAMLReader",
            DataFormat::Nexus => "common.NexusReader",
        }
    }

    fn writer(&self) -> &'static str {
        match self {
            DataFormat::Yaml => "common.YAMLWriter",
            DataFormat::Nexus => "common.NexusWriter",
        }
    }
}

/// Reference to a generated user processor class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorRef {
    pub user: String,
    pub module: String,
    pub processor: String,
}

impl ProcessorRef {
    /// Reference to the default `UserProcessor` class of `module`
    pub fn new(user: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            module: module.into(),
            processor: DEFAULT_PROCESSOR.to_string(),
        }
    }

    pub fn with_processor(mut self, processor: impl Into<String>) -> Self {
        self.processor = processor.into();
        self
    }

    /// Dotted path the pipeline tool imports
    pub fn dotted_name(&self) -> String {
        format!("users.{}.{}.{}", self.user, self.module, self.processor)
    }
}

/// A single pipeline stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Reader(DataFormat),
    UserProcessor(ProcessorRef),
    Print,
    Writer(DataFormat),
}

impl Stage {
    pub fn name(&self) -> String {
        match self {
            Stage::Reader(format) => format.reader().to_string(),
            Stage::UserProcessor(processor) => processor.dotted_name(),
            Stage::Print => "common.PrintProcessor".to_string(),
            Stage::Writer(format) => format.writer().to_string(),
        }
    }

    /// Stage as a line of the pipeline list
    pub fn render(&self) -> String {
        format!("  - {}: {{}}\n", self.name())
    }

    fn rank(&self) -> u8 {
        match self {
            Stage::Reader(_) => 0,
            Stage::UserProcessor(_) => 1,
            Stage::Print => 2,
            Stage::Writer(_) => 3,
        }
    }
}

/// Ordered pipeline stages: reader, user processor, auxiliary processors, writer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    stages: Vec<Stage>,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage at its position in the fixed stage order.
    /// Stages of the same kind keep insertion order.
    pub fn push(&mut self, stage: Stage) {
        let pos = self
            .stages
            .iter()
            .position(|s| s.rank() > stage.rank())
            .unwrap_or(self.stages.len());
        self.stages.insert(pos, stage);
    }

    pub fn with(mut self, stage: Stage) -> Self {
        self.push(stage);
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Render the document consumed by the pipeline tool
    pub fn render(&self) -> String {
        let mut out = String::from("pipeline:\n");
        for stage in &self.stages {
            out.push_str(&stage.render());
        }
        out
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
