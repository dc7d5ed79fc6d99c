use std::time::Duration;

/// Runtime configuration assembled from CLI arguments.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Seed stage taken from the positional arguments, if any.
    pub seed: Option<CommandNode>,
    /// Shell command whose stdout replaces stdin as pipeline input.
    pub run_command: Option<String>,
    /// Quiet period after the last edit before the pipeline reruns.
    pub debounce: Duration,
    pub print_only: bool,
    pub log_file: Option<std::path::PathBuf>,
    pub log_level: String,
}

/// One pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandNode {
    pub command: String,
    pub base_args: Vec<String>,
    /// Trailing argument edited live by the user.
    pub arg: String,
}

impl CommandNode {
    pub fn new(command: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            base_args,
            arg: String::new(),
        }
    }

    /// Parse a raw command line: first whitespace-separated token is the command,
    /// the rest become base args. Returns `None` for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut toks = line.split_whitespace();
        let command = toks.next()?;
        Some(Self::new(command, toks.map(str::to_string).collect()))
    }

    /// Arguments passed to the process: base args plus the trimmed arg when non-empty.
    pub fn effective_args(&self) -> Vec<String> {
        let mut args = self.base_args.clone();
        let arg = self.arg.trim();
        if !arg.is_empty() {
            args.push(arg.to_string());
        }
        args
    }

    /// `command base args` without the editable arg.
    pub fn base_display(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.base_args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }

    /// Full stage as it would appear in a shell pipeline.
    pub fn display(&self) -> String {
        let base = self.base_display();
        let arg = self.arg.trim();
        if arg.is_empty() {
            base
        } else {
            format!("{base} {arg}")
        }
    }
}

/// Render stages as a shell-joinable pipeline string: `cmd1 a | cmd2 b`.
pub fn render_pipeline(stages: &[CommandNode]) -> String {
    stages
        .iter()
        .map(CommandNode::display)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Events consumed by the pipeline controller. UI input, debounce timers and
/// finished runs all arrive on the same serialized stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Edit { stage: usize, arg: String },
    AddStage { line: String },
    /// Remove the focused stage.
    RemoveStage,
    ChangeFocus(isize),
    RunCompleted { run_id: u64, output: String },
    RerunRequested { tag: u64 },
    Quit,
}

/// Updates published by the controller for presentation layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StagesChanged {
        stages: Vec<CommandNode>,
        focus: usize,
    },
    RunStarted {
        run_id: u64,
    },
    OutputUpdated {
        output: String,
    },
    /// Every stage was removed; the UI should prompt for a new command.
    AwaitingCommand,
}
