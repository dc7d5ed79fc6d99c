use crate::model::CommandNode;

/// Pipeline definition and last adopted output. Owned exclusively by the controller.
#[derive(Debug, Default)]
pub(crate) struct PipelineState {
    stages: Vec<CommandNode>,
    focus: usize,
    sequence: u64,
    last_output: String,
}

impl PipelineState {
    pub fn new(seed: Option<CommandNode>) -> Self {
        Self {
            stages: seed.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn stages(&self) -> &[CommandNode] {
        &self.stages
    }

    /// Focused stage index. Only meaningful while stages exist.
    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn last_output(&self) -> &str {
        &self.last_output
    }

    pub fn is_awaiting_command(&self) -> bool {
        self.stages.is_empty()
    }

    /// Replace a stage's arg. Returns the bumped sequence id when the value changed,
    /// `None` for an unchanged value or an unknown stage.
    pub fn set_arg(&mut self, stage: usize, arg: String) -> Option<u64> {
        let node = self.stages.get_mut(stage)?;
        if node.arg == arg {
            return None;
        }
        node.arg = arg;
        self.sequence += 1;
        Some(self.sequence)
    }

    /// Append a stage and focus it.
    pub fn push_stage(&mut self, node: CommandNode) {
        self.stages.push(node);
        self.focus = self.stages.len() - 1;
    }

    /// Remove the focused stage, clamping focus back into range.
    pub fn remove_focused(&mut self) -> Option<CommandNode> {
        if self.stages.is_empty() {
            return None;
        }
        let removed = self.stages.remove(self.focus.min(self.stages.len() - 1));
        self.focus = self.focus.min(self.stages.len().saturating_sub(1));
        Some(removed)
    }

    /// Move focus by `delta`, clamped to the stage list. Returns whether it moved.
    pub fn move_focus(&mut self, delta: isize) -> bool {
        if self.stages.is_empty() {
            return false;
        }
        let last = self.stages.len() - 1;
        let next = self.focus.saturating_add_signed(delta).min(last);
        let moved = next != self.focus;
        self.focus = next;
        moved
    }

    pub fn adopt_output(&mut self, output: String) {
        self.last_output = output;
    }

    pub fn clear_output(&mut self) {
        self.last_output.clear();
    }
}
