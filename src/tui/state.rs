use crate::model::{CommandNode, PipelineEvent};

/// Single-line text buffer with a char-indexed cursor.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineEditor {
    value: String,
    cursor: usize,
}

impl LineEditor {
    /// Editor holding `value` with the cursor at the end.
    pub fn with_value(value: &str) -> Self {
        Self {
            value: value.to_string(),
            cursor: value.chars().count(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    fn byte_index(&self, char_idx: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    pub fn insert(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.value.insert(at, c);
        self.cursor += 1;
    }

    /// Delete the char before the cursor. Returns whether anything changed.
    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.value.remove(at);
        true
    }

    /// Delete the char under the cursor. Returns whether anything changed.
    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.value.chars().count() {
            return false;
        }
        let at = self.byte_index(self.cursor);
        self.value.remove(at);
        true
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    /// Text before and after the cursor, for rendering.
    pub fn split_at_cursor(&self) -> (&str, &str) {
        self.value.split_at(self.byte_index(self.cursor))
    }
}

/// UI-side view of the pipeline. Mirrors what the controller publishes; the arg of the
/// focused stage is owned by `editor` while the user types.
#[derive(Debug, Default)]
pub struct UiState {
    pub stages: Vec<CommandNode>,
    pub focus: usize,
    pub editor: LineEditor,
    pub output: String,
    pub scroll: u16,
    /// Visible output rows, refreshed from the terminal size before each frame.
    pub page_height: u16,
    /// Add-stage prompt; `Some` while open.
    pub modal: Option<LineEditor>,
    pub running: bool,
    pub show_help: bool,
    pub info: String,
}

impl UiState {
    pub fn apply_update(&mut self, ev: PipelineEvent) {
        match ev {
            PipelineEvent::StagesChanged { stages, focus } => {
                let reseed = focus != self.focus || stages.len() != self.stages.len();
                self.stages = stages;
                self.focus = focus;
                if reseed {
                    let arg = self
                        .stages
                        .get(focus)
                        .map(|s| s.arg.as_str())
                        .unwrap_or_default();
                    self.editor = LineEditor::with_value(arg);
                } else if let Some(stage) = self.stages.get_mut(focus) {
                    // Keystrokes may be ahead of the controller's snapshot.
                    stage.arg = self.editor.value().to_string();
                }
            }
            PipelineEvent::RunStarted { .. } => self.running = true,
            PipelineEvent::OutputUpdated { output } => {
                self.running = false;
                self.output = output;
                self.clamp_scroll();
            }
            PipelineEvent::AwaitingCommand => {
                self.running = false;
                self.editor = LineEditor::default();
                self.modal = Some(LineEditor::default());
            }
        }
    }

    /// Move focus ahead of the controller's confirmation so following keystrokes
    /// edit the newly focused stage. Clamps the same way the controller does.
    pub fn move_focus(&mut self, delta: isize) {
        let Some(last) = self.stages.len().checked_sub(1) else {
            return;
        };
        let next = self.focus.saturating_add_signed(delta).min(last);
        if next != self.focus {
            self.focus = next;
            self.editor = LineEditor::with_value(&self.stages[next].arg);
        }
    }

    /// Copy the editor's value into the focused stage; returns the new arg.
    pub fn sync_focused_arg(&mut self) -> Option<String> {
        let stage = self.stages.get_mut(self.focus)?;
        stage.arg = self.editor.value().to_string();
        Some(stage.arg.clone())
    }

    pub fn output_lines(&self) -> u16 {
        self.output.lines().count().min(u16::MAX as usize) as u16
    }

    fn max_scroll(&self) -> u16 {
        self.output_lines().saturating_sub(self.page_height)
    }

    pub fn scroll_by(&mut self, delta: i32) {
        let next = (self.scroll as i32 + delta).clamp(0, self.max_scroll() as i32);
        self.scroll = next as u16;
    }

    pub fn clamp_scroll(&mut self) {
        self.scroll = self.scroll.min(self.max_scroll());
    }

    /// Scroll position as a fraction in `[0, 1]`; a fully visible output counts as 1.
    pub fn scroll_percent(&self) -> f64 {
        let max = self.max_scroll();
        if max == 0 {
            1.0
        } else {
            self.scroll as f64 / max as f64
        }
    }
}
