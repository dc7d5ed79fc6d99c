use super::state::UiState;
use crate::model::render_pipeline;
use anyhow::Result;
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

// Clipboard worker channel, started on first copy.
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// The pipeline as a shell command line. Expects `sync_focused_arg` to have copied
/// the editor value into the focused stage.
pub fn pipeline_text(state: &UiState) -> String {
    render_pipeline(&state.stages)
}

/// Start the clipboard worker thread if it is not running yet.
///
/// Each copy gets a fresh `arboard::Clipboard` that is kept alive for a moment, because
/// on Linux the contents disappear with the owning instance before clipboard managers
/// pick them up.
fn clipboard_worker() -> &'static std_mpsc::Sender<String> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();
        std::thread::spawn(move || {
            for text in rx {
                match arboard::Clipboard::new() {
                    Ok(mut clipboard) => match clipboard.set_text(text) {
                        Ok(()) => std::thread::sleep(Duration::from_secs(2)),
                        Err(e) => tracing::warn!(error = %e, "clipboard write failed"),
                    },
                    Err(e) => tracing::warn!(error = %e, "clipboard unavailable"),
                }
            }
        });
        tx
    })
}

/// Queue `text` for the clipboard without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    clipboard_worker()
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("clipboard worker stopped"))
}

/// Copy and report the outcome in the status line.
pub fn copy_and_report(state: &mut UiState, what: &str, text: &str) {
    state.info = match copy_to_clipboard(text) {
        Ok(()) => format!("✓ Copied {what} to clipboard"),
        Err(e) => format!("Clipboard copy failed: {e:#}"),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommandNode, PipelineEvent};

    #[test]
    fn pipeline_text_includes_typed_arg() {
        let mut state = UiState::default();
        state.apply_update(PipelineEvent::StagesChanged {
            stages: vec![
                CommandNode::new("cat", vec![]),
                CommandNode::new("grep", vec!["-i".into()]),
            ],
            focus: 1,
        });
        for c in "wor".chars() {
            state.editor.insert(c);
        }
        state.sync_focused_arg();
        assert_eq!(pipeline_text(&state), "cat | grep -i wor");
    }
}
