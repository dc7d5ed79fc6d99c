//! Key dispatch.
//!
//! Translates key presses into local UI changes plus at most one action for the
//! caller (a controller event, a clipboard copy, or quit).

use super::state::{LineEditor, UiState};
use crate::model::ControllerEvent;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    None,
    Send(ControllerEvent),
    CopyOutput,
    CopyPipeline,
    Quit,
}

pub fn handle_key(state: &mut UiState, key: KeyEvent) -> UiAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return UiAction::Quit;
    }
    if state.modal.is_some() {
        return handle_modal_key(state, key);
    }
    if state.show_help {
        state.show_help = false;
        return UiAction::None;
    }

    match (key.modifiers, key.code) {
        (m, KeyCode::Char('y')) if m.contains(KeyModifiers::CONTROL) => UiAction::CopyPipeline,
        (m, KeyCode::Char('d')) if m.contains(KeyModifiers::CONTROL) => {
            if state.stages.is_empty() {
                UiAction::None
            } else {
                UiAction::Send(ControllerEvent::RemoveStage)
            }
        }
        (_, KeyCode::Enter) => UiAction::CopyOutput,
        (_, KeyCode::Char('|')) => {
            state.modal = Some(LineEditor::default());
            UiAction::None
        }
        (_, KeyCode::Tab) => change_focus(state, 1),
        (_, KeyCode::BackTab) => change_focus(state, -1),
        (_, KeyCode::F(1)) => {
            state.show_help = true;
            UiAction::None
        }
        (_, KeyCode::Up) => {
            state.scroll_by(-1);
            UiAction::None
        }
        (_, KeyCode::Down) => {
            state.scroll_by(1);
            UiAction::None
        }
        (_, KeyCode::PageUp) => {
            state.scroll_by(-(state.page_height.max(1) as i32));
            UiAction::None
        }
        (_, KeyCode::PageDown) => {
            state.scroll_by(state.page_height.max(1) as i32);
            UiAction::None
        }
        (m, code) => edit_focused_arg(state, m, code),
    }
}

fn change_focus(state: &mut UiState, delta: isize) -> UiAction {
    state.move_focus(delta);
    UiAction::Send(ControllerEvent::ChangeFocus(delta))
}

fn edit_focused_arg(state: &mut UiState, modifiers: KeyModifiers, code: KeyCode) -> UiAction {
    if state.stages.is_empty() {
        return UiAction::None;
    }
    let changed = match code {
        KeyCode::Char(c)
            if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            state.editor.insert(c);
            true
        }
        KeyCode::Backspace => state.editor.backspace(),
        KeyCode::Delete => state.editor.delete(),
        KeyCode::Left => {
            state.editor.left();
            false
        }
        KeyCode::Right => {
            state.editor.right();
            false
        }
        KeyCode::Home => {
            state.editor.home();
            false
        }
        KeyCode::End => {
            state.editor.end();
            false
        }
        _ => false,
    };
    if !changed {
        return UiAction::None;
    }
    match state.sync_focused_arg() {
        Some(arg) => UiAction::Send(ControllerEvent::Edit {
            stage: state.focus,
            arg,
        }),
        None => UiAction::None,
    }
}

fn handle_modal_key(state: &mut UiState, key: KeyEvent) -> UiAction {
    let Some(modal) = state.modal.as_mut() else {
        return UiAction::None;
    };
    match key.code {
        KeyCode::Enter => {
            let line = modal.value().trim().to_string();
            if line.is_empty() {
                // With nothing in the pipeline the prompt stays up.
                if !state.stages.is_empty() {
                    state.modal = None;
                }
                return UiAction::None;
            }
            state.modal = None;
            UiAction::Send(ControllerEvent::AddStage { line })
        }
        KeyCode::Esc => {
            state.modal = None;
            UiAction::None
        }
        KeyCode::Char(c)
            if !key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            modal.insert(c);
            UiAction::None
        }
        KeyCode::Backspace => {
            modal.backspace();
            UiAction::None
        }
        KeyCode::Delete => {
            modal.delete();
            UiAction::None
        }
        KeyCode::Left => {
            modal.left();
            UiAction::None
        }
        KeyCode::Right => {
            modal.right();
            UiAction::None
        }
        KeyCode::Home => {
            modal.home();
            UiAction::None
        }
        KeyCode::End => {
            modal.end();
            UiAction::None
        }
        _ => UiAction::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommandNode, PipelineEvent};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn with_stages(n: usize) -> UiState {
        let mut state = UiState::default();
        state.apply_update(PipelineEvent::StagesChanged {
            stages: (0..n).map(|_| CommandNode::new("cat", vec![])).collect(),
            focus: n.saturating_sub(1),
        });
        state
    }

    #[test]
    fn typing_emits_edits_for_the_focused_stage() {
        let mut state = with_stages(2);
        assert_eq!(
            handle_key(&mut state, key(KeyCode::Char('w'))),
            UiAction::Send(ControllerEvent::Edit {
                stage: 1,
                arg: "w".into()
            })
        );
        assert_eq!(
            handle_key(&mut state, key(KeyCode::Char('o'))),
            UiAction::Send(ControllerEvent::Edit {
                stage: 1,
                arg: "wo".into()
            })
        );
        assert_eq!(handle_key(&mut state, key(KeyCode::Left)), UiAction::None);
        assert_eq!(
            handle_key(&mut state, key(KeyCode::Backspace)),
            UiAction::Send(ControllerEvent::Edit {
                stage: 1,
                arg: "o".into()
            })
        );
        assert_eq!(state.stages[1].arg, "o");
    }

    #[test]
    fn structural_keys_map_to_controller_events() {
        let mut state = with_stages(1);
        assert_eq!(
            handle_key(&mut state, ctrl('d')),
            UiAction::Send(ControllerEvent::RemoveStage)
        );
        assert_eq!(
            handle_key(&mut state, key(KeyCode::Tab)),
            UiAction::Send(ControllerEvent::ChangeFocus(1))
        );
        assert_eq!(
            handle_key(&mut state, key(KeyCode::BackTab)),
            UiAction::Send(ControllerEvent::ChangeFocus(-1))
        );
        assert_eq!(handle_key(&mut state, ctrl('y')), UiAction::CopyPipeline);
        assert_eq!(handle_key(&mut state, key(KeyCode::Enter)), UiAction::CopyOutput);
        assert_eq!(handle_key(&mut state, ctrl('c')), UiAction::Quit);
    }

    #[test]
    fn edits_after_tab_target_the_new_focus() {
        let mut state = with_stages(2);
        handle_key(&mut state, key(KeyCode::Char('z')));
        assert_eq!(
            handle_key(&mut state, key(KeyCode::BackTab)),
            UiAction::Send(ControllerEvent::ChangeFocus(-1))
        );
        // No StagesChanged from the controller yet.
        assert_eq!(
            handle_key(&mut state, key(KeyCode::Char('q'))),
            UiAction::Send(ControllerEvent::Edit {
                stage: 0,
                arg: "q".into()
            })
        );
        assert_eq!(state.stages[1].arg, "z");
    }

    #[test]
    fn pipe_opens_modal_and_enter_adds_stage() {
        let mut state = with_stages(1);
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('|'))), UiAction::None);
        assert!(state.modal.is_some());
        for c in "grep -v x".chars() {
            assert_eq!(handle_key(&mut state, key(KeyCode::Char(c))), UiAction::None);
        }
        assert_eq!(
            handle_key(&mut state, key(KeyCode::Enter)),
            UiAction::Send(ControllerEvent::AddStage {
                line: "grep -v x".into()
            })
        );
        assert!(state.modal.is_none());
    }

    #[test]
    fn blank_modal_entry_stays_open_without_stages() {
        let mut state = UiState::default();
        state.apply_update(PipelineEvent::AwaitingCommand);
        handle_key(&mut state, key(KeyCode::Char(' ')));
        assert_eq!(handle_key(&mut state, key(KeyCode::Enter)), UiAction::None);
        assert!(state.modal.is_some());

        let mut state = with_stages(1);
        handle_key(&mut state, key(KeyCode::Char('|')));
        assert_eq!(handle_key(&mut state, key(KeyCode::Enter)), UiAction::None);
        assert!(state.modal.is_none());
    }

    #[test]
    fn escape_closes_modal() {
        let mut state = with_stages(1);
        handle_key(&mut state, key(KeyCode::Char('|')));
        handle_key(&mut state, key(KeyCode::Esc));
        assert!(state.modal.is_none());
    }

    #[test]
    fn nothing_to_edit_or_delete_without_stages() {
        let mut state = UiState::default();
        assert_eq!(handle_key(&mut state, key(KeyCode::Char('a'))), UiAction::None);
        assert_eq!(handle_key(&mut state, ctrl('d')), UiAction::None);
    }
}
