//! Key handling during playback

use crate::screen::{ControlAction, Screen};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use retype_core::PlaybackControl;

/// Stop the session and answer any open question with a dismissal
fn stop(screen: &mut Screen, control: &PlaybackControl) {
    control.request_stop();
    screen.dismiss();
}

fn apply(action: ControlAction, control: &PlaybackControl) {
    match action {
        ControlAction::TogglePause => {
            control.toggle_pause();
        }
        ControlAction::Skip => control.request_skip(),
        ControlAction::Stop => control.request_stop(),
    }
}

pub fn handle_key(screen: &mut Screen, control: &PlaybackControl, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        stop(screen, control);
        return;
    }

    if let Some(popup) = screen.popup.as_mut() {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') | KeyCode::BackTab => popup.select_prev(),
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => popup.select_next(),
            KeyCode::Char(c @ '1'..='9') => {
                let idx = c as usize - '1' as usize;
                if idx < popup.options.len() {
                    popup.selected = idx;
                }
            }
            KeyCode::Enter => {
                if let Some(action) = screen.accept() {
                    apply(action, control);
                }
            }
            KeyCode::Esc => screen.dismiss(),
            KeyCode::Char('q') => stop(screen, control),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char(' ') => {
            control.toggle_pause();
        }
        KeyCode::Char('s') => control.request_skip(),
        KeyCode::Char('q') | KeyCode::Esc => stop(screen, control),
        KeyCode::Char('c') => screen.open_controls(control.is_paused()),
        KeyCode::Tab => {
            screen.surface.cycle_active();
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, KeyEventKind::Press)
    }

    #[test]
    fn test_keys_without_session_are_harmless() {
        let mut screen = Screen::default();
        let control = PlaybackControl::new();
        handle_key(&mut screen, &control, press(KeyCode::Char('s')));
        handle_key(&mut screen, &control, press(KeyCode::Char('q')));
        assert!(!control.skip_requested());
        assert!(!control.stop_requested());
    }

    #[test]
    fn test_quit_dismisses_open_question() {
        let mut screen = Screen::default();
        let control = PlaybackControl::new();
        let mut reply = screen.open_prompt("Continue?", vec!["Yes".into(), "No".into()]);

        handle_key(&mut screen, &control, press(KeyCode::Char('q')));

        assert!(screen.popup.is_none());
        assert_eq!(reply.try_recv().unwrap(), None);
    }

    #[test]
    fn test_digit_then_enter_answers() {
        let mut screen = Screen::default();
        let control = PlaybackControl::new();
        let mut reply = screen.open_prompt("Pick", vec!["a".into(), "b".into(), "c".into()]);

        handle_key(&mut screen, &control, press(KeyCode::Char('3')));
        handle_key(&mut screen, &control, press(KeyCode::Enter));

        assert_eq!(reply.try_recv().unwrap(), Some(2));
    }

    #[test]
    fn test_space_toggles_pause() {
        let mut screen = Screen::default();
        let control = PlaybackControl::new();
        handle_key(&mut screen, &control, press(KeyCode::Char(' ')));
        assert!(control.is_paused());
        handle_key(&mut screen, &control, press(KeyCode::Char(' ')));
        assert!(!control.is_paused());
    }

    #[test]
    fn test_controls_menu_toggles_pause() {
        let mut screen = Screen::default();
        let control = PlaybackControl::new();
        handle_key(&mut screen, &control, press(KeyCode::Char('c')));
        assert!(screen.popup.as_ref().is_some_and(|p| p.is_controls()));

        handle_key(&mut screen, &control, press(KeyCode::Enter));
        assert!(control.is_paused());
        assert!(screen.popup.is_none());
    }
}
