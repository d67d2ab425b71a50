//! crates/edwin_core/src/controller/control.rs
//!
//! Busy-state bookkeeping for the controls that trigger backend calls.

use crate::ports::{Control, ControlState, PanelView};

/// Shows `control` as busy for as long as the guard lives.
///
/// The control is re-enabled when the guard drops, which covers the
/// success path, every early return and every error path alike.
pub struct BusyGuard<'a> {
    view: &'a dyn PanelView,
    control: Control,
}

impl<'a> BusyGuard<'a> {
    pub fn engage(view: &'a dyn PanelView, control: Control, label: &str) -> Self {
        view.set_control(control, ControlState::Busy(label.to_string()));
        Self { view, control }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.view.set_control(self.control, ControlState::Ready);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingView, ViewEvent};

    #[test]
    fn guard_releases_on_drop() {
        let view = RecordingView::default();
        {
            let _guard = BusyGuard::engage(&view, Control::SyncPage, "Syncing...");
            assert_eq!(view.control_state(Control::SyncPage), Some(ControlState::Busy("Syncing...".into())));
        }
        assert_eq!(view.control_state(Control::SyncPage), Some(ControlState::Ready));
        assert_eq!(
            view.events(),
            vec![
                ViewEvent::Control(Control::SyncPage, ControlState::Busy("Syncing...".into())),
                ViewEvent::Control(Control::SyncPage, ControlState::Ready),
            ]
        );
    }
}
