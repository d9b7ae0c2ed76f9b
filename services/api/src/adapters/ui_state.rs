//! services/api/src/adapters/ui_state.rs
//!
//! Holds the UI-only fields the browser last pushed, so snapshots can include
//! them and a resume can hand them back.

use std::sync::Mutex;
use tutor_core::domain::UiFields;
use tutor_core::ports::UiStateAccessor;

#[derive(Debug, Default)]
pub struct PushedUiState {
    fields: Mutex<UiFields>,
}

impl UiStateAccessor for PushedUiState {
    fn ui_fields(&self) -> UiFields {
        self.fields
            .lock()
            .map(|fields| fields.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn restore_ui_fields(&self, fields: UiFields) {
        match self.fields.lock() {
            Ok(mut guard) => *guard = fields,
            Err(poisoned) => *poisoned.into_inner() = fields,
        }
    }
}
