use std::sync::Arc;

use parking_lot::RwLock;

use crate::orchestrator::LoadObserver;
use crate::roster::EntityDescriptor;

/// Snapshot of the on-screen loading banner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorState {
    pub visible: bool,
    pub text: String,
    /// Display name of the entity being loaded.
    pub label: String,
}

/// Loading banner shared between the orchestrator and a UI thread.
///
/// Clones observe the same state.
#[derive(Debug, Default)]
pub struct LoadIndicator {
    state: Arc<RwLock<IndicatorState>>,
}

impl Clone for LoadIndicator {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl LoadIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> IndicatorState {
        self.state.read().clone()
    }

    pub fn is_visible(&self) -> bool {
        self.state.read().visible
    }

    pub fn text(&self) -> String {
        self.state.read().text.clone()
    }
}

impl LoadObserver for LoadIndicator {
    fn on_load_start(&mut self, entity: &EntityDescriptor) {
        let mut state = self.state.write();
        state.visible = true;
        state.label = entity.display_name.clone();
        state.text = format!("INITIALIZING {}...", entity.display_name);
    }

    fn on_load_progress(&mut self, percent: Option<u8>) {
        let Some(percent) = percent else {
            return;
        };
        let mut state = self.state.write();
        state.text = format!("LOADING {} - {percent}%", state.label);
    }

    fn on_load_end(&mut self) {
        self.state.write().visible = false;
    }
}
