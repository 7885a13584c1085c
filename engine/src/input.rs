use std::collections::{HashMap, HashSet};
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Named actions bound to physical keys, queried by name.
#[derive(Debug, Default)]
pub struct Input {
    bindings: HashMap<String, KeyCode>,
    pressed: HashSet<KeyCode>,
}

impl Input {
    pub fn new() -> Input {
        Input::default()
    }

    pub fn bind(&mut self, action: &str, key: KeyCode) {
        self.bindings.insert(action.to_string(), key);
    }

    pub fn handle_key(&mut self, event: &KeyEvent) {
        if let PhysicalKey::Code(code) = event.physical_key {
            self.set_key(code, event.state == ElementState::Pressed);
        }
    }

    pub fn set_key(&mut self, code: KeyCode, pressed: bool) {
        if pressed {
            self.pressed.insert(code);
        } else {
            self.pressed.remove(&code);
        }
    }

    /// Unknown actions are never pressed.
    pub fn is_action_pressed(&self, action: &str) -> bool {
        self.bindings
            .get(action)
            .is_some_and(|key| self.pressed.contains(key))
    }
}
