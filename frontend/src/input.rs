//! Scripted keyboard input.
//!
//! A key script is a list of `frame:key:down|up` entries separated by
//! commas or newlines, e.g. `"50:J:down, 52:J:up, 60:Enter:down"`. Each
//! entry fires once, before the named frame runs. Blank entries and lines
//! starting with `#` are ignored.

use std::collections::HashMap;
use std::fmt;

use zeta_core::core::machine::InputButton;
use zeta_core::device::Key;

/// Maps key names to machine button IDs.
pub struct KeyMap {
    map: HashMap<String, u8>,
}

impl KeyMap {
    /// Bind every button of the machine under its lowercase name.
    pub fn new(buttons: &[InputButton]) -> Self {
        let map = buttons
            .iter()
            .map(|button| (button.name.to_ascii_lowercase(), button.id))
            .collect();
        Self { map }
    }

    /// Look up a button by its own name or, for the Spectrum matrix, by any
    /// accepted spelling of the key ("sym", "return", "shift").
    pub fn get(&self, name: &str) -> Option<u8> {
        self.map.get(&name.to_ascii_lowercase()).copied().or_else(|| {
            let key: Key = name.parse().ok()?;
            self.map.get(&key.name().to_ascii_lowercase()).copied()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub frame: u64,
    pub key: String,
    pub pressed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub entry: String,
    pub reason: &'static str,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bad key script entry {:?}: {}", self.entry, self.reason)
    }
}

impl std::error::Error for ScriptError {}

/// Parsed key script, ordered by frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyScript {
    events: Vec<KeyEvent>,
}

impl KeyScript {
    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let mut events = Vec::new();
        for entry in text.split([',', '\n']).map(str::trim) {
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            let error = |reason| ScriptError {
                entry: entry.to_string(),
                reason,
            };
            let mut parts = entry.split(':').map(str::trim);
            let (Some(frame), Some(key), Some(action), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(error("expected frame:key:down|up"));
            };
            let frame = frame.parse().map_err(|_| error("frame is not a number"))?;
            if key.is_empty() {
                return Err(error("missing key name"));
            }
            let pressed = match action.to_ascii_lowercase().as_str() {
                "down" => true,
                "up" => false,
                _ => return Err(error("action must be down or up")),
            };
            events.push(KeyEvent {
                frame,
                key: key.to_string(),
                pressed,
            });
        }
        // Stable: entries for the same frame keep their written order.
        events.sort_by_key(|e| e.frame);
        Ok(Self { events })
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[KeyEvent] {
        &self.events
    }

    /// Events due before `frame` runs.
    pub fn due(&self, frame: u64) -> impl Iterator<Item = &KeyEvent> {
        self.events.iter().filter(move |e| e.frame == frame)
    }

    /// First key the machine does not know, if any.
    pub fn check(&self, keys: &KeyMap) -> Result<(), ScriptError> {
        match self.events.iter().find(|e| keys.get(&e.key).is_none()) {
            Some(event) => Err(ScriptError {
                entry: event.key.clone(),
                reason: "no such key on this machine",
            }),
            None => Ok(()),
        }
    }
}
