use serde::{Deserialize, Serialize};

/// Store-native service reference, e.g. `1:0:19:1B1D:802:2:11A0000:0:0:0:`
pub type ServiceRef = String;

/// One normalized programme as handed to the store
///
/// Field order follows the canonical tuple layout
/// `(start, duration, title, subtitle, long_description, genre)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
    /// Unix timestamp in seconds
    pub start: i64,
    /// Seconds
    pub duration: i64,
    pub title: String,
    pub subtitle: String,
    pub long_description: String,
    pub genre: Option<String>,
}

impl EventData {
    /// Drop the long description when the event starts after `horizon`
    pub fn trimmed_after(mut self, horizon: i64) -> Self {
        if self.start > horizon {
            self.long_description.clear();
        }
        self
    }
}

/// A programme together with the services it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEvent {
    pub services: Vec<ServiceRef>,
    pub data: EventData,
}

impl ProgramEvent {
    pub fn new(services: Vec<ServiceRef>, data: EventData) -> Self {
        Self { services, data }
    }
}
