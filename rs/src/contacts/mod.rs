use crate::core::errors::Result;
use crate::core::types::{Coordinate, EmergencyContact, Origin};
use crate::spatial::external_map_url;
use log::{info, warn};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use uuid::Uuid;

/// Delivers an SOS message to one contact.
pub trait SosDispatcher: Send + Sync {
    fn notify(&self, alert_id: &Uuid, contact: &EmergencyContact, message: &str) -> Result<()>;
}

/// Only writes the alert to the log; there is no real transport behind it.
pub struct LogDispatcher;

impl SosDispatcher for LogDispatcher {
    fn notify(&self, alert_id: &Uuid, contact: &EmergencyContact, message: &str) -> Result<()> {
        info!(
            "SOS {} -> {} ({}): {}",
            alert_id, contact.name, contact.phone, message
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SosOutcome {
    LocationUnknown {
        message: String,
    },
    NoContacts {
        message: String,
    },
    Sent {
        alert_id: String,
        message: String,
        notified: usize,
        failed: usize,
    },
}

impl SosOutcome {
    pub fn user_message(&self) -> String {
        match self {
            SosOutcome::LocationUnknown { message } => message.clone(),
            SosOutcome::NoContacts { .. } => {
                "SOS not sent: add an emergency contact first.".to_string()
            }
            SosOutcome::Sent {
                notified, failed, ..
            } if *failed > 0 => format!(
                "SOS has been sent to {} contact(s); {} could not be reached.",
                notified, failed
            ),
            SosOutcome::Sent { notified, .. } => {
                format!("SOS has been sent to {} contact(s)!", notified)
            }
        }
    }
}

pub fn compose_sos_message(origin: Coordinate) -> String {
    format!(
        "SOS! I need help. My location: {}, {} ({})",
        origin.lat,
        origin.lon,
        external_map_url(origin)
    )
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ContactStore {
    contacts: Vec<EmergencyContact>,
}

impl ContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contacts(&self) -> &[EmergencyContact] {
        &self.contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Returns false and leaves the list untouched when either field is blank.
    pub fn add(&mut self, name: &str, phone: &str) -> bool {
        let name = name.trim();
        let phone = phone.trim();
        if name.is_empty() || phone.is_empty() {
            return false;
        }
        self.contacts.push(EmergencyContact {
            name: name.to_string(),
            phone: phone.to_string(),
        });
        true
    }

    pub fn delete(&mut self, index: usize) -> Option<EmergencyContact> {
        if index < self.contacts.len() {
            Some(self.contacts.remove(index))
        } else {
            None
        }
    }

    pub fn send_sos(&self, origin: Origin, dispatcher: &dyn SosDispatcher) -> SosOutcome {
        let Some(coordinate) = origin.coordinate() else {
            return SosOutcome::LocationUnknown {
                message: "Unable to send SOS: your location is unknown.".to_string(),
            };
        };

        let message = compose_sos_message(coordinate);
        if self.contacts.is_empty() {
            return SosOutcome::NoContacts { message };
        }

        let alert_id = Uuid::new_v4();
        let mut notified = 0;
        let mut failed = 0;
        for contact in &self.contacts {
            match dispatcher.notify(&alert_id, contact, &message) {
                Ok(()) => notified += 1,
                Err(e) => {
                    warn!("SOS {} to {} failed: {}", alert_id, contact.name, e);
                    failed += 1;
                }
            }
        }

        SosOutcome::Sent {
            alert_id: alert_id.to_string(),
            message,
            notified,
            failed,
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let contacts: Vec<EmergencyContact> = bincode::deserialize_from(reader)?;
        Ok(ContactStore { contacts })
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, &self.contacts)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::WidgetError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<(String, String)>>,
        fail_for: Option<String>,
    }

    impl SosDispatcher for RecordingDispatcher {
        fn notify(&self, _alert_id: &Uuid, contact: &EmergencyContact, message: &str) -> Result<()> {
            if self.fail_for.as_deref() == Some(contact.name.as_str()) {
                return Err(WidgetError::Dispatch("no signal".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((contact.phone.clone(), message.to_string()));
            Ok(())
        }
    }

    fn known() -> Origin {
        Origin::Known(Coordinate {
            lat: 51.5,
            lon: -0.1,
        })
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut store = ContactStore::new();
        assert!(!store.add("", "555"));
        assert!(!store.add("Ann", "   "));
        assert!(store.is_empty());
    }

    #[test]
    fn add_then_delete_returns_to_empty() {
        let mut store = ContactStore::new();
        assert!(store.add("Ann", "555"));
        assert_eq!(store.len(), 1);
        let removed = store.delete(0).unwrap();
        assert_eq!(removed.name, "Ann");
        assert!(store.is_empty());
    }

    #[test]
    fn duplicates_allowed_and_delete_is_positional() {
        let mut store = ContactStore::new();
        store.add("Ann", "555");
        store.add(" Bob ", "777");
        store.add("Ann", "555");
        assert_eq!(store.len(), 3);
        assert_eq!(store.contacts()[1].name, "Bob");

        assert!(store.delete(5).is_none());
        store.delete(1);
        let names: Vec<&str> = store.contacts().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Ann"]);
    }

    #[test]
    fn sos_without_location_dispatches_nothing() {
        let mut store = ContactStore::new();
        store.add("Ann", "555");
        let dispatcher = RecordingDispatcher::default();

        let outcome = store.send_sos(Origin::Unset, &dispatcher);
        assert!(matches!(outcome, SosOutcome::LocationUnknown { .. }));
        assert!(outcome.user_message().contains("location is unknown"));
        assert!(dispatcher.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn sos_notifies_each_contact_with_location() {
        let mut store = ContactStore::new();
        store.add("Ann", "555");
        store.add("Bob", "777");
        let dispatcher = RecordingDispatcher::default();

        let outcome = store.send_sos(known(), &dispatcher);
        match &outcome {
            SosOutcome::Sent {
                notified, failed, ..
            } => {
                assert_eq!(*notified, 2);
                assert_eq!(*failed, 0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let sent = dispatcher.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].1.contains("51.5, -0.1"));
        assert!(sent[0].1.contains("https://www.google.com/maps?q=51.5,-0.1"));
    }

    #[test]
    fn failed_dispatch_is_counted_not_raised() {
        let mut store = ContactStore::new();
        store.add("Ann", "555");
        store.add("Bob", "777");
        let dispatcher = RecordingDispatcher {
            fail_for: Some("Ann".to_string()),
            ..Default::default()
        };

        let outcome = store.send_sos(known(), &dispatcher);
        assert!(matches!(
            outcome,
            SosOutcome::Sent {
                notified: 1,
                failed: 1,
                ..
            }
        ));
    }

    #[test]
    fn sos_with_no_contacts() {
        let outcome = ContactStore::new().send_sos(known(), &LogDispatcher);
        assert!(matches!(outcome, SosOutcome::NoContacts { .. }));
    }

    #[test]
    fn persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("contacts.bin");

        assert!(ContactStore::load_from(&path).unwrap().is_empty());

        let mut store = ContactStore::new();
        store.add("Ann", "555");
        store.add("Bob", "777");
        store.save_to(&path).unwrap();

        assert_eq!(ContactStore::load_from(&path).unwrap(), store);
    }
}
