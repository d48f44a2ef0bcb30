use std::slice;
use tracing::{debug, warn};

use crate::errors::ImportResult;
use crate::parsers::ParseStep;
use crate::storage::StorageAdapter;

/// Forwards parsed events to the store for one run
///
/// Every event handed to the store is counted, whether or not the store
/// accepts it; sentinels are not.
#[derive(Debug)]
pub struct Committer {
    adapter: StorageAdapter,
    long_desc_until: i64,
    event_count: u64,
    failures: u64,
}

impl Committer {
    pub fn new(adapter: StorageAdapter, long_desc_until: i64) -> Self {
        Self {
            adapter,
            long_desc_until,
            event_count: 0,
            failures: 0,
        }
    }

    /// Apply one pull of an event stream; `false` once the stream is over
    pub fn apply(&mut self, step: Option<ImportResult<ParseStep>>, source: &str) -> bool {
        match step {
            Some(Ok(ParseStep::Event(event))) => {
                self.event_count += 1;
                let data = event.data.trimmed_after(self.long_desc_until);
                if let Err(e) = self
                    .adapter
                    .import_events(&event.services, slice::from_ref(&data))
                {
                    self.failures += 1;
                    warn!("Import of event '{}' from '{}' failed: {}", data.title, source, e);
                }
                true
            }
            Some(Ok(ParseStep::Pending)) => true,
            Some(Err(e)) => {
                warn!("Parsing '{}' stopped: {}", source, e);
                false
            }
            None => {
                debug!("'{}' exhausted after {} events in total", source, self.event_count);
                false
            }
        }
    }

    /// Pull a whole stream through [`Self::apply`]
    pub fn drain<I>(&mut self, mut steps: I, source: &str)
    where
        I: Iterator<Item = ImportResult<ParseStep>>,
    {
        while self.apply(steps.next(), source) {}
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Dispatches the store rejected
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn long_desc_until(&self) -> i64 {
        self.long_desc_until
    }

    pub fn into_adapter(self) -> StorageAdapter {
        self.adapter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ImportError, StoreError, StoreResult};
    use crate::models::{EventData, ProgramEvent, ServiceRef};
    use crate::storage::{EpgStore, SharedStore, StoreCapabilities};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Collect {
        events: Vec<EventData>,
    }

    impl EpgStore for Collect {
        fn capabilities(&self) -> StoreCapabilities {
            StoreCapabilities {
                batch_import: true,
                ..Default::default()
            }
        }

        fn import_events(&mut self, _services: &[ServiceRef], events: &[EventData]) -> StoreResult<()> {
            if events.iter().any(|e| e.title == "reject") {
                return Err(StoreError::rejected("no thanks"));
            }
            self.events.extend_from_slice(events);
            Ok(())
        }
    }

    fn event(start: i64, title: &str) -> ImportResult<ParseStep> {
        Ok(ParseStep::Event(ProgramEvent::new(
            vec!["1:0:1:A".to_string()],
            EventData {
                start,
                duration: 60,
                title: title.to_string(),
                subtitle: "sub".to_string(),
                long_description: "X".to_string(),
                genre: None,
            },
        )))
    }

    fn committer() -> (Committer, Arc<Mutex<Collect>>) {
        let collect = Arc::new(Mutex::new(Collect::default()));
        let store: SharedStore = collect.clone();
        let adapter = StorageAdapter::resolve(&store).unwrap().unwrap();
        (Committer::new(adapter, 1_000), collect)
    }

    #[test]
    fn test_long_description_truncated_past_horizon() {
        let (mut committer, collect) = committer();
        committer.drain(vec![event(1_001, "late"), event(999, "early")].into_iter(), "test");

        let events = &collect.lock().unwrap().events;
        assert_eq!(events[0].long_description, "");
        assert_eq!(events[0].subtitle, "sub");
        assert_eq!(events[1].long_description, "X");
    }

    #[test]
    fn test_counts_dispatches_including_failures() {
        let (mut committer, collect) = committer();
        let steps = vec![
            event(1, "a"),
            Ok(ParseStep::Pending),
            event(2, "reject"),
            Ok(ParseStep::Pending),
            event(3, "b"),
        ];
        committer.drain(steps.into_iter(), "test");

        assert_eq!(committer.event_count(), 3);
        assert_eq!(committer.failures(), 1);
        assert_eq!(collect.lock().unwrap().events.len(), 2);
        assert!(collect.lock().unwrap().events.iter().all(|e| e.title != "reject"));
    }

    #[test]
    fn test_parse_error_ends_stream() {
        let (mut committer, _) = committer();
        let steps = vec![
            event(1, "a"),
            Err(ImportError::parse("xmltv", "broken")),
            event(2, "never"),
        ];
        committer.drain(steps.into_iter(), "test");
        assert_eq!(committer.event_count(), 1);
    }
}
