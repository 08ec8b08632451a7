use std::collections::HashSet;

/// Raw backend event strings observed in the last accepted snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLedger {
    seen: HashSet<String>,
}

impl EventLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: &[String]) -> Self {
        let mut ledger = Self::new();
        ledger.replace(events);
        ledger
    }

    /// Events in `incoming` that were not in the previous snapshot, in arrival order.
    ///
    /// Membership is checked against history only, so a text repeated inside
    /// one batch is emitted once per occurrence.
    pub fn fresh<'a>(&self, incoming: &'a [String]) -> Vec<&'a str> {
        incoming
            .iter()
            .filter(|event| !self.seen.contains(event.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn replace(&mut self, incoming: &[String]) {
        self.seen = incoming.iter().cloned().collect();
    }

    pub fn contains(&self, event: &str) -> bool {
        self.seen.contains(event)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
