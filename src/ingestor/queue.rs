use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::models::Source;

/// Order in which queued sources are processed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueOrder {
    /// Most recently queued first
    #[default]
    Lifo,
    Fifo,
}

/// Worklist of sources still to be imported
#[derive(Debug, Default)]
pub struct SourceQueue {
    sources: VecDeque<Source>,
    order: QueueOrder,
}

impl SourceQueue {
    pub fn new(order: QueueOrder) -> Self {
        Self {
            sources: VecDeque::new(),
            order,
        }
    }

    pub fn push(&mut self, source: Source) {
        self.sources.push_back(source);
    }

    pub fn pop(&mut self) -> Option<Source> {
        match self.order {
            QueueOrder::Lifo => self.sources.pop_back(),
            QueueOrder::Fifo => self.sources.pop_front(),
        }
    }

    /// Remove everything still queued
    pub fn clear(&mut self) -> usize {
        let skipped = self.sources.len();
        self.sources.clear();
        skipped
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn order(&self) -> QueueOrder {
        self.order
    }
}

impl Extend<Source> for SourceQueue {
    fn extend<T: IntoIterator<Item = Source>>(&mut self, iter: T) {
        self.sources.extend(iter);
    }
}
