use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TypingError};
use crate::options::TypingOverrides;

/// Part name used when the engine has no named parts, and by instructions that name none.
pub const DEFAULT_PART: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueItem {
    Sentence {
        part: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        overrides: Option<TypingOverrides>,
    },
    Erase {
        part: String,
        count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        overrides: Option<TypingOverrides>,
    },
    Wait {
        part: String,
        ms: u64,
    },
}

impl QueueItem {
    pub fn part(&self) -> &str {
        match self {
            QueueItem::Sentence { part, .. }
            | QueueItem::Erase { part, .. }
            | QueueItem::Wait { part, .. } => part,
        }
    }

    pub fn overrides(&self) -> Option<&TypingOverrides> {
        match self {
            QueueItem::Sentence { overrides, .. } | QueueItem::Erase { overrides, .. } => {
                overrides.as_ref()
            }
            QueueItem::Wait { .. } => None,
        }
    }

    /// Number of steps the item takes; `None` for single-step items.
    pub fn detail_len(&self) -> Option<usize> {
        match self {
            QueueItem::Sentence { text, .. } => Some(text.chars().count()),
            QueueItem::Erase { count, .. } => Some(*count),
            QueueItem::Wait { .. } => None,
        }
    }

    fn with_part(&self, name: &str) -> QueueItem {
        let mut item = self.clone();
        match &mut item {
            QueueItem::Sentence { part, .. }
            | QueueItem::Erase { part, .. }
            | QueueItem::Wait { part, .. } => *part = name.to_string(),
        }
        item
    }
}

/// Ordered instructions of one part with a two-level cursor: the current item and the
/// progress within it.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    items: Vec<QueueItem>,
    index: usize,
    detail: usize,
}

impl Queue {
    pub fn add(&mut self, item: QueueItem) {
        self.items.push(item);
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.reset_indices();
    }

    pub fn reset_indices(&mut self) {
        self.index = 0;
        self.detail = 0;
    }

    pub fn item(&self) -> Option<&QueueItem> {
        self.items.get(self.index)
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn detail_index(&self) -> usize {
        self.detail
    }

    /// Advance one step. Moves on to the next item once `max_detail` steps are done, or right
    /// away when there is no cap. Returns `false` when the run must stop: the queue is
    /// exhausted or `reset` has fired.
    pub fn increment(&mut self, max_detail: Option<usize>, reset: &CancellationToken) -> bool {
        if reset.is_cancelled() {
            return false;
        }
        self.detail += 1;
        match max_detail {
            Some(max) if max > 0 && self.detail < max => true,
            _ => self.next_item(),
        }
    }

    fn next_item(&mut self) -> bool {
        self.index += 1;
        self.detail = 0;
        self.index < self.items.len()
    }
}

/// One [`Queue`] per part.
#[derive(Debug, Clone)]
pub struct QueueManager {
    queues: Vec<(String, Queue)>,
}

impl QueueManager {
    pub fn new(parts: &[String]) -> Self {
        Self {
            queues: parts
                .iter()
                .map(|part| (part.clone(), Queue::default()))
                .collect(),
        }
    }

    pub fn get(&self, part: &str) -> Result<&Queue> {
        self.queues
            .iter()
            .find(|(name, _)| name == part)
            .map(|(_, queue)| queue)
            .ok_or_else(|| unknown_part(part))
    }

    pub fn get_mut(&mut self, part: &str) -> Result<&mut Queue> {
        self.queues
            .iter_mut()
            .find(|(name, _)| name == part)
            .map(|(_, queue)| queue)
            .ok_or_else(|| unknown_part(part))
    }

    /// Route `item` to its part. An item for [`DEFAULT_PART`] goes to every queue unless a
    /// part of that name exists.
    pub fn add(&mut self, item: QueueItem) -> Result<()> {
        if item.part() == DEFAULT_PART && self.get(DEFAULT_PART).is_err() {
            for (name, queue) in &mut self.queues {
                queue.add(item.with_part(name));
            }
            return Ok(());
        }
        self.get_mut(item.part())?.add(item);
        Ok(())
    }

    /// Parts `part` resolves to when an instruction addresses it.
    pub fn targets(&self, part: &str) -> Result<Vec<String>> {
        if part == DEFAULT_PART && self.get(DEFAULT_PART).is_err() {
            return Ok(self.queues.iter().map(|(name, _)| name.clone()).collect());
        }
        self.get(part)?;
        Ok(vec![part.to_string()])
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Queue)> {
        self.queues
            .iter_mut()
            .map(|(name, queue)| (name.as_str(), queue))
    }

    pub fn clear(&mut self) {
        for (_, queue) in &mut self.queues {
            queue.clear();
        }
    }

    pub fn reset_indices(&mut self) {
        for (_, queue) in &mut self.queues {
            queue.reset_indices();
        }
    }
}

fn unknown_part(part: &str) -> TypingError {
    TypingError::UnknownPart {
        part: part.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(part: &str, text: &str) -> QueueItem {
        QueueItem::Sentence {
            part: part.to_string(),
            text: text.to_string(),
            style: None,
            overrides: None,
        }
    }

    #[test]
    fn increment_walks_details_then_items() {
        let token = CancellationToken::new();
        let mut queue = Queue::default();
        queue.add(sentence(DEFAULT_PART, "ab"));
        queue.add(QueueItem::Wait {
            part: DEFAULT_PART.to_string(),
            ms: 3,
        });

        assert!(queue.increment(Some(2), &token));
        assert_eq!((queue.index(), queue.detail_index()), (0, 1));
        assert!(queue.increment(Some(2), &token));
        assert_eq!((queue.index(), queue.detail_index()), (1, 0));
        assert!(!queue.increment(None, &token));
    }

    #[test]
    fn increment_stops_on_reset_without_moving() {
        let token = CancellationToken::new();
        let mut queue = Queue::default();
        queue.add(sentence(DEFAULT_PART, "abc"));
        token.cancel();
        assert!(!queue.increment(Some(3), &token));
        assert_eq!((queue.index(), queue.detail_index()), (0, 0));
    }

    #[test]
    fn default_part_items_broadcast_to_named_parts() {
        let parts = vec!["a".to_string(), "b".to_string()];
        let mut manager = QueueManager::new(&parts);
        manager
            .add(QueueItem::Wait {
                part: DEFAULT_PART.to_string(),
                ms: 1,
            })
            .expect("broadcast");
        manager.add(sentence("b", "hi")).expect("routed");

        assert_eq!(manager.get("a").expect("a").items().len(), 1);
        assert_eq!(manager.get("b").expect("b").items().len(), 2);
        assert_eq!(manager.get("a").expect("a").items()[0].part(), "a");
        assert_eq!(
            manager.add(sentence("c", "x")),
            Err(TypingError::UnknownPart {
                part: "c".to_string()
            })
        );
    }
}
