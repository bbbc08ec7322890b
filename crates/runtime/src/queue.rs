//! Per-agent priority task queue.

use agentmesh_core::{AgentTask, TaskPriority};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct QueuedTask {
    priority: TaskPriority,
    seq: u64,
    task: AgentTask,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority wins, then lower sequence (older) wins.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Task queue ordered by descending priority, stable FIFO within a band.
#[derive(Default)]
pub struct TaskQueue {
    heap: BinaryHeap<QueuedTask>,
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: AgentTask) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedTask {
            priority: task.priority,
            seq,
            task,
        });
    }

    /// Remove and return the highest-priority task, oldest among ties.
    pub fn pop(&mut self) -> Option<AgentTask> {
        self.heap.pop().map(|queued| queued.task)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Discard all pending tasks, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.heap.len();
        self.heap.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn task(kind: &str, priority: TaskPriority) -> AgentTask {
        AgentTask::new(kind, json!({})).with_priority(priority)
    }

    #[test]
    fn test_priority_order_with_fifo_ties() {
        let mut queue = TaskQueue::new();
        queue.push(task("low", TaskPriority::Low));
        queue.push(task("high-1", TaskPriority::High));
        queue.push(task("normal", TaskPriority::Normal));
        queue.push(task("high-2", TaskPriority::High));

        let order: Vec<String> = std::iter::from_fn(|| queue.pop().map(|t| t.kind)).collect();
        assert_eq!(order, vec!["high-1", "high-2", "normal", "low"]);
    }

    #[test]
    fn test_critical_preempts_everything() {
        let mut queue = TaskQueue::new();
        queue.push(task("high", TaskPriority::High));
        queue.push(task("critical", TaskPriority::Critical));

        assert_eq!(queue.pop().unwrap().kind, "critical");
        assert_eq!(queue.pop().unwrap().kind, "high");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_clear_reports_dropped_count() {
        let mut queue = TaskQueue::new();
        queue.push(task("a", TaskPriority::Normal));
        queue.push(task("b", TaskPriority::Normal));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    fn arb_priority() -> impl Strategy<Value = TaskPriority> {
        prop_oneof![
            Just(TaskPriority::Low),
            Just(TaskPriority::Normal),
            Just(TaskPriority::High),
            Just(TaskPriority::Critical),
        ]
    }

    proptest! {
        #[test]
        fn prop_pop_order_is_priority_then_insertion(priorities in prop::collection::vec(arb_priority(), 0..64)) {
            let mut queue = TaskQueue::new();
            for (i, priority) in priorities.iter().enumerate() {
                queue.push(task(&format!("t{}", i), *priority));
            }

            let mut popped: Vec<(TaskPriority, usize)> = Vec::new();
            while let Some(t) = queue.pop() {
                let index: usize = t.kind[1..].parse().unwrap();
                popped.push((t.priority, index));
            }

            prop_assert_eq!(popped.len(), priorities.len());
            for pair in popped.windows(2) {
                let (p1, i1) = pair[0];
                let (p2, i2) = pair[1];
                prop_assert!(p1 > p2 || (p1 == p2 && i1 < i2));
            }
        }
    }
}
