// Two independent cadences evaluated from one polling loop.

use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Acquire all channels and append one sample.
    Record,
    /// Evaluate staleness and drive the indicator.
    Status,
}

#[derive(Debug, Clone, Copy)]
struct Cadence {
    interval: TimeDelta,
    last_fired: DateTime<Utc>,
}

impl Cadence {
    fn is_due(&self, now: DateTime<Utc>) -> bool {
        now - self.last_fired >= self.interval
    }
}

/// Last-fired times for both tasks, anchored at the loop's start time.
#[derive(Debug, Clone)]
pub struct Schedule {
    record: Cadence,
    status: Cadence,
}

impl Schedule {
    pub fn new(start: DateTime<Utc>, record_interval: TimeDelta, status_interval: TimeDelta) -> Self {
        Self {
            record: Cadence {
                interval: record_interval,
                last_fired: start,
            },
            status: Cadence {
                interval: status_interval,
                last_fired: start,
            },
        }
    }

    fn cadence(&self, task: Task) -> &Cadence {
        match task {
            Task::Record => &self.record,
            Task::Status => &self.status,
        }
    }

    fn cadence_mut(&mut self, task: Task) -> &mut Cadence {
        match task {
            Task::Record => &mut self.record,
            Task::Status => &mut self.status,
        }
    }

    /// Due once at least one interval has elapsed since the task last fired.
    pub fn is_due(&self, task: Task, now: DateTime<Utc>) -> bool {
        self.cadence(task).is_due(now)
    }

    /// Called after the task ran, whether or not it fully succeeded.
    pub fn mark_fired(&mut self, task: Task, now: DateTime<Utc>) {
        self.cadence_mut(task).last_fired = now;
    }

    pub fn last_fired(&self, task: Task) -> DateTime<Utc> {
        self.cadence(task).last_fired
    }

    /// Re-anchors any task whose last fire lies in the future (wall clock stepped back),
    /// so a backwards clock step delays the task by at most one interval.
    pub fn rebase(&mut self, now: DateTime<Utc>) -> bool {
        let mut moved = false;
        for task in [Task::Record, Task::Status] {
            let cadence = self.cadence_mut(task);
            if cadence.last_fired > now {
                cadence.last_fired = now;
                moved = true;
            }
        }
        moved
    }
}
