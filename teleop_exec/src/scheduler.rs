//! # Multi-rate scheduler
//!
//! Runs a set of periodic tasks, each with its own rate, from a single thread. Each task keeps its
//! own next due instant so that the rates do not drift relative to each other. When several tasks
//! are due at once they are returned in the order they were added.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{fmt::Debug, thread, time::{Duration, Instant}};

use log::warn;
use util::raise_error;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct Scheduler<T> {
    tasks: Vec<Task<T>>,
}

struct Task<T> {
    id: T,
    period: Duration,
    next_due: Instant,
    overruns: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SchedulerError {
    #[error("Task frequency must be positive and finite, found {0} Hz")]
    InvalidFrequency(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T> Scheduler<T>
where
    T: Copy + PartialEq + Debug
{
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Add a task running at `frequency_hz`, first due at `start`.
    pub fn add(&mut self, id: T, frequency_hz: f64, start: Instant) -> Result<(), SchedulerError> {
        if !(frequency_hz > 0.0) || !frequency_hz.is_finite() {
            return Err(SchedulerError::InvalidFrequency(frequency_hz));
        }

        // The period must fit in both a Duration and an Instant offset
        let period = Duration::try_from_secs_f64(1.0 / frequency_hz)
            .ok()
            .filter(|p| start.checked_add(*p).is_some())
            .ok_or(SchedulerError::InvalidFrequency(frequency_hz))?;

        self.tasks.push(Task {
            id,
            period,
            next_due: start,
            overruns: 0,
        });

        Ok(())
    }

    /// The earliest instant at which a task is due.
    pub fn next_due(&self) -> Option<Instant> {
        self.tasks.iter().map(|t| t.next_due).min()
    }

    /// Get all tasks due at `now`, in the order they were added, and advance them.
    ///
    /// A task which is still due after advancing by one period has fallen behind, it is re-phased
    /// to run one period from `now` and its overrun count is incremented.
    pub fn due(&mut self, now: Instant) -> Vec<T> {
        let mut due = Vec::new();

        for task in self.tasks.iter_mut() {
            if now < task.next_due {
                continue;
            }

            due.push(task.id);
            task.next_due += task.period;

            if task.next_due <= now {
                task.overruns += 1;
                warn!(
                    "Task {:?} overran by {:.06} s (overrun {})",
                    task.id,
                    (now - task.next_due).as_secs_f64(),
                    task.overruns
                );
                task.next_due = now + task.period;
            }
        }

        due
    }

    /// Sleep until at least one task is due and return the due tasks.
    pub fn wait(&mut self) -> Vec<T> {
        let next_due = match self.next_due() {
            Some(i) => i,
            None => raise_error!("Cannot wait on a scheduler with no tasks"),
        };

        let now = Instant::now();
        if let Some(d) = next_due.checked_duration_since(now) {
            thread::sleep(d);
        }

        self.due(Instant::now())
    }

    /// Number of times the task has been re-phased after falling behind.
    pub fn overruns(&self, id: T) -> Option<u64> {
        self.tasks.iter().find(|t| t.id == id).map(|t| t.overruns)
    }
}

impl<T> Default for Scheduler<T>
where
    T: Copy + PartialEq + Debug
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Id {
        Fast,
        Slow,
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_rates_and_order() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.add(Id::Fast, 100.0, t0).unwrap();
        s.add(Id::Slow, 20.0, t0).unwrap();

        assert_eq!(s.due(t0), vec![Id::Fast, Id::Slow]);
        assert_eq!(s.next_due(), Some(t0 + ms(10)));

        let mut fast = 0;
        let mut slow = 0;
        for i in 1..=100u64 {
            for id in s.due(t0 + ms(i)) {
                match id {
                    Id::Fast => fast += 1,
                    Id::Slow => slow += 1,
                }
            }
        }

        assert_eq!(fast, 10);
        assert_eq!(slow, 2);
        assert_eq!(s.overruns(Id::Fast), Some(0));
    }

    #[test]
    fn test_not_due() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.add(Id::Fast, 100.0, t0 + ms(5)).unwrap();

        assert!(s.due(t0).is_empty());
        assert_eq!(s.due(t0 + ms(5)), vec![Id::Fast]);
    }

    #[test]
    fn test_overrun_rephases() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.add(Id::Fast, 100.0, t0).unwrap();

        s.due(t0);

        // 35 ms late, only runs once and is re-phased
        assert_eq!(s.due(t0 + ms(45)), vec![Id::Fast]);
        assert_eq!(s.overruns(Id::Fast), Some(1));
        assert_eq!(s.next_due(), Some(t0 + ms(55)));
        assert!(s.due(t0 + ms(50)).is_empty());
    }

    #[test]
    fn test_invalid_frequency() {
        let mut s: Scheduler<Id> = Scheduler::new();

        assert_eq!(
            s.add(Id::Fast, 0.0, Instant::now()),
            Err(SchedulerError::InvalidFrequency(0.0))
        );
        assert!(s.add(Id::Fast, std::f64::INFINITY, Instant::now()).is_err());
        assert_eq!(
            s.add(Id::Fast, 1e-30, Instant::now()),
            Err(SchedulerError::InvalidFrequency(1e-30))
        );
        assert_eq!(s.overruns(Id::Fast), None);
    }

    #[test]
    fn test_wait() {
        let mut s = Scheduler::new();
        let start = Instant::now() + ms(5);
        s.add(Id::Slow, 10.0, start).unwrap();

        assert_eq!(s.wait(), vec![Id::Slow]);
        assert!(Instant::now() >= start);
    }
}
