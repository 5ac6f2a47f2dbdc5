use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use log::{error, trace, warn};

use crate::error::TickError;

/// Longest step handed to subscribers, in seconds.
pub const DEFAULT_MAX_DELTA: f32 = 0.1;

/// Wall-clock stopwatch used by the host loop to measure raw frame deltas.
#[derive(Debug)]
pub struct FrameTimer {
    last_tick: Instant,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            last_tick: Instant::now(),
        }
    }

    /// Seconds since the previous call, advancing the timer.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        delta
    }

    /// Forgets the time elapsed so far.
    pub fn reset(&mut self) {
        self.last_tick = Instant::now();
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

type TickCallback = Box<dyn FnMut(f32) -> Result<(), TickError>>;

struct Subscriber {
    name: String,
    callback: TickCallback,
}

/// Outcome of one dispatched tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub delta: f32,
    pub invoked: usize,
    pub failures: Vec<(String, TickError)>,
}

/// Single per-frame driver that hands a clamped delta to every subscriber.
pub struct FrameClock {
    subscribers: Vec<Subscriber>,
    max_delta: f32,
    paused: bool,
    resumed: bool,
    frame: u64,
    elapsed: f32,
}

impl fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameClock")
            .field("subscribers", &self.subscriber_names())
            .field("max_delta", &self.max_delta)
            .field("paused", &self.paused)
            .field("frame", &self.frame)
            .finish()
    }
}

impl FrameClock {
    pub fn new(max_delta: f32) -> Self {
        Self {
            subscribers: Vec::new(),
            max_delta: max_delta.max(0.0),
            paused: false,
            resumed: false,
            frame: 0,
            elapsed: 0.0,
        }
    }

    /// Registers a per-tick callback. Subscribers run in registration order.
    pub fn subscribe<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: FnMut(f32) -> Result<(), TickError> + 'static,
    {
        self.subscribers.push(Subscriber {
            name: name.into(),
            callback: Box::new(callback),
        });
    }

    /// Removes the named subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, name: &str) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.name != name);
        self.subscribers.len() != before
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    pub fn subscriber_names(&self) -> Vec<&str> {
        self.subscribers.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn max_delta(&self) -> f32 {
        self.max_delta
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Number of ticks dispatched so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Sum of the clamped deltas dispatched so far.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resumes dispatching. The time spent paused is never replayed.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.resumed = true;
        }
    }

    /// Clamps a raw delta to `[0, max_delta]`; non-finite input becomes zero.
    pub fn clamp_delta(&self, raw_delta: f32) -> f32 {
        if raw_delta.is_finite() {
            raw_delta.clamp(0.0, self.max_delta)
        } else {
            0.0
        }
    }

    /// Dispatches one tick. Returns `None` while paused.
    ///
    /// The first tick after [`resume`](Self::resume) carries a zero delta, since
    /// the raw delta measured by the host spans the paused interval.
    pub fn tick(&mut self, raw_delta: f32) -> Option<TickReport> {
        if self.paused {
            return None;
        }
        let delta = if std::mem::take(&mut self.resumed) {
            0.0
        } else {
            self.clamp_delta(raw_delta)
        };
        if raw_delta > self.max_delta {
            trace!("clamped frame delta {raw_delta:.3}s to {delta:.3}s");
        }

        let mut report = TickReport {
            delta,
            invoked: 0,
            failures: Vec::new(),
        };
        for subscriber in &mut self.subscribers {
            report.invoked += 1;
            let callback = &mut subscriber.callback;
            match panic::catch_unwind(AssertUnwindSafe(|| callback(delta))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!("frame subscriber {} failed: {err}", subscriber.name);
                    report.failures.push((subscriber.name.clone(), err));
                }
                Err(panic) => {
                    let err = TickError::Panicked {
                        subscriber: subscriber.name.clone(),
                        message: panic_message(panic),
                    };
                    error!("{err}");
                    report.failures.push((subscriber.name.clone(), err));
                }
            }
        }
        self.frame += 1;
        self.elapsed += delta;
        Some(report)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DELTA)
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn recorder(clock: &mut FrameClock, name: &str) -> Rc<RefCell<Vec<f32>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        clock.subscribe(name, move |dt| {
            sink.borrow_mut().push(dt);
            Ok(())
        });
        seen
    }

    #[test]
    fn timer_measures_delta_between_instants() {
        let mut timer = FrameTimer::new();
        let start = Instant::now();
        timer.tick_at(start);
        let delta = timer.tick_at(start + Duration::from_millis(16));
        assert!((delta - 0.016).abs() < 1e-4);
    }

    #[test]
    fn timer_never_goes_backwards() {
        let mut timer = FrameTimer::new();
        let now = Instant::now();
        timer.tick_at(now + Duration::from_millis(50));
        assert_eq!(timer.tick_at(now), 0.0);
    }

    #[test]
    fn delivers_clamped_delta_to_every_subscriber() {
        let mut clock = FrameClock::new(0.1);
        let first = recorder(&mut clock, "first");
        let second = recorder(&mut clock, "second");

        let report = clock.tick(5.0).unwrap();
        assert_eq!(report.delta, 0.1);
        assert_eq!(report.invoked, 2);
        assert_eq!(*first.borrow(), vec![0.1]);
        assert_eq!(*second.borrow(), vec![0.1]);
    }

    #[test]
    fn bogus_deltas_become_zero() {
        let clock = FrameClock::default();
        assert_eq!(clock.clamp_delta(f32::NAN), 0.0);
        assert_eq!(clock.clamp_delta(f32::INFINITY), 0.0);
        assert_eq!(clock.clamp_delta(-0.5), 0.0);
        assert_eq!(clock.clamp_delta(0.016), 0.016);
    }

    #[test]
    fn failing_subscribers_do_not_stop_the_others() {
        let mut clock = FrameClock::default();
        clock.subscribe("broken", |_| Err(TickError::Failed("boom".into())));
        clock.subscribe("panicky", |_| panic!("kaboom"));
        let survivor = recorder(&mut clock, "survivor");

        let report = clock.tick(0.016).unwrap();
        assert_eq!(report.invoked, 3);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].0, "broken");
        assert!(matches!(
            &report.failures[1].1,
            TickError::Panicked { message, .. } if message == "kaboom"
        ));
        assert_eq!(survivor.borrow().len(), 1);
    }

    #[test]
    fn paused_clock_skips_ticks_without_catch_up() {
        let mut clock = FrameClock::default();
        let seen = recorder(&mut clock, "seen");

        clock.tick(0.016);
        clock.pause();
        assert!(clock.tick(0.016).is_none());
        assert!(clock.tick(0.016).is_none());
        clock.resume();
        clock.tick(3.0);
        clock.tick(0.016);

        assert_eq!(*seen.borrow(), vec![0.016, 0.0, 0.016]);
        assert_eq!(clock.frame(), 3);
    }

    #[test]
    fn unsubscribe_removes_by_name() {
        let mut clock = FrameClock::default();
        recorder(&mut clock, "camera");
        recorder(&mut clock, "particles");
        assert!(clock.unsubscribe("camera"));
        assert!(!clock.unsubscribe("camera"));
        assert_eq!(clock.subscriber_names(), vec!["particles"]);
    }
}
