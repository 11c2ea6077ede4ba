//! Absolute-time parameter automation.
//!
//! A [`Timeline`] is a list of events on the audio clock, evaluated the way
//! an audio parameter is: a `Set` event jumps, a `Linear` event ramps from the
//! previous event's value and time to its own.

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Set,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Event {
    time: f64,
    value: f64,
    kind: Kind,
}

/// A scheduled automation curve for one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    default: f64,
    events: Vec<Event>,
}

impl Timeline {
    /// A timeline holding `default` until its first event.
    pub fn new(default: f64) -> Self {
        Timeline {
            default,
            events: Vec::new(),
        }
    }

    fn insert(&mut self, event: Event) {
        // Events at the same time keep insertion order.
        let idx = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(idx, event);
    }

    /// Jump to `value` at `time`.
    pub fn set_value_at(&mut self, value: f64, time: f64) -> &mut Self {
        self.insert(Event {
            time,
            value,
            kind: Kind::Set,
        });
        self
    }

    /// Ramp linearly from the previous event to `value`, arriving at `time`.
    pub fn linear_ramp_to(&mut self, value: f64, time: f64) -> &mut Self {
        self.insert(Event {
            time,
            value,
            kind: Kind::Linear,
        });
        self
    }

    /// Value of the parameter at absolute time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        let next = self.events.partition_point(|e| e.time <= t);
        let (prev_time, prev_value) = match next.checked_sub(1) {
            Some(i) => (self.events[i].time, self.events[i].value),
            None => (f64::NEG_INFINITY, self.default),
        };

        match self.events.get(next) {
            Some(e) if e.kind == Kind::Linear && prev_time.is_finite() => {
                let span = e.time - prev_time;
                if span <= 0.0 {
                    return e.value;
                }
                let progress = (t - prev_time) / span;
                prev_value + (e.value - prev_value) * progress
            }
            _ => prev_value,
        }
    }

    /// Drop every event after `t` and hold the value the curve had at `t`.
    ///
    /// A ramp that was in flight at `t` is truncated there, so the curve up
    /// to `t` is unchanged.
    pub fn cancel_and_hold(&mut self, t: f64) {
        let held = self.value_at(t);
        self.events.retain(|e| e.time <= t);
        self.insert(Event {
            time: t,
            value: held,
            kind: Kind::Linear,
        });
    }
}
