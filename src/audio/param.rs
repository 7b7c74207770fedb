//! Automatable audio parameters
//!
//! Values are scheduled against the graph's render clock in seconds.
//! Evaluation follows the Web Audio rules: a ramp interpolates from the
//! event before it to its own end point, and after the last event the
//! parameter holds that event's value.

#[derive(Clone, Copy, Debug, PartialEq)]
enum Event {
    Set { time: f64, value: f32 },
    Linear { time: f64, value: f32 },
    Exponential { time: f64, value: f32 },
}

impl Event {
    fn time(&self) -> f64 {
        match *self {
            Event::Set { time, .. } | Event::Linear { time, .. } | Event::Exponential { time, .. } => {
                time
            }
        }
    }

    fn value(&self) -> f32 {
        match *self {
            Event::Set { value, .. }
            | Event::Linear { value, .. }
            | Event::Exponential { value, .. } => value,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AudioParam {
    default_value: f32,
    min: f32,
    max: f32,
    events: Vec<Event>,
}

impl AudioParam {
    pub fn new(default_value: f32, min: f32, max: f32) -> Self {
        Self {
            default_value,
            min,
            max,
            events: Vec::new(),
        }
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(Event::Set { time, value });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, end_time: f64) {
        self.insert(Event::Linear {
            time: end_time,
            value,
        });
    }

    /// Exponential ramps need both end points strictly positive; otherwise
    /// the previous value is held until `end_time`.
    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, end_time: f64) {
        self.insert(Event::Exponential {
            time: end_time,
            value,
        });
    }

    /// Freeze the parameter at whatever value it has at `time`.
    ///
    /// Past events are no longer needed once the clock reaches `time`, so the
    /// schedule collapses to a single set event.
    pub fn cancel_and_hold_at_time(&mut self, time: f64) {
        let held = self.value_at(time);
        self.events.clear();
        self.events.push(Event::Set { time, value: held });
    }

    pub fn value_at(&self, t: f64) -> f32 {
        // First event strictly after `t`; equal times resolve to the later
        // event, so a zero-length ramp lands on its target.
        let next = self.events.partition_point(|e| e.time() <= t);
        let previous = next.checked_sub(1).map(|i| self.events[i]);

        let value = match (previous, self.events.get(next)) {
            (None, None) => self.default_value,
            (Some(prev), None) => prev.value(),
            (prev, Some(&upcoming)) => {
                let (t0, v0) = prev
                    .map(|p| (p.time(), p.value()))
                    .unwrap_or((0.0, self.default_value));
                match upcoming {
                    Event::Set { .. } => v0,
                    Event::Linear { time: t1, value: v1 } => {
                        let progress = ((t - t0) / (t1 - t0)) as f32;
                        v0 + (v1 - v0) * progress
                    }
                    Event::Exponential { time: t1, value: v1 } => {
                        if v0 <= 0.0 || v1 <= 0.0 {
                            v0
                        } else {
                            let progress = ((t - t0) / (t1 - t0)) as f32;
                            v0 * (v1 / v0).powf(progress)
                        }
                    }
                }
            }
        };

        value.clamp(self.min, self.max)
    }

    fn insert(&mut self, event: Event) {
        let at = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(at, event);
    }
}
