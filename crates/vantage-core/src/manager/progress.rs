/// Span of aggregate progress owned by one part of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ProgressWindow {
    pub start: f64,
    pub end: f64,
}

impl ProgressWindow {
    pub fn full() -> Self {
        Self {
            start: 0.0,
            end: 100.0,
        }
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    pub fn midpoint(&self) -> f64 {
        self.start + self.span() / 2.0
    }

    pub fn front_half(&self) -> Self {
        Self {
            start: self.start,
            end: self.midpoint(),
        }
    }

    pub fn back_half(&self) -> Self {
        Self {
            start: self.midpoint(),
            end: self.end,
        }
    }

    /// Cut `units` equal slices; returns the slice width
    pub fn unit(&self, units: usize) -> f64 {
        if units == 0 {
            return 0.0;
        }
        self.span() / units as f64
    }

    /// Progress after the `done`-th of `count` resultors in this window
    pub fn resultor_step(&self, done: usize, count: usize) -> f64 {
        if count == 0 {
            return self.start;
        }
        self.start + self.span() / count as f64 / 2.0 * done as f64
    }
}
