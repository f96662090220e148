use std::fmt;
use std::time::{Duration, Instant};

/// Collects named, sequential timing steps for one build.
///
/// ```rust
/// use quire::Timer;
///
/// let mut timer = Timer::new();
/// timer.step("process");
/// timer.step("render");
/// assert_eq!(timer.steps().len(), 2);
/// assert_eq!(timer.steps()[0].name, "process");
/// ```
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
    last: Instant,
    steps: Vec<Step>,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    /// Time since the previous step.
    pub elapsed: Duration,
}

impl Timer {
    pub fn new() -> Self {
        let now = Instant::now();
        Timer { start: now, last: now, steps: vec![] }
    }

    /// Closes the step that began at the previous call (or at creation).
    pub fn step(&mut self, name: impl Into<String>) {
        let now = Instant::now();
        let step = Step { name: name.into(), elapsed: now - self.last };
        tracing::debug!(step = %step.name, elapsed = ?step.elapsed, "timer");
        self.steps.push(step);
        self.last = now;
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn total(&self) -> Duration {
        self.last - self.start
    }
}

impl Default for Timer {
    fn default() -> Self {
        Timer::new()
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(f, "{:>12}: {:.2?}", step.name, step.elapsed)?;
        }

        write!(f, "{:>12}: {:.2?}", "total", self.total())
    }
}
