/// Bounded percentage of `done` over `total`; an empty total counts as done.
pub fn percentage(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = done.saturating_mul(100) / total;
    percent.min(100) as u8
}

/// One monotonic counter against one denominator fixed for the whole
/// transaction. Only percentages that differ from the last reported value
/// are handed out.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    done: u64,
    total: u64,
    last_reported: Option<u8>,
}

impl ProgressReporter {
    pub fn new(total: u64) -> Self {
        Self {
            done: 0,
            total,
            last_reported: None,
        }
    }

    pub fn done(&self) -> u64 {
        self.done
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn current(&self) -> u8 {
        percentage(self.done, self.total)
    }

    pub fn start(&mut self) -> Option<u8> {
        self.report(self.current())
    }

    pub fn advance(&mut self) -> Option<u8> {
        self.done = self.done.saturating_add(1);
        self.report(self.current())
    }

    pub fn finish(&mut self) -> Option<u8> {
        self.done = self.done.max(self.total);
        self.report(100)
    }

    fn report(&mut self, value: u8) -> Option<u8> {
        if self.last_reported.is_some_and(|last| last >= value) {
            return None;
        }
        self.last_reported = Some(value);
        Some(value)
    }
}
