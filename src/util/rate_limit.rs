//! Outbound rate limiting

/// Fixed-cadence gate for outbound state reports.
///
/// Frame time is accumulated and the gate opens at most once per call to
/// [`SendAccumulator::advance`], however many intervals have piled up. The
/// backlog is capped at one interval so a long hitch does not cause a burst
/// of catch-up reports.
#[derive(Debug, Clone)]
pub struct SendAccumulator {
    interval: f64,
    accumulated: f64,
}

impl SendAccumulator {
    pub fn new(rate_hz: u32) -> Self {
        Self {
            interval: 1.0 / rate_hz.max(1) as f64,
            accumulated: 0.0,
        }
    }

    /// Feed elapsed seconds, returns true when a report is due this tick
    pub fn advance(&mut self, dt: f64) -> bool {
        self.accumulated += dt.max(0.0);
        if self.accumulated >= self.interval {
            self.accumulated = (self.accumulated - self.interval).min(self.interval);
            true
        } else {
            false
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn reset(&mut self) {
        self.accumulated = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_at_most_once_per_advance() {
        let mut acc = SendAccumulator::new(60);
        // A one second hitch still yields a single report
        assert!(acc.advance(1.0));
        // The capped backlog allows exactly one more on the next frame
        assert!(acc.advance(0.0));
        assert!(!acc.advance(0.0));
    }

    #[test]
    fn high_frame_rate_is_throttled() {
        let mut acc = SendAccumulator::new(60);
        let sent = (0..240).filter(|_| acc.advance(1.0 / 240.0)).count();
        assert!((59..=61).contains(&sent), "sent {sent}");
    }
}
