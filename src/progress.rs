//! Coarse progress reporting over the input list.

/// Reported percentages: every 1% up to 9%, then every 10%.
const THRESHOLDS: [u32; 20] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

/// Tracks which progress thresholds have already been reported.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    next: usize,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the completed percentage of `index` out of `total`, if it
    /// reaches a threshold not reported yet.
    ///
    /// At most one value is returned per call; every threshold passed by the
    /// call is consumed. An empty `total` counts as complete.
    pub fn observe(&mut self, index: usize, total: usize) -> Option<u32> {
        let percent = if total == 0 {
            100
        } else {
            (index.min(total) as u128 * 100 / total as u128) as u32
        };
        let passed = THRESHOLDS[self.next..]
            .iter()
            .take_while(|&&t| t <= percent)
            .count();
        if passed == 0 {
            return None;
        }
        self.next += passed;
        Some(percent)
    }

    /// True once 100% has been reported.
    pub fn is_complete(&self) -> bool {
        self.next == THRESHOLDS.len()
    }
}
