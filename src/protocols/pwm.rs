use core::fmt;

/// One electrical transition on the RC input pin, timestamped in us.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub timestamp_us: i64,
    pub rising: bool,
}

impl Edge {
    pub fn new(timestamp_us: i64, rising: bool) -> Self {
        Self {
            timestamp_us,
            rising,
        }
    }
}

/// A low half followed by a high half, all values in us.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cycle {
    pub low_time: i64,
    pub low_length: i64,
    pub high_time: i64,
    pub high_length: i64,
}

impl Cycle {
    pub fn starting_at(low_time: i64) -> Self {
        Self {
            low_time,
            ..Default::default()
        }
    }

    pub fn length(&self) -> i64 {
        self.low_length.saturating_add(self.high_length)
    }

    /// Both halves observed, in order, with a non-zero duration.
    pub fn is_valid(&self) -> bool {
        self.low_time > 0
            && self.low_length > 0
            && self.high_time > 0
            && self.high_length > 0
            && self.low_time < self.high_time
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "low {}us @ {}, high {}us @ {}",
            self.low_length, self.low_time, self.high_length, self.high_time
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    // waiting for the first falling edge
    Unsynced,
    Low,
    High,
}

/// Pairs consecutive edges into [`Cycle`]s.
///
/// Every falling edge closes the cycle in progress and opens the low half of
/// the next one. A repeated polarity means an edge was missed, so the partial
/// cycle is thrown away. So is a half whose duration does not fit an `i64`,
/// since timestamps come straight from the capture source.
pub struct CycleAssembler {
    phase: Phase,
    current: Cycle,
}

impl CycleAssembler {
    pub fn new() -> Self {
        Self {
            phase: Phase::Unsynced,
            current: Cycle::default(),
        }
    }

    /// Feeds one edge, returning a cycle once both of its halves are known.
    pub fn push(&mut self, edge: Edge) -> Option<Cycle> {
        match (self.phase, edge.rising) {
            (Phase::Unsynced, false) => {
                self.begin(edge.timestamp_us);
                None
            }
            (Phase::Unsynced, true) => None,
            (Phase::Low, true) => {
                let Some(low_length) = edge.timestamp_us.checked_sub(self.current.low_time) else {
                    self.reset();
                    return None;
                };
                self.current.high_time = edge.timestamp_us;
                self.current.low_length = low_length;
                self.phase = Phase::High;
                None
            }
            // missed the rising edge, restart the low half from here
            (Phase::Low, false) => {
                self.begin(edge.timestamp_us);
                None
            }
            (Phase::High, false) => {
                let Some(high_length) = edge.timestamp_us.checked_sub(self.current.high_time)
                else {
                    // the falling edge is still usable as the start of the next cycle
                    self.begin(edge.timestamp_us);
                    return None;
                };
                self.current.high_length = high_length;
                let complete = self.current;
                self.begin(edge.timestamp_us);
                Some(complete)
            }
            // missed a falling edge, nothing usable until the next one
            (Phase::High, true) => {
                self.reset();
                None
            }
        }
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Unsynced;
        self.current = Cycle::default();
    }

    fn begin(&mut self, low_time: i64) {
        self.current = Cycle::starting_at(low_time);
        self.phase = Phase::Low;
    }
}

impl Default for CycleAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(assembler: &mut CycleAssembler, edges: &[(i64, bool)]) -> Vec<Cycle> {
        edges
            .iter()
            .filter_map(|&(t, rising)| assembler.push(Edge::new(t, rising)))
            .collect()
    }

    #[test]
    fn cycle_is_emitted_on_closing_falling_edge() {
        let mut assembler = CycleAssembler::new();
        let cycles = feed(&mut assembler, &[(100, false), (400, true)]);
        assert!(cycles.is_empty(), "high half is still open");

        let cycles = feed(&mut assembler, &[(1900, false)]);
        assert_eq!(
            cycles,
            vec![Cycle {
                low_time: 100,
                low_length: 300,
                high_time: 400,
                high_length: 1500,
            }]
        );
        assert_eq!(cycles[0].length(), 1800);
        assert!(cycles[0].is_valid());
    }

    #[test]
    fn closing_edge_opens_next_cycle() {
        let mut assembler = CycleAssembler::new();
        let cycles = feed(
            &mut assembler,
            &[(100, false), (400, true), (1900, false), (2200, true), (3200, false)],
        );
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[1].low_time, 1900);
        assert_eq!(cycles[1].high_length, 1000);
    }

    #[test]
    fn leading_rising_edge_is_ignored() {
        let mut assembler = CycleAssembler::new();
        let cycles = feed(&mut assembler, &[(50, true), (100, false), (400, true), (900, false)]);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].low_time, 100);
    }

    #[test]
    fn repeated_polarity_drops_partial_cycle() {
        let mut assembler = CycleAssembler::new();

        // two falling edges: the low half restarts at the second one
        let cycles = feed(&mut assembler, &[(100, false), (250, false), (550, true), (2050, false)]);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].low_time, 250);
        assert_eq!(cycles[0].low_length, 300);

        // two rising edges: nothing until a fresh falling edge
        let mut assembler = CycleAssembler::new();
        let cycles = feed(
            &mut assembler,
            &[(100, false), (400, true), (700, true), (900, false), (1200, true)],
        );
        assert!(cycles.is_empty());
        let cycles = feed(&mut assembler, &[(2200, false)]);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].low_time, 900);
    }

    #[test]
    fn overflowing_timestamps_drop_the_cycle() {
        let mut assembler = CycleAssembler::new();
        let cycles = feed(&mut assembler, &[(-10, false), (i64::MAX, true)]);
        assert!(cycles.is_empty());

        // the assembler is usable again from the next falling edge
        let cycles = feed(&mut assembler, &[(100, false), (400, true), (1900, false)]);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].low_time, 100);

        let mut assembler = CycleAssembler::new();
        let cycles = feed(
            &mut assembler,
            &[(i64::MAX - 10, false), (i64::MAX, true), (i64::MIN, false)],
        );
        assert!(cycles.is_empty());
        let cycles = feed(&mut assembler, &[(i64::MIN + 300, true), (i64::MIN + 1800, false)]);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].low_time, i64::MIN);
        assert_eq!(cycles[0].high_length, 1500);
    }

    #[test]
    fn length_saturates() {
        let cycle = Cycle {
            low_time: 1,
            low_length: i64::MAX,
            high_time: 2,
            high_length: i64::MAX,
        };
        assert_eq!(cycle.length(), i64::MAX);
    }

    #[test]
    fn validity_requires_both_halves_in_order() {
        let valid = Cycle {
            low_time: 10,
            low_length: 300,
            high_time: 310,
            high_length: 1200,
        };
        assert!(valid.is_valid());

        assert!(!Cycle::starting_at(10).is_valid());
        assert!(!Cycle { low_time: 0, ..valid }.is_valid());
        assert!(!Cycle { high_length: 0, ..valid }.is_valid());
        assert!(!Cycle { high_time: 5, ..valid }.is_valid());
    }
}
