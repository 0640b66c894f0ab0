/// Detects unpressed → pressed transitions between consecutive polls
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeDetector {
    previous: bool,
}

impl EdgeDetector {
    /// Feeds the current button state; true on a rising edge
    pub fn update(&mut self, pressed: bool) -> bool {
        let rising = pressed && !self.previous;
        self.previous = pressed;
        rising
    }

    pub fn is_pressed(&self) -> bool {
        self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_rising_edges_only() {
        let mut detector = EdgeDetector::default();
        let edges: Vec<usize> = [false, true, true, false, true]
            .into_iter()
            .enumerate()
            .filter(|(_, pressed)| detector.update(*pressed))
            .map(|(idx, _)| idx)
            .collect();

        assert_eq!(edges, vec![1, 4]);
        assert!(detector.is_pressed());
    }

    #[test]
    fn held_from_the_first_poll_is_an_edge() {
        let mut detector = EdgeDetector::default();
        assert!(detector.update(true));
        assert!(!detector.update(true));
    }
}
