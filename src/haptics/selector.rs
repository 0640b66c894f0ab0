use super::HapticChannel;

/// Number of selector slots: one per channel plus an idle slot
pub const SLOT_COUNT: u8 = 5;

/// Cycles through the haptic channels on each rising edge
///
/// Slots `0..=3` select [`HapticChannel::ALL`] in order, slot `4` selects no
/// channel. Advancing from slot `4` wraps back to `0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelSelector {
    slot: u8,
}

impl ChannelSelector {
    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub fn channel(&self) -> Option<HapticChannel> {
        HapticChannel::ALL.get(usize::from(self.slot)).copied()
    }

    /// Moves to the next slot and returns the newly selected channel
    pub fn advance(&mut self) -> Option<HapticChannel> {
        self.slot = (self.slot + 1) % SLOT_COUNT;
        self.channel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn starts_on_left_motor() {
        let selector = ChannelSelector::default();
        assert_eq!(selector.slot(), 0);
        assert_eq!(selector.channel(), Some(HapticChannel::LeftMotor));
    }

    #[test]
    fn five_edges_cycle_back_to_start() {
        let mut selector = ChannelSelector::default();
        let slots: Vec<u8> = (0..5)
            .map(|_| {
                selector.advance();
                selector.slot()
            })
            .collect();

        assert_eq!(slots, vec![1, 2, 3, 4, 0]);
    }

    #[test]
    fn idle_slot_selects_nothing() {
        let mut selector = ChannelSelector::default();
        assert_eq!(selector.advance(), Some(HapticChannel::RightMotor));
        assert_eq!(selector.advance(), Some(HapticChannel::LeftTrigger));
        assert_eq!(selector.advance(), Some(HapticChannel::RightTrigger));
        assert_eq!(selector.advance(), None);
        assert_eq!(selector.advance(), Some(HapticChannel::LeftMotor));
    }

    proptest! {
        #[test]
        fn slot_is_edge_count_modulo_five(edges in 0usize..200) {
            let mut selector = ChannelSelector::default();
            for _ in 0..edges {
                selector.advance();
            }
            prop_assert_eq!(usize::from(selector.slot()), edges % usize::from(SLOT_COUNT));
        }
    }
}
