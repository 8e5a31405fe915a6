//! Link-delay state machine (§4.6): wrap detection, delay onset/recovery.

use crate::link::LinkSet;

const WRAP_THRESHOLD_USEC: u64 = 60_000_000;
const DELAY_ONSET_USEC: u64 = 1_000_000;
const DELAY_RECOVERY_USEC: u64 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayOutcome {
    Wrapped,
    DelayOnset,
    DelayRecovery,
    Normal,
}

impl LinkSet {
    /// Call for every inbound message carrying a `usec` timestamp, on the
    /// link it arrived on.
    pub fn on_usec(&mut self, link_num: usize, usec: u64) -> DelayOutcome {
        let u_link = self.links[link_num].highest_usec;

        if usec.saturating_add(WRAP_THRESHOLD_USEC) < u_link {
            self.highest_usec = usec;
            for link in &mut self.links {
                link.highest_usec = usec;
                link.link_delayed = false;
            }
            return DelayOutcome::Wrapped;
        }

        self.links[link_num].highest_usec = usec;
        self.highest_usec = self.highest_usec.max(usec);

        let was_delayed = self.links[link_num].link_delayed;
        if usec.saturating_add(DELAY_ONSET_USEC) < self.highest_usec && !was_delayed {
            self.links[link_num].link_delayed = true;
            return DelayOutcome::DelayOnset;
        }
        if usec.saturating_add(DELAY_RECOVERY_USEC) >= self.highest_usec && was_delayed {
            self.links[link_num].link_delayed = false;
            return DelayOutcome::DelayRecovery;
        }
        DelayOutcome::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Link;
    use crate::transport::UdpTransport;

    async fn two_link_set() -> LinkSet {
        let t0 = UdpTransport::bind("127.0.0.1:0", false).await.unwrap();
        let t1 = UdpTransport::bind("127.0.0.1:0", false).await.unwrap();
        LinkSet::new(vec![Link::new(0, Box::new(t0)), Link::new(1, Box::new(t1))], 1)
    }

    #[tokio::test]
    async fn scenario_2_delay_onset_and_drop() {
        // spec.md §8 scenario 2.
        let mut set = two_link_set().await;
        assert_eq!(set.on_usec(0, 10_000_000), DelayOutcome::Normal);
        assert_eq!(set.on_usec(1, 10_000_000 + 2_000_000), DelayOutcome::Normal);
        let outcome = set.on_usec(0, 10_000_000 + 100_000);
        assert_eq!(outcome, DelayOutcome::DelayOnset);
        assert!(set.links[0].link_delayed);
    }

    #[tokio::test]
    async fn scenario_3_wrap_resets_all_links() {
        // spec.md §8 scenario 3.
        let mut set = two_link_set().await;
        set.links[0].highest_usec = 500_000_000;
        set.highest_usec = 500_000_000;
        let outcome = set.on_usec(0, 100_000_000);
        assert_eq!(outcome, DelayOutcome::Wrapped);
        assert_eq!(set.links[0].highest_usec, 100_000_000);
        assert_eq!(set.links[1].highest_usec, 100_000_000);
        assert_eq!(set.highest_usec, 100_000_000);
    }

    #[tokio::test]
    async fn delay_recovers_once_caught_up() {
        let mut set = two_link_set().await;
        set.on_usec(0, 10_000_000);
        set.on_usec(1, 10_000_000 + 2_000_000);
        set.on_usec(0, 10_000_000 + 100_000);
        assert!(set.links[0].link_delayed);

        let outcome = set.on_usec(0, 10_000_000 + 2_000_000 - 400_000);
        assert_eq!(outcome, DelayOutcome::DelayRecovery);
        assert!(!set.links[0].link_delayed);
    }
}
