//! Link (§4.2) and Link Set / Master Selector (§3, §4.3).

use std::time::Instant;

use crate::codec::{FrameCodec, SimpleCodec};
use crate::transport::Transport;

/// One vehicle link: a transport plus its codec and health state. `link_num`
/// is 0-based and stable for the process lifetime; link 0 is the primary
/// per §3's invariant.
pub struct Link {
    pub link_num: usize,
    pub transport: Box<dyn Transport>,
    pub codec: Box<dyn FrameCodec>,
    pub link_error: bool,
    pub link_delayed: bool,
    pub last_heartbeat_wall: Option<Instant>,
    pub highest_usec: u64,
    pub param_fetch_complete: bool,
    /// One-shot flags so "print once" behaviors (§4.5, §4.6) don't spam.
    pub warned_delayed: bool,
    pub warned_bad_data: bool,
    pub messages_in: u64,
}

impl Link {
    pub fn new(link_num: usize, transport: Box<dyn Transport>) -> Self {
        Self {
            link_num,
            transport,
            codec: Box::new(SimpleCodec::new()),
            link_error: false,
            link_delayed: false,
            last_heartbeat_wall: None,
            highest_usec: 0,
            param_fetch_complete: false,
            warned_delayed: false,
            warned_bad_data: false,
            messages_in: 0,
        }
    }

    /// §4.2: ready for the poller iff the transport exposes a readiness
    /// handle, or it doesn't but has bytes buffered right now.
    pub fn is_ready_for_poll(&self) -> bool {
        self.transport.has_readiness_handle() || self.transport.bytes_waiting() > 0
    }
}

/// Ordered collection of links plus the 1-based preferred-link index (§3).
pub struct LinkSet {
    pub links: Vec<Link>,
    pub preferred_link: usize,
    /// Fleet-wide high-water mark used by the link-delay state machine (§4.6).
    pub highest_usec: u64,
}

impl LinkSet {
    pub fn new(links: Vec<Link>, preferred_link: usize) -> Self {
        Self {
            links,
            preferred_link,
            highest_usec: 0,
        }
    }

    fn normalize(&mut self) {
        if self.preferred_link == 0 || self.preferred_link > self.links.len() {
            self.preferred_link = 1;
        }
    }

    /// §4.3's four-step selection rule. Returns the index into `self.links`.
    pub fn current_master_index(&mut self) -> usize {
        self.normalize();
        let preferred_idx = self.preferred_link - 1;
        if !self.links[preferred_idx].link_error {
            return preferred_idx;
        }
        if let Some(idx) = self.links.iter().position(|l| !l.link_error) {
            return idx;
        }
        preferred_idx
    }

    pub fn current_master(&mut self) -> &mut Link {
        let idx = self.current_master_index();
        &mut self.links[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::UdpTransport;

    async fn dummy_link(link_num: usize) -> Link {
        let t = UdpTransport::bind("127.0.0.1:0", false).await.unwrap();
        Link::new(link_num, Box::new(t))
    }

    #[tokio::test]
    async fn normalizes_out_of_range_preferred_link() {
        let links = vec![dummy_link(0).await, dummy_link(1).await];
        let mut set = LinkSet::new(links, 9);
        let idx = set.current_master_index();
        assert_eq!(idx, 0);
        assert_eq!(set.preferred_link, 1);
    }

    #[tokio::test]
    async fn failover_to_first_healthy_link() {
        let links = vec![dummy_link(0).await, dummy_link(1).await];
        let mut set = LinkSet::new(links, 1);
        set.links[0].link_error = true;
        assert_eq!(set.current_master_index(), 1);
    }

    #[tokio::test]
    async fn stays_on_preferred_when_healthy_repeatedly() {
        let links = vec![dummy_link(0).await, dummy_link(1).await];
        let mut set = LinkSet::new(links, 2);
        assert_eq!(set.current_master_index(), 1);
        assert_eq!(set.current_master_index(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_preferred_when_all_errored() {
        let links = vec![dummy_link(0).await, dummy_link(1).await];
        let mut set = LinkSet::new(links, 2);
        set.links[0].link_error = true;
        set.links[1].link_error = true;
        assert_eq!(set.current_master_index(), 1);
    }
}
