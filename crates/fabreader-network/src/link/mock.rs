//! Mock link for tests and for running without network hardware.

use super::NetworkLink;
use crate::error::{LinkError, LinkResult};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Address reported while the mock link is up (TEST-NET-1).
pub const MOCK_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10));

#[derive(Debug, Default)]
struct Shared {
    up: AtomicBool,
    refuse_bring_up: AtomicBool,
    bring_ups: AtomicU32,
    maintains: AtomicU32,
    tear_downs: AtomicU32,
}

/// Link whose state is driven by a [`MockLinkHandle`].
///
/// `bring_up` succeeds immediately unless refused through the handle.
#[derive(Debug, Clone)]
pub struct MockLink {
    shared: Arc<Shared>,
}

impl MockLink {
    pub fn new() -> (Self, MockLinkHandle) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockLinkHandle { shared },
        )
    }
}

impl NetworkLink for MockLink {
    async fn bring_up(&self) -> LinkResult<()> {
        self.shared.bring_ups.fetch_add(1, Ordering::SeqCst);
        if self.shared.refuse_bring_up.load(Ordering::SeqCst) {
            return Err(LinkError::bring_up_timeout("mock0", 1));
        }
        self.shared.up.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.shared.up.load(Ordering::SeqCst)
    }

    async fn maintain(&self) {
        self.shared.maintains.fetch_add(1, Ordering::SeqCst);
    }

    fn current_address(&self) -> Option<IpAddr> {
        self.is_up().then_some(MOCK_ADDRESS)
    }

    async fn tear_down(&self) {
        self.shared.tear_downs.fetch_add(1, Ordering::SeqCst);
        self.shared.up.store(false, Ordering::SeqCst);
    }
}

/// Control handle for a [`MockLink`]. Clones share state.
#[derive(Debug, Clone)]
pub struct MockLinkHandle {
    shared: Arc<Shared>,
}

impl MockLinkHandle {
    /// Force the carrier state, e.g. to simulate a cable pull.
    pub fn set_up(&self, up: bool) {
        self.shared.up.store(up, Ordering::SeqCst);
    }

    /// Make subsequent bring-ups fail (or succeed again).
    pub fn refuse_bring_up(&self, refuse: bool) {
        self.shared.refuse_bring_up.store(refuse, Ordering::SeqCst);
    }

    pub fn is_up(&self) -> bool {
        self.shared.up.load(Ordering::SeqCst)
    }

    pub fn bring_up_calls(&self) -> u32 {
        self.shared.bring_ups.load(Ordering::SeqCst)
    }

    pub fn maintain_calls(&self) -> u32 {
        self.shared.maintains.load(Ordering::SeqCst)
    }

    pub fn tear_down_calls(&self) -> u32 {
        self.shared.tear_downs.load(Ordering::SeqCst)
    }
}
