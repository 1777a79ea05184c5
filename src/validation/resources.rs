//! System headroom probe consulted by the resource check.

/// Point-in-time load figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceSnapshot {
    pub active_generations: usize,
}

pub trait ResourceProbe: Send + Sync {
    fn snapshot(&self) -> ResourceSnapshot;
}

/// Probe for contexts without a coordinator (reports zero load).
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleResourceProbe;

impl ResourceProbe for IdleResourceProbe {
    fn snapshot(&self) -> ResourceSnapshot {
        ResourceSnapshot::default()
    }
}
