use std::fmt;

/// Why a page counted against its site's failure streak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Timeout, connection failure or error status after all retries
    Network,
    /// The page answered with an archive code (404/410)
    Archived,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

/// Consecutive-failure streak for one site during one cycle
///
/// Both kinds feed the same streak, so a site whose pages are all being
/// archived trips the dead threshold exactly like an unreachable one. The
/// kinds are still counted apart so the dead reason tells them apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureTally {
    consecutive: u32,
    network: u32,
    archived: u32,
    last_error: Option<String>,
}

impl FailureTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure and returns the streak length
    pub fn record(&mut self, kind: FailureKind, detail: impl Into<String>) -> u32 {
        self.consecutive += 1;
        match kind {
            FailureKind::Network => self.network += 1,
            FailureKind::Archived => self.archived += 1,
        }
        self.last_error = Some(detail.into());
        self.consecutive
    }

    /// A successful fetch ends the streak
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn count(&self, kind: FailureKind) -> u32 {
        match kind {
            FailureKind::Network => self.network,
            FailureKind::Archived => self.archived,
        }
    }

    pub fn reached(&self, threshold: u32) -> bool {
        self.consecutive >= threshold
    }

    /// Human-readable reason recorded in the dead ledger
    pub fn reason(&self) -> String {
        let mut reason = format!(
            "{} consecutive failures ({} network, {} archived)",
            self.consecutive, self.network, self.archived
        );
        if let Some(last) = &self.last_error {
            reason.push_str("; last: ");
            reason.push_str(last);
        }
        reason
    }
}
