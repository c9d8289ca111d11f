/// GPU context lifecycle as seen by the frame controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Live,
    Lost,
    /// Context came back; resources are rebuilt but the reload has not been
    /// shown yet.
    Restoring,
}

#[derive(Debug)]
pub struct ContextRecovery {
    state: ContextState,
    losses: u32,
}

impl ContextRecovery {
    pub fn new() -> Self {
        Self {
            state: ContextState::Live,
            losses: 0,
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn is_lost(&self) -> bool {
        self.state == ContextState::Lost
    }

    pub fn losses(&self) -> u32 {
        self.losses
    }

    /// Returns `false` when the context was already lost.
    pub fn mark_lost(&mut self) -> bool {
        if self.state == ContextState::Lost {
            return false;
        }
        self.state = ContextState::Lost;
        self.losses += 1;
        true
    }

    /// Returns `false` when no loss was pending.
    pub fn mark_restored(&mut self) -> bool {
        if self.state != ContextState::Lost {
            return false;
        }
        self.state = ContextState::Restoring;
        true
    }

    /// Called once the reload after a restoration is visible again.
    pub fn mark_ready(&mut self) {
        if self.state == ContextState::Restoring {
            self.state = ContextState::Live;
        }
    }

    /// GPU handles may only be released while the context is fully live.
    pub fn may_dispose(&self) -> bool {
        self.state == ContextState::Live
    }

    /// Chooses what to reload after restoration: the URL last asked to bind,
    /// then the one known to be displayed, then the host's latest request.
    pub fn reload_target(
        last_bound: Option<&str>,
        displayed: Option<&str>,
        latest_requested: Option<&str>,
    ) -> Option<String> {
        last_bound
            .or(displayed)
            .or(latest_requested)
            .filter(|url| !url.is_empty())
            .map(str::to_owned)
    }
}

impl Default for ContextRecovery {
    fn default() -> Self {
        Self::new()
    }
}
