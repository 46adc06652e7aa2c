/// Which area the player has reached, and whether its intro has been shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AreaProgress {
    current_level: u32,
    transition_shown: bool,
}

impl AreaProgress {
    pub fn new(current_level: u32, transition_shown: bool) -> Self {
        Self {
            current_level,
            transition_shown,
        }
    }

    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    pub fn transition_shown(&self) -> bool {
        self.transition_shown
    }

    /// Moves to the next area; its transition has not been shown yet.
    pub fn advance(&mut self) -> u32 {
        self.current_level = self.current_level.saturating_add(1);
        self.transition_shown = false;
        self.current_level
    }

    /// Returns `false` when the flag was already set.
    pub fn mark_transition_shown(&mut self) -> bool {
        !std::mem::replace(&mut self.transition_shown, true)
    }
}
