//! Expandable panel ("island") widget state machine
//!
//! A two-state animated container. The state machine here knows nothing about
//! rendering; the embedding loop schedules the two transition timers
//! (content phase at 0.3 x D, completion at D) and calls back in.

use std::time::Duration;

pub const DEFAULT_ANIMATION_MS: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Collapsed,
    Expanded,
}

/// Where inside the panel a click landed. Clicks on inner controls must not
/// collapse an expanded panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    Surface,
    Interactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Expanding { content_shown: bool },
    Collapsing,
}

#[derive(Debug)]
pub struct Panel {
    state: PanelState,
    transition: Option<Transition>,
    content: String,
    default_content: String,
    animation: Duration,
}

impl Panel {
    pub fn new(animation: Duration) -> Self {
        Self {
            state: PanelState::Collapsed,
            transition: None,
            content: String::new(),
            default_content: String::new(),
            animation,
        }
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn is_expanded(&self) -> bool {
        self.state == PanelState::Expanded
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    /// Start expanding. No-op while already expanded or mid-transition.
    /// Returns true when a transition was started.
    pub fn expand(&mut self) -> bool {
        if self.state == PanelState::Expanded || self.transition.is_some() {
            return false;
        }
        self.transition = Some(Transition::Expanding {
            content_shown: false,
        });
        true
    }

    /// Start collapsing. No-op while already collapsed or mid-transition.
    pub fn collapse(&mut self) -> bool {
        if self.state == PanelState::Collapsed || self.transition.is_some() {
            return false;
        }
        self.transition = Some(Transition::Collapsing);
        true
    }

    /// A direct click on the panel toggles it, except clicks on interactive
    /// descendants while expanded. Returns true when a transition started.
    pub fn handle_click(&mut self, target: ClickTarget) -> bool {
        if self.transition.is_some() {
            return false;
        }
        if self.is_expanded() {
            if target == ClickTarget::Interactive {
                return false;
            }
            self.collapse()
        } else {
            self.expand()
        }
    }

    /// Mid-transition callback: partway through an expansion the expanded
    /// content becomes visible. Ignored outside an expansion.
    pub fn content_phase(&mut self) {
        if let Some(Transition::Expanding { content_shown }) = &mut self.transition {
            *content_shown = true;
        }
    }

    /// Transition completion callback: settles the target state and clears
    /// the in-flight guard.
    pub fn finish_transition(&mut self) {
        match self.transition.take() {
            Some(Transition::Expanding { .. }) => self.state = PanelState::Expanded,
            Some(Transition::Collapsing) => self.state = PanelState::Collapsed,
            None => {}
        }
    }

    /// Replace the expanded-state content immediately; panel state is
    /// unaffected.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    /// Replace the collapsed-face content.
    pub fn set_default_content(&mut self, content: impl Into<String>) {
        self.default_content = content.into();
    }

    /// What the panel currently shows. The expanded content only appears
    /// once the content phase of an expansion has passed, never before the
    /// container started growing.
    pub fn visible_content(&self) -> &str {
        match (self.state, self.transition) {
            (_, Some(Transition::Expanding { content_shown: true })) => &self.content,
            (_, Some(Transition::Expanding { .. })) => &self.default_content,
            (_, Some(Transition::Collapsing)) => &self.default_content,
            (PanelState::Expanded, None) => &self.content,
            (PanelState::Collapsed, None) => &self.default_content,
        }
    }

    /// Delay from transition start until the content swap.
    pub fn content_phase_delay(&self) -> Duration {
        self.animation.mul_f64(0.3)
    }

    pub fn transition_duration(&self) -> Duration {
        self.animation
    }
}

impl Default for Panel {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_ANIMATION_MS))
    }
}
