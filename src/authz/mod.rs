//! Route guard.
//!
//! `decide` is a pure function of the session state and a screen's
//! requirement. `ScreenGate` is the adapter that turns a change in decision
//! into at most one navigation reset.

mod gate;
mod guard;

pub use gate::{ScreenGate, ScreenPolicy};
pub use guard::{decide, decide_holding, landing, use_session_decision};

use serde::{Deserialize, Serialize};

/// Screens the gate can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    Login,
    PendingApproval,
    Main,
}

/// Declared by each protected screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScreenRequirement {
    pub require_approval: bool,
}

impl ScreenRequirement {
    pub fn approved_only() -> Self {
        Self { require_approval: true }
    }

    pub fn signed_in() -> Self {
        Self { require_approval: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationDecision {
    Render,
    RedirectTo(Route),
}

impl NavigationDecision {
    pub fn redirect_target(&self) -> Option<Route> {
        match self {
            NavigationDecision::Render => None,
            NavigationDecision::RedirectTo(route) => Some(*route),
        }
    }
}
