use std::sync::Arc;

use tokio::sync::watch;

use crate::config::RouteNames;
use crate::models::SessionState;
use crate::providers::NavigationController;

use super::{decide, decide_holding, NavigationDecision, Route, ScreenRequirement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenPolicy {
    /// A content screen guarded by its requirement.
    Protected(ScreenRequirement),
    /// One of the gate's own screens (Login, PendingApproval).
    Holding(Route),
}

/// Per-screen adapter between decisions and the navigation controller.
///
/// Remembers the previous decision and resets the stack only when the decision
/// changes to a redirect whose target is not already the root.
pub struct ScreenGate {
    policy: ScreenPolicy,
    routes: RouteNames,
    navigator: Arc<dyn NavigationController>,
    last: Option<NavigationDecision>,
}

impl ScreenGate {
    pub fn new(policy: ScreenPolicy, routes: RouteNames, navigator: Arc<dyn NavigationController>) -> Self {
        Self {
            policy,
            routes,
            navigator,
            last: None,
        }
    }

    pub fn protected(
        requirement: ScreenRequirement,
        routes: RouteNames,
        navigator: Arc<dyn NavigationController>,
    ) -> Self {
        Self::new(ScreenPolicy::Protected(requirement), routes, navigator)
    }

    pub fn holding(screen: Route, routes: RouteNames, navigator: Arc<dyn NavigationController>) -> Self {
        Self::new(ScreenPolicy::Holding(screen), routes, navigator)
    }

    pub fn policy(&self) -> ScreenPolicy {
        self.policy
    }

    pub fn last_decision(&self) -> Option<NavigationDecision> {
        self.last
    }

    pub fn decide(&self, state: &SessionState) -> NavigationDecision {
        match self.policy {
            ScreenPolicy::Protected(requirement) => decide(state, requirement),
            ScreenPolicy::Holding(screen) => decide_holding(state, screen),
        }
    }

    /// Re-evaluate against `state`, navigating if needed. Safe to call on every
    /// render.
    pub fn evaluate(&mut self, state: &SessionState) -> NavigationDecision {
        let decision = self.decide(state);
        if self.last == Some(decision) {
            return decision;
        }
        self.last = Some(decision);

        if let NavigationDecision::RedirectTo(route) = decision {
            let target = self.routes.name(route);
            if self.navigator.current_root().as_deref() != Some(target) {
                tracing::debug!(policy = ?self.policy, route = %target, phase = %state.phase(), "redirecting");
                self.navigator.reset_to(target);
            }
        }
        decision
    }

    /// Evaluate on mount and again on every session change until the store
    /// goes away.
    pub async fn follow(mut self, mut changes: watch::Receiver<SessionState>) {
        loop {
            let state = changes.borrow_and_update().clone();
            self.evaluate(&state);
            if changes.changed().await.is_err() {
                break;
            }
        }
    }
}
