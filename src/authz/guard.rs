use crate::models::{SessionPhase, SessionState};
use crate::session::SessionStore;

use super::{NavigationDecision, Route, ScreenRequirement};

/// Decide whether a protected screen may render.
///
/// Fails closed: anything short of a confirmed record, and any state whose
/// parts disagree, goes to Login.
pub fn decide(state: &SessionState, req: ScreenRequirement) -> NavigationDecision {
    if !state.is_consistent() {
        return NavigationDecision::RedirectTo(Route::Login);
    }

    match state.phase() {
        SessionPhase::SignedOut | SessionPhase::Authenticating | SessionPhase::AwaitingRecord => {
            NavigationDecision::RedirectTo(Route::Login)
        }
        SessionPhase::Unapproved if req.require_approval => {
            NavigationDecision::RedirectTo(Route::PendingApproval)
        }
        SessionPhase::Unapproved | SessionPhase::Approved => NavigationDecision::Render,
    }
}

/// Where the app should rest for a given state.
pub fn landing(state: &SessionState) -> Route {
    if !state.is_consistent() {
        return Route::Login;
    }

    match state.phase() {
        SessionPhase::SignedOut | SessionPhase::Authenticating | SessionPhase::AwaitingRecord => Route::Login,
        SessionPhase::Unapproved => Route::PendingApproval,
        SessionPhase::Approved => Route::Main,
    }
}

/// Decision for the Login and PendingApproval screens themselves: stay while
/// the state belongs here, move on to the landing route once it does not.
pub fn decide_holding(state: &SessionState, screen: Route) -> NavigationDecision {
    let target = landing(state);
    if target == screen {
        NavigationDecision::Render
    } else {
        NavigationDecision::RedirectTo(target)
    }
}

/// Decision for a screen mounted against the live session.
pub fn use_session_decision(store: &SessionStore, require_approval: bool) -> NavigationDecision {
    decide(&store.state(), ScreenRequirement { require_approval })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthorizationRecord, Identity, Role};
    use chrono::Utc;

    fn identity() -> Identity {
        Identity::new("u1", "dev@example.com")
    }

    fn with_approval(approved: bool) -> SessionState {
        SessionState::with_record(identity(), AuthorizationRecord::new("u1", Role::Member, approved, Utc::now()))
    }

    fn every_state() -> Vec<SessionState> {
        vec![
            SessionState::signed_out(),
            SessionState::authenticating(),
            SessionState::awaiting_record(identity()),
            with_approval(false),
            with_approval(true),
        ]
    }

    #[test]
    fn render_only_for_approved_or_unapproved_bypass() {
        for state in every_state() {
            for require_approval in [true, false] {
                let decision = decide(&state, ScreenRequirement { require_approval });
                let expected_render = state.phase() == SessionPhase::Approved
                    || (state.phase() == SessionPhase::Unapproved && !require_approval);
                assert_eq!(decision == NavigationDecision::Render, expected_render, "{state:?} {require_approval}");
            }
        }
    }

    #[test]
    fn pre_record_phases_always_go_to_login() {
        for state in every_state().into_iter().take(3) {
            assert_eq!(decide(&state, ScreenRequirement::approved_only()), NavigationDecision::RedirectTo(Route::Login));
            assert_eq!(decide(&state, ScreenRequirement::signed_in()), NavigationDecision::RedirectTo(Route::Login));
        }
    }

    #[test]
    fn unapproved_goes_to_pending_when_approval_required() {
        assert_eq!(
            decide(&with_approval(false), ScreenRequirement::approved_only()),
            NavigationDecision::RedirectTo(Route::PendingApproval)
        );
    }

    #[test]
    fn inconsistent_state_fails_closed() {
        let mut state = with_approval(false);
        state.phase = SessionPhase::Approved;
        assert_eq!(decide(&state, ScreenRequirement::signed_in()), NavigationDecision::RedirectTo(Route::Login));

        let mut orphan = SessionState::signed_out();
        orphan.phase = SessionPhase::Approved;
        assert_eq!(decide(&orphan, ScreenRequirement::signed_in()), NavigationDecision::RedirectTo(Route::Login));
        assert_eq!(landing(&orphan), Route::Login);
    }

    #[test]
    fn holding_screens_move_on() {
        assert_eq!(decide_holding(&SessionState::signed_out(), Route::Login), NavigationDecision::Render);
        assert_eq!(
            decide_holding(&with_approval(false), Route::Login),
            NavigationDecision::RedirectTo(Route::PendingApproval)
        );
        assert_eq!(
            decide_holding(&with_approval(true), Route::PendingApproval),
            NavigationDecision::RedirectTo(Route::Main)
        );
    }
}
