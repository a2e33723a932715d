//! Re-entrancy guard for the render pipeline.
//!
//! The guard is a plain value. [`transition`] maps the current state and an
//! event to the next state plus a decision the engine acts on; nothing here
//! performs I/O.

use serde::Serialize;

/// Identifies one accepted render. Continuations and completions are only
/// honored for the live ticket.
pub type Ticket = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    Rendering(Ticket),
    Searching(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub state: GuardState,
    /// Term of a search whose lookup is still outstanding
    pub latch: Option<String>,
    next_ticket: Ticket,
}

impl Default for Guard {
    fn default() -> Self {
        Self {
            state: GuardState::Idle,
            latch: None,
            next_ticket: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardEvent {
    /// A fresh render of the current universe
    RenderRequested,
    /// Skip-guard continuation issued by the render holding `Ticket`
    RenderContinued(Ticket),
    RenderFinished(Ticket),
    RefreshRequested { scheduled: bool },
    SearchSubmitted(String),
    /// The outstanding lookup for this term produced a view
    SearchResolved(String),
    SearchCleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DropReason {
    /// Another render holds the guard
    Busy,
    /// A search owns the view
    Searching,
    /// The ticket is no longer live
    Stale,
    /// A search lookup is outstanding
    Latched,
    /// The same term is already displayed
    AlreadyActive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Render(Ticket),
    Continue(Ticket),
    Finished,
    Fetch,
    StartSearch(String),
    Released,
    /// Search mode left; the engine owes exactly one refresh
    Cleared,
    Dropped(DropReason),
    Ignored,
}

impl GuardDecision {
    pub fn is_dropped(&self) -> bool {
        matches!(self, GuardDecision::Dropped(_))
    }
}

/// The guard's transition table.
pub fn transition(guard: Guard, event: GuardEvent) -> (Guard, GuardDecision) {
    use GuardDecision as D;
    use GuardEvent as E;
    use GuardState as S;

    let Guard {
        state,
        latch,
        next_ticket,
    } = guard;
    let keep = |state: S, latch: Option<String>, decision: D| {
        (
            Guard {
                state,
                latch,
                next_ticket,
            },
            decision,
        )
    };

    match (state, event) {
        (S::Idle, E::RenderRequested) => (
            Guard {
                state: S::Rendering(next_ticket),
                latch,
                next_ticket: next_ticket + 1,
            },
            D::Render(next_ticket),
        ),
        (s @ S::Rendering(_), E::RenderRequested) => keep(s, latch, D::Dropped(DropReason::Busy)),
        (s @ S::Searching(_), E::RenderRequested) => {
            keep(s, latch, D::Dropped(DropReason::Searching))
        }

        (S::Rendering(live), E::RenderContinued(t)) if live == t => {
            keep(S::Rendering(live), latch, D::Continue(t))
        }
        (s, E::RenderContinued(_)) => keep(s, latch, D::Dropped(DropReason::Stale)),

        (S::Rendering(live), E::RenderFinished(t)) if live == t => {
            keep(S::Idle, latch, D::Finished)
        }
        (s, E::RenderFinished(_)) => keep(s, latch, D::Ignored),

        (s @ S::Searching(_), E::RefreshRequested { .. }) => {
            keep(s, latch, D::Dropped(DropReason::Searching))
        }
        (s, E::RefreshRequested { .. }) => keep(s, latch, D::Fetch),

        (s, E::SearchSubmitted(_)) if latch.is_some() => {
            keep(s, latch, D::Dropped(DropReason::Latched))
        }
        (S::Searching(active), E::SearchSubmitted(term)) if active == term => {
            keep(S::Searching(active), latch, D::Dropped(DropReason::AlreadyActive))
        }
        (_, E::SearchSubmitted(term)) => keep(
            S::Searching(term.clone()),
            Some(term.clone()),
            D::StartSearch(term),
        ),

        (s, E::SearchResolved(term)) if latch.as_deref() == Some(term.as_str()) => {
            keep(s, None, D::Released)
        }
        (s, E::SearchResolved(_)) => keep(s, latch, D::Ignored),

        (S::Searching(_), E::SearchCleared) => keep(S::Idle, None, D::Cleared),
        (s, E::SearchCleared) => keep(s, latch, D::Ignored),
    }
}

impl Guard {
    /// Apply `event` in place and return the decision.
    pub fn apply(&mut self, event: GuardEvent) -> GuardDecision {
        let (next, decision) = transition(std::mem::take(self), event);
        *self = next;
        decision
    }

    pub fn is_live(&self, ticket: Ticket) -> bool {
        self.state == GuardState::Rendering(ticket)
    }

    pub fn search_term(&self) -> Option<&str> {
        match &self.state {
            GuardState::Searching(term) => Some(term.as_str()),
            _ => None,
        }
    }

    /// True while `term` is displayed and its lookup is still outstanding
    pub fn owns_search(&self, term: &str) -> bool {
        self.search_term() == Some(term) && self.latch.as_deref() == Some(term)
    }
}
