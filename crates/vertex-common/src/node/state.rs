//! The node lifecycle state machine (spec.md §4.2).

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NodeState {
    New,
    Running,
    Stopping,
    Stopped,
}

impl NodeState {
    /// Valid transitions are strictly `New -> Running -> Stopping -> Stopped`; a node may only
    /// be started once (spec.md §4.2).
    #[must_use]
    pub fn can_transition_to(self, next: NodeState) -> bool {
        matches!(
            (self, next),
            (NodeState::New, NodeState::Running)
                | (NodeState::Running, NodeState::Stopping)
                | (NodeState::Stopping, NodeState::Stopped)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_forward_transitions_are_legal() {
        assert!(NodeState::New.can_transition_to(NodeState::Running));
        assert!(!NodeState::New.can_transition_to(NodeState::Stopped));
        assert!(!NodeState::Running.can_transition_to(NodeState::New));
        assert!(!NodeState::Stopped.can_transition_to(NodeState::Running));
    }
}
