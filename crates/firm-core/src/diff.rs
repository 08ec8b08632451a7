use crate::AgentState;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentChange {
    pub agent: AgentState,
    pub last_action: String,
}

/// Agents present in both snapshots whose latest action changed, in `current` order.
///
/// Agents seen for the first time produce nothing: there is no earlier action
/// to compare against. A history that became empty is not a change either.
pub fn diff_agents(previous: &[AgentState], current: &[AgentState]) -> Vec<AgentChange> {
    let before: HashMap<&str, Option<&str>> = previous
        .iter()
        .map(|agent| (agent.name.as_str(), agent.last_action()))
        .collect();

    current
        .iter()
        .filter_map(|agent| {
            let prior = before.get(agent.name.as_str())?;
            let latest = agent.last_action()?;
            if *prior == Some(latest) {
                return None;
            }
            Some(AgentChange {
                agent: agent.clone(),
                last_action: latest.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str, actions: &[&str]) -> AgentState {
        AgentState {
            name: name.to_string(),
            current_room: Some("Lab".to_string()),
            action_history: actions.iter().map(|a| a.to_string()).collect(),
            ..AgentState::default()
        }
    }

    #[test]
    fn appended_action_is_reported() {
        let previous = vec![agent("Alice", &["wait"])];
        let current = vec![agent("Alice", &["wait", "move:Lab"])];
        let changes = diff_agents(&previous, &current);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].agent.name, "Alice");
        assert_eq!(changes[0].last_action, "move:Lab");
    }

    #[test]
    fn new_agents_are_not_reported_on_first_sighting() {
        let previous = vec![agent("Alice", &["wait"])];
        let current = vec![agent("Alice", &["wait"]), agent("Bob", &["code"])];
        assert!(diff_agents(&previous, &current).is_empty());
    }

    #[test]
    fn empty_to_defined_is_a_change_but_empty_to_empty_is_not() {
        let previous = vec![agent("Alice", &[]), agent("Bob", &[])];
        let current = vec![agent("Alice", &["idle"]), agent("Bob", &[])];
        let changes = diff_agents(&previous, &current);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].agent.name, "Alice");
    }

    #[test]
    fn cleared_history_is_not_a_change() {
        let previous = vec![agent("Alice", &["wait"])];
        let current = vec![agent("Alice", &[])];
        assert!(diff_agents(&previous, &current).is_empty());
    }

    #[test]
    fn equal_last_action_is_not_a_change_even_if_history_was_replaced() {
        let previous = vec![agent("Alice", &["a", "b", "report"])];
        let current = vec![agent("Alice", &["report"])];
        assert!(diff_agents(&previous, &current).is_empty());
    }

    #[test]
    fn shorter_replacement_with_different_tail_is_a_change() {
        let previous = vec![agent("Alice", &["a", "b", "c"])];
        let current = vec![agent("Alice", &["z"])];
        let changes = diff_agents(&previous, &current);
        assert_eq!(changes[0].last_action, "z");
    }

    #[test]
    fn output_follows_current_order() {
        let previous = vec![agent("Alice", &["a"]), agent("Bob", &["a"])];
        let current = vec![agent("Bob", &["b"]), agent("Alice", &["b"])];
        let names: Vec<String> = diff_agents(&previous, &current)
            .into_iter()
            .map(|change| change.agent.name)
            .collect();
        assert_eq!(names, vec!["Bob", "Alice"]);
    }

    #[test]
    fn removed_agents_are_ignored() {
        let previous = vec![agent("Alice", &["a"]), agent("Bob", &["a"])];
        let current = vec![agent("Alice", &["a"])];
        assert!(diff_agents(&previous, &current).is_empty());
    }
}
