//! Compose-stack projection over the reconciled container set.
//!
//! Purely derived: recomputed from scratch after every container pass,
//! with no identity of its own beyond the grouping label. O(n log n) in
//! container count, which is nothing at GUI-refresh cadence.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::entity::ContainerEntity;

/// Aggregate state of a stack, derived from its members on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    AllRunning,
    AllStopped,
    Mixed,
}

pub struct Stack {
    pub name: String,
    pub containers: Vec<Arc<ContainerEntity>>,
}

impl Stack {
    pub fn state(&self) -> StackState {
        if self.containers.is_empty() {
            return StackState::Mixed;
        }
        if self.containers.iter().all(|c| c.state().is_running()) {
            StackState::AllRunning
        } else if self.containers.iter().all(|c| c.state().is_stopped()) {
            StackState::AllStopped
        } else {
            StackState::Mixed
        }
    }

    pub fn running_count(&self) -> usize {
        self.containers
            .iter()
            .filter(|c| c.state().is_running())
            .count()
    }
}

/// Stacks sorted by name plus the residual standalone containers.
pub struct StackView {
    pub stacks: Vec<Stack>,
    pub standalone: Vec<Arc<ContainerEntity>>,
}

/// Group containers by their compose-project label.
///
/// Within a stack, members are ordered by service label then name;
/// standalone containers are ordered by name.
pub fn group_by_stack(containers: &[Arc<ContainerEntity>]) -> StackView {
    let mut grouped: BTreeMap<String, Vec<Arc<ContainerEntity>>> = BTreeMap::new();
    let mut standalone: Vec<Arc<ContainerEntity>> = Vec::new();

    for container in containers {
        match container.stack_name() {
            Some(stack) => grouped.entry(stack).or_default().push(Arc::clone(container)),
            None => standalone.push(Arc::clone(container)),
        }
    }

    let stacks = grouped
        .into_iter()
        .map(|(name, mut members)| {
            members.sort_by_key(|c| (c.service_name().unwrap_or_default(), c.name()));
            Stack {
                name,
                containers: members,
            }
        })
        .collect();

    standalone.sort_by_key(|c| c.name());

    StackView { stacks, standalone }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ViewEntity;
    use chrono::Utc;
    use orbital_common::{
        ContainerRecord, ContainerState, COMPOSE_PROJECT_LABEL, COMPOSE_SERVICE_LABEL,
    };
    use std::collections::HashMap;

    fn entity(
        id: &str,
        name: &str,
        state: ContainerState,
        stack: Option<&str>,
        service: Option<&str>,
    ) -> Arc<ContainerEntity> {
        let mut labels = HashMap::new();
        if let Some(stack) = stack {
            labels.insert(COMPOSE_PROJECT_LABEL.to_string(), stack.to_string());
        }
        if let Some(service) = service {
            labels.insert(COMPOSE_SERVICE_LABEL.to_string(), service.to_string());
        }
        Arc::new(ContainerEntity::from_record(ContainerRecord {
            id: id.to_string(),
            name: name.to_string(),
            image: "alpine".to_string(),
            state,
            status: String::new(),
            created: Utc::now(),
            labels,
            ports: vec![],
        }))
    }

    #[test]
    fn test_grouping_and_ordering() {
        let containers = vec![
            entity("1", "zeta", ContainerState::Running, None, None),
            entity("2", "w-web-1", ContainerState::Running, Some("webapp"), Some("web")),
            entity("3", "w-db-1", ContainerState::Running, Some("webapp"), Some("db")),
            entity("4", "alpha", ContainerState::Exited, None, None),
            entity("5", "a-api-1", ContainerState::Running, Some("api"), Some("api")),
        ];

        let view = group_by_stack(&containers);

        let names: Vec<_> = view.stacks.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["api", "webapp"]);

        // Service-label ordering within the stack: db before web.
        let webapp = &view.stacks[1];
        let members: Vec<_> = webapp.containers.iter().map(|c| c.name()).collect();
        assert_eq!(members, vec!["w-db-1", "w-web-1"]);

        let standalone: Vec<_> = view.standalone.iter().map(|c| c.name()).collect();
        assert_eq!(standalone, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_aggregate_state_mixed() {
        let containers = vec![
            entity("1", "a", ContainerState::Running, Some("s"), None),
            entity("2", "b", ContainerState::Running, Some("s"), None),
            entity("3", "c", ContainerState::Exited, Some("s"), None),
        ];
        let view = group_by_stack(&containers);
        assert_eq!(view.stacks[0].state(), StackState::Mixed);
        assert_eq!(view.stacks[0].running_count(), 2);
    }

    #[test]
    fn test_aggregate_state_all_running() {
        let containers = vec![
            entity("1", "a", ContainerState::Running, Some("s"), None),
            entity("2", "b", ContainerState::Running, Some("s"), None),
        ];
        let view = group_by_stack(&containers);
        assert_eq!(view.stacks[0].state(), StackState::AllRunning);
    }

    #[test]
    fn test_aggregate_state_all_stopped() {
        let containers = vec![
            entity("1", "a", ContainerState::Exited, Some("s"), None),
            entity("2", "b", ContainerState::Created, Some("s"), None),
        ];
        let view = group_by_stack(&containers);
        assert_eq!(view.stacks[0].state(), StackState::AllStopped);
    }

    #[test]
    fn test_paused_member_is_not_stopped() {
        let containers = vec![
            entity("1", "a", ContainerState::Paused, Some("s"), None),
            entity("2", "b", ContainerState::Exited, Some("s"), None),
        ];
        let view = group_by_stack(&containers);
        assert_eq!(view.stacks[0].state(), StackState::Mixed);
    }
}
