// SPDX-License-Identifier: MIT

//! Typed DAG of job instances: the execution graph.
//!
//! The conductor is the sole writer of this structure after the expander
//! hands ownership over (see `cond-engine::expand`).

use crate::id::JobInstanceId;
use crate::job::{JobInstance, JobState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An edge `u -> v`: "v may not enter PENDING_SUBMIT until u is FINISHED".
/// Fan-in produces one edge per expanded parent instance; there is no
/// distinct edge *kind* at the graph level — fan-in/per-combination only
/// affects how many edges the expander creates, not how an edge behaves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge {
    pub from: JobInstanceId,
    pub to: JobInstanceId,
}

/// The full execution graph: nodes plus edges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionGraph {
    nodes: HashMap<JobInstanceId, JobInstance>,
    /// Declaration order, preserved for deterministic status rendering.
    order: Vec<JobInstanceId>,
    edges: Vec<Edge>,
}

impl ExecutionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: JobInstance) {
        let id = node.id.clone();
        if !self.nodes.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.nodes.insert(id, node);
    }

    pub fn add_edge(&mut self, from: JobInstanceId, to: JobInstanceId) {
        self.edges.push(Edge { from, to });
    }

    pub fn get(&self, id: &JobInstanceId) -> Option<&JobInstance> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &JobInstanceId) -> Option<&mut JobInstance> {
        self.nodes.get_mut(id)
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &JobInstance> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn parents(&self, id: &JobInstanceId) -> impl Iterator<Item = &JobInstanceId> {
        self.edges.iter().filter(move |e| &e.to == id).map(|e| &e.from)
    }

    fn children(&self, id: &JobInstanceId) -> impl Iterator<Item = &JobInstanceId> + '_ {
        self.edges
            .iter()
            .filter(move |e| &e.from == id)
            .map(|e| &e.to)
    }

    /// Nodes in `INITIALIZED` whose every incoming edge originates in a
    /// `FINISHED` node (including nodes with no incoming edges at all).
    pub fn ready_nodes(&self) -> Vec<JobInstanceId> {
        self.order
            .iter()
            .filter(|id| {
                self.nodes.get(*id).map(|n| n.state) == Some(JobState::Initialized)
                    && self
                        .parents(id)
                        .all(|p| self.nodes.get(p).map(|n| n.state) == Some(JobState::Finished))
            })
            .cloned()
            .collect()
    }

    /// Atomic per-node state transition. Records timestamps appropriate to
    /// the new state.
    pub fn transition(&mut self, id: &JobInstanceId, new_state: JobState, now: DateTime<Utc>) {
        if let Some(node) = self.nodes.get_mut(id) {
            match new_state {
                JobState::PendingSubmit => {
                    node.submit_time = Some(now);
                }
                JobState::Running => {
                    node.start_time = Some(now);
                }
                JobState::Finished | JobState::Failed | JobState::Cancelled => {
                    node.end_time = Some(now);
                }
                _ => {}
            }
            node.state = new_state;
        }
    }

    /// When `id` enters a terminal `FAILED`/`CANCELLED`/`TIMEDOUT`-terminal
    /// state, cascade-cancel every `INITIALIZED` descendant reachable from
    /// it (including through fan-in edges, since "all parents FINISHED" can
    /// no longer hold).
    pub fn cascade_cancel(&mut self, id: &JobInstanceId, now: DateTime<Utc>) -> Vec<JobInstanceId> {
        let mut cancelled = Vec::new();
        let mut stack: Vec<JobInstanceId> = self.children(id).cloned().collect();
        let mut visited = std::collections::HashSet::new();

        while let Some(child) = stack.pop() {
            if !visited.insert(child.clone()) {
                continue;
            }
            let is_initialized = self.nodes.get(&child).map(|n| n.state) == Some(JobState::Initialized);
            if is_initialized {
                self.transition(&child, JobState::Cancelled, now);
                cancelled.push(child.clone());
                stack.extend(self.children(&child).cloned());
            }
        }
        cancelled
    }

    pub fn all_terminal(&self) -> bool {
        self.nodes.values().all(|n| n.state.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::ResourceRequest;
    use std::path::PathBuf;

    fn node(name: &str) -> JobInstance {
        JobInstance::new(
            JobInstanceId::new(name),
            name,
            None,
            PathBuf::from(format!("/tmp/{name}")),
            "true".into(),
            None,
            ResourceRequest::default(),
        )
    }

    #[test]
    fn node_with_no_parents_is_ready() {
        let mut g = ExecutionGraph::new();
        g.add_node(node("a"));
        assert_eq!(g.ready_nodes(), vec![JobInstanceId::new("a")]);
    }

    #[test]
    fn node_is_not_ready_until_parent_finished() {
        let mut g = ExecutionGraph::new();
        g.add_node(node("a"));
        g.add_node(node("b"));
        g.add_edge(JobInstanceId::new("a"), JobInstanceId::new("b"));

        assert_eq!(g.ready_nodes(), vec![JobInstanceId::new("a")]);

        g.transition(&JobInstanceId::new("a"), JobState::PendingSubmit, Utc::now());
        g.transition(&JobInstanceId::new("a"), JobState::Running, Utc::now());
        g.transition(&JobInstanceId::new("a"), JobState::Finished, Utc::now());

        assert_eq!(g.ready_nodes(), vec![JobInstanceId::new("b")]);
    }

    #[test]
    fn cascade_cancel_propagates_through_fan_in_edges() {
        // b depends on a; c fans in on all instances of b (single edge here).
        let mut g = ExecutionGraph::new();
        g.add_node(node("a"));
        g.add_node(node("b"));
        g.add_node(node("c"));
        g.add_edge(JobInstanceId::new("a"), JobInstanceId::new("b"));
        g.add_edge(JobInstanceId::new("b"), JobInstanceId::new("c"));

        g.transition(&JobInstanceId::new("a"), JobState::Failed, Utc::now());
        let cancelled = g.cascade_cancel(&JobInstanceId::new("a"), Utc::now());

        assert_eq!(
            cancelled,
            vec![JobInstanceId::new("b"), JobInstanceId::new("c")]
        );
        assert_eq!(g.get(&JobInstanceId::new("b")).unwrap().state, JobState::Cancelled);
        assert_eq!(g.get(&JobInstanceId::new("c")).unwrap().state, JobState::Cancelled);
    }

    #[test]
    fn transition_sets_timestamps() {
        let mut g = ExecutionGraph::new();
        g.add_node(node("a"));
        let t1 = Utc::now();
        g.transition(&JobInstanceId::new("a"), JobState::PendingSubmit, t1);
        assert_eq!(g.get(&JobInstanceId::new("a")).unwrap().submit_time, Some(t1));

        let t2 = t1 + chrono::Duration::seconds(1);
        g.transition(&JobInstanceId::new("a"), JobState::Running, t2);
        assert_eq!(g.get(&JobInstanceId::new("a")).unwrap().start_time, Some(t2));

        let t3 = t2 + chrono::Duration::seconds(1);
        g.transition(&JobInstanceId::new("a"), JobState::Finished, t3);
        assert_eq!(g.get(&JobInstanceId::new("a")).unwrap().end_time, Some(t3));
    }

    #[test]
    fn all_terminal_true_when_every_node_terminal() {
        let mut g = ExecutionGraph::new();
        g.add_node(node("a"));
        assert!(!g.all_terminal());
        g.transition(&JobInstanceId::new("a"), JobState::Finished, Utc::now());
        assert!(g.all_terminal());
    }
}
