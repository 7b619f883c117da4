//! Automation — a stored trigger + node graph definition.
//!
//! An automation reacts to one kind of domain event and walks its node
//! graph for each matching subscriber. Nodes live in authoring order; the
//! first node is the entry node. The graph is validated when the
//! automation is built or loaded, so execution never meets a duplicate id,
//! an unresolvable edge, or a cycle that save-time checks could catch.

mod action;
mod node;
mod predicate;
mod trigger;

pub use action::Action;
pub use node::{Node, NodeId, NodeKind};
pub use predicate::{CompareOp, Predicate};
pub use trigger::Trigger;

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{DriplineError, ValidationError};
use crate::id::AutomationId;

/// A rule that reacts to events by executing a node graph per subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    pub id: AutomationId,
    pub name: String,
    pub enabled: bool,
    pub trigger: Trigger,
    /// Nodes in authoring order. The first node is the entry node.
    pub nodes: Vec<Node>,
}

impl Automation {
    /// Create a builder for constructing an [`Automation`].
    #[must_use]
    pub fn builder() -> AutomationBuilder {
        AutomationBuilder::default()
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    /// The node a new run starts at: the first node in authoring order.
    #[must_use]
    pub fn entry_node(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`DriplineError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - `nodes` is empty ([`ValidationError::NoNodes`])
    /// - two nodes share an id ([`ValidationError::DuplicateNodeId`])
    /// - a successor edge targets a missing node
    ///   ([`ValidationError::UnknownNodeReference`])
    /// - the graph contains a cycle ([`ValidationError::CycleDetected`])
    pub fn validate(&self) -> Result<(), DriplineError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.nodes.is_empty() {
            return Err(ValidationError::NoNodes.into());
        }

        let mut indices: HashMap<&NodeId, usize> = HashMap::with_capacity(self.nodes.len());
        for (index, node) in self.nodes.iter().enumerate() {
            if indices.insert(&node.id, index).is_some() {
                return Err(ValidationError::DuplicateNodeId(node.id.to_string()).into());
            }
        }

        for node in &self.nodes {
            for target in node.successors() {
                if !indices.contains_key(target) {
                    return Err(ValidationError::UnknownNodeReference {
                        from: node.id.to_string(),
                        to: target.to_string(),
                    }
                    .into());
                }
            }
        }

        self.check_acyclic(&indices)?;
        Ok(())
    }

    /// Kahn's algorithm over successor edges: if some node never reaches
    /// in-degree zero, the graph has a cycle.
    fn check_acyclic(&self, indices: &HashMap<&NodeId, usize>) -> Result<(), ValidationError> {
        let mut in_degree = vec![0usize; self.nodes.len()];
        for node in &self.nodes {
            for target in node.successors() {
                in_degree[indices[target]] += 1;
            }
        }

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(index, _)| index)
            .collect();

        let mut visited = 0;
        while let Some(index) = queue.pop_front() {
            visited += 1;
            for target in self.nodes[index].successors() {
                let target_index = indices[target];
                in_degree[target_index] -= 1;
                if in_degree[target_index] == 0 {
                    queue.push_back(target_index);
                }
            }
        }

        if visited == self.nodes.len() {
            Ok(())
        } else {
            Err(ValidationError::CycleDetected)
        }
    }
}

/// Step-by-step builder for [`Automation`].
#[derive(Debug, Default)]
pub struct AutomationBuilder {
    id: Option<AutomationId>,
    name: Option<String>,
    enabled: Option<bool>,
    trigger: Option<Trigger>,
    nodes: Vec<Node>,
}

impl AutomationBuilder {
    #[must_use]
    pub fn id(mut self, id: AutomationId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    #[must_use]
    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Consume the builder, validate, and return an [`Automation`].
    ///
    /// # Errors
    ///
    /// Returns [`DriplineError::Validation`] if required fields are missing
    /// or the node graph breaks an invariant.
    pub fn build(self) -> Result<Automation, DriplineError> {
        let automation = Automation {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            trigger: self
                .trigger
                .unwrap_or_else(|| Trigger::on(crate::event::EventType::NewLead)),
            nodes: self.nodes,
        };
        automation.validate()?;
        Ok(automation)
    }
}
