//! Plan item definition tree and case definitions.

use std::collections::HashSet;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::PlanItemKind;
use crate::{
    error::{CaseError, Result},
    expression::{self, Expression},
};

/// Immutable definition of one plan item, shared by every instance created
/// from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanItemDefinition {
    /// Identifier, unique within its case definition
    pub id: String,

    /// Human readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Task, stage, or plan model
    #[serde(rename = "type")]
    pub kind: PlanItemKind,

    /// Decides whether the item blocks its container while available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_rule: Option<Expression>,

    /// When true the item waits for an explicit activate command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_activation_rule: Option<Expression>,

    /// Containers only: complete as soon as nothing blocks
    #[serde(default)]
    pub auto_complete: bool,

    /// Any satisfied criterion lets the item activate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry_criteria: Vec<Expression>,

    /// Any satisfied criterion terminates the live item
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exit_criteria: Vec<Expression>,

    /// Containers only: child definitions in instantiation order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PlanItemDefinition>,
}

impl PlanItemDefinition {
    /// Creates a bare definition of the given kind.
    pub fn new(id: impl Into<String>, kind: PlanItemKind) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind,
            required_rule: None,
            manual_activation_rule: None,
            auto_complete: false,
            entry_criteria: Vec::new(),
            exit_criteria: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A human task definition.
    pub fn task(id: impl Into<String>) -> Self {
        Self::new(id, PlanItemKind::HumanTask)
    }

    /// A stage definition.
    pub fn stage(id: impl Into<String>) -> Self {
        Self::new(id, PlanItemKind::Stage)
    }

    /// A plan model (root) definition.
    pub fn plan_model(id: impl Into<String>) -> Self {
        Self::new(id, PlanItemKind::PlanModel)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_required_rule(mut self, expression: impl Into<Expression>) -> Self {
        self.required_rule = Some(expression.into());
        self
    }

    pub fn with_manual_activation_rule(mut self, expression: impl Into<Expression>) -> Self {
        self.manual_activation_rule = Some(expression.into());
        self
    }

    pub fn with_auto_complete(mut self, auto_complete: bool) -> Self {
        self.auto_complete = auto_complete;
        self
    }

    pub fn with_entry_criterion(mut self, expression: impl Into<Expression>) -> Self {
        self.entry_criteria.push(expression.into());
        self
    }

    pub fn with_exit_criterion(mut self, expression: impl Into<Expression>) -> Self {
        self.exit_criteria.push(expression.into());
        self
    }

    pub fn with_child(mut self, child: PlanItemDefinition) -> Self {
        self.children.push(child);
        self
    }

    /// Name if present, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Depth-first search for a definition by id, including `self`.
    pub fn find(&self, id: &str) -> Option<&PlanItemDefinition> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    fn expressions(&self) -> impl Iterator<Item = (&'static str, &Expression)> {
        self.required_rule
            .iter()
            .map(|e| ("requiredRule", e))
            .chain(
                self.manual_activation_rule
                    .iter()
                    .map(|e| ("manualActivationRule", e)),
            )
            .chain(self.entry_criteria.iter().map(|e| ("entryCriteria", e)))
            .chain(self.exit_criteria.iter().map(|e| ("exitCriteria", e)))
    }

    /// The plan model activates at case start and has no container to block.
    fn validate_root(&self) -> Result<()> {
        let field = if self.required_rule.is_some() {
            "requiredRule"
        } else if self.manual_activation_rule.is_some() {
            "manualActivationRule"
        } else if !self.entry_criteria.is_empty() {
            "entryCriteria"
        } else {
            return Ok(());
        };
        Err(CaseError::invalid_input(field).with_reason(format!(
            "Plan model '{}' is activated when the case starts and cannot have {field}",
            self.id
        )))
    }

    fn validate_node(&self, is_root: bool, seen: &mut HashSet<String>) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CaseError::invalid_input("id").with_reason("Plan item id cannot be empty"));
        }
        if !seen.insert(self.id.clone()) {
            return Err(CaseError::invalid_input("id")
                .with_reason(format!("Duplicate plan item id '{}'", self.id)));
        }
        match (is_root, self.kind) {
            (true, PlanItemKind::PlanModel)
            | (false, PlanItemKind::HumanTask | PlanItemKind::Stage) => {}
            (true, kind) => {
                return Err(CaseError::invalid_input("planModel").with_reason(format!(
                    "Root definition must be a planModel, found {}",
                    kind.as_str()
                )));
            }
            (false, PlanItemKind::PlanModel) => {
                return Err(CaseError::invalid_input("type").with_reason(format!(
                    "'{}' is a nested planModel; use a stage instead",
                    self.id
                )));
            }
        }
        if is_root {
            self.validate_root()?;
        }
        if !self.kind.is_container() {
            if !self.children.is_empty() {
                return Err(CaseError::invalid_input("children")
                    .with_reason(format!("Task '{}' cannot have children", self.id)));
            }
            if self.auto_complete {
                return Err(CaseError::invalid_input("autoComplete")
                    .with_reason(format!("Task '{}' cannot be auto-completed", self.id)));
            }
        }
        for (field, expression) in self.expressions() {
            expression::parse(expression.as_str()).map_err(|e| {
                CaseError::invalid_input(field)
                    .with_reason(format!("'{}' in '{}': {e}", expression, self.id))
            })?;
        }
        for child in &self.children {
            child.validate_node(false, seen)?;
        }
        Ok(())
    }
}

/// A deployable case definition: a key plus its plan model tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaseDefinition {
    /// Key used to start cases of this definition
    pub key: String,

    /// Human readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Root of the plan item definition tree
    pub plan_model: PlanItemDefinition,
}

impl CaseDefinition {
    pub fn new(key: impl Into<String>, plan_model: PlanItemDefinition) -> Self {
        Self {
            key: key.into(),
            name: None,
            plan_model,
        }
    }

    /// Finds a plan item definition anywhere in the tree.
    pub fn find(&self, id: &str) -> Option<&PlanItemDefinition> {
        self.plan_model.find(id)
    }

    /// Checks the structural rules a definition must satisfy before it can be
    /// deployed.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::InvalidInput` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(CaseError::invalid_input("key").with_reason("Definition key cannot be empty"));
        }
        let mut seen = HashSet::new();
        self.plan_model.validate_node(true, &mut seen)
    }
}

/// A case definition as recorded by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployedDefinition {
    /// Version number, starting at 1 for each key
    pub version: u32,

    /// Timestamp of the deployment (UTC)
    pub deployed_at: Timestamp,

    /// The definition itself
    pub definition: CaseDefinition,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CaseDefinition {
        CaseDefinition::new(
            "sample",
            PlanItemDefinition::plan_model("root")
                .with_auto_complete(true)
                .with_child(PlanItemDefinition::task("a").with_required_rule("${required}"))
                .with_child(
                    PlanItemDefinition::stage("s")
                        .with_child(PlanItemDefinition::task("b").with_entry_criterion("go")),
                ),
        )
    }

    #[test]
    fn test_find_nested_definition() {
        let definition = sample();
        assert_eq!(definition.find("b").map(|d| d.kind), Some(PlanItemKind::HumanTask));
        assert_eq!(definition.find("s").map(|d| d.kind), Some(PlanItemKind::Stage));
        assert!(definition.find("missing").is_none());
    }

    #[test]
    fn test_valid_definition_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut definition = sample();
        definition
            .plan_model
            .children
            .push(PlanItemDefinition::task("a"));
        let err = definition.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate plan item id 'a'"));
    }

    #[test]
    fn test_root_must_be_plan_model() {
        let definition = CaseDefinition::new("bad", PlanItemDefinition::stage("root"));
        assert!(definition.validate().is_err());
    }

    #[test]
    fn test_nested_plan_model_rejected() {
        let definition = CaseDefinition::new(
            "bad",
            PlanItemDefinition::plan_model("root").with_child(PlanItemDefinition::plan_model("inner")),
        );
        assert!(definition.validate().is_err());
    }

    #[test]
    fn test_plan_model_activation_rules_rejected() {
        let cases = [
            ("requiredRule", PlanItemDefinition::plan_model("root").with_required_rule("true")),
            (
                "manualActivationRule",
                PlanItemDefinition::plan_model("root").with_manual_activation_rule("true"),
            ),
            ("entryCriteria", PlanItemDefinition::plan_model("root").with_entry_criterion("${go}")),
        ];
        for (expected, plan_model) in cases {
            let err = CaseDefinition::new("bad", plan_model).validate().unwrap_err();
            assert!(
                matches!(err, CaseError::InvalidInput { ref field, .. } if field == expected),
                "{expected}: {err}"
            );
        }
    }

    #[test]
    fn test_plan_model_exit_criterion_allowed() {
        let definition = CaseDefinition::new(
            "exit",
            PlanItemDefinition::plan_model("root")
                .with_exit_criterion("${cancelled}")
                .with_child(PlanItemDefinition::task("t")),
        );
        assert!(definition.validate().is_ok());
    }

    #[test]
    fn test_task_with_children_rejected() {
        let definition = CaseDefinition::new(
            "bad",
            PlanItemDefinition::plan_model("root").with_child(
                PlanItemDefinition::task("t").with_child(PlanItemDefinition::task("u")),
            ),
        );
        let err = definition.validate().unwrap_err();
        assert!(err.to_string().contains("cannot have children"));
    }

    #[test]
    fn test_unparseable_expression_rejected() {
        let definition = CaseDefinition::new(
            "bad",
            PlanItemDefinition::plan_model("root")
                .with_child(PlanItemDefinition::task("t").with_required_rule("${a &&}")),
        );
        let err = definition.validate().unwrap_err();
        assert!(matches!(err, CaseError::InvalidInput { ref field, .. } if field == "requiredRule"));
    }

    #[test]
    fn test_json_uses_camel_case_fields() {
        let json = r#"{
            "key": "k",
            "planModel": {
                "id": "root",
                "type": "planModel",
                "autoComplete": true,
                "children": [
                    { "id": "t", "type": "humanTask", "requiredRule": "${required}" }
                ]
            }
        }"#;
        let definition: CaseDefinition = serde_json::from_str(json).unwrap();
        assert!(definition.plan_model.auto_complete);
        assert_eq!(
            definition.find("t").and_then(|d| d.required_rule.as_ref()).map(Expression::as_str),
            Some("${required}")
        );
    }
}
