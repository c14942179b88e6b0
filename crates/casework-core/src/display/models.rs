//! `Display` implementations for the domain models.
//!
//! Everything renders as markdown: cases and definitions get a heading and a
//! metadata list, plan item trees render as nested bullet lists.

use std::fmt;

use super::datetime::LocalDateTime;
use crate::models::{
    CaseInstance, CaseState, CaseSummary, DeployedDefinition, HistoryEntry, LifecycleEvent,
    PlanItemDefinition, PlanItemInstance, PlanItemKind, PlanItemState, TransitionCause,
    VariableScope,
};

impl fmt::Display for PlanItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PlanItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for VariableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No variables set.");
        }
        for (name, value) in self.iter() {
            writeln!(f, "- `{name}` = `{value}`")?;
        }
        Ok(())
    }
}

impl PlanItemInstance {
    /// Short flag list such as `required, enabled`.
    fn flags(&self) -> String {
        let mut flags = Vec::new();
        if self.required {
            flags.push("required");
        }
        if self.enabled {
            flags.push("awaiting activation");
        }
        if self.is_container() && self.completeable && self.state.is_live() {
            flags.push("completeable");
        }
        flags.join(", ")
    }

    fn fmt_tree_line(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let flags = self.flags();
        write!(
            f,
            "{:indent$}- **{}** {} `{}` ({})",
            "",
            self.id,
            self.name,
            self.kind,
            self.state.with_icon(),
            indent = depth * 2
        )?;
        if flags.is_empty() {
            writeln!(f)
        } else {
            writeln!(f, " _{flags}_")
        }
    }
}

impl fmt::Display for PlanItemInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "### {}. {} ({})", self.id, self.name, self.state.with_icon())?;
        writeln!(f)?;
        writeln!(f, "- Case: {}", self.case_id)?;
        writeln!(f, "- Definition: `{}` ({})", self.definition_id, self.kind)?;
        if let Some(parent) = self.parent_id {
            writeln!(f, "- Parent: {parent}")?;
        }
        writeln!(f, "- Required: {}", if self.required { "yes" } else { "no" })?;
        if self.is_container() {
            writeln!(
                f,
                "- Completeable: {}",
                if self.completeable { "yes" } else { "no" }
            )?;
        }
        if self.enabled {
            writeln!(f, "- Waiting for manual activation")?;
        }
        if !self.children.is_empty() {
            let ids: Vec<String> = self.children.iter().map(u64::to_string).collect();
            writeln!(f, "- Children: {}", ids.join(", "))?;
        }
        writeln!(f, "- Created: {}", LocalDateTime(&self.created_at))?;
        writeln!(f, "- Updated: {}", LocalDateTime(&self.updated_at))?;
        if let Some(ended) = &self.ended_at {
            writeln!(f, "- Ended: {}", LocalDateTime(ended))?;
        }
        writeln!(f)
    }
}

impl CaseInstance {
    fn fmt_plan(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(root) = self.root() else {
            return writeln!(f, "No plan items loaded.");
        };
        let mut stack = vec![(root, 0usize)];
        while let Some((item, depth)) = stack.pop() {
            item.fmt_tree_line(f, depth)?;
            for child_id in item.children.iter().rev() {
                if let Some(child) = self.plan_item(*child_id) {
                    stack.push((child, depth + 1));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for CaseInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "# Case {}: {} v{}",
            self.id, self.definition_key, self.definition_version
        )?;
        writeln!(f)?;
        writeln!(f, "- State: {}", self.state)?;
        writeln!(f, "- Started: {}", LocalDateTime(&self.created_at))?;
        writeln!(f, "- Updated: {}", LocalDateTime(&self.updated_at))?;
        if let Some(ended) = &self.ended_at {
            writeln!(f, "- Ended: {}", LocalDateTime(ended))?;
        }

        writeln!(f, "\n## Variables")?;
        writeln!(f)?;
        write!(f, "{}", self.variables)?;

        writeln!(f, "\n## Plan")?;
        writeln!(f)?;
        self.fmt_plan(f)?;

        let open: Vec<String> = self
            .work_items()
            .map(|item| format!("{} ({})", item.name, item.id))
            .collect();
        if !open.is_empty() {
            writeln!(f, "\n## Open tasks")?;
            writeln!(f)?;
            for task in open {
                writeln!(f, "- {task}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for CaseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "## Case {}: {} v{} ({})",
            self.id, self.definition_key, self.definition_version, self.state
        )?;
        writeln!(f)?;
        if !self.state.is_ended() {
            writeln!(
                f,
                "- **Open tasks**: {} of {} live items",
                self.open_tasks, self.live_items
            )?;
        }
        writeln!(f, "- **Started**: {}", LocalDateTime(&self.created_at))?;
        writeln!(f, "- **Updated**: {}", LocalDateTime(&self.updated_at))?;
        writeln!(f)
    }
}

fn fmt_definition_tree(
    f: &mut fmt::Formatter<'_>,
    node: &PlanItemDefinition,
    depth: usize,
) -> fmt::Result {
    write!(
        f,
        "{:indent$}- `{}` {} ({})",
        "",
        node.id,
        node.display_name(),
        node.kind,
        indent = depth * 2
    )?;
    let mut rules = Vec::new();
    if let Some(rule) = &node.required_rule {
        rules.push(format!("required if `{rule}`"));
    }
    if let Some(rule) = &node.manual_activation_rule {
        rules.push(format!("manual if `{rule}`"));
    }
    for criterion in &node.entry_criteria {
        rules.push(format!("entry `{criterion}`"));
    }
    for criterion in &node.exit_criteria {
        rules.push(format!("exit `{criterion}`"));
    }
    if node.auto_complete {
        rules.push("auto-complete".to_string());
    }
    if rules.is_empty() {
        writeln!(f)?;
    } else {
        writeln!(f, ": {}", rules.join("; "))?;
    }
    for child in &node.children {
        fmt_definition_tree(f, child, depth + 1)?;
    }
    Ok(())
}

impl fmt::Display for DeployedDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let definition = &self.definition;
        match &definition.name {
            Some(name) => writeln!(f, "## {} v{}: {name}", definition.key, self.version)?,
            None => writeln!(f, "## {} v{}", definition.key, self.version)?,
        }
        writeln!(f)?;
        writeln!(f, "- Deployed: {}", LocalDateTime(&self.deployed_at))?;
        writeln!(f)?;
        fmt_definition_tree(f, &definition.plan_model, 0)?;
        writeln!(f)
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::CaseStarted {
                case_id,
                definition_key,
            } => write!(f, "case {case_id} started from '{definition_key}'"),
            LifecycleEvent::PlanItemCreated {
                item_id,
                definition_id,
                parent_id: Some(parent),
            } => write!(f, "item {item_id} created from `{definition_id}` in {parent}"),
            LifecycleEvent::PlanItemCreated {
                item_id,
                definition_id,
                parent_id: None,
            } => write!(f, "item {item_id} created from `{definition_id}`"),
            LifecycleEvent::StateChanged {
                item_id,
                from,
                to,
                cause,
            } => write!(f, "item {item_id}: {from} -> {to} ({cause})"),
            LifecycleEvent::RequiredChanged { item_id, required } => {
                let verb = if *required { "became" } else { "is no longer" };
                write!(f, "item {item_id} {verb} required")
            }
            LifecycleEvent::CompleteableChanged {
                item_id,
                completeable,
            } => {
                let verb = if *completeable { "became" } else { "is no longer" };
                write!(f, "item {item_id} {verb} completeable")
            }
            LifecycleEvent::ActivationEnabled { item_id } => {
                write!(f, "item {item_id} awaits manual activation")
            }
            LifecycleEvent::VariablesChanged { names } => {
                write!(f, "variables changed: {}", names.join(", "))
            }
            LifecycleEvent::CaseEnded { case_id, state } => {
                write!(f, "case {case_id} {state}")
            }
        }
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}. {} {}",
            self.seq,
            LocalDateTime(&self.recorded_at),
            self.event
        )
    }
}
