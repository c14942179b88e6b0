//! Parameter structures for engine operations.
//!
//! These structures are shared by every interface (currently the CLI) and
//! carry no framework-specific derives. Interface layers define their own
//! argument types and convert into these with `From`.
//!
//! Values arrive as text from the outside world; the `validate`/`parse`
//! methods here turn them into typed models and report malformed input as
//! `CaseError::InvalidInput`.

use std::{collections::BTreeMap, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{CaseError, Result},
    models::{CaseDefinition, CaseFilter, PlanItemFilter, PlanItemKind, PlanItemState},
};

/// Generic parameters for operations requiring just an ID.
///
/// Used for get_case, get_plan_item, complete_item, complete_stage,
/// activate_item, terminate_case and case_history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Id {
    /// The ID of the case or plan item to operate on
    pub id: u64,
}

/// Parameters for deploying a case definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployDefinition {
    /// The definition as JSON
    pub source: String,
}

impl DeployDefinition {
    /// Parses the JSON source into a definition and checks its structure.
    ///
    /// # Errors
    ///
    /// * `CaseError::InvalidInput` - When the JSON is malformed or the
    ///   definition breaks a structural rule
    pub fn parse(&self) -> Result<CaseDefinition> {
        let definition: CaseDefinition = serde_json::from_str(&self.source).map_err(|e| {
            CaseError::invalid_input("definition").with_reason(format!("Malformed JSON: {e}"))
        })?;
        definition.validate()?;
        Ok(definition)
    }
}

/// Parameters for looking up a deployed definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShowDefinition {
    /// Definition key
    pub key: String,
    /// Specific version; the latest when omitted
    pub version: Option<u32>,
}

/// Parameters for starting a case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartCase {
    /// Key of the definition to start (its latest version is used)
    pub definition_key: String,
    /// Initial variables as `name=value` assignments
    #[serde(default)]
    pub variables: Vec<String>,
}

/// Parameters for assigning case variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetVariables {
    /// Case to update
    pub case_id: u64,
    /// `name=value` assignments
    pub assignments: Vec<String>,
}

/// Parameters for listing cases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListCases {
    /// Show completed and terminated cases instead of active ones
    #[serde(default)]
    pub ended: bool,
    /// Show every case regardless of state
    #[serde(default)]
    pub all: bool,
    /// Only cases of this definition
    pub definition_key: Option<String>,
}

impl From<&ListCases> for CaseFilter {
    fn from(params: &ListCases) -> Self {
        if params.all {
            CaseFilter::All
        } else if params.ended {
            CaseFilter::Ended
        } else {
            CaseFilter::Active
        }
    }
}

/// Parameters for listing the plan items of a case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPlanItems {
    /// Case whose items to list
    pub case_id: u64,
    /// Only items in this state ('available', 'active', 'completed',
    /// 'terminated')
    pub state: Option<String>,
    /// Only items of this kind ('humanTask', 'stage', 'planModel')
    pub kind: Option<String>,
    /// Only items with this completeable flag
    pub completeable: Option<bool>,
    /// Include completed and terminated items
    #[serde(default)]
    pub all: bool,
}

impl ListPlanItems {
    /// Builds the item filter, rejecting unknown state or kind names.
    ///
    /// # Errors
    ///
    /// * `CaseError::InvalidInput` - When `state` or `kind` is not recognized
    ///
    /// # Examples
    ///
    /// ```rust
    /// use casework_core::{models::PlanItemState, params::ListPlanItems};
    ///
    /// let params = ListPlanItems {
    ///     case_id: 1,
    ///     state: Some("active".to_string()),
    ///     ..Default::default()
    /// };
    /// let filter = params.to_filter()?;
    /// assert_eq!(filter.state, Some(PlanItemState::Active));
    ///
    /// let params = ListPlanItems {
    ///     case_id: 1,
    ///     state: Some("sleeping".to_string()),
    ///     ..Default::default()
    /// };
    /// assert!(params.to_filter().is_err());
    /// # Ok::<(), casework_core::CaseError>(())
    /// ```
    pub fn to_filter(&self) -> Result<PlanItemFilter> {
        let state = parse_optional::<PlanItemState>(
            "state",
            self.state.as_deref(),
            "'available', 'active', 'completed', or 'terminated'",
        )?;
        let kind = parse_optional::<PlanItemKind>(
            "kind",
            self.kind.as_deref(),
            "'humanTask', 'stage', or 'planModel'",
        )?;
        Ok(PlanItemFilter {
            state,
            kind,
            completeable: self.completeable,
            include_ended: self.all,
        })
    }
}

/// Parameters for listing open human tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTasks {
    /// Only tasks of this case
    pub case_id: Option<u64>,
}

fn parse_optional<T: FromStr>(field: &str, value: Option<&str>, expected: &str) -> Result<Option<T>> {
    value
        .map(|value| {
            value.parse::<T>().map_err(|_| {
                CaseError::invalid_input(field)
                    .with_reason(format!("Invalid {field}: {value}. Must be {expected}"))
            })
        })
        .transpose()
}

/// Parses `name=value` assignments. The value is read as JSON when it is
/// valid JSON (`true`, `42`, `"text"`, `{"a": 1}`) and as a plain string
/// otherwise.
///
/// # Errors
///
/// * `CaseError::InvalidInput` - When an assignment has no `=` or an empty
///   name
///
/// # Examples
///
/// ```rust
/// use casework_core::params::parse_assignments;
/// use serde_json::json;
///
/// let vars = parse_assignments(&["required=true".to_string(), "owner=ada".to_string()])?;
/// assert_eq!(vars["required"], json!(true));
/// assert_eq!(vars["owner"], json!("ada"));
/// # Ok::<(), casework_core::CaseError>(())
/// ```
pub fn parse_assignments(assignments: &[String]) -> Result<BTreeMap<String, Value>> {
    assignments
        .iter()
        .map(|assignment| {
            let (name, raw) = assignment.split_once('=').ok_or_else(|| {
                CaseError::invalid_input("variables")
                    .with_reason(format!("Expected name=value, got '{assignment}'"))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(CaseError::invalid_input("variables")
                    .with_reason(format!("Missing variable name in '{assignment}'")));
            }
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            Ok((name.to_string(), value))
        })
        .collect()
}
