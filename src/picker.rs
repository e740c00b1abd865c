//! Selection state for the analyzer/fieldset picker.
//!
//! Pure state machine: the TUI and the headless CLI both resolve their run
//! through [`SelectionState::plan_run`], so flow selection is testable without
//! a terminal or a backend.

use std::fmt;

use crate::model::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveTab {
    Analyzer,
    Fieldset,
}

impl ActiveTab {
    pub fn title(self) -> &'static str {
        match self {
            ActiveTab::Analyzer => "Analyzer",
            ActiveTab::Fieldset => "Fieldset",
        }
    }
}

/// Per-session picker state; created fresh when the picker opens and
/// discarded when it closes.
#[derive(Debug, Clone)]
pub struct SelectionState {
    pub active_tab: ActiveTab,
    pub selected: Option<String>,
    pub extract_name: String,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            active_tab: ActiveTab::Analyzer,
            selected: None,
            extract_name: String::new(),
        }
    }
}

/// The three mutually exclusive run flows, resolved from selection + target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPlan {
    Analysis {
        analyzer_id: String,
        document_id: Option<String>,
        corpus_id: Option<String>,
    },
    DocumentExtract {
        document_id: String,
        fieldset_id: String,
        corpus_id: Option<String>,
    },
    CorpusExtract {
        corpus_id: String,
        fieldset_id: String,
        name: String,
    },
}

/// States the Run control is supposed to make unreachable. Surfaced as an
/// explicit error rather than silently doing nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    NothingSelected,
    NoTarget,
    MissingName,
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::NothingSelected => write!(f, "nothing is selected"),
            PlanError::NoTarget => {
                write!(f, "fieldset runs need a document or corpus target")
            }
            PlanError::MissingName => {
                write!(f, "corpus extracts need a non-empty name")
            }
        }
    }
}

impl std::error::Error for PlanError {}

impl SelectionState {
    /// Switch tabs. Always clears the selection, including a switch to the
    /// tab that is already active.
    pub fn switch_tab(&mut self, tab: ActiveTab) {
        self.active_tab = tab;
        self.selected = None;
    }

    pub fn pick(&mut self, id: impl Into<String>) {
        self.selected = Some(id.into());
    }

    /// Name edits never touch the tab or the selection.
    pub fn edit_name(&mut self, name: impl Into<String>) {
        self.extract_name = name.into();
    }

    /// Whether the fieldset name field applies: fieldset tab with no
    /// document target (the corpus-extract flow is the only one that names
    /// anything).
    pub fn name_field_active(&self, target: &Target) -> bool {
        self.active_tab == ActiveTab::Fieldset && !target.has_document()
    }

    /// The Run-control enablement predicate. Only a truly empty name
    /// disables the corpus-extract flow; the name is otherwise sent as
    /// typed.
    pub fn run_ready(&self, target: &Target) -> bool {
        if self.selected.is_none() {
            return false;
        }
        if self.name_field_active(target) && self.extract_name.is_empty() {
            return false;
        }
        true
    }

    /// Resolve which run flow applies. Document target beats corpus target
    /// for fieldset runs.
    pub fn plan_run(&self, target: &Target) -> Result<RunPlan, PlanError> {
        let selected = self.selected.as_ref().ok_or(PlanError::NothingSelected)?;
        match self.active_tab {
            ActiveTab::Analyzer => Ok(RunPlan::Analysis {
                analyzer_id: selected.clone(),
                document_id: target.document_id.clone(),
                corpus_id: target.corpus_id.clone(),
            }),
            ActiveTab::Fieldset => {
                if let Some(document_id) = &target.document_id {
                    return Ok(RunPlan::DocumentExtract {
                        document_id: document_id.clone(),
                        fieldset_id: selected.clone(),
                        corpus_id: target.corpus_id.clone(),
                    });
                }
                let corpus_id = target.corpus_id.as_ref().ok_or(PlanError::NoTarget)?;
                if self.extract_name.is_empty() {
                    return Err(PlanError::MissingName);
                }
                Ok(RunPlan::CorpusExtract {
                    corpus_id: corpus_id.clone(),
                    fieldset_id: selected.clone(),
                    name: self.extract_name.clone(),
                })
            }
        }
    }
}
