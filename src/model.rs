use serde::{Deserialize, Serialize};

/// An analyzer registered on the backend, runnable against a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerOption {
    pub id: String,
    pub description: String,
}

/// A named collection of field definitions driving structured extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsetOption {
    pub id: String,
    pub name: String,
}

/// What the picked analyzer or fieldset will be run against.
///
/// At least one id must be present; when both are set, fieldset runs
/// prefer the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub document_id: Option<String>,
    pub corpus_id: Option<String>,
}

impl Target {
    pub fn new(document_id: Option<String>, corpus_id: Option<String>) -> Option<Self> {
        if document_id.is_none() && corpus_id.is_none() {
            return None;
        }
        Some(Self {
            document_id,
            corpus_id,
        })
    }

    pub fn has_document(&self) -> bool {
        self.document_id.is_some()
    }

    /// Short label for headers and status lines.
    pub fn describe(&self) -> String {
        match (&self.document_id, &self.corpus_id) {
            (Some(d), Some(c)) => format!("document {d} (corpus {c})"),
            (Some(d), None) => format!("document {d}"),
            (None, Some(c)) => format!("corpus {c}"),
            (None, None) => "no target".into(),
        }
    }
}

/// Generic `{ok}` acknowledgement returned by every write operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationAck {
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRef {
    pub id: String,
}

/// Response of create-extract; `obj` carries the new extract id when `ok`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedExtract {
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub obj: Option<ExtractRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub analyzer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartDocumentExtract {
    pub document_id: String,
    pub fieldset_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateExtract {
    pub corpus_id: String,
    pub name: String,
    pub fieldset_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

/// Transient user-facing notification (the toast equivalent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }
}

/// Did a dispatched run flow finish cleanly?
///
/// `Completed` closes the picker; `Failed` leaves it open with state intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed,
    Failed,
}

/// Events from the async controller to the UI thread.
#[derive(Debug, Clone)]
pub enum UiEvent {
    ListsLoaded {
        analyzers: Vec<AnalyzerOption>,
        fieldsets: Vec<FieldsetOption>,
    },
    ListLoadFailed {
        error: String,
    },
    RunFinished {
        outcome: DispatchOutcome,
        notices: Vec<Notice>,
    },
    Info(String),
}
