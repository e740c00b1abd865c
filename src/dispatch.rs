//! Run dispatcher.
//!
//! Takes a resolved [`RunPlan`] and sequences the backend calls for it. A
//! rejected call and an explicit `ok: false` ack are both failures, each with
//! its own action-specific notice; no error escapes [`execute_plan`] and no
//! retry is attempted, so the caller can keep the picker open for a manual
//! retry with selection intact.

use crate::api::JobApi;
use crate::model::{
    CreateExtract, DispatchOutcome, Notice, StartAnalysis, StartDocumentExtract,
};
use crate::picker::RunPlan;

/// Toast surface. The TUI buffers notices into its status line; headless
/// modes print them.
pub trait Notifier: Send {
    fn success(&mut self, text: &str);
    fn error(&mut self, text: &str);
}

/// A notifier that just collects notices, for callers that forward them as
/// events instead of rendering in place.
#[derive(Debug, Default)]
pub struct NoticeLog {
    pub notices: Vec<Notice>,
}

impl Notifier for NoticeLog {
    fn success(&mut self, text: &str) {
        self.notices.push(Notice::success(text));
    }

    fn error(&mut self, text: &str) {
        self.notices.push(Notice::error(text));
    }
}

/// Refusal notice text, carrying the backend's reason when it gave one.
fn refusal(base: &str, message: Option<&str>) -> String {
    match message {
        Some(m) if !m.is_empty() => format!("{base}: {m}"),
        _ => base.to_string(),
    }
}

/// Execute one run flow to completion.
pub async fn execute_plan(
    api: &dyn JobApi,
    notifier: &mut dyn Notifier,
    plan: RunPlan,
) -> DispatchOutcome {
    match plan {
        RunPlan::Analysis {
            analyzer_id,
            document_id,
            corpus_id,
        } => {
            let req = StartAnalysis {
                document_id,
                analyzer_id,
                corpus_id,
            };
            match api.start_analysis(req).await {
                Ok(ack) if ack.ok => {
                    notifier.success("Analysis started");
                    DispatchOutcome::Completed
                }
                Ok(ack) => {
                    notifier.error(&refusal(
                        "Backend refused to start the analysis",
                        ack.message.as_deref(),
                    ));
                    DispatchOutcome::Failed
                }
                Err(e) => {
                    notifier.error(&format!("Starting analysis failed: {e:#}"));
                    DispatchOutcome::Failed
                }
            }
        }
        RunPlan::DocumentExtract {
            document_id,
            fieldset_id,
            corpus_id,
        } => {
            let req = StartDocumentExtract {
                document_id,
                fieldset_id,
                corpus_id,
            };
            match api.start_document_extract(req).await {
                Ok(ack) if ack.ok => {
                    notifier.success("Document extract started");
                    DispatchOutcome::Completed
                }
                Ok(ack) => {
                    notifier.error(&refusal(
                        "Backend refused to start the document extract",
                        ack.message.as_deref(),
                    ));
                    DispatchOutcome::Failed
                }
                Err(e) => {
                    notifier.error(&format!("Starting document extract failed: {e:#}"));
                    DispatchOutcome::Failed
                }
            }
        }
        RunPlan::CorpusExtract {
            corpus_id,
            fieldset_id,
            name,
        } => {
            // Flat two-step chain: create, then start, first failure exits.
            let req = CreateExtract {
                corpus_id,
                name,
                fieldset_id,
            };
            let created = match api.create_extract(req).await {
                Ok(c) => c,
                Err(e) => {
                    notifier.error(&format!("Creating corpus extract failed: {e:#}"));
                    return DispatchOutcome::Failed;
                }
            };
            let extract_id = match created.obj {
                Some(obj) if created.ok => obj.id,
                _ => {
                    notifier.error(&refusal(
                        "Backend refused to create the corpus extract",
                        created.message.as_deref(),
                    ));
                    return DispatchOutcome::Failed;
                }
            };
            match api.start_extract(&extract_id).await {
                Ok(ack) if ack.ok => {
                    notifier.success("Corpus extract created and started");
                    DispatchOutcome::Completed
                }
                Ok(ack) => {
                    notifier.error(&refusal(
                        "Backend refused to start the corpus extract",
                        ack.message.as_deref(),
                    ));
                    DispatchOutcome::Failed
                }
                Err(e) => {
                    notifier.error(&format!("Starting corpus extract failed: {e:#}"));
                    DispatchOutcome::Failed
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AnalyzerOption, CreatedExtract, ExtractRef, FieldsetOption, MutationAck, NoticeLevel,
    };
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Calls observed by the mock, in order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        StartAnalysis {
            document_id: Option<String>,
            analyzer_id: String,
            corpus_id: Option<String>,
        },
        StartDocumentExtract {
            document_id: String,
            fieldset_id: String,
            corpus_id: Option<String>,
        },
        CreateExtract {
            corpus_id: String,
            name: String,
            fieldset_id: String,
        },
        StartExtract {
            extract_id: String,
        },
    }

    #[derive(Default)]
    struct MockApi {
        calls: Mutex<Vec<Call>>,
        ack_ok: bool,
        create_ok: bool,
        fail_transport: bool,
    }

    impl MockApi {
        fn all_ok() -> Self {
            Self {
                ack_ok: true,
                create_ok: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn ack(&self) -> Result<MutationAck> {
            if self.fail_transport {
                return Err(anyhow!("connection reset"));
            }
            Ok(MutationAck {
                ok: self.ack_ok,
                message: None,
            })
        }
    }

    #[async_trait]
    impl JobApi for MockApi {
        async fn list_analyzers(&self) -> Result<Vec<AnalyzerOption>> {
            Ok(Vec::new())
        }

        async fn list_fieldsets(&self) -> Result<Vec<FieldsetOption>> {
            Ok(Vec::new())
        }

        async fn start_analysis(&self, req: StartAnalysis) -> Result<MutationAck> {
            self.calls.lock().unwrap().push(Call::StartAnalysis {
                document_id: req.document_id,
                analyzer_id: req.analyzer_id,
                corpus_id: req.corpus_id,
            });
            self.ack()
        }

        async fn start_document_extract(&self, req: StartDocumentExtract) -> Result<MutationAck> {
            self.calls.lock().unwrap().push(Call::StartDocumentExtract {
                document_id: req.document_id,
                fieldset_id: req.fieldset_id,
                corpus_id: req.corpus_id,
            });
            self.ack()
        }

        async fn create_extract(&self, req: CreateExtract) -> Result<CreatedExtract> {
            self.calls.lock().unwrap().push(Call::CreateExtract {
                corpus_id: req.corpus_id,
                name: req.name,
                fieldset_id: req.fieldset_id,
            });
            if self.fail_transport {
                return Err(anyhow!("connection reset"));
            }
            Ok(CreatedExtract {
                ok: self.create_ok,
                message: None,
                obj: self.create_ok.then(|| ExtractRef { id: "X".into() }),
            })
        }

        async fn start_extract(&self, extract_id: &str) -> Result<MutationAck> {
            self.calls.lock().unwrap().push(Call::StartExtract {
                extract_id: extract_id.to_string(),
            });
            self.ack()
        }
    }

    fn analysis_plan() -> RunPlan {
        RunPlan::Analysis {
            analyzer_id: "a-1".into(),
            document_id: Some("doc-1".into()),
            corpus_id: None,
        }
    }

    fn corpus_plan() -> RunPlan {
        RunPlan::CorpusExtract {
            corpus_id: "corp-1".into(),
            fieldset_id: "f-1".into(),
            name: "lease terms".into(),
        }
    }

    #[tokio::test]
    async fn analysis_success_notifies_and_completes() {
        let api = MockApi::all_ok();
        let mut log = NoticeLog::default();
        let outcome = execute_plan(&api, &mut log, analysis_plan()).await;

        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(
            api.calls(),
            vec![Call::StartAnalysis {
                document_id: Some("doc-1".into()),
                analyzer_id: "a-1".into(),
                corpus_id: None,
            }]
        );
        assert_eq!(log.notices.len(), 1);
        assert_eq!(log.notices[0].level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn analysis_negative_ack_fails_with_one_error() {
        let api = MockApi::default();
        let mut log = NoticeLog::default();
        let outcome = execute_plan(&api, &mut log, analysis_plan()).await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(log.notices.len(), 1);
        assert_eq!(log.notices[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn document_extract_issues_only_one_call() {
        let api = MockApi::all_ok();
        let mut log = NoticeLog::default();
        let plan = RunPlan::DocumentExtract {
            document_id: "doc-1".into(),
            fieldset_id: "f-1".into(),
            corpus_id: Some("corp-1".into()),
        };
        let outcome = execute_plan(&api, &mut log, plan).await;

        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(
            api.calls(),
            vec![Call::StartDocumentExtract {
                document_id: "doc-1".into(),
                fieldset_id: "f-1".into(),
                corpus_id: Some("corp-1".into()),
            }]
        );
    }

    #[tokio::test]
    async fn corpus_extract_chains_create_then_start() {
        let api = MockApi::all_ok();
        let mut log = NoticeLog::default();
        let outcome = execute_plan(&api, &mut log, corpus_plan()).await;

        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(
            api.calls(),
            vec![
                Call::CreateExtract {
                    corpus_id: "corp-1".into(),
                    name: "lease terms".into(),
                    fieldset_id: "f-1".into(),
                },
                Call::StartExtract {
                    extract_id: "X".into()
                },
            ]
        );
        assert_eq!(log.notices.len(), 1);
        assert_eq!(log.notices[0].level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn create_failure_skips_start() {
        let api = MockApi {
            ack_ok: true,
            ..Default::default()
        };
        let mut log = NoticeLog::default();
        let outcome = execute_plan(&api, &mut log, corpus_plan()).await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(api.calls().len(), 1, "no start-extract after create failure");
        assert_eq!(log.notices.len(), 1);
        assert_eq!(log.notices[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn start_failure_after_create_is_a_distinct_error() {
        let api = MockApi {
            create_ok: true,
            ..Default::default()
        };
        let mut log = NoticeLog::default();
        let outcome = execute_plan(&api, &mut log, corpus_plan()).await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(api.calls().len(), 2);
        assert_eq!(log.notices.len(), 1);
        assert!(log.notices[0].text.contains("start"));
    }

    #[tokio::test]
    async fn transport_rejection_surfaces_exactly_one_error() {
        let api = MockApi {
            fail_transport: true,
            ..Default::default()
        };
        let mut log = NoticeLog::default();
        let outcome = execute_plan(&api, &mut log, corpus_plan()).await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(api.calls().len(), 1);
        assert_eq!(log.notices.len(), 1);
        assert_eq!(log.notices[0].level, NoticeLevel::Error);
    }
}
