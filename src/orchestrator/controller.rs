//! Picker session controller.
//!
//! Loads the option lists, then serves run commands one at a time, emitting
//! events back to the presentation layer.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::api::JobApi;
use crate::dispatch::{execute_plan, NoticeLog};
use crate::model::{DispatchOutcome, UiEvent};
use crate::picker::RunPlan;

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Run(RunPlan),
    ReloadLists,
    Quit,
}

/// Fetch both option lists concurrently and emit the result.
///
/// Event sends are best-effort: if the UI has already gone away the events
/// are dropped, which is exactly the stale-response behavior we want.
async fn load_lists(api: &dyn JobApi, event_tx: &UnboundedSender<UiEvent>) {
    let (analyzers, fieldsets) = tokio::join!(api.list_analyzers(), api.list_fieldsets());
    match (analyzers, fieldsets) {
        (Ok(analyzers), Ok(fieldsets)) => {
            let _ = event_tx.send(UiEvent::ListsLoaded {
                analyzers,
                fieldsets,
            });
        }
        (Err(e), _) | (_, Err(e)) => {
            let _ = event_tx.send(UiEvent::ListLoadFailed {
                error: format!("{e:#}"),
            });
        }
    }
}

/// Serve UI commands until `Quit` or until the command channel closes.
///
/// At most one run is in flight; a `Run` arriving while busy is answered
/// with an informational notice instead of overlapping calls.
pub(crate) async fn run_controller(
    api: Arc<dyn JobApi>,
    event_tx: UnboundedSender<UiEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    load_lists(api.as_ref(), &event_tx).await;

    let mut run_handle: Option<tokio::task::JoinHandle<(DispatchOutcome, NoticeLog)>> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Run(plan)) => {
                        if run_handle.is_some() {
                            let _ = event_tx.send(UiEvent::Info(
                                "A run is already in progress".into(),
                            ));
                            continue;
                        }
                        let api = api.clone();
                        run_handle = Some(tokio::spawn(async move {
                            let mut log = NoticeLog::default();
                            let outcome = execute_plan(api.as_ref(), &mut log, plan).await;
                            (outcome, log)
                        }));
                    }
                    Some(UiCommand::ReloadLists) => {
                        load_lists(api.as_ref(), &event_tx).await;
                    }
                    Some(UiCommand::Quit) | None => {
                        // In-flight calls are not awaited; a late completion
                        // lands on a dropped receiver and is ignored.
                        if let Some(h) = run_handle.take() {
                            h.abort();
                        }
                        return Ok(());
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it
            // can be dropped when another branch is chosen and the completion
            // is never observed.
            join_res = async {
                match run_handle.as_mut() {
                    Some(h) => h.await,
                    None => futures::future::pending().await,
                }
            } => {
                run_handle = None;
                match join_res {
                    Ok((outcome, log)) => {
                        let _ = event_tx.send(UiEvent::RunFinished {
                            outcome,
                            notices: log.notices,
                        });
                    }
                    Err(e) => {
                        let _ = event_tx.send(UiEvent::Info(format!("Run task failed: {e}")));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AnalyzerOption, CreateExtract, CreatedExtract, FieldsetOption, MutationAck, NoticeLevel,
        StartAnalysis, StartDocumentExtract,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct StaticApi {
        lists_ok: bool,
    }

    /// API whose mutations park on a gate, for observing in-flight runs.
    struct GatedApi {
        gate: tokio::sync::Notify,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl JobApi for GatedApi {
        async fn list_analyzers(&self) -> Result<Vec<AnalyzerOption>> {
            Ok(Vec::new())
        }

        async fn list_fieldsets(&self) -> Result<Vec<FieldsetOption>> {
            Ok(Vec::new())
        }

        async fn start_analysis(&self, _req: StartAnalysis) -> Result<MutationAck> {
            self.gate.notified().await;
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(MutationAck {
                ok: true,
                message: None,
            })
        }

        async fn start_document_extract(
            &self,
            _req: StartDocumentExtract,
        ) -> Result<MutationAck> {
            Ok(MutationAck {
                ok: true,
                message: None,
            })
        }

        async fn create_extract(&self, _req: CreateExtract) -> Result<CreatedExtract> {
            Ok(CreatedExtract {
                ok: true,
                message: None,
                obj: Some(crate::model::ExtractRef { id: "x-1".into() }),
            })
        }

        async fn start_extract(&self, _extract_id: &str) -> Result<MutationAck> {
            Ok(MutationAck {
                ok: true,
                message: None,
            })
        }
    }

    #[async_trait]
    impl JobApi for StaticApi {
        async fn list_analyzers(&self) -> Result<Vec<AnalyzerOption>> {
            if !self.lists_ok {
                anyhow::bail!("service unavailable");
            }
            Ok(vec![AnalyzerOption {
                id: "a-1".into(),
                description: "Clause tagger".into(),
            }])
        }

        async fn list_fieldsets(&self) -> Result<Vec<FieldsetOption>> {
            Ok(vec![FieldsetOption {
                id: "f-1".into(),
                name: "Lease terms".into(),
            }])
        }

        async fn start_analysis(&self, _req: StartAnalysis) -> Result<MutationAck> {
            Ok(MutationAck {
                ok: true,
                message: None,
            })
        }

        async fn start_document_extract(
            &self,
            _req: StartDocumentExtract,
        ) -> Result<MutationAck> {
            Ok(MutationAck {
                ok: true,
                message: None,
            })
        }

        async fn create_extract(&self, _req: CreateExtract) -> Result<CreatedExtract> {
            Ok(CreatedExtract {
                ok: true,
                message: None,
                obj: Some(crate::model::ExtractRef { id: "x-1".into() }),
            })
        }

        async fn start_extract(&self, _extract_id: &str) -> Result<MutationAck> {
            Ok(MutationAck {
                ok: true,
                message: None,
            })
        }
    }

    #[tokio::test]
    async fn loads_lists_then_serves_a_run() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let api = Arc::new(StaticApi { lists_ok: true });
        let ctrl = tokio::spawn(run_controller(api, event_tx, cmd_rx));

        match event_rx.recv().await {
            Some(UiEvent::ListsLoaded {
                analyzers,
                fieldsets,
            }) => {
                assert_eq!(analyzers.len(), 1);
                assert_eq!(fieldsets.len(), 1);
            }
            other => panic!("expected ListsLoaded, got {other:?}"),
        }

        cmd_tx
            .send(UiCommand::Run(RunPlan::Analysis {
                analyzer_id: "a-1".into(),
                document_id: Some("doc-1".into()),
                corpus_id: None,
            }))
            .unwrap();

        match event_rx.recv().await {
            Some(UiEvent::RunFinished { outcome, notices }) => {
                assert_eq!(outcome, DispatchOutcome::Completed);
                assert_eq!(notices.len(), 1);
                assert_eq!(notices[0].level, NoticeLevel::Success);
            }
            other => panic!("expected RunFinished, got {other:?}"),
        }

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctrl.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn run_while_busy_is_refused_and_runs_once() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let api = Arc::new(GatedApi {
            gate: tokio::sync::Notify::new(),
            runs: AtomicUsize::new(0),
        });
        let ctrl = tokio::spawn(run_controller(api.clone(), event_tx, cmd_rx));

        match event_rx.recv().await {
            Some(UiEvent::ListsLoaded { .. }) => {}
            other => panic!("expected ListsLoaded, got {other:?}"),
        }

        let plan = RunPlan::Analysis {
            analyzer_id: "a-1".into(),
            document_id: Some("doc-1".into()),
            corpus_id: None,
        };
        cmd_tx.send(UiCommand::Run(plan.clone())).unwrap();
        cmd_tx.send(UiCommand::Run(plan)).unwrap();

        // The first run is parked on the gate, so the second is refused.
        match event_rx.recv().await {
            Some(UiEvent::Info(text)) => {
                assert!(text.contains("already in progress"), "got: {text}");
            }
            other => panic!("expected Info, got {other:?}"),
        }

        api.gate.notify_one();
        match event_rx.recv().await {
            Some(UiEvent::RunFinished { outcome, .. }) => {
                assert_eq!(outcome, DispatchOutcome::Completed);
            }
            other => panic!("expected RunFinished, got {other:?}"),
        }
        assert_eq!(api.runs.load(Ordering::SeqCst), 1);

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctrl.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn list_load_failure_is_reported() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let api = Arc::new(StaticApi { lists_ok: false });
        let ctrl = tokio::spawn(run_controller(api, event_tx, cmd_rx));

        match event_rx.recv().await {
            Some(UiEvent::ListLoadFailed { error }) => {
                assert!(error.contains("service unavailable"));
            }
            other => panic!("expected ListLoadFailed, got {other:?}"),
        }

        drop(cmd_tx);
        ctrl.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn closed_event_channel_does_not_wedge_the_controller() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        drop(event_rx);
        let api = Arc::new(StaticApi { lists_ok: true });
        let ctrl = tokio::spawn(run_controller(api, event_tx, cmd_rx));

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctrl.await.unwrap().unwrap();
    }
}
