//! Engine actor - runs executions and discovery runs in the Tokio runtime

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::discovery::{DiscoveryEngine, DiscoveryProgress, ProgressSink};
use crate::messages::{EngineCommand, EngineEvent};
use crate::network::client::RequestExecutor;

/// Forwards discovery progress into the event channel
struct EventSink(mpsc::UnboundedSender<EngineEvent>);

impl ProgressSink for EventSink {
    fn emit(&self, progress: DiscoveryProgress) {
        let _ = self.0.send(EngineEvent::DiscoveryProgress(progress));
    }
}

/// Engine actor that processes execution and discovery commands.
///
/// Each command claims its slot in the executor or discovery engine before
/// its task is spawned, so supersession follows command order no matter how
/// the runtime schedules the tasks.
pub struct EngineActor {
    executor: Arc<RequestExecutor>,
    discovery: Arc<DiscoveryEngine>,
    event_tx: mpsc::UnboundedSender<EngineEvent>,
    tasks: JoinSet<()>,
}

impl EngineActor {
    pub fn new(
        executor: Arc<RequestExecutor>,
        discovery: Arc<DiscoveryEngine>,
        event_tx: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        EngineActor {
            executor,
            discovery,
            event_tx,
            tasks: JoinSet::new(),
        }
    }

    /// Run the engine actor message loop
    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<EngineCommand>) {
        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(EngineCommand::Execute { id, request }) => {
                            let guard = self.executor.register();
                            let executor = Arc::clone(&self.executor);
                            let event_tx = self.event_tx.clone();

                            self.tasks.spawn(async move {
                                let result = executor.execute_registered(guard, request).await;
                                let _ = event_tx.send(EngineEvent::RequestFinished { id, result });
                            });
                        }

                        Some(EngineCommand::CancelRequest) => self.executor.cancel_active(),

                        Some(EngineCommand::Discover { workspace_id, base_url }) => {
                            let guard = self.discovery.register();
                            let discovery = Arc::clone(&self.discovery);
                            let event_tx = self.event_tx.clone();

                            self.tasks.spawn(async move {
                                let sink = EventSink(event_tx.clone());
                                let result = discovery
                                    .run_registered(guard, &workspace_id, &base_url, &sink)
                                    .await;
                                let _ = event_tx.send(EngineEvent::DiscoveryFinished { workspace_id, result });
                            });
                        }

                        Some(EngineCommand::CancelDiscovery) => self.discovery.cancel_discovery(),

                        Some(EngineCommand::Shutdown) | None => {
                            self.executor.cancel_active();
                            self.discovery.cancel_discovery();
                            // Let cancelled tasks report before the loop ends
                            while self.tasks.join_next().await.is_some() {}
                            break;
                        }
                    }
                }

                // Clean up completed tasks
                Some(result) = self.tasks.join_next() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Engine task failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use crate::discovery::{DiscoveryError, DiscoveryStep};
    use crate::models::{HttpMethod, HttpRequestSpec};
    use crate::network::client::{create_client, ExecuteError};
    use crate::storage::{MemoryStore, Storage};

    fn spawn_actor() -> (
        mpsc::UnboundedSender<EngineCommand>,
        mpsc::UnboundedReceiver<EngineEvent>,
        Arc<MemoryStore>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let storage: Arc<dyn Storage> = store.clone();
        let executor = Arc::new(RequestExecutor::new(create_client(None)));
        let discovery = Arc::new(DiscoveryEngine::new(create_client(None), storage));

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(EngineActor::new(executor, discovery, event_tx).run(cmd_rx));
        (cmd_tx, event_rx, store)
    }

    #[tokio::test]
    async fn test_superseded_request_reports_cancelled() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;
        Mock::given(path("/fast"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let (cmd_tx, mut event_rx, _store) = spawn_actor();
        cmd_tx
            .send(EngineCommand::Execute {
                id: 1,
                request: HttpRequestSpec::new(HttpMethod::GET, format!("{}/slow", server.uri())),
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        cmd_tx
            .send(EngineCommand::Execute {
                id: 2,
                request: HttpRequestSpec::new(HttpMethod::GET, format!("{}/fast", server.uri())),
            })
            .unwrap();

        let mut finished = Vec::new();
        while finished.len() < 2 {
            if let Some(EngineEvent::RequestFinished { id, result }) = event_rx.recv().await {
                finished.push((id, result));
            }
        }
        finished.sort_by_key(|(id, _)| *id);

        assert_eq!(finished[0].1, Err(ExecuteError::Cancelled));
        assert_eq!(finished[1].1.as_ref().map(|r| r.status_code), Ok(204));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_back_to_back_executes_keep_command_order() {
        let server = MockServer::start().await;
        Mock::given(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(50)))
            .mount(&server)
            .await;
        Mock::given(path("/b"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        for _ in 0..100 {
            let (cmd_tx, mut event_rx, _store) = spawn_actor();
            for (id, route) in [(1, "/a"), (2, "/b")] {
                cmd_tx
                    .send(EngineCommand::Execute {
                        id,
                        request: HttpRequestSpec::new(HttpMethod::GET, format!("{}{}", server.uri(), route)),
                    })
                    .unwrap();
            }

            let mut finished = Vec::new();
            while finished.len() < 2 {
                if let Some(EngineEvent::RequestFinished { id, result }) = event_rx.recv().await {
                    finished.push((id, result));
                }
            }
            finished.sort_by_key(|(id, _)| *id);

            assert_eq!(finished[0].1, Err(ExecuteError::Cancelled));
            assert_eq!(finished[1].1.as_ref().map(|r| r.status_code), Ok(200));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_back_to_back_discovers_keep_command_order() {
        let server = MockServer::start().await;
        Mock::given(path("/openapi.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"openapi": "3.0.0", "info": {"title": "Mini"}, "paths": {"/ping": {"get": {}}}}"#,
            ))
            .mount(&server)
            .await;

        for _ in 0..20 {
            let (cmd_tx, mut event_rx, store) = spawn_actor();
            for workspace_id in ["older", "newer"] {
                cmd_tx
                    .send(EngineCommand::Discover { workspace_id: workspace_id.into(), base_url: server.uri() })
                    .unwrap();
            }

            let mut finished = Vec::new();
            while finished.len() < 2 {
                if let Some(EngineEvent::DiscoveryFinished { workspace_id, result }) = event_rx.recv().await {
                    finished.push((workspace_id, result.is_ok()));
                }
            }
            finished.sort();

            assert_eq!(finished, [("newer".to_string(), true), ("older".to_string(), false)]);
            assert!(store.list_discovered_endpoints("older").unwrap().is_empty());
            assert_eq!(store.list_discovered_endpoints("newer").unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_discovery_streams_progress_then_result() {
        let (cmd_tx, mut event_rx, store) = spawn_actor();
        let server = MockServer::start().await;
        Mock::given(path("/openapi.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"openapi": "3.0.0", "info": {"title": "Mini"}, "paths": {"/ping": {"get": {}}}}"#,
            ))
            .mount(&server)
            .await;

        cmd_tx
            .send(EngineCommand::Discover { workspace_id: "ws".into(), base_url: server.uri() })
            .unwrap();

        let mut steps = Vec::new();
        let result = loop {
            match event_rx.recv().await.unwrap() {
                EngineEvent::DiscoveryProgress(p) => steps.push(p.step),
                EngineEvent::DiscoveryFinished { result, .. } => break result,
                EngineEvent::RequestFinished { .. } => unreachable!(),
            }
        };

        let result = result.unwrap();
        assert_eq!(result.title.as_deref(), Some("Mini"));
        assert_eq!(steps.last(), Some(&DiscoveryStep::Complete));
        assert_eq!(store.list_discovered_endpoints("ws").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_discovery_command() {
        let (cmd_tx, mut event_rx, store) = spawn_actor();
        let server = MockServer::start().await;
        Mock::given(path("/openapi.json"))
            .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        cmd_tx
            .send(EngineCommand::Discover { workspace_id: "ws".into(), base_url: server.uri() })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        cmd_tx.send(EngineCommand::CancelDiscovery).unwrap();

        let result = loop {
            if let Some(EngineEvent::DiscoveryFinished { result, .. }) = event_rx.recv().await {
                break result;
            }
        };
        assert!(matches!(result, Err(DiscoveryError::Cancelled)));
        assert!(store.list_discovered_endpoints("ws").unwrap().is_empty());
    }
}
