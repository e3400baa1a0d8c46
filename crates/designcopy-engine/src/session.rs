//! Single-owner authoring-engine session.
//!
//! The engine is stateful and not reentrant. [`EngineSession`] moves it onto
//! one dedicated OS thread and serialises every call through a channel:
//! callers send a boxed job and await its reply, so no two engine calls
//! ever overlap no matter how many tasks hold the session.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use designcopy_core::result::AppResult;
use designcopy_core::traits::{AuthoringEngine, FileReference, PropertySet};
use designcopy_core::types::{DocumentHandle, DocumentKind};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::ReplicationError;

type Job = Box<dyn FnOnce(&mut dyn AuthoringEngine) + Send>;

/// Capacity of the job queue.
const QUEUE_DEPTH: usize = 32;

/// Handle to the engine worker thread.
#[derive(Debug)]
pub struct EngineSession {
    sender: mpsc::Sender<Job>,
    worker: Option<JoinHandle<()>>,
    engine_name: String,
}

impl EngineSession {
    /// Start the worker thread and build the engine on it.
    ///
    /// The factory runs on the worker thread, so engines bound to their
    /// creating thread are supported.
    pub async fn spawn<F>(factory: F) -> Result<Self, ReplicationError>
    where
        F: FnOnce() -> AppResult<Box<dyn AuthoringEngine>> + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::channel::<Job>(QUEUE_DEPTH);
        let (ready_tx, ready_rx) = oneshot::channel::<AppResult<String>>();

        let worker = std::thread::Builder::new()
            .name("authoring-engine".to_string())
            .spawn(move || {
                let mut engine = match factory() {
                    Ok(engine) => {
                        let _ = ready_tx.send(Ok(engine.name().to_string()));
                        engine
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while let Some(job) = receiver.blocking_recv() {
                    job(engine.as_mut());
                }
                debug!(engine = engine.name(), "Engine session worker stopped");
            })?;

        let engine_name = match ready_rx.await {
            Ok(Ok(name)) => name,
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(ReplicationError::Engine(e));
            }
            Err(_) => return Err(ReplicationError::SessionClosed),
        };

        info!(engine = %engine_name, "Authoring engine session started");

        Ok(Self {
            sender,
            worker: Some(worker),
            engine_name,
        })
    }

    /// Name reported by the engine.
    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    /// Run a closure against the engine on the worker thread.
    pub async fn call<R, F>(&self, f: F) -> Result<R, ReplicationError>
    where
        F: FnOnce(&mut dyn AuthoringEngine) -> AppResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |engine: &mut dyn AuthoringEngine| {
            let _ = reply_tx.send(f(engine));
        });

        self.sender
            .send(job)
            .await
            .map_err(|_| ReplicationError::SessionClosed)?;

        let result = reply_rx
            .await
            .map_err(|_| ReplicationError::SessionClosed)?;
        Ok(result?)
    }

    /// Open a document.
    pub async fn open(&self, path: &Path, visible: bool) -> Result<DocumentHandle, ReplicationError> {
        let path = path.to_path_buf();
        self.call(move |e| e.open(&path, visible)).await
    }

    /// Transitive live references of a document.
    pub async fn all_referenced_documents(
        &self,
        handle: DocumentHandle,
    ) -> Result<Vec<DocumentHandle>, ReplicationError> {
        self.call(move |e| e.all_referenced_documents(handle)).await
    }

    /// Absolute path of a document.
    pub async fn full_path(&self, handle: DocumentHandle) -> Result<PathBuf, ReplicationError> {
        self.call(move |e| e.full_path(handle)).await
    }

    /// Kind of a document.
    pub async fn kind(&self, handle: DocumentHandle) -> Result<DocumentKind, ReplicationError> {
        self.call(move |e| e.kind(handle)).await
    }

    /// Save a document under a new path.
    pub async fn save_as(
        &self,
        handle: DocumentHandle,
        new_path: &Path,
    ) -> Result<(), ReplicationError> {
        let new_path = new_path.to_path_buf();
        self.call(move |e| e.save_as(handle, &new_path)).await
    }

    /// Stored reference descriptors of a document.
    pub async fn file_references(
        &self,
        handle: DocumentHandle,
    ) -> Result<Vec<FileReference>, ReplicationError> {
        self.call(move |e| e.file_references(handle)).await
    }

    /// Point a stored reference at a new file.
    pub async fn redirect_file_reference(
        &self,
        handle: DocumentHandle,
        reference: FileReference,
        new_path: &Path,
    ) -> Result<(), ReplicationError> {
        let new_path = new_path.to_path_buf();
        self.call(move |e| e.redirect_file_reference(handle, &reference, &new_path))
            .await
    }

    /// Set a property.
    pub async fn set_property(
        &self,
        handle: DocumentHandle,
        set: PropertySet,
        name: &str,
        value: &str,
    ) -> Result<(), ReplicationError> {
        let name = name.to_string();
        let value = value.to_string();
        self.call(move |e| e.set_property(handle, set, &name, &value))
            .await
    }

    /// Rebuild a document.
    pub async fn update(&self, handle: DocumentHandle) -> Result<(), ReplicationError> {
        self.call(move |e| e.update(handle)).await
    }

    /// Save a document in place.
    pub async fn save(&self, handle: DocumentHandle) -> Result<(), ReplicationError> {
        self.call(move |e| e.save(handle)).await
    }

    /// Close a document.
    pub async fn close(&self, handle: DocumentHandle, save: bool) -> Result<(), ReplicationError> {
        self.call(move |e| e.close(handle, save)).await
    }

    /// Close every open document.
    pub async fn close_all(&self) -> Result<(), ReplicationError> {
        self.call(|e| e.close_all()).await
    }

    /// Activate a workspace descriptor.
    pub async fn switch_workspace_context(&self, descriptor: &Path) -> Result<(), ReplicationError> {
        let descriptor = descriptor.to_path_buf();
        self.call(move |e| e.switch_workspace_context(&descriptor))
            .await
    }

    /// Currently active workspace descriptor.
    pub async fn active_workspace_context(&self) -> Result<Option<PathBuf>, ReplicationError> {
        self.call(|e| e.active_workspace_context()).await
    }

    /// Stop the worker thread and wait for it to exit.
    pub async fn shutdown(self) -> Result<(), ReplicationError> {
        let Self { sender, worker, .. } = self;
        drop(sender);

        if let Some(worker) = worker {
            tokio::task::spawn_blocking(move || worker.join())
                .await?
                .map_err(|_| ReplicationError::Fatal("engine worker panicked".to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use designcopy_core::AppError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEngine {
        calls: Arc<AtomicUsize>,
        context: Option<PathBuf>,
    }

    impl AuthoringEngine for CountingEngine {
        fn name(&self) -> &str {
            "counting"
        }
        fn open(&mut self, _path: &Path, _visible: bool) -> AppResult<DocumentHandle> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(DocumentHandle(n as u64))
        }
        fn all_referenced_documents(&mut self, _h: DocumentHandle) -> AppResult<Vec<DocumentHandle>> {
            Ok(Vec::new())
        }
        fn full_path(&self, _h: DocumentHandle) -> AppResult<PathBuf> {
            Err(AppError::not_found("no document"))
        }
        fn kind(&self, _h: DocumentHandle) -> AppResult<DocumentKind> {
            Ok(DocumentKind::Part)
        }
        fn save_as(&mut self, _h: DocumentHandle, _p: &Path) -> AppResult<()> {
            Ok(())
        }
        fn file_references(&self, _h: DocumentHandle) -> AppResult<Vec<FileReference>> {
            Ok(Vec::new())
        }
        fn redirect_file_reference(
            &mut self,
            _h: DocumentHandle,
            _r: &FileReference,
            _p: &Path,
        ) -> AppResult<()> {
            Ok(())
        }
        fn set_property(
            &mut self,
            _h: DocumentHandle,
            _s: PropertySet,
            _n: &str,
            _v: &str,
        ) -> AppResult<()> {
            Ok(())
        }
        fn update(&mut self, _h: DocumentHandle) -> AppResult<()> {
            Ok(())
        }
        fn save(&mut self, _h: DocumentHandle) -> AppResult<()> {
            Ok(())
        }
        fn close(&mut self, _h: DocumentHandle, _save: bool) -> AppResult<()> {
            Ok(())
        }
        fn close_all(&mut self) -> AppResult<()> {
            Ok(())
        }
        fn switch_workspace_context(&mut self, descriptor: &Path) -> AppResult<()> {
            self.context = Some(descriptor.to_path_buf());
            Ok(())
        }
        fn active_workspace_context(&self) -> AppResult<Option<PathBuf>> {
            Ok(self.context.clone())
        }
    }

    async fn session(calls: Arc<AtomicUsize>) -> EngineSession {
        EngineSession::spawn(move || {
            Ok(Box::new(CountingEngine {
                calls,
                context: None,
            }) as Box<dyn AuthoringEngine>)
        })
        .await
        .expect("spawn")
    }

    #[tokio::test]
    async fn test_calls_are_serialised() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = Arc::new(session(Arc::clone(&calls)).await);

        let tasks = (0..16).map(|_| {
            let s = Arc::clone(&session);
            async move { s.open(Path::new("/a.ipt"), false).await }
        });
        let mut handles: Vec<u64> = futures::future::try_join_all(tasks)
            .await
            .expect("open")
            .into_iter()
            .map(|h| h.0)
            .collect();
        handles.sort_unstable();

        assert_eq!(handles, (0..16).collect::<Vec<u64>>());
        assert_eq!(calls.load(Ordering::SeqCst), 16);
    }

    #[tokio::test]
    async fn test_engine_errors_propagate() {
        let session = session(Arc::new(AtomicUsize::new(0))).await;
        let err = session.full_path(DocumentHandle(1)).await.expect_err("error");
        assert!(matches!(err, ReplicationError::Engine(_)));
        assert_eq!(session.engine_name(), "counting");
        session.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn test_state_persists_across_calls() {
        let session = session(Arc::new(AtomicUsize::new(0))).await;
        session
            .switch_workspace_context(Path::new("/w/a.ipj"))
            .await
            .expect("switch");
        assert_eq!(
            session.active_workspace_context().await.expect("context"),
            Some(PathBuf::from("/w/a.ipj"))
        );
    }

    #[tokio::test]
    async fn test_factory_failure_is_reported() {
        let result = EngineSession::spawn(|| Err(AppError::engine("no license"))).await;
        assert!(matches!(result, Err(ReplicationError::Engine(_))));
    }
}
