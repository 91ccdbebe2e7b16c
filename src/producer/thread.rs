//! Dedicated producer thread

use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::oneshot;

use super::engine::{EngineError, InferenceEngine, PredictionSink, StopToken};

type ExitReceiver = oneshot::Receiver<Result<(), EngineError>>;

/// Handle to the thread driving an `InferenceEngine`
///
/// The thread calls `start` then blocks in `join`. Its exit, normal or not,
/// is reported back through a oneshot so the async side can notice a dead
/// producer.
pub struct ProducerHandle {
    stop: StopToken,
    exit_rx: Option<ExitReceiver>,
    thread: Option<JoinHandle<()>>,
}

impl ProducerHandle {
    /// Spawn the producer thread and wait for the engine to start
    ///
    /// Start failures are returned here rather than reported as an exit.
    pub async fn spawn<E: InferenceEngine>(
        mut engine: E,
        sink: PredictionSink,
        stop: StopToken,
    ) -> Result<Self, EngineError> {
        let (started_tx, started_rx) = oneshot::channel::<Result<(), EngineError>>();
        let (exit_tx, exit_rx) = oneshot::channel();
        let thread_stop = stop.clone();

        let thread = std::thread::Builder::new()
            .name("relay-producer".into())
            .spawn(move || {
                if let Err(e) = engine.start(sink, thread_stop) {
                    let _ = started_tx.send(Err(e));
                    return;
                }
                let _ = started_tx.send(Ok(()));

                let _ = exit_tx.send(engine.join());
            })?;

        let started = started_rx.await.unwrap_or(Err(EngineError::Panicked));
        if let Err(e) = started {
            join_thread(thread).await;
            return Err(e);
        }

        tracing::info!("Producer started");

        Ok(Self {
            stop,
            exit_rx: Some(exit_rx),
            thread: Some(thread),
        })
    }

    pub fn stop_token(&self) -> &StopToken {
        &self.stop
    }

    /// Whether the exit has already been observed
    pub fn has_exited(&self) -> bool {
        self.exit_rx.is_none()
    }

    /// Resolves once, when the producer thread exits
    ///
    /// Cancel-safe. After the exit has been observed this never resolves
    /// again.
    pub async fn exited(&mut self) -> Result<(), EngineError> {
        let Some(rx) = self.exit_rx.as_mut() else {
            return std::future::pending().await;
        };

        let result = rx.await.unwrap_or(Err(EngineError::Panicked));
        self.exit_rx = None;
        result
    }

    /// Request a stop and wait up to `timeout` for the thread to finish
    ///
    /// Returns `false` if the engine did not stop in time; the thread is then
    /// detached, never killed.
    pub async fn shutdown(mut self, timeout: Duration) -> bool {
        self.stop.stop();

        if let Some(rx) = self.exit_rx.take() {
            match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(Ok(()))) => tracing::info!("Producer stopped"),
                Ok(Ok(Err(e))) => tracing::error!(error = %e, "Producer stopped with error"),
                Ok(Err(_)) => tracing::error!("Producer thread panicked"),
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = timeout.as_millis() as u64,
                        "Producer did not stop in time, detaching"
                    );
                    return false;
                }
            }
        }

        if let Some(thread) = self.thread.take() {
            join_thread(thread).await;
        }
        true
    }
}

async fn join_thread(thread: JoinHandle<()>) {
    let _ = tokio::task::spawn_blocking(move || thread.join()).await;
}
