use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

use crate::pipeline::{ColorizeError, Colorizer};

/// Pending jobs beyond this make senders wait
const QUEUE_DEPTH: usize = 16;

/// Request routed to the inference worker thread.
pub enum WorkerRequest {
    Colorize {
        input: PathBuf,
        output: PathBuf,
        response_tx: oneshot::Sender<Result<PathBuf, ColorizeError>>,
    },
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("inference worker unavailable")]
    Unavailable,
    #[error(transparent)]
    Colorize(#[from] ColorizeError),
}

/// Handle to the thread that owns the inference session.
///
/// The session is moved into the thread, so model state is never shared
/// between requests running in parallel; jobs are served one at a time.
#[derive(Clone)]
pub struct ColorizeWorker {
    tx: mpsc::Sender<WorkerRequest>,
}

impl ColorizeWorker {
    pub fn spawn(mut colorizer: Colorizer) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::channel::<WorkerRequest>(QUEUE_DEPTH);

        std::thread::Builder::new()
            .name("colorize-worker".to_string())
            .spawn(move || {
                tracing::info!("Inference worker started with model {}", colorizer.model_name());
                while let Some(req) = rx.blocking_recv() {
                    match req {
                        WorkerRequest::Colorize {
                            input,
                            output,
                            response_tx,
                        } => {
                            let result = colorizer.colorize(&input, &output);
                            if let Err(e) = &result {
                                tracing::error!("{}", e);
                            }
                            // The requester may have gone away
                            let _ = response_tx.send(result);
                        }
                        WorkerRequest::Shutdown => break,
                    }
                }
                tracing::info!("Inference worker stopped");
            })?;

        Ok(ColorizeWorker { tx })
    }

    /// Colorize `input` into `output` and wait for the result.
    pub async fn colorize(&self, input: PathBuf, output: PathBuf) -> Result<PathBuf, WorkerError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.tx
            .send(WorkerRequest::Colorize {
                input,
                output,
                response_tx,
            })
            .await
            .map_err(|_| WorkerError::Unavailable)?;

        let path = response_rx.await.map_err(|_| WorkerError::Unavailable)??;
        Ok(path)
    }

    /// Ask the worker thread to exit once queued jobs are done.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(WorkerRequest::Shutdown).await;
    }
}

impl std::fmt::Debug for ColorizeWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorizeWorker")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{Broken, FixedChroma};
    use image::{GenericImageView, Rgb, RgbImage};

    #[tokio::test]
    async fn test_worker_colorizes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        RgbImage::from_pixel(20, 10, Rgb([10, 20, 30])).save(&input).unwrap();

        let worker = ColorizeWorker::spawn(Colorizer::new(Box::new(FixedChroma { a: 0.0, b: 0.0 }))).unwrap();
        let written = worker.colorize(input, output.clone()).await.unwrap();

        assert_eq!(written, output);
        assert_eq!(image::open(&output).unwrap().dimensions(), (20, 10));
    }

    #[tokio::test]
    async fn test_worker_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        RgbImage::new(4, 4).save(&input).unwrap();

        let worker = ColorizeWorker::spawn(Colorizer::new(Box::new(Broken))).unwrap();
        let err = worker.colorize(input, dir.path().join("out.png")).await.unwrap_err();
        assert!(matches!(err, WorkerError::Colorize(_)));
    }

    #[tokio::test]
    async fn test_shutdown_makes_worker_unavailable() {
        let worker = ColorizeWorker::spawn(Colorizer::new(Box::new(FixedChroma { a: 0.0, b: 0.0 }))).unwrap();
        worker.shutdown().await;

        // Queued behind the shutdown request, so it is dropped unanswered
        let err = worker.colorize("a.png".into(), "b.png".into()).await.unwrap_err();
        assert!(matches!(err, WorkerError::Unavailable));
    }
}
