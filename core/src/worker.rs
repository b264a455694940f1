//! Background prediction worker.
//!
//! Model inference runs on a dedicated thread. Every request carries the
//! buffer generation it was issued for; the engine applies a response only
//! while that generation is still current. When requests pile up, the worker
//! answers only the newest one.

use crate::candidate::Candidate;
use crate::prediction::Predictor;
use kanal::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub generation: u64,
    pub romanization: String,
    pub context: String,
    pub max_predictions: usize,
}

#[derive(Debug, Clone)]
pub struct PredictionResponse {
    pub generation: u64,
    pub romanization: String,
    pub candidates: Vec<Candidate>,
}

/// Owns the worker thread; dropping it closes the queue and joins.
pub struct PredictionWorker {
    requests: Option<Sender<PredictionRequest>>,
    responses: Receiver<PredictionResponse>,
    handle: Option<JoinHandle<()>>,
}

impl PredictionWorker {
    pub fn spawn(predictor: Arc<dyn Predictor>) -> std::io::Result<Self> {
        let (request_tx, request_rx) = kanal::unbounded::<PredictionRequest>();
        let (response_tx, response_rx) = kanal::unbounded::<PredictionResponse>();
        let handle = std::thread::Builder::new()
            .name("hanzi-prediction".into())
            .spawn(move || run(predictor, request_rx, response_tx))?;
        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            handle: Some(handle),
        })
    }

    /// Queue a request. Returns `false` if the worker has stopped.
    pub fn submit(&self, request: PredictionRequest) -> bool {
        match &self.requests {
            Some(tx) => tx.send(request).is_ok(),
            None => false,
        }
    }

    /// Next finished response, if any, without blocking.
    pub fn try_next(&self) -> Option<PredictionResponse> {
        match self.responses.try_recv() {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "prediction worker channel closed");
                None
            }
        }
    }

    /// Next finished response, waiting up to `timeout`.
    pub fn next_timeout(&self, timeout: Duration) -> Option<PredictionResponse> {
        self.responses.recv_timeout(timeout).ok()
    }
}

impl Drop for PredictionWorker {
    fn drop(&mut self) {
        // closing the sender ends the worker loop
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("prediction worker panicked");
            }
        }
    }
}

fn run(
    predictor: Arc<dyn Predictor>,
    requests: Receiver<PredictionRequest>,
    responses: Sender<PredictionResponse>,
) {
    while let Ok(mut request) = requests.recv() {
        // only the newest pending request matters
        while let Ok(Some(newer)) = requests.try_recv() {
            debug!(skipped = request.generation, "superseded prediction request");
            request = newer;
        }
        let candidates =
            predictor.predict(&request.romanization, &request.context, request.max_predictions);
        let response = PredictionResponse {
            generation: request.generation,
            romanization: request.romanization,
            candidates,
        };
        if responses.send(response).is_err() {
            break;
        }
    }
    debug!("prediction worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    struct EchoPredictor;

    impl Predictor for EchoPredictor {
        fn is_available(&self) -> bool {
            true
        }

        fn predict(&self, romanization: &str, _context: &str, max: usize) -> Vec<Candidate> {
            (0..max)
                .map(|i| Candidate::predicted(format!("{}{}", romanization, i), romanization, 0.9))
                .collect()
        }

        fn learn_pattern(&self, _input: &str, _selected: &str) {}

        fn set_threshold(&self, _threshold: f64) {}

        fn reload_model(&self, _path: &Path) -> bool {
            false
        }
    }

    #[test]
    fn responses_carry_request_generation() {
        let worker = PredictionWorker::spawn(Arc::new(EchoPredictor)).unwrap();
        assert!(worker.submit(PredictionRequest {
            generation: 7,
            romanization: "ni".into(),
            context: String::new(),
            max_predictions: 2,
        }));

        let resp = worker.next_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(resp.generation, 7);
        assert_eq!(resp.romanization, "ni");
        assert_eq!(resp.candidates.len(), 2);
    }

    #[test]
    fn try_next_does_not_block() {
        let worker = PredictionWorker::spawn(Arc::new(EchoPredictor)).unwrap();
        assert!(worker.try_next().is_none());
    }
}
