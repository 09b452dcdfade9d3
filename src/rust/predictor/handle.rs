use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use super::pipeline::Predictor;

/// Shared holder for a predictor that can be replaced while serving.
///
/// Callers take a snapshot with [`current`](Self::current) for the duration
/// of a request. [`replace`](Self::replace) swaps in a fully built predictor,
/// so in-flight calls keep the one they started with.
#[derive(Debug, Clone)]
pub struct PredictorHandle {
    inner: Arc<RwLock<Arc<Predictor>>>,
}

impl PredictorHandle {
    pub fn new(predictor: Predictor) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(predictor))),
        }
    }

    pub fn current(&self) -> Arc<Predictor> {
        Arc::clone(&self.inner.read())
    }

    /// Installs a new predictor and returns the previous one
    pub fn replace(&self, predictor: Predictor) -> Arc<Predictor> {
        let next = Arc::new(predictor);
        info!("Swapping in {} predictor", next.info().kind);
        std::mem::replace(&mut *self.inner.write(), next)
    }
}

impl From<Predictor> for PredictorHandle {
    fn from(predictor: Predictor) -> Self {
        Self::new(predictor)
    }
}
