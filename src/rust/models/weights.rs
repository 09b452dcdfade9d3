use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use log::debug;

use crate::predictor::PredictorError;

/// Named weight tensors read from a safetensors artifact.
///
/// Tensors keep the dtype they were stored with; the var builder handed to
/// the network converts them to F32 and checks every shape on access.
#[derive(Debug, Clone, Default)]
pub struct WeightStore {
    tensors: HashMap<String, Tensor>,
}

impl WeightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PredictorError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PredictorError::MissingArtifact(path.to_path_buf()));
        }
        let tensors = candle_core::safetensors::load(path, &Device::Cpu).map_err(unreadable)?;
        debug!("Loaded {} weight tensors from {:?}", tensors.len(), path);
        Ok(Self { tensors })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PredictorError> {
        candle_core::safetensors::save(&self.tensors, path)
            .map_err(|e| PredictorError::WeightShape(format!("cannot encode weights: {}", e)))
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn into_var_builder(self) -> VarBuilder<'static> {
        VarBuilder::from_tensors(self.tensors, DType::F32, &Device::Cpu)
    }
}

fn unreadable(e: candle_core::Error) -> PredictorError {
    PredictorError::WeightShape(format!("unreadable weight artifact: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_preserves_values_and_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.safetensors");
        let mut store = WeightStore::new();
        let weight = Tensor::new(&[[1.5f32, -2.0], [0.25, 4.0]], &Device::Cpu).unwrap();
        store.insert("layers.0.weight", weight);
        store.insert("layers.0.bias", Tensor::new(&[0.5f32, -0.5], &Device::Cpu).unwrap());
        store.save(&path).unwrap();

        let loaded = WeightStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        let weight = loaded.get("layers.0.weight").unwrap();
        assert_eq!(weight.to_vec2::<f32>().unwrap(), vec![vec![1.5, -2.0], vec![0.25, 4.0]]);
        assert_eq!(loaded.get("layers.0.bias").unwrap().dims(), &[2]);
    }

    #[test]
    fn test_var_builder_checks_shape() {
        let mut store = WeightStore::new();
        store.insert("layers.0.bias", Tensor::new(&[0.5f32, -0.5], &Device::Cpu).unwrap());
        let vb = store.into_var_builder();
        assert!(vb.get(2, "layers.0.bias").is_ok());
        assert!(vb.get(3, "layers.0.bias").is_err());
        assert!(vb.get(2, "layers.1.bias").is_err());
    }

    #[test]
    fn test_f64_tensors_are_narrowed() {
        let mut store = WeightStore::new();
        store.insert("layers.0.bias", Tensor::new(&[0.5f64, -0.25], &Device::Cpu).unwrap());
        let bias = store.into_var_builder().get(2, "layers.0.bias").unwrap();
        assert_eq!(bias.dtype(), DType::F32);
        assert_eq!(bias.to_vec1::<f32>().unwrap(), vec![0.5, -0.25]);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.safetensors");
        std::fs::write(&path, b"not a safetensors file").unwrap();
        assert!(matches!(
            WeightStore::load(&path),
            Err(PredictorError::WeightShape(_))
        ));
        assert!(matches!(
            WeightStore::load("/nonexistent/weights.safetensors"),
            Err(PredictorError::MissingArtifact(_))
        ));
    }
}
