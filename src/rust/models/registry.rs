use std::fmt;
use std::str::FromStr;

use super::topology::{Activation, InputLayout, LayerSpec, Topology};
use crate::predictor::PredictorError;

/// The three supported model architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    FeedForward,
    SimpleRecurrent,
    Lstm,
}

const FEEDFORWARD_LAYERS: &[LayerSpec] = &[
    LayerSpec::Dense { units: 64, activation: Activation::Relu },
    LayerSpec::Dense { units: 64, activation: Activation::Relu },
    LayerSpec::Dense { units: 2, activation: Activation::Softmax },
];

const SIMPLE_RECURRENT_LAYERS: &[LayerSpec] = &[
    LayerSpec::Dense { units: 256, activation: Activation::Relu },
    LayerSpec::Dense { units: 128, activation: Activation::Relu },
    LayerSpec::Dense { units: 2, activation: Activation::Softmax },
];

const LSTM_LAYERS: &[LayerSpec] = &[
    LayerSpec::Lstm { units: 512 },
    LayerSpec::Dropout { rate: 0.5 },
    LayerSpec::Dense { units: 256, activation: Activation::Relu },
    LayerSpec::Dense { units: 2, activation: Activation::Softmax },
];

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [Self::FeedForward, Self::SimpleRecurrent, Self::Lstm];

    /// Canonical architecture name
    pub fn name(self) -> &'static str {
        match self {
            Self::FeedForward => "feedforward",
            Self::SimpleRecurrent => "simple-recurrent",
            Self::Lstm => "lstm",
        }
    }

    /// Prefix of the artifact file names, e.g. `rnn` in `rnnmodel.json`
    pub fn artifact_stem(self) -> &'static str {
        match self {
            Self::FeedForward => "ff",
            Self::SimpleRecurrent => "rnn",
            Self::Lstm => "lstm",
        }
    }

    pub fn layers(self) -> &'static [LayerSpec] {
        match self {
            Self::FeedForward => FEEDFORWARD_LAYERS,
            Self::SimpleRecurrent => SIMPLE_RECURRENT_LAYERS,
            Self::Lstm => LSTM_LAYERS,
        }
    }

    pub fn input_layout(self, features: usize) -> InputLayout {
        match self {
            Self::Lstm => InputLayout::Sequence { steps: features, width: 1 },
            Self::FeedForward | Self::SimpleRecurrent => InputLayout::Flat { features },
        }
    }

    /// Registry topology for `features` encoded input columns
    pub fn architecture(self, features: usize) -> Topology {
        Topology {
            input: self.input_layout(features),
            layers: self.layers().to_vec(),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = PredictorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "feedforward" | "ff" => Ok(Self::FeedForward),
            "simple-recurrent" | "rnn" => Ok(Self::SimpleRecurrent),
            "lstm" => Ok(Self::Lstm),
            other => Err(PredictorError::UnknownModelKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_aliases() {
        assert_eq!("ff".parse::<ModelKind>().unwrap(), ModelKind::FeedForward);
        assert_eq!("FeedForward".parse::<ModelKind>().unwrap(), ModelKind::FeedForward);
        assert_eq!("rnn".parse::<ModelKind>().unwrap(), ModelKind::SimpleRecurrent);
        assert_eq!("simple-recurrent".parse::<ModelKind>().unwrap(), ModelKind::SimpleRecurrent);
        assert_eq!("LSTM".parse::<ModelKind>().unwrap(), ModelKind::Lstm);
        assert!(matches!(
            "gru".parse::<ModelKind>(),
            Err(PredictorError::UnknownModelKind(_))
        ));
    }

    #[test]
    fn test_registry_topologies_are_executable() {
        for kind in ModelKind::ALL {
            let topology = kind.architecture(6);
            assert_eq!(topology.validate(), Ok(2), "{} should emit two classes", kind);
        }
    }

    #[test]
    fn test_only_lstm_takes_sequences() {
        assert_eq!(ModelKind::Lstm.input_layout(6), InputLayout::Sequence { steps: 6, width: 1 });
        assert_eq!(ModelKind::FeedForward.input_layout(6), InputLayout::Flat { features: 6 });
        assert_eq!(ModelKind::SimpleRecurrent.input_layout(6), InputLayout::Flat { features: 6 });
    }

    #[test]
    fn test_lstm_manifest_shapes() {
        let manifest = ModelKind::Lstm.architecture(6).weight_manifest();
        assert_eq!(manifest[0], ("layers.0.weight_ih_l0".to_string(), vec![2048, 1]));
        assert_eq!(manifest[1], ("layers.0.weight_hh_l0".to_string(), vec![2048, 512]));
        assert_eq!(manifest.last().unwrap().1, vec![2]);
    }
}
