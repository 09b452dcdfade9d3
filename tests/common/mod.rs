#![allow(dead_code)]

use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use cropcast::{DirectLoad, InputRecord, ModelKind, Predictor, Topology, WeightStore};
use env_logger::{Builder, Env};
use tempfile::TempDir;

pub const DATASET_CSV: &str = "\
State_Name,District_Name,Crop_Year,Season,Crop,Area,Production
Assam,X,2013,Kharif,Rice,1000.0,2100
Assam,Y,2012,Rabi,Wheat,450.0,600
Bihar,Z,2014,Kharif,Rice,1200.0,3300
Bihar,X,2011,Rabi,Wheat,300.0,
Assam,Z,2010,Kharif,Wheat,800.0,1500
Bihar,Y,2015,Rabi,Rice,150.0,90
";

pub const FEEDFORWARD_JSON: &str = r#"{
    "class_name": "Sequential",
    "config": {
        "name": "sequential",
        "layers": [
            {"class_name": "InputLayer",
             "config": {"batch_input_shape": [null, 6], "dtype": "float32"}},
            {"class_name": "Dense", "config": {"units": 16, "activation": "relu"}},
            {"class_name": "Dense", "config": {"units": 8, "activation": "relu"}},
            {"class_name": "Dense", "config": {"units": 2, "activation": "softmax"}}
        ]
    },
    "keras_version": "2.12.0"
}"#;

pub const LSTM_JSON: &str = r#"{
    "class_name": "Sequential",
    "config": {
        "layers": [
            {"class_name": "InputLayer", "config": {"batch_input_shape": [null, 6, 1]}},
            {"class_name": "LSTM",
             "config": {"units": 8, "activation": "tanh", "recurrent_activation": "sigmoid"}},
            {"class_name": "Dropout", "config": {"rate": 0.5}},
            {"class_name": "Dense", "config": {"units": 4, "activation": "relu"}},
            {"class_name": "Dense", "config": {"units": 2, "activation": "softmax"}}
        ]
    }
}"#;

/// Well-formed descriptor the native runtime cannot execute
pub const FUNCTIONAL_JSON: &str = r#"{
    "class_name": "Functional",
    "config": {"name": "model", "layers": [], "input_layers": [], "output_layers": []}
}"#;

pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// Temporary directory holding a reference dataset and a models directory
pub struct Fixture {
    pub dir: TempDir,
    pub dataset: PathBuf,
    pub models: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        init();
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dataset = dir.path().join("crops.csv");
        std::fs::write(&dataset, DATASET_CSV).expect("Failed to write dataset");
        let models = dir.path().join("model");
        std::fs::create_dir_all(&models).expect("Failed to create models dir");
        Self { dir, dataset, models }
    }

    /// Writes `<stem>model.json` with the given descriptor and weights shaped
    /// for `weights_for`
    pub fn write_model(&self, stem: &str, json: &str, weights_for: &Topology) {
        std::fs::write(self.models.join(format!("{stem}model.json")), json)
            .expect("Failed to write topology");
        write_weights(weights_for, &self.models.join(format!("{stem}model_weights.safetensors")));
    }

    /// Installs artifacts for a registered kind: feedforward and lstm load
    /// directly, simple-recurrent only through the registry rebuild.
    pub fn install(&self, kind: ModelKind) {
        match kind {
            ModelKind::FeedForward => {
                self.write_model("ff", FEEDFORWARD_JSON, &parsed(FEEDFORWARD_JSON))
            }
            ModelKind::Lstm => self.write_model("lstm", LSTM_JSON, &parsed(LSTM_JSON)),
            ModelKind::SimpleRecurrent => {
                let registry = ModelKind::SimpleRecurrent.architecture(6);
                self.write_model("rnn", FUNCTIONAL_JSON, &registry)
            }
        }
    }

    pub fn predictor(&self, kind: ModelKind) -> Predictor {
        self.install(kind);
        Predictor::builder()
            .with_model(kind)
            .with_models_dir(&self.models)
            .with_dataset_path(&self.dataset)
            .build()
            .expect("Failed to build predictor")
    }
}

pub fn parsed(json: &str) -> Topology {
    match Topology::from_keras_json(json).expect("valid JSON") {
        DirectLoad::Parsed(topology) => topology,
        DirectLoad::NeedsRebuild(reason) => panic!("fixture needs rebuild: {}", reason),
    }
}

/// Deterministic small weights for every tensor of the topology
pub fn write_weights(topology: &Topology, path: &Path) {
    let mut store = WeightStore::new();
    for (t, (name, shape)) in topology.weight_manifest().into_iter().enumerate() {
        let len: usize = shape.iter().product();
        let values: Vec<f32> = (0..len)
            .map(|i| ((i as f32) * 0.37 + (t as f32) * 1.3).sin() * 0.2)
            .collect();
        let tensor = Tensor::from_vec(values, shape, &Device::Cpu).expect("manifest shape");
        store.insert(name, tensor);
    }
    store.save(path).expect("Failed to write weights");
}

pub fn assam_rice() -> InputRecord {
    InputRecord::new("Assam", "X", 2013, "Kharif", "Rice", 1000.0)
}

pub fn bihar_wheat() -> InputRecord {
    InputRecord::new("Bihar", "Y", 2012, "Rabi", "Wheat", 275.5)
}
