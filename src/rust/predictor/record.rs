use std::fmt;
use std::io::Read;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::error::PredictorError;

/// Columns of the crop table, named by their CSV headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    StateName,
    DistrictName,
    CropYear,
    Season,
    Crop,
    Area,
    Production,
}

/// Feature columns in the order the scaler and every model expect them.
pub const FEATURE_COLUMNS: [Column; 6] = [
    Column::StateName,
    Column::DistrictName,
    Column::CropYear,
    Column::Season,
    Column::Crop,
    Column::Area,
];

/// Columns encoded by the encoder bank.
pub const CATEGORICAL_COLUMNS: [Column; 4] = [
    Column::StateName,
    Column::DistrictName,
    Column::Season,
    Column::Crop,
];

impl Column {
    pub fn header(&self) -> &'static str {
        match self {
            Self::StateName => "State_Name",
            Self::DistrictName => "District_Name",
            Self::CropYear => "Crop_Year",
            Self::Season => "Season",
            Self::Crop => "Crop",
            Self::Area => "Area",
            Self::Production => "Production",
        }
    }

    pub fn is_categorical(&self) -> bool {
        CATEGORICAL_COLUMNS.contains(self)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// Binary yield outcome. The discriminant is the model's output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum YieldClass {
    Less = 0,
    High = 1,
}

impl YieldClass {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Less),
            1 => Some(Self::High),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

impl From<YieldClass> for u8 {
    fn from(class: YieldClass) -> Self {
        class.index()
    }
}

/// A single prediction query. Production is never part of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputRecord {
    #[serde(rename = "State_Name")]
    pub state_name: String,
    #[serde(rename = "District_Name")]
    pub district_name: String,
    #[serde(rename = "Crop_Year")]
    pub crop_year: i32,
    #[serde(rename = "Season")]
    pub season: String,
    #[serde(rename = "Crop")]
    pub crop: String,
    #[serde(rename = "Area")]
    pub area: f64,
}

impl InputRecord {
    pub fn new(
        state_name: impl Into<String>,
        district_name: impl Into<String>,
        crop_year: i32,
        season: impl Into<String>,
        crop: impl Into<String>,
        area: f64,
    ) -> Self {
        Self {
            state_name: state_name.into(),
            district_name: district_name.into(),
            crop_year,
            season: season.into(),
            crop: crop.into(),
            area,
        }
    }

    /// Builds a record from a JSON object whose keys are exactly the six
    /// feature columns. Missing and unexpected keys are reported by name.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, PredictorError> {
        let object = value
            .as_object()
            .ok_or_else(|| PredictorError::validation("record", "expected a JSON object"))?;

        for column in FEATURE_COLUMNS {
            if !object.contains_key(column.header()) {
                return Err(PredictorError::validation(column.header(), "missing field"));
            }
        }
        if let Some(extra) = object
            .keys()
            .find(|key| !FEATURE_COLUMNS.iter().any(|c| c.header() == key.as_str()))
        {
            return Err(PredictorError::validation(extra.as_str(), "unexpected field"));
        }

        for column in FEATURE_COLUMNS {
            let field = &object[column.header()];
            let well_typed = match column {
                Column::CropYear => field.as_i64().is_some(),
                Column::Area => field.as_f64().is_some(),
                _ => field.is_string(),
            };
            if !well_typed {
                let expected = match column {
                    Column::CropYear => "an integer",
                    Column::Area => "a number",
                    _ => "a string",
                };
                return Err(PredictorError::validation(
                    column.header(),
                    format!("expected {}, got {}", expected, field),
                ));
            }
        }

        let record: InputRecord = serde_json::from_value(value.clone())
            .map_err(|e| PredictorError::validation("record", e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Checks the numeric fields can be fed to the scaler
    pub fn validate(&self) -> Result<(), PredictorError> {
        if !self.area.is_finite() {
            return Err(PredictorError::validation(
                Column::Area.header(),
                format!("must be a finite number, got {}", self.area),
            ));
        }
        Ok(())
    }

    /// Returns the value of a categorical column
    pub fn category(&self, column: Column) -> Option<&str> {
        match column {
            Column::StateName => Some(&self.state_name),
            Column::DistrictName => Some(&self.district_name),
            Column::Season => Some(&self.season),
            Column::Crop => Some(&self.crop),
            _ => None,
        }
    }
}

/// A batch of input records read from a delimited file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputTable {
    pub records: Vec<InputRecord>,
}

impl InputTable {
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self, PredictorError> {
        let path = path.as_ref();
        debug!("Reading batch table from {:?}", path);
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Reads a header-led CSV table. The six feature columns must be present;
    /// Production is dropped and any other column is ignored.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, PredictorError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = reader.headers()?.clone();

        let mut indices = [0usize; 6];
        for (slot, column) in indices.iter_mut().zip(FEATURE_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h == column.header())
                .ok_or_else(|| PredictorError::validation(column.header(), "missing column"))?;
        }
        for header in headers.iter() {
            let known = FEATURE_COLUMNS.iter().any(|c| c.header() == header)
                || header == Column::Production.header();
            if !known {
                warn!("Ignoring unexpected column {:?} in batch table", header);
            }
        }

        let mut records = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let line = result?;
            let cell = |i: usize| line.get(indices[i]).unwrap_or("");

            let crop_year = cell(2).trim().parse::<i32>().map_err(|_| {
                PredictorError::validation(
                    Column::CropYear.header(),
                    format!("row {}: expected an integer, got {:?}", row + 1, cell(2)),
                )
            })?;
            let area = cell(5).trim().parse::<f64>().map_err(|_| {
                PredictorError::validation(
                    Column::Area.header(),
                    format!("row {}: expected a number, got {:?}", row + 1, cell(5)),
                )
            })?;

            let record = InputRecord::new(cell(0), cell(1), crop_year, cell(3), cell(4), area);
            record.validate()?;
            records.push(record);
        }

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<InputRecord>> for InputTable {
    fn from(records: Vec<InputRecord>) -> Self {
        Self { records }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_json() {
        let record = InputRecord::from_json(&json!({
            "State_Name": "Assam",
            "District_Name": "X",
            "Crop_Year": 2013,
            "Season": "Kharif",
            "Crop": "Rice",
            "Area": 1000.0
        }))
        .unwrap();
        assert_eq!(record, InputRecord::new("Assam", "X", 2013, "Kharif", "Rice", 1000.0));
    }

    #[test]
    fn test_missing_field_is_named() {
        let err = InputRecord::from_json(&json!({
            "State_Name": "Assam",
            "District_Name": "X",
            "Crop_Year": 2013,
            "Crop": "Rice",
            "Area": 1000.0
        }))
        .unwrap_err();
        assert_eq!(err.field(), Some("Season"));
    }

    #[test]
    fn test_unexpected_field_is_rejected() {
        let err = InputRecord::from_json(&json!({
            "State_Name": "Assam",
            "District_Name": "X",
            "Crop_Year": 2013,
            "Season": "Kharif",
            "Crop": "Rice",
            "Area": 1000.0,
            "Production": 5
        }))
        .unwrap_err();
        assert_eq!(err.field(), Some("Production"));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let err = InputRecord::from_json(&json!({
            "State_Name": "Assam",
            "District_Name": "X",
            "Crop_Year": "2013",
            "Season": "Kharif",
            "Crop": "Rice",
            "Area": 1000.0
        }))
        .unwrap_err();
        assert_eq!(err.field(), Some("Crop_Year"));
    }

    #[test]
    fn test_table_drops_production_and_reorders() {
        let csv = "Crop,Production,Area,State_Name,Season,District_Name,Crop_Year\n\
                   Rice,12,1000.5,Assam,Kharif,X,2013\n";
        let table = InputTable::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.records[0],
            InputRecord::new("Assam", "X", 2013, "Kharif", "Rice", 1000.5)
        );
    }

    #[test]
    fn test_table_missing_column() {
        let csv = "State_Name,District_Name,Crop_Year,Season,Area\nAssam,X,2013,Kharif,1.0\n";
        let err = InputTable::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert_eq!(err.field(), Some("Crop"));
    }

    #[test]
    fn test_table_bad_number() {
        let csv = "State_Name,District_Name,Crop_Year,Season,Crop,Area\n\
                   Assam,X,soon,Kharif,Rice,1.0\n";
        let err = InputTable::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert_eq!(err.field(), Some("Crop_Year"));
    }

    #[test]
    fn test_yield_class_index() {
        assert_eq!(YieldClass::from_index(0), Some(YieldClass::Less));
        assert_eq!(YieldClass::from_index(1), Some(YieldClass::High));
        assert_eq!(YieldClass::from_index(2), None);
        assert_eq!(u8::from(YieldClass::High), 1);
    }
}
