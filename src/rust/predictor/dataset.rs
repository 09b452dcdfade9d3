use std::io::Read;
use std::path::Path;

use log::info;
use ndarray::Array2;

use super::encoder::EncoderBank;
use super::error::PredictorError;
use super::record::{Column, FEATURE_COLUMNS};

/// Cell values read as missing, the same set pandas' `read_csv` treats as NA.
const NA_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_missing(value: &str) -> bool {
    NA_TOKENS.contains(&value)
}

/// One historical row of the reference corpus, after missing-value filling.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRow {
    pub state_name: String,
    pub district_name: String,
    pub crop_year: f64,
    pub season: String,
    pub crop: String,
    pub area: f64,
    pub production: i64,
}

/// Immutable historical corpus used to fit the encoder bank and the scaler.
#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    rows: Vec<ReferenceRow>,
}

impl ReferenceDataset {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, PredictorError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PredictorError::Dataset(format!(
                "reference dataset not found: {}",
                path.display()
            )));
        }
        info!("Loading reference dataset from {:?}", path);
        let dataset = Self::from_reader(std::fs::File::open(path)?)?;
        info!("Reference dataset loaded ({} rows)", dataset.len());
        Ok(dataset)
    }

    /// Parses a header-led CSV. Missing cells (empty or an NA token such as
    /// `NaN`, `NA` or `null`) are treated as zero before type coercion:
    /// categorical cells become `"0"` and numeric cells `0`. Any other
    /// numeric cell must parse to a finite number.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PredictorError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = reader.headers()?.clone();

        let required = [
            Column::StateName,
            Column::DistrictName,
            Column::CropYear,
            Column::Season,
            Column::Crop,
            Column::Area,
            Column::Production,
        ];
        let mut indices = [0usize; 7];
        for (slot, column) in indices.iter_mut().zip(required) {
            *slot = headers
                .iter()
                .position(|h| h == column.header())
                .ok_or_else(|| {
                    PredictorError::Dataset(format!("missing column {}", column.header()))
                })?;
        }

        let mut rows = Vec::new();
        for (line, result) in reader.records().enumerate() {
            let record = result?;
            let text = |i: usize| -> String {
                match record.get(indices[i]) {
                    Some(value) if !is_missing(value) => value.to_string(),
                    _ => "0".to_string(),
                }
            };
            let number = |i: usize| -> Result<f64, PredictorError> {
                let raw = record.get(indices[i]).unwrap_or("").trim();
                if is_missing(raw) {
                    return Ok(0.0);
                }
                match raw.parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(value),
                    _ => Err(PredictorError::Dataset(format!(
                        "line {}: column {} is not a finite number: {:?}",
                        line + 2,
                        required[i].header(),
                        raw
                    ))),
                }
            };

            rows.push(ReferenceRow {
                state_name: text(0),
                district_name: text(1),
                crop_year: number(2)?,
                season: text(3),
                crop: text(4),
                area: number(5)?,
                production: number(6)? as i64,
            });
        }

        if rows.is_empty() {
            return Err(PredictorError::Dataset("reference dataset has no rows".into()));
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[ReferenceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Encodes every row into the feature matrix the scaler is fit on,
    /// columns ordered as [`FEATURE_COLUMNS`].
    pub fn feature_matrix(&self, encoders: &EncoderBank) -> Result<Array2<f64>, PredictorError> {
        let mut matrix = Array2::zeros((self.rows.len(), FEATURE_COLUMNS.len()));
        for (mut out, row) in matrix.outer_iter_mut().zip(&self.rows) {
            let encode = |column: Column, value: &str| -> Result<f64, PredictorError> {
                let encoder = encoders.encoder(column).ok_or_else(|| {
                    PredictorError::Dataset(format!("no encoder for column {}", column))
                })?;
                Ok(encoder.encode(value)? as f64)
            };
            out[0] = encode(Column::StateName, &row.state_name)?;
            out[1] = encode(Column::DistrictName, &row.district_name)?;
            out[2] = row.crop_year;
            out[3] = encode(Column::Season, &row.season)?;
            out[4] = encode(Column::Crop, &row.crop)?;
            out[5] = row.area;
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "State_Name,District_Name,Crop_Year,Season,Crop,Area,Production\n\
                       Bihar,Y,2014,Rabi,Wheat,20.0,\n\
                       Assam,X,2013,Kharif,Rice,10.0,125.7\n\
                       ,X,,Kharif,Rice,,3\n";

    #[test]
    fn test_missing_values_become_zero() {
        let dataset = ReferenceDataset::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.rows()[0].production, 0);
        assert_eq!(dataset.rows()[1].production, 125);
        assert_eq!(dataset.rows()[2].state_name, "0");
        assert_eq!(dataset.rows()[2].crop_year, 0.0);
        assert_eq!(dataset.rows()[2].area, 0.0);
    }

    #[test]
    fn test_na_tokens_become_zero() {
        let csv = "State_Name,District_Name,Crop_Year,Season,Crop,Area,Production\n\
                   Assam,X,2013,Kharif,Rice,NaN,2100\n\
                   NA,X,2012,Rabi,null,N/A,nan\n\
                   Bihar,<NA>,None,Rabi,Wheat, NULL ,#N/A\n";
        let dataset = ReferenceDataset::from_reader(csv.as_bytes()).unwrap();
        let rows = dataset.rows();
        assert_eq!(rows[0].area, 0.0);
        assert_eq!(rows[1].state_name, "0");
        assert_eq!(rows[1].crop, "0");
        assert_eq!(rows[1].area, 0.0);
        assert_eq!(rows[1].production, 0);
        assert_eq!(rows[2].district_name, "0");
        assert_eq!(rows[2].crop_year, 0.0);
        assert_eq!(rows[2].area, 0.0);
        assert!(rows.iter().all(|row| row.area.is_finite()));
    }

    #[test]
    fn test_infinite_number_is_rejected() {
        let csv = "State_Name,District_Name,Crop_Year,Season,Crop,Area,Production\n\
                   Assam,X,2013,Kharif,Rice,10.0,1\n\
                   Assam,X,2013,Kharif,Rice,inf,1\n";
        match ReferenceDataset::from_reader(csv.as_bytes()) {
            Err(PredictorError::Dataset(message)) => {
                assert!(message.contains("line 3"));
                assert!(message.contains("Area"));
            }
            other => panic!("expected a dataset error, got {:?}", other),
        }
    }

    #[test]
    fn test_feature_matrix_order() {
        let dataset = ReferenceDataset::from_reader(CSV.as_bytes()).unwrap();
        let encoders = EncoderBank::fit(&dataset);
        let matrix = dataset.feature_matrix(&encoders).unwrap();
        assert_eq!(matrix.dim(), (3, 6));
        // "0" < "Assam" < "Bihar"
        assert_eq!(matrix.row(0).to_vec(), vec![2.0, 1.0, 2014.0, 1.0, 1.0, 20.0]);
        assert_eq!(matrix.row(1).to_vec(), vec![1.0, 0.0, 2013.0, 0.0, 0.0, 10.0]);
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let csv = "State_Name,District_Name,Crop_Year,Season,Crop,Area\n\
                   Assam,X,2013,Kharif,Rice,1\n";
        assert!(matches!(
            ReferenceDataset::from_reader(csv.as_bytes()),
            Err(PredictorError::Dataset(_))
        ));
    }

    #[test]
    fn test_empty_dataset_is_rejected() {
        let csv = "State_Name,District_Name,Crop_Year,Season,Crop,Area,Production\n";
        assert!(ReferenceDataset::from_reader(csv.as_bytes()).is_err());
    }
}
