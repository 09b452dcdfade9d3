use std::collections::{BTreeSet, HashMap};

use super::dataset::ReferenceDataset;
use super::error::PredictorError;
use super::record::{Column, InputRecord};

/// Maps a frozen, sorted vocabulary of strings to zero-based integer codes.
///
/// There is no fallback bucket: encoding a value that was not seen at fit
/// time fails with [`PredictorError::UnknownCategory`].
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    column: Column,
    classes: Vec<String>,
    codes: HashMap<String, usize>,
}

impl LabelEncoder {
    /// Fits an encoder over the observed values of `column`. Codes follow the
    /// lexicographic order of the deduplicated values.
    pub fn fit<I, S>(column: Column, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: Vec<String> = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let codes = classes
            .iter()
            .enumerate()
            .map(|(code, class)| (class.clone(), code))
            .collect();

        Self { column, classes, codes }
    }

    pub fn encode(&self, value: &str) -> Result<usize, PredictorError> {
        self.codes
            .get(value)
            .copied()
            .ok_or_else(|| PredictorError::UnknownCategory {
                column: self.column,
                value: value.to_string(),
            })
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn column(&self) -> Column {
        self.column
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// The four categorical encoders, fit independently from the reference dataset.
#[derive(Debug, Clone)]
pub struct EncoderBank {
    state: LabelEncoder,
    district: LabelEncoder,
    season: LabelEncoder,
    crop: LabelEncoder,
}

/// Integer codes for the categorical fields of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedCategories {
    pub state: usize,
    pub district: usize,
    pub season: usize,
    pub crop: usize,
}

impl EncoderBank {
    pub fn fit(dataset: &ReferenceDataset) -> Self {
        let rows = dataset.rows();
        Self {
            state: LabelEncoder::fit(Column::StateName, rows.iter().map(|r| &r.state_name)),
            district: LabelEncoder::fit(
                Column::DistrictName,
                rows.iter().map(|r| &r.district_name),
            ),
            season: LabelEncoder::fit(Column::Season, rows.iter().map(|r| &r.season)),
            crop: LabelEncoder::fit(Column::Crop, rows.iter().map(|r| &r.crop)),
        }
    }

    pub fn encoder(&self, column: Column) -> Option<&LabelEncoder> {
        match column {
            Column::StateName => Some(&self.state),
            Column::DistrictName => Some(&self.district),
            Column::Season => Some(&self.season),
            Column::Crop => Some(&self.crop),
            _ => None,
        }
    }

    pub fn encode(&self, record: &InputRecord) -> Result<EncodedCategories, PredictorError> {
        Ok(EncodedCategories {
            state: self.state.encode(&record.state_name)?,
            district: self.district.encode(&record.district_name)?,
            season: self.season.encode(&record.season)?,
            crop: self.crop.encode(&record.crop)?,
        })
    }

    /// Vocabulary size per categorical column, in encoding order
    pub fn vocabulary_sizes(&self) -> [(Column, usize); 4] {
        [
            (Column::StateName, self.state.len()),
            (Column::DistrictName, self.district.len()),
            (Column::Season, self.season.len()),
            (Column::Crop, self.crop.len()),
        ]
    }
}
