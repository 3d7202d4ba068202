use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One buffered reading from a device or sensor group.
///
/// `data` keeps insertion order, so sensors come out in the order the
/// producer wrote them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sample {
    pub id: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[cfg(test)]
impl Sample {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: Map::new(),
        }
    }

    pub fn with(mut self, data_type: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(data_type.into(), value.into());
        self
    }
}

/// Wire unit sent to the collector, one per drained [`Sample`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReading {
    pub mac: String,
    pub sensors: Vec<SensorValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorValue {
    pub name: String,
    pub value: Value,
}

/// Producers may post either a single sample or a batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SampleBatch {
    Many(Vec<Sample>),
    One(Sample),
}

impl SampleBatch {
    pub fn into_vec(self) -> Vec<Sample> {
        match self {
            SampleBatch::Many(samples) => samples,
            SampleBatch::One(sample) => vec![sample],
        }
    }
}
