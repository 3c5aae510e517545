//! Prometheus remote-write 1.0 protobuf messages (`prometheus.WriteRequest`).

use crate::sample;

#[derive(Clone, PartialEq, prost::Message)]
pub struct WriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TimeSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

impl Label {
    fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

impl TimeSeries {
    /// One series per sample, labels sorted by name as receivers expect.
    pub fn from_sample(sample: &sample::Sample, job: Option<&str>) -> Self {
        let mut labels = vec![
            Label::new("__name__", &sample.metric),
            Label::new("ip", &sample.device.address),
        ];
        if let Some(name) = &sample.device.name {
            labels.push(Label::new("device", name));
        }
        if let Some(job) = job {
            labels.push(Label::new("job", job));
        }
        labels.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            labels,
            samples: vec![Sample {
                value: sample.value,
                timestamp: sample.timestamp_millis(),
            }],
        }
    }
}

impl WriteRequest {
    pub fn from_batch(batch: &[sample::Sample], job: Option<&str>) -> Self {
        Self {
            timeseries: batch
                .iter()
                .map(|sample| TimeSeries::from_sample(sample, job))
                .collect(),
        }
    }
}
