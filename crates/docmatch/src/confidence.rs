use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse quality label for one extracted value or a whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            Confidence::High => 1.0,
            Confidence::Medium => 0.5,
            Confidence::Low => 0.0,
        }
    }

    pub fn from_score(score: f64) -> Self {
        if score > 0.75 {
            Confidence::High
        } else if score > 0.25 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            other => Err(format!("unknown confidence level '{}'", other)),
        }
    }
}

/// Reduces every `confidence` entry found at any depth of `fields` to one label.
///
/// An empty or null collection is `Low`. A non-empty collection without any
/// confidence entries is `Medium`. Otherwise the mean score is bucketed with
/// `> 0.75` high and `> 0.25` medium.
pub fn aggregate(fields: &Value) -> Confidence {
    let is_empty = match fields {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if is_empty {
        return Confidence::Low;
    }

    let mut scores = Vec::new();
    collect_scores(fields, &mut scores);

    if scores.is_empty() {
        return Confidence::Medium;
    }

    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    Confidence::from_score(mean)
}

fn collect_scores(value: &Value, scores: &mut Vec<f64>) {
    match value {
        Value::Object(map) => {
            if let Some(confidence) = map.get("confidence") {
                scores.push(score_of(confidence));
            }
            for child in map.values() {
                collect_scores(child, scores);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_scores(item, scores);
            }
        }
        _ => {}
    }
}

/// Labels map to 1.0/0.5/0.0, numbers in `[0, 1]` are taken as-is, and
/// anything else scores as low.
fn score_of(value: &Value) -> f64 {
    match value {
        Value::String(label) => label.parse::<Confidence>().map(|c| c.score()).unwrap_or(0.0),
        Value::Number(n) => n.as_f64().filter(|f| (0.0..=1.0).contains(f)).unwrap_or(0.0),
        _ => 0.0,
    }
}
