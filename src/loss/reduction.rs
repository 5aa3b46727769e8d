use serde::{Deserialize, Serialize};

/// How per-row losses are combined into the scalar loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    #[default]
    Mean,
    Sum,
}

impl Reduction {
    /// Factor applied to the summed loss of a batch of `rows` rows.
    pub fn scale(&self, rows: usize) -> f64 {
        match self {
            Reduction::Mean => 1.0 / rows as f64,
            Reduction::Sum => 1.0,
        }
    }
}
