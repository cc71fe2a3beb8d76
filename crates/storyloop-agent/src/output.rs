use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Text returned from a single generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// Generated text, as returned by the backend
    pub text: String,
    /// Model that served the request
    pub model: String,
    /// Wall-clock duration of the call
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl GenerationOutput {
    pub fn new(text: String, model: String, duration: Duration) -> Self {
        Self {
            text,
            model,
            duration,
        }
    }

    /// True when the backend returned nothing but whitespace
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
