//! Serde adapters for the scene file format.

/// JSON has no infinity literal; scene files store `null` instead. This
/// adapter restores `null → +∞` on read and writes `null` for any non-finite
/// value.
pub mod float_or_inf {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_unit()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Probe {
        #[serde(with = "super::float_or_inf")]
        f: f64,
    }

    #[test]
    fn infinity_round_trips_through_null() {
        let json = serde_json::to_string(&Probe { f: f64::INFINITY }).unwrap();
        assert_eq!(json, r#"{"f":null}"#);
        let back: Probe = serde_json::from_str(&json).unwrap();
        assert!(back.f.is_infinite());
    }

    #[test]
    fn finite_values_stay_numeric() {
        let json = serde_json::to_string(&Probe { f: 100.0 }).unwrap();
        let back: Probe = serde_json::from_str(&json).unwrap();
        assert_eq!(back.f, 100.0);
    }
}
