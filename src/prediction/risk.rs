//! Response decoding and risk classification.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::RiskTier;

const HIGH_THRESHOLD: f64 = 0.7;
const MODERATE_THRESHOLD: f64 = 0.4;

/// Classify a probability. Boundaries go to the higher tier; NaN is Low.
pub fn classify(probability: f64) -> RiskTier {
    if probability >= HIGH_THRESHOLD {
        RiskTier::High
    } else if probability >= MODERATE_THRESHOLD {
        RiskTier::Moderate
    } else {
        RiskTier::Low
    }
}

// ═══════════════════════════════════════════════════════════
// OrderedMap
// ═══════════════════════════════════════════════════════════

/// JSON object kept in document order. Duplicate keys keep the last value
/// at the first position.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> OrderedMap<V> {
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn upsert(&mut self, key: String, value: V) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (k, v) in iter {
            map.upsert(k.into(), v);
        }
        map
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = OrderedMap::default();
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            map.upsert(key, value);
        }
        Ok(map)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// ═══════════════════════════════════════════════════════════
// Response
// ═══════════════════════════════════════════════════════════

/// `probabilities` is either keyed by subject id or, from older model
/// deployments, a single flat `{condition: p}` map for the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Probabilities {
    PerSubject(OrderedMap<OrderedMap<f64>>),
    Flat(OrderedMap<f64>),
}

impl Default for Probabilities {
    fn default() -> Self {
        Self::PerSubject(OrderedMap::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(default)]
    pub probabilities: Probabilities,
}

impl PredictionResponse {
    /// Probabilities for `subject_id`; a flat response belongs to `root_id`.
    pub fn for_subject(&self, subject_id: &str, root_id: &str) -> Option<&OrderedMap<f64>> {
        match &self.probabilities {
            Probabilities::PerSubject(map) => map.get(subject_id),
            Probabilities::Flat(map) if subject_id == root_id => Some(map),
            Probabilities::Flat(_) => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// View model
// ═══════════════════════════════════════════════════════════

/// One result card.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRisk {
    pub condition: String,
    pub probability: f64,
    pub tier: RiskTier,
    pub color: &'static str,
    pub label: String,
    pub percent: f64,
    pub probability_text: String,
}

impl ConditionRisk {
    pub fn new(condition: impl Into<String>, probability: f64) -> Self {
        let tier = classify(probability);
        let percent = if probability.is_nan() {
            0.0
        } else {
            (probability * 100.0).clamp(0.0, 100.0)
        };
        Self {
            condition: condition.into(),
            probability,
            tier,
            color: tier.color(),
            label: format!("{} Risk", tier.as_str()),
            percent,
            probability_text: format!("{:.1}% probability", probability * 100.0),
        }
    }
}

/// Root subject's results, in response order. `risks: None` is the
/// "no predictions available" state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionReport {
    pub subject_id: String,
    pub risks: Option<Vec<ConditionRisk>>,
}

impl PredictionReport {
    pub fn from_response(response: &PredictionResponse, root_id: &str) -> Self {
        let risks = response.for_subject(root_id, root_id).map(|map| {
            map.iter()
                .map(|(condition, p)| ConditionRisk::new(condition, *p))
                .collect()
        });
        if risks.is_none() {
            tracing::info!(root_id, "Prediction response has no entry for root subject");
        }
        Self {
            subject_id: root_id.to_string(),
            risks,
        }
    }

    pub fn has_predictions(&self) -> bool {
        self.risks.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_exact() {
        assert_eq!(classify(0.7), RiskTier::High);
        assert_eq!(classify(0.6999), RiskTier::Moderate);
        assert_eq!(classify(0.4), RiskTier::Moderate);
        assert_eq!(classify(0.3999), RiskTier::Low);
        assert_eq!(classify(1.0), RiskTier::High);
        assert_eq!(classify(0.0), RiskTier::Low);
    }

    #[test]
    fn nan_is_low() {
        assert_eq!(classify(f64::NAN), RiskTier::Low);
        assert_eq!(ConditionRisk::new("X", f64::NAN).percent, 0.0);
    }

    #[test]
    fn view_model_formatting() {
        let risk = ConditionRisk::new("Diabetes", 0.72345);
        assert_eq!(risk.tier, RiskTier::High);
        assert_eq!(risk.color, "red");
        assert_eq!(risk.label, "High Risk");
        assert_eq!(risk.probability_text, "72.3% probability");

        assert_eq!(ConditionRisk::new("X", 1.4).percent, 100.0);
        assert_eq!(ConditionRisk::new("X", -0.2).percent, 0.0);
    }

    #[test]
    fn per_subject_response_keeps_document_order() {
        let response: PredictionResponse = serde_json::from_str(
            r#"{"probabilities": {"self-assessment":
                {"Hypertension": 0.2, "Asthma": 0.5, "Diabetes": 0.9}}}"#,
        )
        .unwrap();
        let report = PredictionReport::from_response(&response, "self-assessment");
        let risks = report.risks.unwrap();
        let names: Vec<_> = risks.iter().map(|r| r.condition.as_str()).collect();
        assert_eq!(names, vec!["Hypertension", "Asthma", "Diabetes"]);
        assert_eq!(risks[1].tier, RiskTier::Moderate);
    }

    #[test]
    fn value_built_response_keeps_insertion_order() {
        let response: PredictionResponse = serde_json::from_value(serde_json::json!({
            "probabilities": { "p1": { "Diabetes": 0.8, "Cancer": 0.1, "Asthma": 0.5 } }
        }))
        .unwrap();
        let risks = PredictionReport::from_response(&response, "p1").risks.unwrap();
        let names: Vec<_> = risks.iter().map(|r| r.condition.as_str()).collect();
        assert_eq!(names, vec!["Diabetes", "Cancer", "Asthma"]);
    }

    #[test]
    fn flat_response_attributed_to_root() {
        let response: PredictionResponse =
            serde_json::from_str(r#"{"probabilities": {"Cancer": 0.45}}"#).unwrap();
        assert!(matches!(response.probabilities, Probabilities::Flat(_)));

        let report = PredictionReport::from_response(&response, "p1");
        assert_eq!(report.risks.unwrap()[0].condition, "Cancer");
        assert!(response.for_subject("father-p1", "p1").is_none());
    }

    #[test]
    fn missing_root_is_no_predictions() {
        let response: PredictionResponse = serde_json::from_str(
            r#"{"probabilities": {"someone-else": {"Diabetes": 0.9}}}"#,
        )
        .unwrap();
        let report = PredictionReport::from_response(&response, "self-assessment");
        assert!(!report.has_predictions());

        let empty: PredictionResponse = serde_json::from_str("{}").unwrap();
        assert!(!PredictionReport::from_response(&empty, "p1").has_predictions());
    }

    #[test]
    fn ordered_map_serializes_in_order() {
        let map: OrderedMap<f64> = [("b", 0.1), ("a", 0.2)].into_iter().collect();
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"b":0.1,"a":0.2}"#);
    }
}
