//! Label tokenization for classification targets and prediction decoding

use crate::error::{PrepError, Result};
use polars::prelude::*;
use rand::RngCore;
use std::collections::{HashMap, HashSet};

/// Number of random bytes per label token (rendered as 16 hex characters)
pub const TOKEN_BYTES: usize = 8;

/// Bijection from raw label value to an opaque random token.
///
/// Tokens are drawn from the OS random source so label identity and order
/// cannot be recovered from the token itself. The inverse map is kept in
/// memory for prediction decoding.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    forward: HashMap<String, String>,
    inverse: HashMap<String, String>,
}

impl LabelMap {
    /// Build a map over all distinct label values in the series, ordered by
    /// descending frequency. Order has no semantic effect; it mirrors the
    /// frequency ranking the values are drawn from.
    pub fn fit(series: &Series) -> Result<LabelMap> {
        let casted = series.cast(&DataType::String)?;
        let ca = casted.str()?;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for value in ca.into_iter().flatten() {
            let count = counts.entry(value).or_insert(0);
            if *count == 0 {
                order.push(value);
            }
            *count += 1;
        }
        order.sort_by_key(|value| std::cmp::Reverse(counts[value]));

        let mut forward = HashMap::with_capacity(order.len());
        let mut inverse = HashMap::with_capacity(order.len());
        let mut used: HashSet<String> = HashSet::with_capacity(order.len());
        for value in order {
            let mut token = random_token();
            while !used.insert(token.clone()) {
                token = random_token();
            }
            forward.insert(value.to_string(), token.clone());
            inverse.insert(token, value.to_string());
        }

        Ok(LabelMap { forward, inverse })
    }

    /// Reconstruct a map from a persisted forward mapping
    pub fn from_forward(forward: HashMap<String, String>) -> LabelMap {
        let inverse = forward
            .iter()
            .map(|(raw, token)| (token.clone(), raw.clone()))
            .collect();
        LabelMap { forward, inverse }
    }

    /// The forward raw-value → token mapping, as persisted in the schema
    pub fn forward(&self) -> &HashMap<String, String> {
        &self.forward
    }

    pub fn token_for(&self, raw: &str) -> Option<&str> {
        self.forward.get(raw).map(String::as_str)
    }

    pub fn raw_for(&self, token: &str) -> Option<&str> {
        self.inverse.get(token).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Substitute each row's raw label with its token. A raw value absent
    /// from the map is an error; fit is total over the training set, so this
    /// only fires on misuse.
    pub fn encode(&self, series: &Series) -> Result<Series> {
        let casted = series.cast(&DataType::String)?;
        let ca = casted.str()?;

        let mut tokens: Vec<Option<String>> = Vec::with_capacity(ca.len());
        for opt in ca.into_iter() {
            let raw = opt.ok_or_else(|| {
                PrepError::DataError(format!(
                    "missing label value in column {}; drop missing-label rows before encoding",
                    series.name()
                ))
            })?;
            let token = self.forward.get(raw).ok_or_else(|| {
                PrepError::DataError(format!("label value '{raw}' is not present in the label map"))
            })?;
            tokens.push(Some(token.clone()));
        }

        let chunked: StringChunked = tokens.into_iter().collect();
        Ok(chunked.with_name(series.name().clone()).into_series())
    }
}

fn random_token() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

/// Inverts the label map on prediction output so callers see original label
/// values. Records whose predicted token is absent from the inverse map pass
/// through unchanged.
pub struct PredictionDecoder<'a> {
    map: &'a LabelMap,
    field: String,
}

impl<'a> PredictionDecoder<'a> {
    pub fn new(map: &'a LabelMap, field: impl Into<String>) -> Self {
        Self {
            map,
            field: field.into(),
        }
    }

    pub fn decode(&self, records: &mut [serde_json::Value]) {
        for record in records.iter_mut() {
            let Some(object) = record.as_object_mut() else {
                continue;
            };
            let Some(serde_json::Value::String(token)) = object.get(&self.field) else {
                continue;
            };
            if let Some(raw) = self.map.raw_for(token) {
                let raw = raw.to_string();
                object.insert(self.field.clone(), serde_json::Value::String(raw));
            }
        }
    }
}
