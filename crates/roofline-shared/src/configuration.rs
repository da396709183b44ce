//! Benchmark configuration: a small set of typed controls consumed by the engine, plus an
//! open, insertion-ordered parameter map forwarded verbatim to the subject executable.

use anyhow::{Result, bail};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Keys owned by the engine itself. A user-supplied value for one of these is rejected.
const ENGINE_OWNED_KEYS: &[&str] = &["measure"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Infer the most specific value type from a raw command-line string.
    ///
    /// Integers win over floats, `true`/`false` are matched case-insensitively and anything
    /// else is kept as a string.
    pub fn infer(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(int) = raw.parse::<i64>() {
            return ParamValue::Int(int);
        }
        // `inf` and `nan` parse as floats but are almost always meant as strings
        if raw.chars().any(|c| c.is_ascii_digit()) {
            if let Ok(float) = raw.parse::<f64>() {
                return ParamValue::Float(float);
            }
        }
        if raw.eq_ignore_ascii_case("true") {
            return ParamValue::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return ParamValue::Bool(false);
        }
        ParamValue::Str(raw.to_string())
    }

    fn as_u32(&self, key: &str) -> Result<u32> {
        match self {
            ParamValue::Int(value) if *value >= 0 && *value <= u32::MAX as i64 => Ok(*value as u32),
            other => bail!("`{key}` expects a non-negative integer, got `{other}`"),
        }
    }

    fn as_bool(&self, key: &str) -> Result<bool> {
        match self {
            ParamValue::Bool(value) => Ok(*value),
            other => bail!("`{key}` expects a boolean, got `{other}`"),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(value) => write!(f, "{value}"),
            ParamValue::Int(value) => write!(f, "{value}"),
            // Debug keeps the trailing `.0`, so `1.0` does not come back as an integer
            ParamValue::Float(value) => write!(f, "{value:?}"),
            ParamValue::Str(value) => f.write_str(value),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

/// Normalize a parameter key so that `ring-dim` and `ring_dim` name the same parameter.
pub fn normalize_key(key: &str) -> String {
    key.trim().trim_start_matches("--").replace('-', "_")
}

/// Insertion-ordered map of benchmark parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: Vec<(String, ParamValue)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter. A replaced parameter keeps its original position.
    pub fn insert<K: AsRef<str>, V: Into<ParamValue>>(
        &mut self,
        key: K,
        value: V,
    ) -> Option<ParamValue> {
        let key = normalize_key(key.as_ref());
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Insert a parameter, failing if the key is already present.
    pub fn try_insert<K: AsRef<str>, V: Into<ParamValue>>(&mut self, key: K, value: V) -> Result<()> {
        let key = normalize_key(key.as_ref());
        if self.contains(&key) {
            bail!("Parameter `{key}` is specified more than once");
        }
        self.entries.push((key, value.into()));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        let key = normalize_key(key);
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Parameters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParametersVisitor;

        impl<'de> Visitor<'de> for ParametersVisitor {
            type Value = Parameters;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of benchmark parameters")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Parameters, A::Error> {
                let mut params = Parameters::new();
                while let Some((key, value)) = access.next_entry::<String, ParamValue>()? {
                    params
                        .try_insert(&key, value)
                        .map_err(serde::de::Error::custom)?;
                }
                Ok(params)
            }
        }

        deserializer.deserialize_map(ParametersVisitor)
    }
}

/// Controls interpreted by the engine rather than forwarded as-is.
///
/// Unset controls fall back to the engine defaults when the measurement runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Controls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup_runs: Option<u32>,
    /// Also forwarded to the subject, as a flag and through the parallel runtime environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebuild: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiet: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_verify: Option<bool>,
}

impl Controls {
    /// Fill every unset control from `base`.
    pub fn or(&self, base: &Controls) -> Controls {
        Controls {
            runs: self.runs.or(base.runs),
            warmup_runs: self.warmup_runs.or(base.warmup_runs),
            threads: self.threads.or(base.threads),
            rebuild: self.rebuild.or(base.rebuild),
            quiet: self.quiet.or(base.quiet),
            skip_verify: self.skip_verify.or(base.skip_verify),
        }
    }

    /// Route a reserved key into its typed slot. Returns `Ok(false)` if `key` is not reserved.
    fn try_set(&mut self, key: &str, value: &ParamValue) -> Result<bool> {
        fn set_once<T>(slot: &mut Option<T>, key: &str, value: T) -> Result<()> {
            if slot.is_some() {
                bail!("Control `{key}` is specified more than once");
            }
            *slot = Some(value);
            Ok(())
        }

        match key {
            "runs" | "timing_runs" => {
                let runs = value.as_u32(key)?;
                if runs == 0 {
                    bail!("`{key}` must be at least 1");
                }
                set_once(&mut self.runs, key, runs)?;
            }
            "warmup_runs" | "warmup" => set_once(&mut self.warmup_runs, key, value.as_u32(key)?)?,
            "threads" => {
                let threads = value.as_u32(key)?;
                if threads == 0 {
                    bail!("`threads` must be at least 1");
                }
                set_once(&mut self.threads, key, threads)?;
            }
            "rebuild" | "build" => set_once(&mut self.rebuild, key, value.as_bool(key)?)?,
            "quiet" => set_once(&mut self.quiet, key, value.as_bool(key)?)?,
            "skip_verify" => set_once(&mut self.skip_verify, key, value.as_bool(key)?)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfiguration {
    #[serde(default)]
    pub controls: Controls,
    #[serde(default)]
    pub params: Parameters,
}

impl BenchmarkConfiguration {
    /// Build a configuration from loosely typed key/value pairs, routing reserved keys into
    /// [`Controls`] and keeping everything else, in order, as subject parameters.
    pub fn from_entries<I, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: AsRef<str>,
    {
        let mut configuration = BenchmarkConfiguration::default();
        for (key, value) in entries {
            let key = normalize_key(key.as_ref());
            if ENGINE_OWNED_KEYS.contains(&key.as_str()) {
                bail!("`{key}` is set by the engine for each stage and cannot be configured");
            }
            if !configuration.controls.try_set(&key, &value)? {
                configuration.params.try_insert(&key, value)?;
            }
        }
        Ok(configuration)
    }

    /// Copy of this configuration with one parameter replaced (or appended).
    pub fn with_param<V: Into<ParamValue>>(&self, key: &str, value: V) -> Self {
        let mut configuration = self.clone();
        configuration.params.insert(key, value);
        configuration
    }

    /// Copy of this configuration with the thread count replaced.
    pub fn with_threads(&self, threads: u32) -> Self {
        let mut configuration = self.clone();
        configuration.controls.threads = Some(threads);
        configuration
    }

    /// Layer this configuration on top of `base`: base parameters keep their order, values
    /// present here win, and parameters only present here are appended.
    pub fn merged_over(&self, base: &BenchmarkConfiguration) -> Self {
        let mut params = base.params.clone();
        for (key, value) in self.params.iter() {
            params.insert(key, value.clone());
        }
        BenchmarkConfiguration {
            controls: self.controls.or(&base.controls),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("8192", ParamValue::Int(8192))]
    #[case("-3", ParamValue::Int(-3))]
    #[case("0.5", ParamValue::Float(0.5))]
    #[case("1e3", ParamValue::Float(1000.0))]
    #[case("TRUE", ParamValue::Bool(true))]
    #[case("false", ParamValue::Bool(false))]
    #[case("inf", ParamValue::Str("inf".to_string()))]
    #[case("bsgs", ParamValue::Str("bsgs".to_string()))]
    fn test_infer(#[case] raw: &str, #[case] expected: ParamValue) {
        assert_eq!(ParamValue::infer(raw), expected);
    }

    #[test]
    fn test_float_display_keeps_fraction() {
        assert_eq!(ParamValue::Float(1.0).to_string(), "1.0");
        assert_eq!(ParamValue::infer(&ParamValue::Float(1.0).to_string()), ParamValue::Float(1.0));
    }

    #[test]
    fn test_parameters_keep_insertion_order_on_replace() {
        let mut params = Parameters::new();
        params.insert("ring_dim", 8192);
        params.insert("mult_depth", 1);
        assert_eq!(params.insert("ring-dim", 4096), Some(ParamValue::Int(8192)));

        let keys: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["ring_dim", "mult_depth"]);
        assert_eq!(params.get("ring_dim"), Some(&ParamValue::Int(4096)));
    }

    #[test]
    fn test_from_entries_routes_controls() {
        let configuration = BenchmarkConfiguration::from_entries([
            ("ring_dim", ParamValue::Int(8192)),
            ("timing_runs", ParamValue::Int(5)),
            ("threads", ParamValue::Int(4)),
            ("build", ParamValue::Bool(false)),
            ("check_security", ParamValue::Bool(false)),
        ])
        .unwrap();

        assert_eq!(configuration.controls.runs, Some(5));
        assert_eq!(configuration.controls.threads, Some(4));
        assert_eq!(configuration.controls.rebuild, Some(false));
        assert_eq!(configuration.params.len(), 2);
        assert!(configuration.params.contains("check_security"));
    }

    #[rstest]
    #[case(vec![("ring_dim", ParamValue::Int(1)), ("ring-dim", ParamValue::Int(2))], "more than once")]
    #[case(vec![("runs", ParamValue::Int(1)), ("timing_runs", ParamValue::Int(2))], "more than once")]
    #[case(vec![("measure", ParamValue::from("dram"))], "set by the engine")]
    #[case(vec![("runs", ParamValue::Int(0))], "at least 1")]
    #[case(vec![("threads", ParamValue::from("many"))], "non-negative integer")]
    #[case(vec![("rebuild", ParamValue::Int(1))], "expects a boolean")]
    fn test_from_entries_rejects(#[case] entries: Vec<(&str, ParamValue)>, #[case] message: &str) {
        let err = BenchmarkConfiguration::from_entries(entries).unwrap_err();
        assert!(err.to_string().contains(message), "unexpected error: {err}");
    }

    #[test]
    fn test_merged_over_base() {
        let base = BenchmarkConfiguration::from_entries([
            ("ring_dim", ParamValue::Int(8192)),
            ("mult_depth", ParamValue::Int(1)),
            ("timing_runs", ParamValue::Int(3)),
        ])
        .unwrap();
        let run = BenchmarkConfiguration::from_entries([
            ("matrix_dim", ParamValue::Int(16)),
            ("ring_dim", ParamValue::Int(128)),
            ("threads", ParamValue::Int(2)),
        ])
        .unwrap();

        let merged = run.merged_over(&base);
        let params: Vec<_> = merged.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        assert_eq!(params, vec!["ring_dim=128", "mult_depth=1", "matrix_dim=16"]);
        assert_eq!(merged.controls.runs, Some(3));
        assert_eq!(merged.controls.threads, Some(2));
    }

    #[test]
    fn test_parameters_serde_preserves_order() {
        let mut params = Parameters::new();
        params.insert("z_last", 1);
        params.insert("a_first", "x");
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"z_last":1,"a_first":"x"}"#);

        let parsed: Parameters = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, params);
        assert!(serde_json::from_str::<Parameters>(r#"{"a":1,"a":2}"#).is_err());
    }
}
