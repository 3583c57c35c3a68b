use std::collections::BTreeMap;
use std::fmt;

/// Equality-based label selector, e.g. `s-product=shop,s-service=api`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    labels: BTreeMap<String, String>,
}

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// An empty selector matches everything.
    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        self.labels.iter().all(|(key, value)| {
            labels
                .and_then(|labels| labels.get(key))
                .map_or(false, |actual| actual == value)
        })
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .labels
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        f.write_str(&parts.join(","))
    }
}
