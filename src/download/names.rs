//! Label and file-name escaping, and label deduplication

use std::collections::{HashMap, HashSet};

/// Longest file-name component produced by [`escf`]
const MAX_FILE_NAME_LEN: usize = 200;

/// Turn a display name into a Terraform resource label
pub fn escape(name: &str) -> String {
    let mut label: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if label
        .chars()
        .next()
        .map_or(true, |c| c.is_ascii_digit() || c == '-')
    {
        label.insert(0, '_');
    }
    label
}

/// Turn a display name into a file-name component
pub fn escf(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_NAME_LEN)
        .collect()
}

/// Assigns unique labels when several resources share a display name
///
/// The first resource with a given label keeps it; later ones get `_2`,
/// `_3`, ... Asking again for the same (label, id) pair returns the label
/// assigned the first time.
#[derive(Debug, Default)]
pub struct NameCounter {
    counts: HashMap<String, usize>,
    assigned: HashMap<(String, String), String>,
    used: HashSet<String>,
}

impl NameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn numbering(&mut self, name: &str, id: &str) -> String {
        let key = (name.to_string(), id.to_string());
        if let Some(label) = self.assigned.get(&key) {
            return label.clone();
        }

        let count = self.counts.entry(name.to_string()).or_insert(0);
        let label = loop {
            *count += 1;
            let candidate = if *count == 1 {
                name.to_string()
            } else {
                format!("{}_{}", name, count)
            };
            if !self.used.contains(&candidate) {
                break candidate;
            }
        };

        self.used.insert(label.clone());
        self.assigned.insert(key, label.clone());
        label
    }
}
