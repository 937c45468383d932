use crate::config::{parse_phrase_mapping, ConfigError, DEFAULT_EVENTS_YAML};

/// Event labels and their synonym phrases, in load order.
#[derive(Debug, Clone, PartialEq)]
pub struct EventOntology {
    entries: Vec<(String, Vec<String>)>,
}

impl EventOntology {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let entries = parse_phrase_mapping(yaml)?;
        if entries.is_empty() {
            return Err(ConfigError::Invalid("ontology defines no event labels".into()));
        }
        Ok(Self { entries })
    }

    /// The ontology shipped in `resources/events.yml`.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(DEFAULT_EVENTS_YAML)
    }

    /// Number of event labels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    /// Flat `(phrase, label)` vocabulary: each label's synonyms followed by
    /// the label itself. A phrase listed under several labels keeps its first
    /// position and belongs to the last label that lists it.
    pub fn vocabulary(&self) -> Vec<(String, String)> {
        let mut vocab: Vec<(String, String)> = Vec::new();
        for (label, synonyms) in &self.entries {
            for phrase in synonyms.iter().chain(std::iter::once(label)) {
                match vocab.iter_mut().find(|(p, _)| p == phrase) {
                    Some(slot) => slot.1 = label.clone(),
                    None => vocab.push((phrase.clone(), label.clone())),
                }
            }
        }
        vocab
    }
}
