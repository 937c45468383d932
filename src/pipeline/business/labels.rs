use crate::config::{parse_phrase_mapping, ConfigError, DEFAULT_BUSINESS_DATA_YAML};

/// Label phrases that introduce each text field, in priority order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusinessLabels {
    pub vessel: Vec<String>,
    pub voyage_from: Vec<String>,
    pub voyage_to: Vec<String>,
    pub port: Vec<String>,
    pub cargo: Vec<String>,
}

impl BusinessLabels {
    /// Parse a `FIELD -> [label, ...]` mapping. Keys are matched
    /// case-insensitively; unknown keys are ignored, missing keys leave the
    /// field with no labels.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let mut labels = Self::default();
        for (key, phrases) in parse_phrase_mapping(yaml)? {
            let slot = match key.to_uppercase().as_str() {
                "VESSEL" => &mut labels.vessel,
                "VOYAGE_FROM" => &mut labels.voyage_from,
                "VOYAGE_TO" => &mut labels.voyage_to,
                "PORT" => &mut labels.port,
                "CARGO" => &mut labels.cargo,
                _ => {
                    tracing::warn!(key = %key, "Ignoring unknown business label group");
                    continue;
                }
            };
            slot.extend(phrases.into_iter().filter(|p| !p.trim().is_empty()));
        }
        Ok(labels)
    }

    /// The vocabulary shipped in `resources/business_data.yml`.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(DEFAULT_BUSINESS_DATA_YAML)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_every_group() {
        let labels = BusinessLabels::builtin().unwrap();
        assert!(labels.vessel.contains(&"name of vessel".to_string()));
        assert!(labels.port.contains(&"port".to_string()));
        assert!(!labels.voyage_from.is_empty());
        assert!(!labels.voyage_to.is_empty());
        assert!(labels.cargo.iter().any(|l| l.contains("description")));
    }

    #[test]
    fn keys_are_case_insensitive_and_unknown_ignored() {
        let labels = BusinessLabels::from_yaml("vessel: [ship]\nCHARTERER: [charterer]\n").unwrap();
        assert_eq!(labels.vessel, vec!["ship"]);
        assert!(labels.port.is_empty());
    }

    #[test]
    fn order_is_preserved_within_group() {
        let labels = BusinessLabels::from_yaml("PORT:\n  - port name\n  - port\n").unwrap();
        assert_eq!(labels.port, vec!["port name", "port"]);
    }
}
