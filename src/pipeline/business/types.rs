use serde::{Deserialize, Serialize};

/// Cargo operation performed at the port call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Load,
    Discharge,
}

/// Shipping fields pulled from a document. Every field is independently
/// optional; an absent field is a normal outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessRecord {
    pub vessel: Option<String>,
    pub voyage_from: Option<String>,
    pub voyage_to: Option<String>,
    pub port: Option<String>,
    pub cargo: Option<String>,
    pub operation: Option<Operation>,
    pub demurrage: Option<f64>,
    pub dispatch: Option<f64>,
    pub rate: Option<f64>,
    pub quantity: Option<f64>,
    pub allowed_laytime: Option<f64>,
}

impl BusinessRecord {
    /// Number of fields that were found.
    pub fn found_count(&self) -> usize {
        let text = [
            &self.vessel,
            &self.voyage_from,
            &self.voyage_to,
            &self.port,
            &self.cargo,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count();
        let numeric = [
            self.demurrage,
            self.dispatch,
            self.rate,
            self.quantity,
            self.allowed_laytime,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count();
        text + numeric + usize::from(self.operation.is_some())
    }
}
