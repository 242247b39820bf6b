use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    RecordUpdate,
    Move,
    Rename,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RecordUpdate => write!(f, "record_update"),
            Self::Move => write!(f, "move"),
            Self::Rename => write!(f, "rename"),
        }
    }
}

impl std::str::FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "record_update" => Ok(Self::RecordUpdate),
            "move" => Ok(Self::Move),
            "rename" => Ok(Self::Rename),
            _ => Err(format!("unknown operation type: {s}")),
        }
    }
}

/// One executed mutation, as written to `operation_log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation_id: String,
    pub run_id: String,
    pub operation_type: OperationType,
    pub target: String,
    pub metadata: Option<serde_json::Value>,
    pub executed_at: String,
    pub compensated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_type_round_trips_through_display() {
        for op in [
            OperationType::RecordUpdate,
            OperationType::Move,
            OperationType::Rename,
        ] {
            assert_eq!(op.to_string().parse::<OperationType>().unwrap(), op);
        }
        assert!("delete".parse::<OperationType>().is_err());
    }
}
