use dronenode_fc::modes::ModeInputError;
use dronenode_fc::LinkError;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Bad action input. Nothing was sent downstream.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Transport(#[from] LinkError),
}

impl BridgeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        BridgeError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, BridgeError::Validation(_))
    }
}

impl From<ModeInputError> for BridgeError {
    fn from(e: ModeInputError) -> Self {
        BridgeError::Validation(e.to_string())
    }
}
