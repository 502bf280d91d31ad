use serde::{Deserialize, Serialize};

use super::error::IntakeError;

/// Uniform result shape returned by every workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResponse<T> {
    #[serde(rename = "exito")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(rename = "errores", default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(rename = "mensaje", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> WorkflowResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            errors: Vec::new(),
            message: None,
        }
    }

    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            errors,
            message: None,
        }
    }

    /// Attach the record a failed call still stored.
    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl<T> From<IntakeError> for WorkflowResponse<T> {
    fn from(error: IntakeError) -> Self {
        WorkflowResponse::failure(vec![error.to_string()])
            .with_message(format!("registration incomplete: {}", error.field()))
    }
}
