use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::ImageRecord;

pub const MIN_PROMPT_LEN: usize = 3;
pub const MAX_PROMPT_LEN: usize = 1000;
pub const MAX_NEGATIVE_PROMPT_LEN: usize = 500;
pub const MIN_DIMENSION: i64 = 256;
pub const MAX_DIMENSION: i64 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Flash,
    Pro,
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelVariant::Flash => "flash",
            ModelVariant::Pro => "pro",
        })
    }
}

/// Generation request body. Fields are optional at the serde level so
/// missing values surface as field errors instead of a decode failure.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub user_id: Option<Uuid>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub model: Option<String>,
}

impl GenerateRequest {
    /// Field-schema check. Returns the full list of violations, empty when
    /// the request is admissible.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // Limits count characters, not bytes, so multibyte prompts near the
        // boundary are judged by their visible length.
        match self.prompt.as_deref() {
            None => errors.push("prompt is required".to_string()),
            Some(p) if p.trim().is_empty() => errors.push("prompt is required".to_string()),
            Some(p) if p.chars().count() < MIN_PROMPT_LEN => errors.push(format!(
                "prompt must be at least {MIN_PROMPT_LEN} characters"
            )),
            Some(p) if p.chars().count() > MAX_PROMPT_LEN => errors.push(format!(
                "prompt must be no more than {MAX_PROMPT_LEN} characters"
            )),
            Some(_) => {}
        }

        if let Some(np) = self.negative_prompt.as_deref() {
            if np.chars().count() > MAX_NEGATIVE_PROMPT_LEN {
                errors.push(format!(
                    "negativePrompt must be no more than {MAX_NEGATIVE_PROMPT_LEN} characters"
                ));
            }
        }

        for (field, value) in [("width", self.width), ("height", self.height)] {
            match value {
                None => errors.push(format!("{field} is required")),
                Some(v) if v < MIN_DIMENSION => {
                    errors.push(format!("{field} must be at least {MIN_DIMENSION}"))
                }
                Some(v) if v > MAX_DIMENSION => {
                    errors.push(format!("{field} must be no more than {MAX_DIMENSION}"))
                }
                Some(_) => {}
            }
        }

        match self.model.as_deref() {
            None | Some("") => errors.push("model is required".to_string()),
            Some("flash") | Some("pro") => {}
            Some(_) => errors.push("model must be one of: flash, pro".to_string()),
        }

        errors
    }

    pub fn model_variant(&self) -> Option<ModelVariant> {
        match self.model.as_deref() {
            Some("flash") => Some(ModelVariant::Flash),
            Some("pro") => Some(ModelVariant::Pro),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(flatten)]
    pub image: ImageRecord,
    pub credits_remaining: i32,
    pub daily_limit: i32,
}
