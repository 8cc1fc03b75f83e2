use std::time::Duration;

use rand::{distributions::Alphanumeric, Rng};
use tracing::{info, warn};

use crate::auth::services::sanitize_text;
use crate::error::ApiError;
use crate::generate::dto::{GenerateRequest, GenerateResponse, ModelVariant};
use crate::generate::provider::placeholder_url;
use crate::state::AppState;
use crate::store::{NewImage, User};

const SHAREABLE_ID_LEN: usize = 10;

fn shareable_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHAREABLE_ID_LEN)
        .map(char::from)
        .collect()
}

/// Full prompt handed to the provider: negative prompt folded in as an
/// avoid clause, dimensions appended as a textual hint.
fn compose_prompt(prompt: &str, negative_prompt: &str, width: i64, height: i64) -> String {
    let mut full = prompt.to_string();
    if !negative_prompt.is_empty() {
        full.push_str(&format!(". Avoid: {negative_prompt}"));
    }
    full.push_str(&format!(". Image dimensions: {width}x{height}px"));
    full
}

/// Request admission pipeline: validate, check credits, provision (provider
/// call with placeholder fallback), then commit artifact, debit and usage.
/// A debit that loses a concurrent race rolls the artifact back.
///
/// Provider trouble of any kind (error, timeout, empty output) is absorbed
/// into the placeholder path and never fails the request. A credit is
/// consumed either way; validation and credit rejections happen before any
/// side effect.
pub async fn admit(
    state: &AppState,
    user: &User,
    request: GenerateRequest,
) -> Result<GenerateResponse, ApiError> {
    // Received -> Validated
    let errors = request.validate();
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    let prompt = sanitize_text(request.prompt.as_deref().unwrap_or_default());
    let negative_prompt = sanitize_text(request.negative_prompt.as_deref().unwrap_or_default());
    let (width, height) = (
        request.width.unwrap_or_default(),
        request.height.unwrap_or_default(),
    );
    let model = request.model_variant().unwrap_or(ModelVariant::Flash);

    // Validated -> CreditChecked
    let status = state.ledger.check(user.id).await?;
    if !status.has_credits {
        return Err(ApiError::InsufficientCredits {
            remaining: status.remaining,
            daily_limit: status.daily_limit,
        });
    }

    // CreditChecked -> Provisioned
    let full_prompt = compose_prompt(&prompt, &negative_prompt, width, height);
    let timeout = Duration::from_secs(state.config.provider.timeout_secs);
    let image_url = match tokio::time::timeout(
        timeout,
        state.generator.generate(&full_prompt, width, height, model),
    )
    .await
    {
        Ok(Ok(Some(image))) => image.to_data_url(),
        Ok(Ok(None)) => {
            warn!(user_id = %user.id, "provider returned no image, using placeholder");
            placeholder_url(width, height, &prompt)
        }
        Ok(Err(e)) => {
            warn!(user_id = %user.id, error = %e, "provider call failed, using placeholder");
            placeholder_url(width, height, &prompt)
        }
        Err(_) => {
            warn!(user_id = %user.id, "provider call timed out, using placeholder");
            placeholder_url(width, height, &prompt)
        }
    };

    // Provisioned -> Committed. The artifact is persisted before the debit
    // so a store failure here cannot leave the user charged for nothing.
    let image = state
        .store
        .save_image(NewImage {
            user_id: user.id,
            prompt,
            negative_prompt,
            width: width as i32,
            height: height as i32,
            model: model.to_string(),
            image_url,
            shareable_id: shareable_id(),
            is_public: false,
        })
        .await?;

    if !state.ledger.consume(user.id, 1).await? {
        // Lost the race to a concurrent request; the quota is spent. Roll
        // the artifact back so the rejected request leaves no trace.
        if let Err(e) = state.store.delete_image(image.id).await {
            warn!(user_id = %user.id, image_id = %image.id, error = %e,
                  "failed to remove artifact for rejected request");
        }
        let status = state.ledger.check(user.id).await?;
        return Err(ApiError::InsufficientCredits {
            remaining: status.remaining,
            daily_limit: status.daily_limit,
        });
    }
    state.store.track_usage(user.id, 1).await?;

    let status = state.ledger.check(user.id).await?;
    info!(user_id = %user.id, image_id = %image.id, remaining = status.remaining,
          "generation committed");
    Ok(GenerateResponse {
        image,
        credits_remaining: status.remaining,
        daily_limit: status.daily_limit,
    })
}
