use axum::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::dto::ModelVariant;

/// Output of a successful provider call: raw base64 body plus its mime type.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub data_base64: String,
    pub mime_type: String,
}

impl GeneratedImage {
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data_base64)
    }
}

/// External generation capability. `Ok(None)` means the provider produced no
/// image, which is an expected outcome and triggers the placeholder path; it
/// must never be reported as an error.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        width: i64,
        height: i64,
        model: ModelVariant,
    ) -> anyhow::Result<Option<GeneratedImage>>;
}

/// Stand-in used when no API key is configured; every request falls back to
/// the placeholder reference.
pub struct DisabledGenerator;

#[async_trait]
impl ImageGenerator for DisabledGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _width: i64,
        _height: i64,
        _model: ModelVariant,
    ) -> anyhow::Result<Option<GeneratedImage>> {
        Ok(None)
    }
}

// Matches encodeURIComponent: everything but alphanumerics and -_.!~*'()
// is escaped, keeping placeholder URLs identical to the previous deployment.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Deterministic substitute reference used whenever the provider yields no
/// image.
pub fn placeholder_url(width: i64, height: i64, prompt: &str) -> String {
    format!(
        "/placeholder.svg?height={height}&width={width}&query={}",
        utf8_percent_encode(prompt, COMPONENT)
    )
}

// Both model variants currently route to the same hosted model; the variant
// is kept on the wire for when a dedicated pro model ships.
const GEMINI_MODEL: &str = "gemini-2.0-flash-exp";

pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct TextPart {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<&'static str>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct InlineData {
    data: Option<String>,
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
}

#[async_trait]
impl ImageGenerator for GeminiGenerator {
    async fn generate(
        &self,
        prompt: &str,
        width: i64,
        height: i64,
        model: ModelVariant,
    ) -> anyhow::Result<Option<GeneratedImage>> {
        debug!(%model, width, height, "sending generation request");

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{GEMINI_MODEL}:generateContent?key={}",
            self.api_key
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![TextPart {
                    text: format!("Generate an image: {prompt}"),
                }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["Text", "Image"],
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<GenerateContentResponse>()
            .await?;

        for candidate in response.candidates {
            let Some(content) = candidate.content else {
                continue;
            };
            for part in content.parts {
                if let Some(InlineData {
                    data: Some(data),
                    mime_type,
                }) = part.inline_data
                {
                    if !data.is_empty() {
                        return Ok(Some(GeneratedImage {
                            data_base64: data,
                            mime_type: mime_type.unwrap_or_else(|| "image/png".into()),
                        }));
                    }
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_url_percent_encodes_prompt() {
        let url = placeholder_url(512, 768, "a red fox & a dog");
        assert_eq!(
            url,
            "/placeholder.svg?height=768&width=512&query=a%20red%20fox%20%26%20a%20dog"
        );
    }

    #[test]
    fn placeholder_url_keeps_unreserved_marks() {
        let url = placeholder_url(256, 256, "it's-a_test.*(!)~");
        assert!(url.ends_with("query=it's-a_test.*(!)~"));
    }

    #[test]
    fn data_url_is_built_from_mime_and_body() {
        let image = GeneratedImage {
            data_base64: "aGVsbG8=".into(),
            mime_type: "image/png".into(),
        };
        assert_eq!(image.to_data_url(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn response_parsing_finds_inline_data() {
        let raw = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "here you go" },
                        { "inlineData": { "data": "Zm9v", "mimeType": "image/webp" } }
                    ]
                }
            }]
        });
        let parsed: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        let inline = parsed.candidates[0]
            .content
            .as_ref()
            .unwrap()
            .parts
            .iter()
            .find_map(|p| p.inline_data.as_ref())
            .unwrap();
        assert_eq!(inline.data.as_deref(), Some("Zm9v"));
        assert_eq!(inline.mime_type.as_deref(), Some("image/webp"));
    }

    #[test]
    fn response_without_image_parses_to_empty() {
        let parsed: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(parsed.candidates.is_empty());
    }
}
