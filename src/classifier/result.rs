//! Turning model replies into [`CreativeFields`].

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use super::options::{AiFlag, ClosedSet, CreativeType, MainObject, MainTone, Offer, Product, Style, Uvp};
use crate::sheets::{CreativeFields, MarketingFields};

lazy_static! {
    // Outermost braces; replies often wrap the object in prose or code fences.
    static ref JSON_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
}

/// Reply as the model writes it. Every field is optional and loosely typed.
#[derive(Debug, Default, Deserialize)]
pub struct RawClassification {
    #[serde(rename = "type")]
    pub kind: Option<serde_json::Value>,
    pub name_of_hypothesis: Option<serde_json::Value>,
    pub made_ai: Option<serde_json::Value>,
    pub style: Option<serde_json::Value>,
    pub main_ton: Option<serde_json::Value>,
    pub main_object: Option<serde_json::Value>,
    pub header_text: Option<serde_json::Value>,
    pub uvp: Option<serde_json::Value>,
    pub product: Option<serde_json::Value>,
    pub offer: Option<serde_json::Value>,
}

fn text(value: &Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Text with surrounding whitespace removed, or `default` when that leaves nothing.
fn text_or(value: &Option<serde_json::Value>, default: &str) -> String {
    let trimmed = text(value).trim().to_string();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed
    }
}

impl RawClassification {
    pub fn normalize(&self) -> CreativeFields {
        CreativeFields {
            kind: CreativeType::normalize(&text(&self.kind)),
            hypothesis: text_or(&self.name_of_hypothesis, "unknown").to_lowercase(),
            ai_flag: AiFlag::normalize(&text(&self.made_ai)),
            style: Style::normalize(&text(&self.style)),
            main_tone: MainTone::normalize(&text(&self.main_ton)),
            main_object: MainObject::normalize(&text(&self.main_object)),
            marketing: MarketingFields {
                header_text: text_or(&self.header_text, "none"),
                uvp: Uvp::normalize(&text(&self.uvp)),
                product: Product::normalize(&text(&self.product)),
                offer: Offer::normalize(&text(&self.offer)),
            },
        }
    }
}

/// Finds and parses the JSON object in a reply.
pub fn parse_reply(content: &str) -> Option<CreativeFields> {
    let object = JSON_OBJECT.find(content)?;
    let raw: RawClassification = serde_json::from_str(object.as_str()).ok()?;
    Some(raw.normalize())
}

/// Fixed classification for video files, which are never sent to the model.
pub fn video_default() -> CreativeFields {
    CreativeFields {
        kind: CreativeType::Video,
        hypothesis: "video content".to_string(),
        ai_flag: AiFlag::NotAi,
        style: Style::Real,
        main_tone: MainTone::Neutral,
        main_object: MainObject::Other,
        marketing: MarketingFields::default(),
    }
}

/// Classification used when the model call fails or its reply is unusable.
pub fn fallback(kind: CreativeType) -> CreativeFields {
    CreativeFields {
        kind,
        hypothesis: "unknown".to_string(),
        ai_flag: AiFlag::NotAi,
        style: Style::Other,
        main_tone: MainTone::Neutral,
        main_object: MainObject::Other,
        marketing: MarketingFields::default(),
    }
}
