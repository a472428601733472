//! Field sets written to and patched in the Creative and Title sheets.

use serde::{Deserialize, Serialize};

use crate::classifier::options::{
    AiFlag, CreativeType, MainObject, MainTone, Offer, Product, Style, Uvp,
};

use super::schema::{CreativeField, TitleField};

/// Marketing copy extracted from a creative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketingFields {
    pub header_text: String,
    pub uvp: Uvp,
    pub product: Product,
    pub offer: Offer,
}

impl Default for MarketingFields {
    fn default() -> Self {
        Self {
            header_text: "none".to_string(),
            uvp: Uvp::Other,
            product: Product::Other,
            offer: Offer::Other,
        }
    }
}

/// Classification of one creative, as stored in its Creative row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeFields {
    #[serde(rename = "type")]
    pub kind: CreativeType,
    #[serde(rename = "nameOfHypothesis")]
    pub hypothesis: String,
    pub ai_flag: AiFlag,
    pub style: Style,
    #[serde(rename = "mainTon")]
    pub main_tone: MainTone,
    pub main_object: MainObject,
    #[serde(flatten)]
    pub marketing: MarketingFields,
}

/// `V_id=<id>;type=<type>;NameHypoth=<hypothesis>`
pub fn link_tag(id: u64, kind: &str, hypothesis: &str) -> String {
    format!("V_id={};type={};NameHypoth={}", id, kind, hypothesis)
}

/// `=IMAGE("<url>")`, with embedded quotes doubled.
pub fn image_formula(url: &str) -> String {
    format!("=IMAGE(\"{}\")", url.replace('"', "\"\""))
}

impl CreativeFields {
    /// Cell values for every classification and marketing column.
    pub fn cells(&self) -> Vec<(CreativeField, String)> {
        vec![
            (CreativeField::Type, self.kind.as_str().to_string()),
            (CreativeField::Hypothesis, self.hypothesis.clone()),
            (CreativeField::AiFlag, self.ai_flag.as_str().to_string()),
            (CreativeField::Style, self.style.as_str().to_string()),
            (CreativeField::MainTone, self.main_tone.as_str().to_string()),
            (CreativeField::MainObject, self.main_object.as_str().to_string()),
            (CreativeField::HeaderText, self.marketing.header_text.clone()),
            (CreativeField::Uvp, self.marketing.uvp.as_str().to_string()),
            (CreativeField::Product, self.marketing.product.as_str().to_string()),
            (CreativeField::Offer, self.marketing.offer.as_str().to_string()),
        ]
    }
}

impl MarketingFields {
    /// Plain cells of a Title row. The key and translation cells are formulas
    /// written once the row number is known.
    pub fn title_cells(&self, id: u64) -> Vec<(TitleField, String)> {
        vec![
            (TitleField::Id, id.to_string()),
            (TitleField::English, self.header_text.clone()),
            (TitleField::HeaderText, self.header_text.clone()),
            (TitleField::Uvp, self.uvp.as_str().to_string()),
            (TitleField::Product, self.product.as_str().to_string()),
            (TitleField::Offer, self.offer.as_str().to_string()),
        ]
    }
}

/// Partial update of a Creative row. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativePatch {
    #[serde(default, rename = "type")]
    pub kind: Option<CreativeType>,
    #[serde(default, rename = "nameOfHypothesis", alias = "hypothesisName")]
    pub hypothesis: Option<String>,
    #[serde(default)]
    pub ai_flag: Option<AiFlag>,
    #[serde(default)]
    pub style: Option<Style>,
    #[serde(default, rename = "mainTon", alias = "mainTone")]
    pub main_tone: Option<MainTone>,
    #[serde(default)]
    pub main_object: Option<MainObject>,
    #[serde(default)]
    pub header_text: Option<String>,
    #[serde(default)]
    pub uvp: Option<Uvp>,
    #[serde(default)]
    pub product: Option<Product>,
    #[serde(default)]
    pub offer: Option<Offer>,
}

impl CreativePatch {
    /// Fields present in the patch, as cell values.
    pub fn cells(&self) -> Vec<(CreativeField, String)> {
        let mut cells = Vec::new();
        let mut push = |field, value: Option<String>| {
            if let Some(value) = value {
                cells.push((field, value));
            }
        };
        push(CreativeField::Type, self.kind.map(|v| v.as_str().to_string()));
        push(CreativeField::Hypothesis, self.hypothesis.clone());
        push(CreativeField::AiFlag, self.ai_flag.map(|v| v.as_str().to_string()));
        push(CreativeField::Style, self.style.map(|v| v.as_str().to_string()));
        push(CreativeField::MainTone, self.main_tone.map(|v| v.as_str().to_string()));
        push(CreativeField::MainObject, self.main_object.map(|v| v.as_str().to_string()));
        push(CreativeField::HeaderText, self.header_text.clone());
        push(CreativeField::Uvp, self.uvp.map(|v| v.as_str().to_string()));
        push(CreativeField::Product, self.product.map(|v| v.as_str().to_string()));
        push(CreativeField::Offer, self.offer.map(|v| v.as_str().to_string()));
        cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells().is_empty()
    }
}
