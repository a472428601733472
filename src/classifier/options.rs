//! Closed value sets for classification fields and their normalization.
//!
//! Model output is free text. Each set owns an ordered candidate table; the
//! first candidate found as a substring of the prepared input wins, otherwise
//! the set's fallback is used.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid value for {field}: \"{value}\"")]
pub struct InvalidOption {
    pub field: &'static str,
    pub value: String,
}

/// A closed set of labels with substring normalization.
pub trait ClosedSet: Copy + Sized + 'static {
    const FALLBACK: Self;

    /// Ordered `(needle, value)` pairs; needles are matched against [`ClosedSet::prepare`]d input.
    fn candidates() -> &'static [(&'static str, Self)];

    fn prepare(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    fn normalize(raw: &str) -> Self {
        let haystack = Self::prepare(raw);
        Self::candidates()
            .iter()
            .find(|(needle, _)| haystack.contains(needle))
            .map(|(_, value)| *value)
            .unwrap_or(Self::FALLBACK)
    }
}

macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $name:ident, field = $field:literal, {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn labels() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = InvalidOption;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| InvalidOption {
                        field: $field,
                        value: s.to_string(),
                    })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(de::Error::custom)
            }
        }
    };
}

closed_set!(CreativeType, field = "type", {
    Static => "static",
    Video => "video",
});

closed_set!(AiFlag, field = "aiFlag", {
    MadeAi => "made AI",
    NotAi => "not AI",
});

closed_set!(Style, field = "style", {
    Real => "Real",
    ThreeD => "3D",
    Illustration => "Illustration",
    Minecraft => "Minecraft style",
    Pixar => "Pixar style",
    Cartoon => "Cartoon",
    Other => "Other",
});

closed_set!(MainTone, field = "mainTone", {
    Bright => "bright",
    Light => "light",
    Dark => "dark",
    Soft => "soft",
    Neutral => "neutral",
});

closed_set!(MainObject, field = "mainObject", {
    City => "city",
    Boy => "boy",
    Girl => "girl",
    BoyGirl => "boy_girl",
    Statue => "statue",
    Building => "building",
    Object => "object",
    People => "people",
    Offline => "offline",
    None => "none",
    Other => "other",
});

closed_set!(Uvp, field = "uvp", {
    DirectSale => "прямая продажа",
    ThroughPain => "через боль",
    ThroughBenefit => "через выгоду",
    Fomo => "FOMO",
    SocialProof => "социальное доказательство",
    Other => "other",
});

closed_set!(Product, field = "product", {
    MathCourse => "курс математики",
    ProgrammingCourse => "курс программирования",
    EnglishCourse => "курс английского",
    Subscription => "подписка",
    Other => "other",
});

closed_set!(Offer, field = "offer", {
    FreeLesson => "бесплатный урок",
    MasterClass => "мастер-класс",
    Webinar => "вебинар",
    FreeCourse => "бесплатный курс",
    Discount => "скидка",
    TrialPeriod => "пробный период",
    Other => "other",
});

impl ClosedSet for CreativeType {
    const FALLBACK: Self = CreativeType::Static;

    fn candidates() -> &'static [(&'static str, Self)] {
        &[("video", CreativeType::Video)]
    }

    // Only an exact "video" counts; "video banner" is still a static creative.
    fn normalize(raw: &str) -> Self {
        if Self::prepare(raw) == "video" {
            CreativeType::Video
        } else {
            Self::FALLBACK
        }
    }
}

impl ClosedSet for AiFlag {
    const FALLBACK: Self = AiFlag::NotAi;

    fn candidates() -> &'static [(&'static str, Self)] {
        &[("made", AiFlag::MadeAi)]
    }

    fn normalize(raw: &str) -> Self {
        let haystack = Self::prepare(raw);
        if haystack.contains("made") && haystack.contains("ai") {
            AiFlag::MadeAi
        } else {
            Self::FALLBACK
        }
    }
}

impl ClosedSet for Style {
    const FALLBACK: Self = Style::Other;

    fn candidates() -> &'static [(&'static str, Self)] {
        &[
            ("real", Style::Real),
            ("3d", Style::ThreeD),
            ("illustration", Style::Illustration),
            ("minecraft style", Style::Minecraft),
            ("pixar style", Style::Pixar),
            ("cartoon", Style::Cartoon),
            ("other", Style::Other),
        ]
    }
}

impl ClosedSet for MainTone {
    const FALLBACK: Self = MainTone::Neutral;

    fn candidates() -> &'static [(&'static str, Self)] {
        &[
            ("bright", MainTone::Bright),
            ("light", MainTone::Light),
            ("dark", MainTone::Dark),
            ("soft", MainTone::Soft),
            ("neutral", MainTone::Neutral),
        ]
    }
}

impl ClosedSet for MainObject {
    const FALLBACK: Self = MainObject::Other;

    // boy_girl precedes boy and girl, which it contains.
    fn candidates() -> &'static [(&'static str, Self)] {
        &[
            ("city", MainObject::City),
            ("boy_girl", MainObject::BoyGirl),
            ("boy", MainObject::Boy),
            ("girl", MainObject::Girl),
            ("statue", MainObject::Statue),
            ("building", MainObject::Building),
            ("object", MainObject::Object),
            ("people", MainObject::People),
            ("offline", MainObject::Offline),
            ("none", MainObject::None),
            ("other", MainObject::Other),
        ]
    }

    fn prepare(raw: &str) -> String {
        raw.trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl ClosedSet for Uvp {
    const FALLBACK: Self = Uvp::Other;

    fn candidates() -> &'static [(&'static str, Self)] {
        &[
            ("прямая продажа", Uvp::DirectSale),
            ("через боль", Uvp::ThroughPain),
            ("через выгоду", Uvp::ThroughBenefit),
            ("fomo", Uvp::Fomo),
            ("социальное доказательство", Uvp::SocialProof),
            ("other", Uvp::Other),
        ]
    }
}

impl ClosedSet for Product {
    const FALLBACK: Self = Product::Other;

    fn candidates() -> &'static [(&'static str, Self)] {
        &[
            ("курс математики", Product::MathCourse),
            ("курс программирования", Product::ProgrammingCourse),
            ("курс английского", Product::EnglishCourse),
            ("подписка", Product::Subscription),
            ("other", Product::Other),
        ]
    }
}

impl ClosedSet for Offer {
    const FALLBACK: Self = Offer::Other;

    fn candidates() -> &'static [(&'static str, Self)] {
        &[
            ("бесплатный урок", Offer::FreeLesson),
            ("мастер-класс", Offer::MasterClass),
            ("вебинар", Offer::Webinar),
            ("бесплатный курс", Offer::FreeCourse),
            ("скидка", Offer::Discount),
            ("пробный период", Offer::TrialPeriod),
            ("other", Offer::Other),
        ]
    }
}

/// Every closed set, as served to the editing UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionSets {
    #[serde(rename = "type")]
    pub kind: Vec<&'static str>,
    pub ai_flag: Vec<&'static str>,
    pub style: Vec<&'static str>,
    pub main_ton: Vec<&'static str>,
    pub main_object: Vec<&'static str>,
    pub uvp: Vec<&'static str>,
    pub product: Vec<&'static str>,
    pub offer: Vec<&'static str>,
}

impl OptionSets {
    pub fn all() -> Self {
        Self {
            kind: CreativeType::labels(),
            ai_flag: AiFlag::labels(),
            style: Style::labels(),
            main_ton: MainTone::labels(),
            main_object: MainObject::labels(),
            uvp: Uvp::labels(),
            product: Product::labels(),
            offer: Offer::labels(),
        }
    }
}
