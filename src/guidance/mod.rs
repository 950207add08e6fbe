//! Localized agronomic guidance
//!
//! Class labels come from dataset directory names, so they vary in case,
//! separators, and filler words ("Aphids", "powdery_mildew",
//! "Army worm leaf"). [`canonicalize`] reduces a label to one of six
//! canonical keys and [`guide_for`] returns the Hindi guidance for it.

mod hindi;

use serde::{Deserialize, Serialize};

/// Canonical disease/pest categories with guidance text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseKey {
    Aphids,
    TargetSpot,
    PowderyMildew,
    BacterialBlight,
    ArmyWorms,
    Healthy,
}

impl DiseaseKey {
    pub const ALL: [DiseaseKey; 6] = [
        DiseaseKey::Aphids,
        DiseaseKey::TargetSpot,
        DiseaseKey::PowderyMildew,
        DiseaseKey::BacterialBlight,
        DiseaseKey::ArmyWorms,
        DiseaseKey::Healthy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseKey::Aphids => "aphids",
            DiseaseKey::TargetSpot => "target_spot",
            DiseaseKey::PowderyMildew => "powdery_mildew",
            DiseaseKey::BacterialBlight => "bacterial_blight",
            DiseaseKey::ArmyWorms => "army_worms",
            DiseaseKey::Healthy => "healthy",
        }
    }
}

impl std::fmt::Display for DiseaseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Noise removed from labels, in this order
const NOISE_TOKENS: [&str; 5] = ["leaf", "leaves", "plant", "-", "_"];

/// Keyword rules; the first rule with a matching keyword wins
const KEYWORD_RULES: [(&[&str], DiseaseKey); 6] = [
    (&["aphid"], DiseaseKey::Aphids),
    (&["target"], DiseaseKey::TargetSpot),
    (&["powdery"], DiseaseKey::PowderyMildew),
    (&["bacterial", "blight"], DiseaseKey::BacterialBlight),
    (&["army", "worm"], DiseaseKey::ArmyWorms),
    (&["healthy"], DiseaseKey::Healthy),
];

/// Lower-case, blank out noise tokens (plain substring replacement, in
/// order), and collapse whitespace.
pub fn normalize_label(label: &str) -> String {
    let mut raw = label.to_lowercase();
    for token in NOISE_TOKENS {
        raw = raw.replace(token, " ");
    }
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map a class label to its canonical key
pub fn canonicalize(label: &str) -> Option<DiseaseKey> {
    let normalized = normalize_label(label);
    KEYWORD_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| normalized.contains(k)))
        .map(|(_, key)| *key)
}

/// Guidance for one class, serialized with Hindi field names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseGuide {
    #[serde(rename = "नाम")]
    pub name: String,
    #[serde(rename = "विवरण")]
    pub description: String,
    #[serde(rename = "उपचार_कदम")]
    pub treatment_steps: Vec<String>,
    #[serde(rename = "अनुशंसित_कीटनाशक")]
    pub recommended_pesticides: Vec<String>,
}

impl DiseaseGuide {
    pub fn for_key(key: DiseaseKey) -> Self {
        let entry = hindi::entry(key);
        Self {
            name: entry.name.to_string(),
            description: entry.description.to_string(),
            treatment_steps: entry.treatment_steps.iter().map(|s| s.to_string()).collect(),
            recommended_pesticides: entry.recommended_pesticides.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn without_steps(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            treatment_steps: Vec::new(),
            recommended_pesticides: Vec::new(),
        }
    }
}

/// Hindi guidance for a class label.
///
/// An empty label yields the "unknown" guide; a label matching no rule
/// yields a guide named after the label itself with an "information not
/// available" description.
pub fn guide_for(label: &str) -> DiseaseGuide {
    if label.is_empty() {
        return DiseaseGuide::without_steps(hindi::UNKNOWN_NAME, hindi::UNKNOWN_DESCRIPTION);
    }

    match canonicalize(label) {
        Some(key) => DiseaseGuide::for_key(key),
        None => DiseaseGuide::without_steps(label, hindi::UNAVAILABLE_DESCRIPTION),
    }
}
