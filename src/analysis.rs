//! Product categorization and description heuristics over image labels.

use serde::Serialize;

use crate::models::Category;

/// A label detected in an image, with confidence in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    pub name: String,
    pub confidence: f32,
}

impl Label {
    pub fn new(name: impl Into<String>, confidence: f32) -> Self {
        Self { name: name.into(), confidence }
    }
}

/// Keyword substrings per category, in category declaration order.
pub const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Electronics, &[
        "phone", "computer", "laptop", "tablet", "camera", "headphones", "speaker", "monitor",
        "keyboard", "mouse", "cable", "charger", "electronics", "device", "screen",
    ]),
    (Category::Clothing, &[
        "shirt", "pants", "dress", "jacket", "coat", "shoes", "boots", "hat", "clothing",
        "apparel", "fashion", "textile", "fabric", "garment",
    ]),
    (Category::HomeAndGarden, &[
        "furniture", "chair", "table", "lamp", "decoration", "plant", "flower", "vase",
        "cushion", "pillow", "blanket", "curtain", "home", "garden",
    ]),
    (Category::Kitchen, &[
        "cup", "mug", "plate", "bowl", "spoon", "fork", "knife", "pot", "pan", "kitchen",
        "cooking", "food", "utensil", "appliance",
    ]),
    (Category::Books, &[
        "book", "magazine", "text", "reading", "paper", "literature", "novel", "guide", "manual",
    ]),
    (Category::Sports, &[
        "ball", "equipment", "sports", "fitness", "exercise", "gym", "athletic", "game", "outdoor",
    ]),
    (Category::Beauty, &[
        "cosmetics", "makeup", "perfume", "beauty", "skincare", "lotion", "cream", "lipstick",
    ]),
    (Category::Toys, &["toy", "game", "doll", "puzzle", "children", "kids", "play", "fun"]),
    (Category::Automotive, &["car", "vehicle", "automotive", "wheel", "tire", "parts", "motor"]),
    (Category::Health, &[
        "medicine", "health", "medical", "vitamin", "supplement", "pharmacy", "wellness",
    ]),
];

/// A winning score must exceed this to beat `General`.
const MIN_CATEGORY_SCORE: f32 = 0.3;

const GENERIC_LABELS: &[&str] = &["object", "thing", "item", "product", "material", "solid", "abstract"];

const MAX_DESCRIBED_LABELS: usize = 8;
const MAX_DETECTED_TEXT: usize = 5;
const FALLBACK_DESCRIPTION: &str = "Quality product available for purchase.";

fn category_score(labels: &[Label], keywords: &[&str]) -> f32 {
    labels
        .iter()
        .filter(|label| {
            let name = label.name.to_lowercase();
            keywords.iter().any(|keyword| name.contains(keyword))
        })
        .map(|label| label.confidence / 100.0)
        .sum()
}

/// Picks the best matching category for a set of labels.
///
/// Each label contributes `confidence / 100` to every category that has a
/// keyword contained in its lowercase name. Ties go to the category declared
/// first; a best score of 0.3 or less yields [`Category::General`].
pub fn classify(labels: &[Label]) -> Category {
    let mut best: Option<(Category, f32)> = None;
    for (category, keywords) in CATEGORY_KEYWORDS {
        let score = category_score(labels, keywords);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((*category, score));
        }
    }

    match best {
        Some((category, score)) if score > MIN_CATEGORY_SCORE => category,
        _ => Category::General,
    }
}

/// Builds a short human-readable product description.
///
/// `labels` should be sorted by confidence, highest first.
pub fn describe(labels: &[Label], detected_text: &[String]) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(text) = detected_text
        .iter()
        .take(MAX_DETECTED_TEXT)
        .find(|t| (3..50).contains(&t.chars().count()))
    {
        parts.push(text.clone());
    }

    let primary: Vec<&str> = labels
        .iter()
        .take(MAX_DESCRIBED_LABELS)
        .map(|label| label.name.as_str())
        .filter(|name| !GENERIC_LABELS.contains(&name.to_lowercase().as_str()))
        .take(3)
        .collect();

    match primary.as_slice() {
        [] => {}
        [a] => parts.push(format!("High-quality {}", a.to_lowercase())),
        [a, b] => parts.push(format!("{} with {} features", a, b.to_lowercase())),
        [a, b, c, ..] => parts.push(format!(
            "{} featuring {} and {}",
            a,
            b.to_lowercase(),
            c.to_lowercase()
        )),
    }

    if labels.iter().any(|label| label.confidence > 90.0) {
        parts.push("Premium quality item".to_string());
    }

    if parts.is_empty() {
        return FALLBACK_DESCRIPTION.to_string();
    }

    let mut description = parts.join(". ");
    if !description.ends_with('.') {
        description.push('.');
    }
    description
}
