//! Prompt text for each pipeline stage.
//!
//! Every analysis prompt embeds the exact JSON shape the interpreter's
//! structured path expects. The model does not always honor it — that is what
//! the heuristic fallback is for — but a precise schema in the prompt keeps
//! the structured path the common case.

use super::types::ItemCategory;

/// First-stage classification. One cheap call that decides which specialized
/// prompt the main analysis uses.
pub const DETECTION_PROMPT: &str = r#"Look at this photograph and classify what it primarily shows.

Answer with a JSON object only:

```json
{"category": "fruit | leaf | unrelated"}
```

- "fruit": a mango fruit (whole or cut, any ripeness)
- "leaf": mango tree foliage
- "unrelated": anything that is not a mango fruit or mango leaf
"#;

pub const FRUIT_ANALYSIS_PROMPT: &str = r#"You are inspecting a photograph of a mango fruit for disease.

Examine the skin and visible flesh for signs of anthracnose, stem end rot,
bacterial black spot, sooty mold, scab, or other conditions.

Respond with a JSON object wrapped in ```json``` fences:

```json
{
  "disease_detected": true,
  "disease_name": "name of the condition, or null if healthy",
  "confidence": 0.0,
  "symptoms": ["visible symptom", "..."],
  "recommendations": ["practical handling or treatment step", "..."],
  "severity": "none | low | medium | high"
}
```

Rules:
- "disease_detected" must be false and "disease_name" null for a healthy fruit.
- "confidence" is a number between 0.0 and 1.0.
- "severity" must be "none" when no disease is detected.
- List only symptoms actually visible in the photograph.
"#;

pub const LEAF_ANALYSIS_PROMPT: &str = r#"You are inspecting a photograph of a mango leaf for disease.

Examine the blade, margins and veins for signs of anthracnose, powdery mildew,
red rust, leaf spot, bacterial black spot, malformation, or other conditions.

Respond with a JSON object wrapped in ```json``` fences:

```json
{
  "disease_detected": true,
  "disease_name": "name of the condition, or null if healthy",
  "confidence": 0.0,
  "symptoms": ["visible symptom", "..."],
  "recommendations": ["practical treatment or cultural step", "..."],
  "severity": "none | low | medium | high"
}
```

Rules:
- "disease_detected" must be false and "disease_name" null for a healthy leaf.
- "confidence" is a number between 0.0 and 1.0.
- "severity" must be "none" when no disease is detected.
- List only symptoms actually visible in the photograph.
"#;

/// Neutral prompt for images that are not a mango at all. Deliberately asks
/// for observation only — no disease vocabulary, no diagnosis.
pub const UNRELATED_PROMPT: &str = r#"This photograph does not show a mango fruit or mango leaf.

Briefly describe what the image shows, in one or two neutral sentences.
Do not diagnose anything and do not mention diseases.
"#;

/// Secondary, best-effort pass for fruit photographs.
pub const VARIETY_PROMPT: &str = r#"Identify the mango variety shown in this photograph.

Consider: Alphonso, Sindhri, Chaunsa, Anwar Ratol, Langra, Dasheri, Kent, Keitt.

Respond with a JSON object wrapped in ```json``` fences:

```json
{
  "variety": "variety name, or \"other\" if none of the above",
  "confidence": 0.0,
  "characteristics": ["shape/color/size cue you relied on", "..."],
  "description": "one sentence about this variety"
}
```
"#;

/// The category-specific prompt for the main analysis call.
pub fn analysis_prompt_for(category: ItemCategory) -> &'static str {
    match category {
        ItemCategory::Fruit => FRUIT_ANALYSIS_PROMPT,
        ItemCategory::Leaf => LEAF_ANALYSIS_PROMPT,
        ItemCategory::Unrelated => UNRELATED_PROMPT,
    }
}
