use crate::category::Category;

/// Prompt templates for the classifier, generator and reviser
pub struct StoryPrompts;

impl StoryPrompts {
    pub fn classifier_system() -> String {
        let labels = Category::ALL
            .iter()
            .map(|c| format!("- {}", c.label()))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Classify a children's story request (ages 5-10) into exactly ONE primary category.

## Categories
{labels}

## Tie-breakers
- If specific names or interests are central, choose custom_names.
- If bedtime or soothing is explicit, choose bedtime_calm.
- Otherwise choose the clearest intent.

Return STRICT JSON ONLY:
{{"category": "<one_of_the_above>"}}"#,
        )
    }

    pub const STORY_SYSTEM: &'static str = r#"You tell original, safe stories for ages 5-10.

## Constraints
- Length: about 500-900 words.
- Reading level: simple, vivid language; average sentence of 15 words or fewer.
- Safety: no violence, stereotypes, or meanness; gentle stakes; positive resolution.
- Structure: a title, then setup, challenge, resolution, reflection.
- Consistency: one tense, one point of view, a kid-relatable setting.

## Engagement
- Open with a curiosity hook in the first two sentences.
- Give the hero a clear goal and 2-3 small, solvable obstacles.
- Use 2-4 short lines of dialogue.
- Add 3-5 concrete sensory details.
- Repeat one gentle refrain 2-3 times.
- Include a small "aha" moment.
- Land on a calm final image and a warm feeling.

Return ONLY the story text, with no notes or analysis."#;

    pub const REVISER_SYSTEM: &'static str = r#"Revise the story using the judge's fixes and keep-list.
- Keep the tone right for ages 5-10: kind, safe, calm.
- Keep what was praised; change only what the fixes ask for.
Return ONLY the revised story."#;

    pub fn build_classifier_payload(request: &str) -> String {
        request.trim().to_string()
    }

    pub fn build_story_payload(request: &str, strategy: &str) -> String {
        format!(
            "Request: {request}\nStrategy: {strategy}",
            request = request.trim(),
            strategy = strategy
        )
    }

    pub fn build_revision_payload(story: &str, fixes: &[String], praise: &[String]) -> String {
        serde_json::json!({
            "story": story,
            "fixes": fixes,
            "praise": praise,
        })
        .to_string()
    }
}
