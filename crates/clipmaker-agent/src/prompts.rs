//! Prompt templates for step generation.

/// Number of steps the model is asked for.
pub const STEP_COUNT: usize = 4;

/// System prompt for a topic and product keyword.
pub fn system_prompt(topic: &str, product: &str) -> String {
    format!(
        "You are a helpful assistant that creates {} steps with {} supplement integration.",
        topic, product
    )
}

/// User prompt asking for one activity with [`STEP_COUNT`] one-sentence steps.
///
/// The third step must mention the product keyword.
pub fn steps_prompt(topic: &str, product: &str) -> String {
    format!(
        r#"Create {count} coherent steps with very short one-sentence abstracts on the topic of {topic} with the addition of selling {product} supplements, where the third step must mention {product}. Answer in json format. The structure should be as follows:

{{
  "activities": [
    {{
      "activity": "{title}",
      "description": "A journey to tranquility and cellular rejuvenation.",
      "steps": [
        {{ "step": "Step 1", "details": "One-sentence description of step 1." }},
        {{ "step": "Step 2", "details": "One-sentence description of step 2." }},
        {{ "step": "Step 3", "details": "One-sentence description mentioning {product}." }},
        {{ "step": "Step 4", "details": "One-sentence description of step 4." }}
      ]
    }}
  ]
}}

Ensure that the steps are coherent and flow logically from one to the next, incorporating the {product} supplement naturally into the {topic} process."#,
        count = STEP_COUNT,
        topic = topic,
        product = product,
        title = activity_title(topic),
    )
}

fn activity_title(topic: &str) -> String {
    let mut chars = topic.chars();
    match chars.next() {
        Some(first) => format!("{}{} for Inner Peace", first.to_uppercase(), chars.as_str()),
        None => "Activity".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt() {
        assert_eq!(
            system_prompt("meditation", "NAD+"),
            "You are a helpful assistant that creates meditation steps with NAD+ supplement integration."
        );
    }

    #[test]
    fn test_steps_prompt_mentions_topic_and_product() {
        let prompt = steps_prompt("meditation", "NAD+");
        assert!(prompt.starts_with("Create 4 coherent steps"));
        assert!(prompt.contains("on the topic of meditation"));
        assert!(prompt.contains("the third step must mention NAD+"));
        assert!(prompt.contains("\"activity\": \"Meditation for Inner Peace\""));
        assert!(prompt.contains("\"step\": \"Step 4\""));
    }

    #[test]
    fn test_steps_prompt_is_valid_json_example() {
        let prompt = steps_prompt("yoga", "Omega-3");
        let start = prompt.find('{').unwrap();
        let end = prompt.rfind('}').unwrap();
        let example: serde_json::Value = serde_json::from_str(&prompt[start..=end]).unwrap();
        assert_eq!(example["activities"][0]["steps"].as_array().unwrap().len(), STEP_COUNT);
        assert_eq!(example["activities"][0]["activity"], "Yoga for Inner Peace");
    }
}
