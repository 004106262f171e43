//! Free-text reply parsing
//!
//! The generative API is asked for a fixed reply shape: "- " bullets, a "2."
//! line naming a task type, and a "3." line naming a target column. Format
//! drift is expected, so parsing is lenient and failure is an explicit
//! outcome (`None`), letting the advisor fall back to heuristics.

/// Task-type vocabulary the reply is scanned against, in priority order.
pub const VALID_TASK_TYPES: [&str; 7] = [
    "classification",
    "regression",
    "clustering",
    "dimensionality_reduction",
    "anomaly_detection",
    "time_series",
    "reinforcement_learning",
];

pub const DEFAULT_TASK: &str = "clustering";

/// Insight content without provenance, produced by the parser or heuristics.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInsights {
    pub insights: Vec<String>,
    pub suggested_task_type: String,
    pub suggested_target_column: Option<String>,
}

/// Build the analysis prompt from the summary fields.
pub fn build_prompt(
    columns: &[String],
    data_types: &serde_json::Value,
    missing_values: &serde_json::Value,
) -> String {
    format!(
        "I have a dataset with the following details:\n\
        Columns: {columns:?}\n\
        Data Types: {data_types}\n\
        Missing Values: {missing_values}\n\n\
        1. Provide 3-5 bullet point insights about the dataset (e.g., potential issues, \
        interesting patterns). Format each point as '- Point text here' on a new line.\n\
        2. Suggest the most suitable machine learning task type (choose one): {}.\n\
        3. If the task type requires a target column (e.g., classification, regression), \
        recommend the best target column from the list of columns. If the task type does \
        not require a target column (e.g., clustering), return 'None' for the target column.",
        VALID_TASK_TYPES.join(", ")
    )
}

/// Extract insights, task type, and target column from a reply.
/// Returns None when nothing recognizable was found.
pub fn parse_response(text: &str, columns: &[String]) -> Option<ParsedInsights> {
    let mut insights = Vec::new();
    let mut task = DEFAULT_TASK.to_string();
    let mut target: Option<String> = None;
    let mut structure_seen = false;

    for raw in text.lines() {
        let line = raw.trim();
        if let Some(rest) = line.strip_prefix("- ") {
            insights.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("2.") {
            let candidate = rest.trim().to_lowercase();
            for valid in VALID_TASK_TYPES {
                if candidate.contains(valid) {
                    task = valid.to_string();
                    structure_seen = true;
                    break;
                }
            }
        } else if let Some(rest) = line.strip_prefix("3.") {
            let candidate = rest.trim().trim_matches(['\'', '"', '`', '*']);
            if candidate == "None" {
                target = None;
                structure_seen = true;
            } else if columns.iter().any(|c| c == candidate) {
                target = Some(candidate.to_string());
                structure_seen = true;
            }
        }
    }

    // Some replies number their insights instead of using bullets.
    if insights.is_empty() {
        for raw in text.lines() {
            let line = raw.trim();
            if line.starts_with("1.") && !line.starts_with("1. Provide") {
                if let Some((_, rest)) = line.split_once('.') {
                    insights.push(rest.trim().to_string());
                }
            }
        }
    }

    if insights.is_empty() && !structure_seen {
        return None;
    }
    if insights.is_empty() {
        insights.push("No structured insights could be parsed from the API response".to_string());
    }

    Some(ParsedInsights {
        insights,
        suggested_task_type: task,
        suggested_target_column: target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_well_formed_reply() {
        let reply = "\
            - The age column has a wide range\n\
            - Income is heavily skewed\n\
            - No duplicate rows detected\n\n\
            2. regression\n\
            3. income\n";
        let parsed = parse_response(reply, &cols(&["age", "income"])).unwrap();

        assert_eq!(parsed.insights.len(), 3);
        assert_eq!(parsed.suggested_task_type, "regression");
        assert_eq!(parsed.suggested_target_column.as_deref(), Some("income"));
    }

    #[test]
    fn test_task_keyword_found_inside_sentence() {
        let reply = "- something\n2. This looks like a classification problem\n3. None\n";
        let parsed = parse_response(reply, &cols(&["a"])).unwrap();
        assert_eq!(parsed.suggested_task_type, "classification");
        assert!(parsed.suggested_target_column.is_none());
    }

    #[test]
    fn test_target_must_be_existing_column() {
        let reply = "- something\n2. regression\n3. revenue\n";
        let parsed = parse_response(reply, &cols(&["age", "income"])).unwrap();
        assert!(parsed.suggested_target_column.is_none());
    }

    #[test]
    fn test_quoted_target_is_accepted() {
        let reply = "- something\n2. regression\n3. 'income'\n";
        let parsed = parse_response(reply, &cols(&["income"])).unwrap();
        assert_eq!(parsed.suggested_target_column.as_deref(), Some("income"));
    }

    #[test]
    fn test_numbered_items_used_when_no_bullets() {
        let reply = "1. The dataset is small\n2. clustering\n3. None\n";
        let parsed = parse_response(reply, &cols(&["a"])).unwrap();
        assert_eq!(parsed.insights, vec!["The dataset is small"]);
        assert_eq!(parsed.suggested_task_type, "clustering");
    }

    #[test]
    fn test_placeholder_when_structure_but_no_insights() {
        let reply = "2. regression\n3. None\n";
        let parsed = parse_response(reply, &cols(&["a"])).unwrap();
        assert_eq!(parsed.insights.len(), 1);
        assert!(parsed.insights[0].contains("No structured insights"));
    }

    #[test]
    fn test_unrecognizable_reply_is_none() {
        assert!(parse_response("I cannot help with that.", &cols(&["a"])).is_none());
        assert!(parse_response("", &cols(&["a"])).is_none());
    }

    #[test]
    fn test_prompt_mentions_all_fields() {
        let prompt = build_prompt(
            &cols(&["age", "income"]),
            &serde_json::json!({"age": "Int64"}),
            &serde_json::json!({"age": 0}),
        );
        assert!(prompt.contains("age"));
        assert!(prompt.contains("classification, regression"));
        assert!(prompt.contains("return 'None'"));
    }
}
