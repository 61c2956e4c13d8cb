use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepList {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default)]
    pub start: Value,
    #[serde(default)]
    pub end: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Each step ends where the next one starts; the last step has no end.
pub fn assign_end_times(list: &mut StepList) {
    let next_starts: Vec<Value> = list
        .steps
        .iter()
        .skip(1)
        .map(|step| step.start.clone())
        .chain(std::iter::once(Value::Null))
        .collect();

    for (step, end) in list.steps.iter_mut().zip(next_starts) {
        step.end = end;
    }
}

/// Parses a clip-mode step list, fills in end times and serializes it again.
pub fn postprocess_clip_steps(raw: &str) -> Result<String, GenerationError> {
    let mut list: StepList = serde_json::from_str(raw.trim())
        .map_err(|error| GenerationError::InvalidOutput(error.to_string()))?;
    assign_end_times(&mut list);
    Ok(serde_json::to_string(&list)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn end_times_follow_the_next_start() -> Result<(), GenerationError> {
        let raw = r#"{"steps":[{"description":"open","start":0},{"description":"drain","start":5},{"description":"refill","start":12}]}"#;
        let processed: Value = serde_json::from_str(&postprocess_clip_steps(raw)?)?;

        assert_eq!(
            processed,
            json!({"steps": [
                {"description": "open", "start": 0, "end": 5},
                {"description": "drain", "start": 5, "end": 12},
                {"description": "refill", "start": 12, "end": null},
            ]})
        );
        Ok(())
    }

    #[test]
    fn details_and_unknown_fields_survive() -> Result<(), GenerationError> {
        let raw = r#"{"steps":[{"description":"open","details":"use a 10 mm key","start":1.5,"tool":"key"}]}"#;
        let processed: Value = serde_json::from_str(&postprocess_clip_steps(raw)?)?;

        assert_eq!(
            processed,
            json!({"steps": [
                {"description": "open", "details": "use a 10 mm key", "start": 1.5, "end": null, "tool": "key"},
            ]})
        );
        Ok(())
    }

    #[test]
    fn empty_step_list_stays_empty() -> Result<(), GenerationError> {
        assert_eq!(postprocess_clip_steps(r#"{"steps":[]}"#)?, r#"{"steps":[]}"#);
        Ok(())
    }

    #[test]
    fn malformed_output_is_reported() {
        let result = postprocess_clip_steps("{\"steps\": [{\"description\": ");
        assert!(matches!(result, Err(GenerationError::InvalidOutput(_))));
    }
}
