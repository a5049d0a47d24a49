//! Prompt validation shared by the orchestrator and the session layer.

use crate::error::CoreError;

/// Trim surrounding whitespace and reject prompts that end up empty.
pub fn normalize_prompt(prompt: &str) -> Result<String, CoreError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Please generate or enter a prompt first.".into(),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(
            normalize_prompt("  a cat in space\n").unwrap(),
            "a cat in space"
        );
    }

    #[test]
    fn keeps_inner_whitespace() {
        assert_eq!(normalize_prompt("a  cat").unwrap(), "a  cat");
    }

    #[test]
    fn rejects_empty_and_blank() {
        assert_matches!(normalize_prompt(""), Err(CoreError::Validation(_)));
        assert_matches!(normalize_prompt("  "), Err(CoreError::Validation(_)));
        assert_matches!(normalize_prompt("\t\n"), Err(CoreError::Validation(_)));
    }
}
