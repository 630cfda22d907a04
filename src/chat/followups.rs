//! Follow-up question suggestions.
//!
//! Advisory only: suggestions never affect the answer and a failure here is
//! never surfaced. The strategy is pluggable so a richer implementation can
//! replace the keyword heuristics later.

/// Strategy for deriving follow-up questions from a finished exchange.
pub trait FollowupStrategy: Send + Sync {
    /// Suggest up to three follow-up questions.
    fn suggest(&self, question: &str, answer: &str) -> Vec<String>;
}

/// Keyword-triggered follow-up suggestions.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordFollowups;

impl FollowupStrategy for KeywordFollowups {
    fn suggest(&self, question: &str, answer: &str) -> Vec<String> {
        let question_lower = question.to_lowercase();
        let answer_lower = answer.to_lowercase();
        let mentioned = |keyword: &str| {
            question_lower.contains(keyword) || answer_lower.contains(keyword)
        };

        let mut suggestions = Vec::new();

        if mentioned("action item") {
            suggestions.push("Who owns each of the action items?".to_string());
        }
        if mentioned("decision") {
            suggestions.push("What alternatives were considered before that decision?".to_string());
        }
        if mentioned("next step") {
            suggestions.push("When are the next steps due?".to_string());
        }
        if !question_lower.contains("summary") {
            suggestions.push("Can you summarize the key points?".to_string());
        }

        suggestions.truncate(3);
        suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_triggers() {
        let strategy = KeywordFollowups;

        let suggestions = strategy.suggest(
            "what were the action items?",
            "The team agreed on a decision and two next steps.",
        );
        assert_eq!(suggestions.len(), 3);

        let suggestions = strategy.suggest("give me a summary", "Here is the summary.");
        assert!(suggestions.is_empty());
    }

    #[test]
    fn test_summary_suggested_when_absent_from_question() {
        let strategy = KeywordFollowups;
        let suggestions = strategy.suggest("what did Bob say?", "Bob talked about hiring.");
        assert_eq!(suggestions, vec!["Can you summarize the key points?".to_string()]);
    }

    #[test]
    fn test_never_more_than_three() {
        let strategy = KeywordFollowups;
        let suggestions = strategy.suggest(
            "tell me everything",
            "action item one, a decision, and the next step",
        );
        assert_eq!(suggestions.len(), 3);
    }
}
