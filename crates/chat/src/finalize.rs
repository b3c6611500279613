//! Finalization of complete (non-streamed) answers.

use crate::chunk::{
    ChatResponse, ExtraInfo, RESPONSE_OBJECT, ResponseChoice, ResponseContext, ResponseMessage,
};
use crate::followup::extract_followup_questions;
use ragchat_core::message::Role;
use ragchat_core::provider::ProviderResponse;

/// Visible answer text and the follow-ups split off it.
#[derive(Debug, Clone, PartialEq)]
pub struct Finalized {
    pub visible_text: String,
    pub followup_questions: Vec<String>,
}

/// Split follow-up questions off a complete answer when enabled.
pub fn finalize(text: &str, followup_enabled: bool) -> Finalized {
    if !followup_enabled {
        return Finalized {
            visible_text: text.to_string(),
            followup_questions: Vec::new(),
        };
    }
    let (visible, questions) = extract_followup_questions(text);
    Finalized {
        visible_text: visible.to_string(),
        followup_questions: questions,
    }
}

/// Build the client-facing response for a complete answer.
///
/// `context.followup_questions` is present only when follow-ups are enabled.
pub fn build_response(
    completion: ProviderResponse,
    extra: ExtraInfo,
    followup_enabled: bool,
    session_state: serde_json::Value,
) -> ChatResponse {
    let finalized = finalize(&completion.message.text(), followup_enabled);

    let mut context = ResponseContext::from(extra);
    if followup_enabled {
        context.followup_questions = Some(finalized.followup_questions);
    }

    let id = if completion.id.is_empty() {
        format!("chatcmpl-{}", uuid::Uuid::new_v4())
    } else {
        completion.id
    };

    ChatResponse {
        id,
        object: RESPONSE_OBJECT.into(),
        created: chrono::Utc::now().timestamp(),
        model: completion.model,
        usage: completion.usage,
        choices: vec![ResponseChoice {
            index: 0,
            message: ResponseMessage {
                role: Role::Assistant,
                content: finalized.visible_text,
            },
            finish_reason: completion.finish_reason,
            context,
            session_state,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_core::message::Message;

    fn completion(text: &str) -> ProviderResponse {
        ProviderResponse {
            id: String::new(),
            message: Message::assistant(text),
            tool_calls: vec![],
            finish_reason: Some("stop".into()),
            usage: None,
            model: "gpt-35-turbo".into(),
        }
    }

    #[test]
    fn disabled_leaves_text_untouched() {
        let f = finalize("Answer text<<Q1>><<Q2>>", false);
        assert_eq!(f.visible_text, "Answer text<<Q1>><<Q2>>");
        assert!(f.followup_questions.is_empty());
    }

    #[test]
    fn enabled_splits_questions() {
        let f = finalize("Answer text<<Q1>><<Q2>>", true);
        assert_eq!(f.visible_text, "Answer text");
        assert_eq!(f.followup_questions, vec!["Q1", "Q2"]);
    }

    #[test]
    fn response_has_envelope_and_context() {
        let response = build_response(
            completion("Answer<<Next?>>"),
            ExtraInfo::default(),
            true,
            serde_json::json!({"turn": 2}),
        );
        assert!(response.id.starts_with("chatcmpl-"));
        assert_eq!(response.object, "chat.completion");
        assert!(response.created > 0);

        let choice = &response.choices[0];
        assert_eq!(choice.message.content, "Answer");
        assert_eq!(
            choice.context.followup_questions.as_deref(),
            Some(&["Next?".to_string()][..])
        );
        assert_eq!(choice.session_state["turn"], 2);
        assert_eq!(choice.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn disabled_response_omits_followups() {
        let response = build_response(
            completion("Answer<<Next?>>"),
            ExtraInfo::default(),
            false,
            serde_json::Value::Null,
        );
        let value = serde_json::to_value(&response).unwrap();
        let context = &value["choices"][0]["context"];
        assert!(context.get("followup_questions").is_none());
        assert!(context.get("data_points").is_some());
        assert!(value["choices"][0]["session_state"].is_null());
        assert_eq!(response.content(), Some("Answer<<Next?>>"));
    }
}
