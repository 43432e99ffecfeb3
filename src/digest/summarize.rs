use crate::digest::model::{Message, Transcript};
use crate::llm::provider::{ChatTurn, SummaryModel};
use anyhow::{Context, Result};

/// Returned without calling the model when a transcript has nothing to read.
pub const NO_CONVERSATION_SUMMARY: &str = "no conversation";

const SYSTEM_PROMPT: &str = "너는 유능한 비서야.";

fn render_line(message: &Message) -> Option<String> {
    let text = message.text.trim();
    if text.is_empty() {
        return None;
    }
    let author = message.author_label();
    if message.is_reply() {
        Some(format!("  - [댓글][{author}]: {text}\n"))
    } else {
        Some(format!("\n[{author}]: {text}\n"))
    }
}

/// Render at most `max_messages` leading messages as role-tagged lines.
/// Messages past the cap are dropped, not summarized.
pub fn render_transcript(transcript: &Transcript, max_messages: usize) -> String {
    transcript
        .iter()
        .take(max_messages)
        .filter_map(render_line)
        .collect()
}

pub fn build_prompt(context: &str) -> String {
    format!(
        "너는 사내 메시지 분석 전문가야. 아래의 슬랙 대화 내용을 읽고 요약해줘.
반드시 한국어로 작성하고, '뭐뭐했습니다' 대신 '뭐뭐함' 식의 깔끔한 개조식 표현을 써줘.

[요약 형식]
1. 주요 흐름: 전체적인 상황 요약
2. 논의 사항: 주요 논의 내용과 결과
3. 결정사항 및 할 일: 확정된 내용 및 후속 조치

대화 내용:
{context}"
    )
}

/// Summarize one channel's transcript. The model's text is returned as is.
pub fn summarize(model: &dyn SummaryModel, transcript: &Transcript, max_messages: usize) -> Result<String> {
    let context = render_transcript(transcript, max_messages);
    if context.trim().is_empty() {
        return Ok(NO_CONVERSATION_SUMMARY.to_string());
    }

    let turns = [
        ChatTurn::system(SYSTEM_PROMPT),
        ChatTurn::user(build_prompt(&context)),
    ];
    model.complete(&turns).context("summarization model call failed")
}

#[cfg(test)]
mod tests {
    use super::{NO_CONVERSATION_SUMMARY, render_transcript, summarize};
    use crate::digest::testing::{FakeModel, msg, reply, root};
    use crate::llm::provider::Role;

    #[test]
    fn empty_transcript_short_circuits_without_model_call() {
        let model = FakeModel::default();
        let got = summarize(&model, &Vec::new(), 100).expect("summarize");
        assert_eq!(got, NO_CONVERSATION_SUMMARY);
        assert!(model.calls.borrow().is_empty());
    }

    #[test]
    fn blank_only_transcript_also_short_circuits() {
        let model = FakeModel::default();
        let transcript = vec![msg("Kim", "   ", "1.0"), msg("Lee", "", "2.0")];
        let got = summarize(&model, &transcript, 100).expect("summarize");
        assert_eq!(got, NO_CONVERSATION_SUMMARY);
        assert!(model.calls.borrow().is_empty());
    }

    #[test]
    fn replies_are_rendered_indented_under_roots() {
        let transcript = vec![
            root("Kim", "배포 일정 공유", "200.0", 1),
            reply("Lee", "확인함", "201.0", "200.0"),
            msg("Park", "", "150.0"),
        ];
        let rendered = render_transcript(&transcript, 100);
        assert_eq!(
            rendered,
            "\n[Kim]: 배포 일정 공유\n  - [댓글][Lee]: 확인함\n"
        );
    }

    #[test]
    fn messages_beyond_cap_are_dropped() {
        let transcript: Vec<_> = (0..5)
            .map(|i| msg("Kim", &format!("line {i}"), &format!("{i}.0")))
            .collect();
        let rendered = render_transcript(&transcript, 3);
        assert!(rendered.contains("line 2"));
        assert!(!rendered.contains("line 3"));
    }

    #[test]
    fn model_receives_system_and_user_turns_with_template() {
        let model = FakeModel::default();
        let transcript = vec![msg("Kim", "회의록 올림", "1.0")];

        let got = summarize(&model, &transcript, 100).expect("summarize");

        assert_eq!(got, "summary #1");
        let calls = model.calls.borrow();
        let turns = &calls[0];
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::System);
        assert_eq!(turns[1].role, Role::User);
        assert!(turns[1].content.contains("1. 주요 흐름"));
        assert!(turns[1].content.contains("3. 결정사항 및 할 일"));
        assert!(turns[1].content.contains("[Kim]: 회의록 올림"));
    }

    #[test]
    fn model_failure_is_propagated() {
        let model = FakeModel::failing();
        let err = summarize(&model, &vec![msg("Kim", "x", "1.0")], 100).expect_err("should fail");
        assert!(format!("{err:#}").contains("model unavailable"));
    }
}
