//! `ragchat ask`: answer a single question from the terminal.

use futures::StreamExt;
use ragchat_chat::{ChatChunk, ChatOutput, ChatResponse, RequestContext, ThoughtStep};
use ragchat_config::{AppConfig, ApproachKind, ChatOverrides};
use ragchat_core::message::HistoryTurn;
use std::io::Write;

pub struct AskOptions {
    pub stream: bool,
    pub show_thoughts: bool,
    /// Replaces `approach` from the config
    pub approach: Option<ApproachKind>,
    pub overrides: ChatOverrides,
}

pub async fn run(question: String, options: AskOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(approach) = options.approach {
        config.approach = approach;
    }

    if !config.has_api_key() {
        eprintln!("No API key configured. Set RAGCHAT_API_KEY or run `ragchat init`.");
        return Err("missing API key".into());
    }

    let service = ragchat_gateway::build_service(&config).await?;
    tracing::debug!(approach = service.approach_name(), "Service ready");
    let context = RequestContext {
        overrides: options.overrides,
        ..Default::default()
    };
    let history = [HistoryTurn::user(question)];

    match service
        .run(&history, options.stream, serde_json::Value::Null, &context)
        .await?
    {
        ChatOutput::Response(response) => print_response(&response, options.show_thoughts),
        ChatOutput::Stream(mut stream) => {
            let mut stdout = std::io::stdout();
            let mut thoughts = Vec::new();
            let mut followups = Vec::new();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                collect_metadata(&chunk, &mut thoughts, &mut followups);
                if chunk.is_model_delta() {
                    if let Some(text) = chunk.content() {
                        print!("{text}");
                        stdout.flush()?;
                    }
                }
            }
            println!();

            print_followups(&followups);
            if options.show_thoughts {
                print_thoughts(&thoughts);
            }
        }
    }

    Ok(())
}

/// Pick thoughts and follow-up questions out of non-delta chunks.
fn collect_metadata(chunk: &ChatChunk, thoughts: &mut Vec<ThoughtStep>, followups: &mut Vec<String>) {
    if let Some(questions) = chunk.followup_questions() {
        followups.extend(questions.iter().cloned());
    }
    let steps = chunk
        .choices
        .first()
        .and_then(|c| c.context.as_ref())
        .and_then(|ctx| ctx.thoughts.as_ref());
    if let Some(steps) = steps {
        thoughts.extend(steps.iter().cloned());
    }
}

fn print_response(response: &ChatResponse, show_thoughts: bool) {
    println!("{}", response.content().unwrap_or_default());

    let context = response.choices.first().map(|c| &c.context);
    if let Some(questions) = context.and_then(|c| c.followup_questions.as_ref()) {
        print_followups(questions);
    }
    if show_thoughts {
        if let Some(steps) = context.and_then(|c| c.thoughts.as_ref()) {
            print_thoughts(steps);
        }
    }
}

fn print_followups(questions: &[String]) {
    if questions.is_empty() {
        return;
    }
    println!("\nFollow-up questions:");
    for q in questions {
        println!("   - {q}");
    }
}

fn print_thoughts(steps: &[ThoughtStep]) {
    println!("\nThoughts:");
    for step in steps {
        println!("   {}", step.title);
        let description = match &step.description {
            serde_json::Value::String(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        };
        println!("      {description}");
    }
}
