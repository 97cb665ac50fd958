//! Up-front clarifying questions asked before a task starts.

use crate::intervention::Prompter;
use browse_proto::LanguageModel;
use tracing::debug;

const MAX_QUESTIONS: usize = 3;

/// Builds the prompt asking the model for clarifying questions.
pub fn build_questions_prompt(task: &str, context: &str) -> String {
    let context = if context.is_empty() {
        "(first task in session)"
    } else {
        context
    };
    format!(
        "Given this browser task, generate 0-3 brief clarifying questions that would help \
         complete it accurately. If the task is clear enough, return NONE.\n\n\
         Format: one question per line, numbered. Or just NONE.\n\n\
         Task: {task}\n\
         Context: {context}"
    )
}

/// Extracts up to three questions from a model reply. `NONE` anywhere means
/// the task is clear.
pub fn parse_questions(reply: &str) -> Vec<String> {
    if reply.trim().is_empty() || reply.to_uppercase().contains("NONE") {
        return Vec::new();
    }
    reply
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(MAX_QUESTIONS)
        .map(str::to_string)
        .collect()
}

/// Appends answered questions to the task text.
pub fn append_answers(task: &str, answers: &[(String, String)]) -> String {
    if answers.is_empty() {
        return task.to_string();
    }
    let lines: Vec<String> = answers
        .iter()
        .map(|(q, a)| format!("Q: {q} A: {a}"))
        .collect();
    format!("{task}\n\nAdditional context:\n{}", lines.join("\n"))
}

/// Asks the model for clarifying questions and collects the user's answers.
///
/// Returns the task unchanged when the model is unavailable, fails, or finds
/// the task clear. Answers of `skip` are left out.
pub async fn ask_clarifying_questions(
    model: &dyn LanguageModel,
    prompter: &dyn Prompter,
    task: &str,
    context: &str,
) -> String {
    let reply = match model.complete(&build_questions_prompt(task, context)).await {
        Ok(reply) => reply,
        Err(e) => {
            debug!(error = %e, "Clarifying questions unavailable, starting task as given");
            return task.to_string();
        }
    };

    let questions = parse_questions(&reply);
    if questions.is_empty() {
        debug!("Task is clear, no clarifying questions");
        return task.to_string();
    }

    prompter.say("");
    prompter.say("A few quick questions before we start:");
    prompter.say("");

    let mut answers = Vec::new();
    for question in questions {
        prompter.say(&format!("  {question}"));
        let answer = prompter.ask("  Answer", Some("skip")).await;
        let answer = answer.trim();
        if !answer.is_empty() && !answer.eq_ignore_ascii_case("skip") {
            answers.push((question, answer.to_string()));
        }
    }

    append_answers(task, &answers)
}
