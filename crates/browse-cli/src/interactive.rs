//! Interactive session: read a task, confirm it, run it, show results, and
//! offer the completion menu until the user exits.

use crate::Setup;
use anyhow::Result;
use browse_core::{
    ControlState, Prompter, RunOutcome, RunRequest, Session, TaskRunner,
    ask_clarifying_questions,
};
use browse_tui::{
    CompletionMenu, ConsoleReporter, InputListener, NextAction, Output, ResultFormatter,
    TerminalLock, TerminalPrompter, WaitingModel, error_lines, render_session_summary,
    terminal_lock,
};
use colored::Colorize;
use std::io::IsTerminal;
use tracing::{info, warn};

/// How the completion menu was left.
enum MenuExit {
    NewTask,
    Refine,
    Exit,
}

/// Runs the interactive loop until the user exits or input ends.
pub async fn run(setup: &Setup, verbose: bool) -> Result<()> {
    let terminal = terminal_lock();
    let mut cli = InteractiveCli {
        setup,
        control: ControlState::default(),
        prompter: TerminalPrompter::new(terminal.clone()),
        terminal,
        session: Session::new(verbose),
    };
    cli.run_loop().await
}

struct InteractiveCli<'a> {
    setup: &'a Setup,
    control: ControlState,
    prompter: TerminalPrompter,
    terminal: TerminalLock,
    session: Session,
}

impl InteractiveCli<'_> {
    fn say(&self, line: &str) {
        Output::Stdout.line(line);
    }

    async fn run_loop(&mut self) -> Result<()> {
        self.say("Browse - AI browser automation");
        self.say("");

        if !self.session.verbose() {
            let verbose = self
                .prompter
                .confirm("Verbose mode? (shows detailed agent actions)", false)
                .await;
            self.session.set_verbose(verbose);
        }
        self.control.set_verbose(self.session.verbose());
        self.control
            .set_vision_enabled(self.setup.config.run.use_vision);

        let mut refine_task: Option<String> = None;
        loop {
            let task = match refine_task.take() {
                Some(previous) => Some(self.refine(previous).await),
                None => self.read_task().await,
            };
            let Some(task) = task else {
                self.say("Goodbye!");
                return Ok(());
            };

            let Some(task) = self.confirm_task(task).await else {
                continue;
            };

            let context = self.session.build_context_prompt();
            let clarifier = WaitingModel::new(&self.setup.model, "Thinking...");
            let task = ask_clarifying_questions(&clarifier, &self.prompter, &task, &context).await;

            let outcome = self.run_task(&task, context).await;
            self.session.set_verbose(self.control.verbose());
            self.session.add_record(outcome.to_record(&task));
            self.show_results(&outcome);

            match self.completion_menu(outcome.success()).await {
                MenuExit::NewTask => {}
                MenuExit::Refine => refine_task = Some(task),
                MenuExit::Exit => {
                    self.say("");
                    self.say("Goodbye!");
                    return Ok(());
                }
            }
        }
    }

    /// Reads the next task. `None` on blank input or end of input.
    async fn read_task(&self) -> Option<String> {
        self.prompter
            .read_answer("What would you like to do?\n> ")
            .await
            .filter(|task| !task.is_empty())
    }

    /// Echoes the task back and asks for confirmation. A rejected task can be
    /// replaced; a blank replacement abandons it.
    async fn confirm_task(&self, mut task: String) -> Option<String> {
        loop {
            self.say("");
            if let Some(last) = self.session.last_reference() {
                self.say(&format!(
                    "(Following on from {} prior task(s); last: {last})",
                    self.session.records().len()
                ));
            }
            self.say(&format!("I'll {}", task.to_lowercase()));
            self.say("");

            if self.prompter.confirm("Is this correct?", true).await {
                return Some(task);
            }

            let replacement = self
                .prompter
                .ask("What would you like to do instead?", None)
                .await;
            let replacement = replacement.trim();
            if replacement.is_empty() {
                return None;
            }
            task = replacement.to_string();
        }
    }

    async fn refine(&self, previous: String) -> String {
        self.say("");
        self.say(&format!("Previous task: {previous}"));
        let refinement = self
            .prompter
            .ask("How would you like to refine this?", Some(""))
            .await;
        refined_task(previous, &refinement)
    }

    async fn run_task(&self, task: &str, context: String) -> RunOutcome {
        let setup = self.setup;
        let mut engine = setup.engine();
        let runner = TaskRunner::new(&setup.config.run, self.control.clone(), &self.prompter)
            .with_model(&setup.model)
            .with_deployment(setup.deployment.clone());

        // Shortcuts need a real terminal; piped input is left to the prompts
        let listener = std::io::stdin()
            .is_terminal()
            .then(|| InputListener::spawn(self.control.clone(), self.terminal.clone()));

        let mut reporter = ConsoleReporter::new(Output::Stdout);
        let outcome = runner
            .run(&mut engine, &RunRequest::new(task, context), &mut reporter)
            .await;

        if let Some(listener) = listener {
            listener.shutdown().await;
        }
        info!(
            steps = outcome.steps,
            success = outcome.success(),
            "Task finished"
        );
        outcome
    }

    fn show_results(&self, outcome: &RunOutcome) {
        for line in ResultFormatter::new(self.session.verbose()).render(outcome) {
            self.say(&line);
        }
    }

    /// Shows the menu until the user picks something other than export.
    async fn completion_menu(&self, success: bool) -> MenuExit {
        let menu = CompletionMenu::for_outcome(success);
        loop {
            for line in menu.lines() {
                self.say(&line);
            }
            let answer = self.prompter.ask("Choose", Some(menu.default_choice())).await;
            match menu.parse(&answer) {
                NextAction::Export => self.export(),
                NextAction::NewTask => return MenuExit::NewTask,
                NextAction::Refine => return MenuExit::Refine,
                NextAction::Exit => return MenuExit::Exit,
            }
        }
    }

    fn export(&self) {
        self.say("");
        self.say(&render_session_summary(&self.session.export_summary()));

        match self.session.save_to_dir(&self.setup.config.session.export_dir) {
            Ok(path) => {
                let notice = format!("Session summary exported to: {}", path.display());
                self.say(&notice.green().to_string());
            }
            Err(e) => {
                warn!(error = %e, "Session export failed");
                for line in error_lines(&format!("Could not save the session summary: {e}")) {
                    self.say(&line);
                }
            }
        }
    }
}

/// Builds the refined task text. A blank refinement reruns the task as is.
fn refined_task(previous: String, refinement: &str) -> String {
    let refinement = refinement.trim();
    if refinement.is_empty() {
        previous
    } else {
        format!("{previous} - refined: {refinement}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refinement_is_appended() {
        assert_eq!(
            refined_task("find laptops".to_string(), " under £500 "),
            "find laptops - refined: under £500"
        );
    }

    #[test]
    fn test_blank_refinement_keeps_task() {
        assert_eq!(refined_task("find laptops".to_string(), "  "), "find laptops");
    }
}
