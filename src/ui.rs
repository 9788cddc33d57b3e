//! Interface de terminal: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`JobProgress`] traduz os [`JobEvent`]s do
//! orquestrador em saída de terminal e coleta a escolha de versão do usuário.

use std::time::Duration;

use console::{Style, Term};
use indicatif::{ProgressBar, ProgressStyle};

use crate::events::JobEvent;
use crate::hil::VersionCandidates;
use crate::job::{JobOutcome, RunSummary, StepProgress};

/// Pedido de escolha de versão pendente, extraído de
/// [`JobEvent::DependencyChoiceRequested`].
#[derive(Debug, Clone)]
pub struct ChoicePrompt {
    pub dependency: String,
    pub current_version: String,
    pub candidates: VersionCandidates,
}

/// Indicador visual de progresso para a execução de um job no terminal.
///
/// Exibe um spinner animado durante o processamento e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e avisos (amarelo).
#[derive(Clone)]
pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl JobProgress {
    /// Inicia o spinner com o nome do projeto e retorna a instância de progresso.
    pub fn start(project: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Packaging {project}"));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    /// Renderiza um evento. Retorna o pedido de escolha quando o job
    /// aguarda uma versão de dependência.
    pub fn handle(&self, event: &JobEvent) -> Option<ChoicePrompt> {
        match event {
            JobEvent::StatusChanged { status } => {
                self.pb.set_message(format!("Job {status}"));
            }
            JobEvent::StepChanged { step, progress } => {
                let mark = match progress {
                    StepProgress::Succeeded => self.green.apply_to("✓"),
                    StepProgress::Failed => self.red.apply_to("✗"),
                    StepProgress::Pending => self.dim.apply_to("·"),
                };
                self.pb.println(format!("  {mark} {step}"));
            }
            JobEvent::JobStarted { job_id } => {
                self.pb.println(format!("  {} job {job_id}", self.dim.apply_to("→")));
            }
            JobEvent::RemoteStatusObserved { status, .. } => {
                self.pb.set_message(format!("Remote status {status}"));
            }
            JobEvent::Heartbeat { .. } => self.pb.tick(),
            JobEvent::DependencyChoiceRequested {
                dependency,
                current_version,
                candidates,
                ..
            } => {
                return Some(ChoicePrompt {
                    dependency: dependency.clone(),
                    current_version: current_version.clone(),
                    candidates: candidates.clone(),
                });
            }
            JobEvent::DependencyChoiceIgnored { version } => {
                self.pb.println(format!(
                    "  {} {version} is not one of the offered versions",
                    self.yellow.apply_to("!")
                ));
            }
            JobEvent::HilOutcome {
                succeeded, detail, ..
            } => {
                let mark = if *succeeded {
                    self.green.apply_to("✓")
                } else {
                    self.yellow.apply_to("↻")
                };
                self.pb.println(format!("  {mark} {detail}"));
            }
            JobEvent::Notification { message, .. } => {
                self.pb.println(format!("  {message}"));
            }
            JobEvent::Finished { outcome } => self.complete(*outcome),
            JobEvent::CleanedUp => {}
        }
        None
    }

    /// Pergunta ao usuário qual versão usar. Bloqueia a thread atual;
    /// rode em `spawn_blocking`. `None` significa manter a versão atual.
    pub fn prompt_choice(&self, prompt: &ChoicePrompt) -> Option<String> {
        let options = prompt.candidates.all();
        self.pb.suspend(|| {
            let term = Term::stdout();
            let _ = term.write_line(&format!(
                "{} {} is pinned to {}. Available versions:",
                self.yellow.apply_to("?"),
                prompt.dependency,
                prompt.current_version
            ));
            for (i, version) in options.iter().enumerate() {
                let _ = term.write_line(&format!("  [{}] {version}", i + 1));
            }
            let _ = term.write_str("Choose a number or type a version (Enter keeps it): ");
            let line = term.read_line().ok()?;
            parse_answer(&line, &options)
        })
    }

    /// Finaliza o spinner e exibe o resultado final do job.
    pub fn complete(&self, outcome: JobOutcome) {
        self.pb.finish_and_clear();
        match outcome {
            JobOutcome::Succeeded => {
                println!("  {} Transformation completed", self.green.apply_to("✓"));
            }
            JobOutcome::PartiallySucceeded => {
                println!(
                    "  {} Transformation partially completed",
                    self.yellow.apply_to("✓")
                );
            }
            JobOutcome::Failed => {
                println!("  {} Transformation failed", self.red.apply_to("✗"));
            }
            JobOutcome::Cancelled => {
                println!("  {} Transformation cancelled", self.yellow.apply_to("■"));
            }
        }
    }
}

/// Interpreta a resposta digitada: um índice da lista (a partir de 1), uma
/// versão literal ou vazio para recusar.
fn parse_answer(line: &str, options: &[String]) -> Option<String> {
    let answer = line.trim();
    match answer.parse::<usize>() {
        Ok(n) if (1..=options.len()).contains(&n) => Some(options[n - 1].clone()),
        _ if answer.is_empty() => None,
        _ => Some(answer.to_string()),
    }
}

/// Imprime o resumo do run formatado em JSON com estilo colorido.
pub fn print_summary(summary: &RunSummary) {
    let style = match summary.outcome {
        JobOutcome::Succeeded => Style::new().green().bold(),
        JobOutcome::Failed => Style::new().red().bold(),
        _ => Style::new().yellow(),
    };
    if let Some(chat) = &summary.chat_message {
        println!();
        println!("{chat}");
    }
    println!();
    println!("{}", style.apply_to("─── Run Summary ───"));
    println!(
        "{}",
        serde_json::to_string_pretty(summary).unwrap_or_default()
    );
}

pub fn print_error(message: &str) {
    eprintln!("  {} {message}", Style::new().red().bold().apply_to("✗"));
}
