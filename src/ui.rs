//! Interface de terminal do cliente de polling: spinner e saída colorida.
//!
//! Usa `indicatif` para o spinner e `console` para as cores.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::poller::{PollOutcome, ProgressReporter};
use crate::server::JobStatusResponse;
use crate::state_machine::JobStatus;

/// Indicador visual de progresso de um job durante o polling.
///
/// Cada status distinto é impresso acima do spinner; o resultado final
/// sai em verde (sucesso) ou vermelho (falha).
pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    pub fn start(job_id: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Polling job {job_id}"));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e exibe o resultado final do job.
    pub fn complete(&self, outcome: &PollOutcome) {
        self.pb.finish_and_clear();
        match outcome {
            PollOutcome::Success { final_track_url } => {
                println!("  {} Job completed successfully", self.green.apply_to("✓"));
                match final_track_url {
                    Some(url) => println!("Final Track Location: {url}"),
                    None => println!("No output URL provided in the result."),
                }
            }
            PollOutcome::Failure { stage, message } => {
                let stage = stage.as_deref().unwrap_or("unknown stage");
                eprintln!(
                    "  {} Job failed at {stage}: {message}",
                    self.red.apply_to("✗")
                );
            }
        }
    }

    /// Encerra o spinner quando o polling foi interrompido.
    pub fn abandon(&self, reason: &str) {
        self.pb.finish_and_clear();
        eprintln!("  {} {reason}", self.red.apply_to("✗"));
    }
}

impl ProgressReporter for JobProgress {
    fn status_changed(&self, snapshot: &JobStatusResponse) {
        let line = match &snapshot.current_step {
            Some(step) => format!("{} ({step})", snapshot.status),
            None => snapshot.status.to_string(),
        };
        let style = match snapshot.status {
            JobStatus::Success => &self.green,
            JobStatus::Failure => &self.red,
            _ => &self.yellow,
        };
        self.pb
            .println(format!("Job status changed to: {}", style.apply_to(&line)));
        self.pb.set_message(line);
    }
}

/// Print a single snapshot as pretty JSON.
pub fn print_snapshot(snapshot: &JobStatusResponse) {
    let style = match snapshot.status {
        JobStatus::Success => Style::new().green(),
        JobStatus::Failure => Style::new().red(),
        _ => Style::new().yellow(),
    };
    println!("{}", style.apply_to(format!("─── Job {} ───", snapshot.job_id)));
    println!(
        "{}",
        serde_json::to_string_pretty(snapshot).unwrap_or_default()
    );
}
