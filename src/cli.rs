//! Interface de linha de comando do conductor baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (serve, create, status, watch)
//! e flags globais (--url, --config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Conductor: orquestrador do pipeline prompt → stems → faixa masterizada.
#[derive(Debug, Parser)]
#[command(name = "conductor", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// URL base da API do orquestrador. Sobrescreve ORCHESTRATOR_URL e o arquivo de config.
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Caminho para um arquivo de configuração TOML (padrão: ./conductor.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sobe a API HTTP e o pool de workers.
    Serve,

    /// Envia um pedido de faixa e acompanha até o fim.
    Create {
        /// Descrição livre da faixa desejada.
        #[arg(long)]
        prompt: String,

        /// URL of a reference track to borrow style from.
        #[arg(long)]
        reference: Option<String>,
    },

    /// Mostra o status atual de um job uma única vez.
    Status {
        job_id: String,
    },

    /// Consulta um job existente até ele terminar.
    Watch {
        job_id: String,
    },
}
