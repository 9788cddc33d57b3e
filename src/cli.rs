//! Interface de linha de comando baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, stop, status,
//! projects) e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::job::TransformationType;

/// Orquestrador de jobs remotos de transformação de código.
#[derive(Debug, Parser)]
#[command(name = "transform", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./transform.toml).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Empacota o projeto, submete o job e acompanha até o fim.
    Run {
        /// Diretório raiz do projeto.
        project: PathBuf,

        /// Versão alvo (ex.: JDK_17).
        #[arg(long)]
        target: String,

        /// Versão de origem (ex.: JDK_8).
        #[arg(long, default_value = "JDK_8")]
        source: String,

        /// Converte SQL embutido em vez de atualizar a versão da linguagem.
        #[arg(long, default_value_t = false)]
        sql: bool,

        /// Comando de build customizado enviado no manifesto.
        #[arg(long)]
        build_command: Option<String>,
    },

    /// Solicita a parada de um job remoto.
    Stop {
        job_id: String,
    },

    /// Consulta o status de um job remoto.
    Status {
        job_id: String,
    },

    /// Lista projetos Maven elegíveis sob um diretório.
    Projects {
        #[arg(default_value = ".")]
        root: PathBuf,
    },
}

/// Tipo de transformação selecionado pela flag `--sql`.
pub fn transformation_type(sql: bool) -> TransformationType {
    if sql {
        TransformationType::SqlConversion
    } else {
        TransformationType::LanguageUpgrade
    }
}
