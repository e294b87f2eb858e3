use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::LevelFilter;

/// Configurazione da linea di comando
#[derive(Parser, Debug)]
#[command(name = "sftpserver", author, version, about, long_about = None)]
pub struct Args {
    /// Indirizzo su cui ascoltare
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Porta su cui ascoltare
    #[arg(short, long, default_value = "3373")]
    pub port: u16,

    /// Livello di log: WARNING, INFO, DEBUG
    #[arg(short, long, value_enum, ignore_case = true, default_value = "INFO")]
    pub level: LogLevel,

    /// Chiave privata dell'host, per esempio /tmp/test_rsa.key
    #[arg(short, long, value_name = "FILE")]
    pub keyfile: PathBuf,

    /// Directory radice servita dal backend locale
    #[arg(long, default_value = ".")]
    pub root_dir: PathBuf,

    /// Dimensione massima del buffer per il download (in bytes)
    #[arg(long, default_value = "32768")]
    pub max_read_size: u32,

    /// Username per autenticazione password (senza, ogni client viene accettato)
    #[arg(long, requires = "password")]
    pub username: Option<String>,

    /// Password per autenticazione password
    #[arg(long, requires = "username")]
    pub password: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "INFO")]
    Info,
    #[value(name = "DEBUG")]
    Debug,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}
