use clap::Parser;
use std::{net::IpAddr, path::PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about = "Learnly course marketplace API", long_about = None)]
pub struct Config {
    /// Path to the JSON store, created if missing
    #[arg(long = "db", env = "LEARNLY_DB", default_value = "learnly.json")]
    pub db_path: PathBuf,

    /// Address to listen on
    #[arg(long, env = "LEARNLY_ADDRESS", default_value = "127.0.0.1")]
    pub address: IpAddr,

    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Fill a freshly created store with demo accounts, a course and the FAQ
    #[arg(long)]
    pub seed: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}
