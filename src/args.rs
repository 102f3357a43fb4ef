use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::Parser;

use crate::model::MODEL_FILE;

#[derive(Parser, Debug)]
pub struct Args {
    /// Whether clients connect over https.
    /// If so, the sessionid cookie is sent as a secure cookie.
    #[arg(short, long)]
    secure: bool,

    /// The address to listen on. By default only the
    /// IPv4 loopback is used.
    #[arg(short, long)]
    address: Option<String>,

    /// The port to listen on.
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Directory holding the database (heart.db).
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// The pre-trained model artifact.
    #[arg(short, long, default_value = MODEL_FILE)]
    model: PathBuf,
}

impl Args {
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.address
            .as_deref()
            .unwrap_or("127.0.0.1")
            .parse()
            .map(|addr: IpAddr| (addr, self.port).into())
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn model(&self) -> &Path {
        &self.model
    }
}
