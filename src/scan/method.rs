mod echo;
mod ping;
mod tcp;

pub use echo::EchoScan;
pub use ping::PingScan;
pub use tcp::TcpScan;
