use std::path::PathBuf;

/// CLI surface, matching the source's `argparse` flags exactly — no
/// configuration file (see `spec.md` §6).
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "mc8-server", about = "A protocol-8 (Beta-era) Minecraft game server")]
pub struct ServerConfig {
    /// The port for the server to listen on.
    #[arg(long, default_value_t = 25565)]
    pub port: u16,

    /// The directory name of the main world.
    #[arg(long = "world-directory", default_value = "World1")]
    pub world_directory: PathBuf,
}
