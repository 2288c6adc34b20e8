use clap::Parser;
use tracing::{error, info};

use wlboot::{
    config::{BackendKind, ShellPreference, WindowConfig},
    wayland::session::Session,
    Error,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Presentation backend, `egl` or `shm` (default taken from WLBOOT_BACKEND)
    #[arg(short, long)]
    backend: Option<BackendKind>,
    /// Shell protocol, `auto`, `xdg` or `wl-shell`
    #[arg(short, long)]
    shell: Option<ShellPreference>,
    /// Window title
    #[arg(short, long)]
    title: Option<String>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
}

impl Cli {
    fn into_config(self) -> WindowConfig {
        let mut config = WindowConfig::from_env();
        if let Some(backend) = self.backend {
            config = config.with_backend(backend);
        }
        if let Some(shell) = self.shell {
            config = config.with_shell(shell);
        }
        if let Some(title) = self.title {
            config = config.with_title(title);
        }
        let width = self.width.filter(|w| *w > 0).unwrap_or(config.size.w);
        let height = self.height.filter(|h| *h > 0).unwrap_or(config.size.h);
        config.with_size((width, height))
    }
}

fn run(config: WindowConfig) -> Result<(), Error> {
    let (mut session, mut queue) = Session::connect(config)?;
    session.run(&mut queue)
}

fn main() {
    let args = Cli::parse();
    wlboot::init_logging();

    let config = args.into_config();
    info!(
        "Starting {}x{} window {:?} on the {} backend",
        config.size.w, config.size.h, config.title, config.backend
    );

    if let Err(err) = run(config) {
        error!("{}", err);
        std::process::exit(1);
    }
}
