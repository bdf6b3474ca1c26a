//! Keymux CLI - run ssh through the right identity's agent.

use std::env;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use keymux::cli::Cli;
use keymux::config::Config;
use keymux::{EXIT_INTERRUPTED, Result, agent, exec, identity, keys, loader};

fn main() {
    // Diagnostics go to stderr only; stdout belongs to the delegated ssh.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("KEYMUX_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    // A Ctrl-C during a passphrase prompt or agent startup aborts the whole
    // invocation; already-spawned agents and already-loaded keys stay, by
    // design, as accepted side effects.
    if let Err(e) = ctrlc::set_handler(|| {
        eprintln!("\nkeymux: interrupted");
        process::exit(EXIT_INTERRUPTED);
    }) {
        tracing::debug!("could not install interrupt handler: {e}");
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("keymux: {e}");
        process::exit(e.exit_code());
    }
}

/// Resolve identity, make its agent reachable, load missing keys, and hand
/// off to ssh. Returns only on failure: the delegation step replaces the
/// process on success.
fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let candidates = cli.match_candidates();
    let identity = identity::resolve(
        &candidates,
        &cwd,
        &config.match_argv,
        &config.match_path,
        config.default_identity.as_ref(),
    );
    tracing::info!(identity = %identity, "using identity");

    let records = keys::locate(&identity, &config)?;
    let host = agent::host_label();
    let descriptor = agent::get_or_create(&identity, &config, &host)?;
    loader::load_missing(&records, &descriptor, &identity, &config)?;

    Err(exec::delegate(&config.ssh_binary, &cli.args, &descriptor))
}
