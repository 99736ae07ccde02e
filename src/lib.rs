// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod session;
pub mod transform;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{
    DefaultPathTransformer, PathTransformer, Preprocessor, PreprocessorSettings,
};
use crate::fs::RealFileSystem;
use crate::session::{BuildSession, ConfigHost};
use crate::transform::{CommandTransform, IdentityTransform, Transform};
use crate::watch::path_utils::absolutize;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the transform chain and the preprocessor
/// - the build session (initial compile of every source)
/// - (optional) source + dependency watching
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root = absolutize(&config_root_dir(&config_path));
    let out_dir = args
        .out_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.out_dir());

    if args.dry_run {
        return print_dry_run(&cfg, &root, &out_dir);
    }

    let watch_mode = cfg.auto_watch && !args.once;
    let (refresh_tx, mut refresh_rx) = mpsc::unbounded_channel::<()>();

    let host = Arc::new(ConfigHost::new(&cfg, &root, watch_mode, refresh_tx.clone()));
    let chain: Arc<dyn Transform> = match &cfg.preprocessor.command {
        Some(cmd) => Arc::new(CommandTransform::new(cmd.clone()).with_cwd(&root)),
        None => Arc::new(IdentityTransform),
    };
    let preprocessor = Preprocessor::new(
        PreprocessorSettings::default(),
        cfg.preprocessor_settings(),
        host,
        chain,
    )?;

    let session = BuildSession::new(Arc::new(RealFileSystem), &root, &out_dir, &cfg.files)?;
    let summary = session.build_all(&preprocessor).await?;

    if !watch_mode {
        preprocessor.close();
        if !summary.is_success() {
            bail!("{} file(s) failed to compile", summary.failed.len());
        }
        return Ok(());
    }

    // Keep the source watcher alive for the whole loop.
    let _source_watcher = session.watch_sources(refresh_tx)?;
    info!("watching for changes, press Ctrl-C to stop");

    loop {
        tokio::select! {
            Some(()) = refresh_rx.recv() => {
                // Collapse bursts of events into one rebuild.
                while refresh_rx.try_recv().is_ok() {}
                if let Err(err) = session.build_all(&preprocessor).await {
                    warn!(error = %err, "rebuild failed");
                }
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                }
                info!("shutdown requested");
                break;
            }
        }
    }

    preprocessor.close();
    Ok(())
}

/// Figure out a sensible project root.
///
/// - If the config path has a non-empty parent (e.g. "site/Stylewatch.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Stylewatch.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: print settings, then each matched source with the
/// file it would be written to.
fn print_dry_run(cfg: &ConfigFile, root: &Path, out_dir: &Path) -> Result<()> {
    println!("stylewatch dry-run");
    println!("  root = {}", root.display());
    println!("  out_dir = {}", out_dir.display());
    println!("  auto_watch = {}", cfg.auto_watch);
    match &cfg.preprocessor.command {
        Some(cmd) => println!("  command = {cmd}"),
        None => println!("  command = (identity)"),
    }
    if let Some(rule) = &cfg.preprocessor.transform_path {
        println!(
            "  transform_path = {:?} -> {:?}",
            rule.pattern, rule.replacement
        );
    }
    println!();

    println!("files ({}):", cfg.files.len());
    for entry in &cfg.files {
        if entry.watched {
            println!("  - {}", entry.pattern);
        } else {
            println!("  - {} (not watched)", entry.pattern);
        }
    }
    println!();

    let session = BuildSession::new(Arc::new(RealFileSystem), root, out_dir, &cfg.files)?;
    let transform_path: Arc<dyn PathTransformer> = cfg
        .preprocessor_settings()
        .transform_path
        .unwrap_or_else(|| Arc::new(DefaultPathTransformer));
    let sources = session.sources()?;
    println!("sources ({}):", sources.len());
    for source in &sources {
        let dest = session.destination(&transform_path.transform(source));
        println!("  - {} -> {}", source.display(), dest.display());
    }

    debug!("dry-run complete (no compilation)");
    Ok(())
}
