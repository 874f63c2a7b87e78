//! ww - command line front end for an anchor namespace
//!
//! # Usage
//!
//! ```bash
//! # List the children of a path
//! ww ls /cluster
//!
//! # Evaluate one expression against the root anchor
//! ww eval '(def x 1) (+ x 41)'
//!
//! # Import and run source files, in order
//! ww run boot.ww jobs.ww
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use itertools::Itertools;
use tracing::{debug, error};
use ww::config::{WwConfig, CONFIG_ENV};
use ww::{logging, rpc, Host};
use ww_lang::anchor::{Context, Path};
use ww_lang::ast::{Expression, ImportExpr};
use ww_lang::runtime::{Environment, Evaluator, Runtime};
use ww_lang::Value;

#[derive(Parser, Debug)]
#[command(name = "ww")]
#[command(version)]
#[command(about = "Evaluate ww programs against an anchor namespace", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE", env = CONFIG_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the children of an anchor path
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Evaluate source text
    Eval { expr: String },
    /// Import and evaluate files in order
    Run {
        #[arg(required = true)]
        files: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = WwConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Err(e) = logging::init(&config.log.filter) {
        eprintln!("warning: logging disabled: {}", e);
    }
    debug!(?config, "configuration loaded");

    let host = Host::new(config).context("starting host")?;
    let config = host.config();
    let ctx = Context::background().with_timeout(config.call_timeout());
    let dialer = host.dialer();

    if let Command::Ls { path } = &cli.command {
        let path = Path::parse(path).with_context(|| format!("invalid path '{}'", path))?;
        let children = rpc::ls(&ctx, &dialer, &config.rpc.protocol, &path).await?;
        if !children.is_empty() {
            println!("{}", children.iter().join("\n"));
        }
        return Ok(());
    }

    let conn = rpc::dial(&ctx, &dialer, &config.rpc.protocol).await?;
    let evaluator = Evaluator::new(conn.root())
        .with_context(ctx.clone())
        .with_import_roots(config.lang.import_paths.clone())
        .with_max_call_depth(config.lang.max_call_depth);
    let runtime = Runtime::new(evaluator, Environment::with_core());

    let outcome = match cli.command {
        Command::Eval { expr } => runtime.eval_str(&expr).await,
        Command::Run { files } => {
            let import = Expression::Import(ImportExpr { locations: files });
            runtime
                .evaluator()
                .eval(&import, runtime.environment())
                .await
        }
        Command::Ls { .. } => Ok(Value::Nil),
    };
    conn.hang_up();

    match outcome {
        Ok(value) => {
            if !value.is_nil() {
                println!("{}", value);
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "evaluation failed");
            Err(e.into())
        }
    }
}
