//! Command dispatch: routes each CLI subcommand to its handler.

pub mod control;
pub mod devices;
pub mod serve;

use std::sync::Arc;

use kasa_config::Config;

use crate::app::AppContext;
use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a device command.
pub async fn dispatch(
    cmd: Command,
    cfg: &Config,
    ctx: Arc<AppContext>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Serve(args) => serve::handle(args, cfg, ctx, global).await,
        Command::Discover(args) => devices::discover(args, cfg, &ctx, global).await,
        Command::Add(args) => devices::add(args, cfg, &ctx, global).await,
        Command::Remove(args) => devices::remove(args, &ctx, global).await,
        Command::List(args) => devices::list(&args, &ctx, global).await,
        Command::Get(args) => devices::get(args, &ctx, global).await,
        Command::Stats => devices::stats(&ctx, global).await,
        Command::Power(args) => control::power(args, &ctx, global).await,
        Command::Brightness(args) => control::brightness(args, &ctx, global).await,
        Command::Color(args) => control::color(args, &ctx, global).await,
        Command::ColorTemp(args) => control::color_temp(args, &ctx, global).await,
        // Completions are handled before dispatch
        Command::Completions(_) => unreachable!(),
    }
}
