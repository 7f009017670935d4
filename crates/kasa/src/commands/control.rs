//! Device control handlers.

use crate::app::AppContext;
use crate::cli::{BrightnessArgs, ColorArgs, ColorTempArgs, GlobalOpts, PowerAction, PowerArgs};
use crate::error::CliError;

use super::devices::print_record;

pub async fn power(args: PowerArgs, ctx: &AppContext, global: &GlobalOpts) -> Result<(), CliError> {
    let record = match args.action {
        PowerAction::On => ctx.set_power(&args.id, true).await?,
        PowerAction::Off => ctx.set_power(&args.id, false).await?,
        PowerAction::Toggle => ctx.toggle_power(&args.id).await?,
    };
    print_record(&record, global)
}

pub async fn brightness(
    args: BrightnessArgs,
    ctx: &AppContext,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let record = ctx.set_brightness(&args.id, args.brightness).await?;
    print_record(&record, global)
}

pub async fn color(args: ColorArgs, ctx: &AppContext, global: &GlobalOpts) -> Result<(), CliError> {
    let record = ctx
        .set_color(&args.id, args.hue, args.saturation, args.value)
        .await?;
    print_record(&record, global)
}

pub async fn color_temp(
    args: ColorTempArgs,
    ctx: &AppContext,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let record = ctx.set_color_temp(&args.id, args.kelvin).await?;
    print_record(&record, global)
}
