//! Device membership and query handlers.

use std::net::SocketAddr;

use tabled::Tabled;

use kasa_config::Config;
use kasa_core::{DeviceCounts, DeviceRecord, parse_address};

use crate::app::AppContext;
use crate::cli::{AddArgs, DeviceIdArg, DiscoverArgs, GlobalOpts, ListArgs};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Address")]
    addr: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Brightness")]
    brightness: String,
}

fn row(r: &DeviceRecord, color: bool) -> DeviceRow {
    DeviceRow {
        id: r.device_id.clone(),
        name: r.name.clone(),
        kind: r.kind.to_string(),
        model: r.model.clone(),
        addr: r.addr().to_string(),
        status: output::status(r.is_online, color),
        power: if r.is_on { "on" } else { "off" }.into(),
        brightness: if r.kind.supports_light() {
            format!("{}%", r.brightness)
        } else {
            "-".into()
        },
    }
}

fn detail(r: &DeviceRecord, color: bool) -> String {
    let mut lines = vec![
        format!("ID:         {}", r.device_id),
        format!("Name:       {}", r.name),
        format!("Kind:       {}", r.kind),
        format!("Model:      {}", r.model),
        format!("MAC:        {}", r.mac),
        format!("Address:    {}", r.addr()),
        format!("Status:     {}", output::status(r.is_online, color)),
        format!("Power:      {}", if r.is_on { "on" } else { "off" }),
    ];
    if r.kind.supports_light() {
        lines.push(format!("Brightness: {}%", r.brightness));
        lines.push(format!("Color temp: {}K", r.color_temp));
        lines.push(format!("Hue:        {}", r.hue));
        lines.push(format!("Saturation: {}%", r.saturation));
    }
    lines.push(format!(
        "Last seen:  {}",
        r.last_seen
            .map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
    ));
    lines.join("\n")
}

pub(super) fn print_record(record: &DeviceRecord, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        record,
        |r| detail(r, color),
        |r| r.device_id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub(super) fn print_records(records: &[DeviceRecord], global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        records,
        |r| row(r, color),
        |r| r.device_id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn discover(
    args: DiscoverArgs,
    cfg: &Config,
    ctx: &AppContext,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let candidates: Vec<SocketAddr> = if args.addresses.is_empty() {
        cfg.candidates()?
    } else {
        args.addresses
            .iter()
            .map(|a| parse_address(a, cfg.discovery.port))
            .collect::<Result<_, _>>()?
    };

    let outcomes = ctx.discover_all(&candidates).await?;
    let found: Vec<DeviceRecord> = outcomes
        .iter()
        .filter_map(|o| o.record().cloned())
        .collect();
    tracing::info!(probed = outcomes.len(), found = found.len(), "discovery finished");
    print_records(&found, global)
}

pub async fn add(
    args: AddArgs,
    cfg: &Config,
    ctx: &AppContext,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let addr = parse_address(&args.address, cfg.discovery.port)?;
    let record = ctx.add_device(addr).await?;
    print_record(&record, global)
}

pub async fn remove(
    args: DeviceIdArg,
    ctx: &AppContext,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let record = ctx.remove_device(&args.id).await?;
    print_record(&record, global)
}

pub async fn list(args: &ListArgs, ctx: &AppContext, global: &GlobalOpts) -> Result<(), CliError> {
    let filter = match (args.online, args.offline) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    print_records(&ctx.list(filter).await?, global)
}

pub async fn get(args: DeviceIdArg, ctx: &AppContext, global: &GlobalOpts) -> Result<(), CliError> {
    let record = ctx.get(&args.id).await?;
    print_record(&record, global)
}

pub async fn stats(ctx: &AppContext, global: &GlobalOpts) -> Result<(), CliError> {
    let counts = ctx.counts().await?;
    let out = output::render_single(
        global.output,
        &counts,
        |c: &DeviceCounts| {
            format!(
                "Total:   {}\nOnline:  {}\nOffline: {}",
                c.total, c.online, c.offline
            )
        },
        |c| c.total.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
