use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

use usbmfa::{Base32Secret, DeviceId, Token};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let id = device_id(&matches)?;

    match matches.subcommand() {
        Some(("get-time", _)) => {
            let mut token = Token::connect(id)?;
            let device = token.read_clock()?;
            println!("{}", device.format("%Y-%m-%dT%H:%M:%S"));
        }
        Some(("set-time", _)) => {
            let mut token = Token::connect(id)?;
            let written = token.set_clock_to_host_time()?;
            println!("Device time set to current time");

            let device = token.read_clock()?;
            println!("Host time:   {}", written.format("%Y-%m-%dT%H:%M:%S%.6f"));
            println!("Device time: {}", device.format("%Y-%m-%dT%H:%M:%S"));
        }
        Some(("compare", _)) => {
            let mut token = Token::connect(id)?;
            let cmp = token.compare_host_time()?;
            println!("{}", cmp.device.format("%Y-%m-%dT%H:%M:%S"));
            println!("{}", cmp.host.format("%Y-%m-%dT%H:%M:%S%.6f"));
            println!("{}", cmp.drift_seconds);
        }
        Some(("set-secret", sub)) => {
            let text = sub
                .get_one::<String>("SECRET")
                .expect("SECRET is a required argument");
            // Validation happens here, before the device is even opened.
            let secret = Base32Secret::parse(text).context("invalid secret")?;

            let mut token = Token::connect(id)?;
            token.set_secret(&secret)?;
            println!("Secret provisioned ({} bytes)", secret.len());
        }
        _ => unreachable!("subcommand is required"),
    }

    Ok(())
}

fn cli() -> Command {
    Command::new("usbmfa")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Control a USB TOTP hardware token: clock and secret provisioning")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("vendor-id")
                .long("vendor-id")
                .value_name("HEX")
                .global(true)
                .help("Override the USB vendor id (default 4242)"),
        )
        .arg(
            Arg::new("product-id")
                .long("product-id")
                .value_name("HEX")
                .global(true)
                .help("Override the USB product id (default e131)"),
        )
        .subcommand(Command::new("get-time").about("Print the device clock (UTC)"))
        .subcommand(
            Command::new("set-time")
                .about("Set the device clock to host UTC time, then read it back"),
        )
        .subcommand(
            Command::new("compare")
                .about("Print device time, host time, and the drift in seconds"),
        )
        .subcommand(
            Command::new("set-secret")
                .about("Provision a TOTP shared secret onto the device")
                .arg(
                    Arg::new("SECRET")
                        .help("base32 secret; case-insensitive, spaces ignored, max 40 decoded bytes")
                        .required(true),
                ),
        )
}

fn device_id(matches: &ArgMatches) -> Result<DeviceId> {
    let mut id = DeviceId::default();

    if let Some(s) = matches.get_one::<String>("vendor-id") {
        id.vendor_id = parse_hex_u16(s).with_context(|| format!("invalid vendor id '{s}'"))?;
    }
    if let Some(s) = matches.get_one::<String>("product-id") {
        id.product_id = parse_hex_u16(s).with_context(|| format!("invalid product id '{s}'"))?;
    }

    Ok(id)
}

fn parse_hex_u16(s: &str) -> Result<u16> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).context("expected a 16-bit hex value like 4242 or 0xe131")
}
