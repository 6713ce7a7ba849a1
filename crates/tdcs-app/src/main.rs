//! tDCS Bench Simulator
//!
//! Runs the device-side code of the tDCS analog bridge on the host against
//! simulated hardware: an ADS1115 register model on a fake I2C bus, a logging
//! DAC, and a logging BLE stack. A scripted central then walks through one
//! connection and prints every response.
//!
//! # Usage
//!
//! ```bash
//! # Default scenario: ±4.096 V, 64 SPS, inputs 100,-50,0,32767
//! tdcs-bench
//!
//! # Poll the ready bit instead of sleeping the fixed delay
//! tdcs-bench --wait poll --rate-sps 860
//!
//! # NACK conversions on A2
//! tdcs-bench --fail-channel 2 --log-level debug
//! ```

mod sim;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use tdcs_core::protocol::{ControlCommand, ReadResponse, CMD_DISABLE, CMD_ENABLE};
use tdcs_core::types::{AdcConfig, Channel, DataRate, Gain, OutputConfig};
use tdcs_embedded::ble::{ControlSession, GapEvent, GattEvent};
use tdcs_embedded::drivers::ads1115::{Ads1115, ConversionWait, FixedDelay, PollReady};
use tdcs_embedded::{raw_to_voltage, OutputApplier, SharedOutput};

use sim::{SimAds1115, SimDac, SimLink, StdDelay};

const SERVICE_HANDLE: u16 = 40;
const CHAR_HANDLE: u16 = 42;
const CONN_ID: u16 = 0;

/// How the driver waits for a conversion
#[derive(Clone, Copy, Debug, ValueEnum)]
enum WaitStrategy {
    /// Sleep the fixed per-rate delay
    Fixed,
    /// Poll the ready bit, bounded by the fixed delay
    Poll,
}

/// tDCS bench simulator
#[derive(Parser, Debug)]
#[command(name = "tdcs-bench")]
#[command(author, version, about = "tDCS analog bridge bench simulator", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// ADS1115 I2C address (decimal or 0x-prefixed hex)
    #[arg(short, long, default_value = "0x48", value_parser = parse_address)]
    address: u8,

    /// Full-scale range in millivolts (6144, 4096, 2048, 1024, 512, 256)
    #[arg(long, default_value_t = 4096)]
    fsr_mv: u16,

    /// Data rate in samples per second (8, 16, 32, 64, 128, 250, 475, 860)
    #[arg(long, default_value_t = 64)]
    rate_sps: u16,

    /// Conversion wait strategy
    #[arg(long, value_enum, default_value_t = WaitStrategy::Fixed)]
    wait: WaitStrategy,

    /// Output application period in milliseconds
    #[arg(long, default_value_t = OutputConfig::PERIOD_MS)]
    period_ms: u32,

    /// Simulated raw inputs for A0..A3
    #[arg(
        long,
        value_delimiter = ',',
        allow_negative_numbers = true,
        default_value = "100,-50,0,32767"
    )]
    inputs: Vec<i16>,

    /// Channel (0-3) whose conversion reads are NACKed
    #[arg(long)]
    fail_channel: Option<u8>,

    /// Output level written by the scripted central (253 and 254 are commands)
    #[arg(long, default_value_t = 0x10)]
    level: u8,
}

fn parse_address(value: &str) -> Result<u8, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid address {value:?}: {e}"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("tDCS bench v{}", env!("CARGO_PKG_VERSION"));

    let (adc_config, bus) = simulated_device(&cli)?;
    let output_config = OutputConfig {
        period_ms: cli.period_ms,
        ..OutputConfig::default()
    };

    match cli.wait {
        WaitStrategy::Fixed => run(
            Ads1115::new(bus, adc_config, FixedDelay::new(StdDelay)),
            output_config,
            cli.level,
        ),
        WaitStrategy::Poll => run(
            Ads1115::new(bus, adc_config, PollReady::new(StdDelay)),
            output_config,
            cli.level,
        ),
    }
}

/// Build the driver configuration and a simulated ADS1115 strapped to the
/// same address.
fn simulated_device(cli: &Cli) -> anyhow::Result<(AdcConfig, SimAds1115)> {
    let gain = Gain::from_full_scale_mv(cli.fsr_mv)
        .with_context(|| format!("unsupported full-scale range: {} mV", cli.fsr_mv))?;
    let data_rate = DataRate::from_hz(cli.rate_sps)
        .with_context(|| format!("unsupported data rate: {} SPS", cli.rate_sps))?;
    let inputs: [i16; Channel::COUNT] = cli
        .inputs
        .as_slice()
        .try_into()
        .with_context(|| format!("expected {} inputs, got {}", Channel::COUNT, cli.inputs.len()))?;
    let failing = match cli.fail_channel {
        Some(index) => Some(Channel::from_index(index).with_context(|| format!("no channel {index}"))?),
        None => None,
    };

    let config = AdcConfig::new(cli.address, gain, data_rate);
    let bus = SimAds1115::new(cli.address, inputs).fail_channel(failing);
    Ok((config, bus))
}

/// Bring up the device, start the output task and run the scripted central.
fn run<W: ConversionWait>(
    mut adc: Ads1115<SimAds1115, W>,
    output_config: OutputConfig,
    level: u8,
) -> anyhow::Result<()> {
    adc.init().context("ADS1115 initialization failed")?;

    let output = SharedOutput::new();
    let stop = AtomicBool::new(false);

    std::thread::scope(|scope| {
        let mut applier = OutputApplier::with_config(SimDac::default(), &output, output_config);
        let stop = &stop;
        scope.spawn(move || {
            info!("Output task running every {} ms", applier.period_ms());
            while !stop.load(Ordering::Relaxed) {
                if let Err(e) = applier.tick() {
                    error!("Output write failed: {:?}", e);
                }
                std::thread::sleep(Duration::from_millis(u64::from(applier.period_ms())));
            }
        });

        let mut session = ControlSession::new(adc, &output);
        let mut link = SimLink::default();
        let settle = Duration::from_millis(u64::from(output_config.period_ms) + 50);

        central_script(&mut session, &mut link, level, settle);
        stop.store(true, Ordering::Relaxed);
    });

    info!("Bench run complete");
    Ok(())
}

/// Drive one full connection the way a phone app would.
fn central_script<W: ConversionWait>(
    session: &mut ControlSession<'_, Ads1115<SimAds1115, W>>,
    link: &mut SimLink,
    level: u8,
    settle: Duration,
) {
    let gain = session.adc().config().gain;
    let mut trans_id = 0u32;

    session.handle_event(link, GattEvent::Registered { success: true });
    session.handle_gap(link, GapEvent::AdvertisingDataSet);
    session.handle_gap(link, GapEvent::AdvertisingStarted { success: true });
    session.handle_event(link, GattEvent::ServiceCreated { service_handle: SERVICE_HANDLE });
    session.handle_event(link, GattEvent::CharacteristicAdded { attr_handle: CHAR_HANDLE });
    session.handle_event(link, GattEvent::Connected { conn_id: CONN_ID });

    read_samples(session, link, &mut trans_id, gain);

    for command in [
        ControlCommand::SetLevel(level),
        ControlCommand::from_byte(CMD_ENABLE),
        ControlCommand::from_byte(CMD_DISABLE),
    ] {
        let payload = [command.to_byte()];
        println!("write {:02X} ({:?})", payload[0], command);
        session.handle_event(
            link,
            GattEvent::WriteRequested {
                conn_id: CONN_ID,
                trans_id: 100 + u32::from(payload[0]),
                handle: CHAR_HANDLE,
                value: &payload,
                need_rsp: true,
            },
        );
        report(link, gain);
        std::thread::sleep(settle);

        if command == ControlCommand::Enable {
            read_samples(session, link, &mut trans_id, gain);
        }
    }

    session.handle_event(link, GattEvent::Disconnected { conn_id: CONN_ID });
}

fn read_samples<W: ConversionWait>(
    session: &mut ControlSession<'_, Ads1115<SimAds1115, W>>,
    link: &mut SimLink,
    trans_id: &mut u32,
    gain: Gain,
) {
    *trans_id += 1;
    println!("read handle {}", CHAR_HANDLE);
    session.handle_event(
        link,
        GattEvent::ReadRequested {
            conn_id: CONN_ID,
            trans_id: *trans_id,
            handle: CHAR_HANDLE,
        },
    );
    report(link, gain);
}

/// Print every response the session sent, decoding read values.
fn report(link: &mut SimLink, gain: Gain) {
    for response in link.take_responses() {
        let Some(value) = response.value else {
            println!("  <- ack (conn {}, trans {})", response.conn_id, response.trans_id);
            continue;
        };

        let hex: Vec<String> = value.iter().map(|b| format!("{b:02X}")).collect();
        println!("  <- {} (conn {}, trans {})", hex.join(" "), response.conn_id, response.trans_id);

        if let Some(decoded) = ReadResponse::from_slice(&value) {
            for channel in Channel::ALL {
                let raw = decoded.sample(channel);
                println!("     {}: {:6} = {:9.3} mV", channel, raw, raw_to_voltage(raw, gain));
            }
        }
    }
}
