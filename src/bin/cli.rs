use anyhow::{anyhow, bail, Context, Result};
use camrelay::config::AppConfig;
use camrelay::relay::{NegotiationRelay, OfferRequest};
use camrelay::testing::FakeMediaHost;
use camrelay::types::Device;
use camrelay::{CaptureController, DeviceRegistry, MediaHost};
use serde_json::Value;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

const USAGE: &str = "Usage: camrelay <command> [args]

Commands:
  serve [--config <path>]                      Run the offer relay server
  relay <endpoint> <offer.json> [--prompt <json>]
                                               Relay one offer and print the answer
  list-devices [--json] [--fake]               List video inputs
  select <device_id> [--stream] [--fake]       Open a capture session on a device";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let config_path = flag_value(&args, "--config")
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load_from_file(&config_path)?;
    camrelay::init_logging_with(&config.logging.filter);

    let command = &args[1];
    match command.as_str() {
        "serve" => cmd_serve(&config).await,
        "relay" => cmd_relay(&config, &args).await,
        "list-devices" => cmd_list_devices(&args).await,
        "select" => cmd_select(&args).await,
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    }
}

async fn cmd_serve(config: &AppConfig) -> Result<()> {
    camrelay::server::serve(config).await?;
    Ok(())
}

async fn cmd_relay(config: &AppConfig, args: &[String]) -> Result<()> {
    let positional = positional(args);
    let (endpoint, offer_path) = match positional.as_slice() {
        [endpoint, offer_path, ..] => (endpoint.to_string(), offer_path.to_string()),
        _ => bail!("Usage: camrelay relay <endpoint> <offer.json> [--prompt <json>]"),
    };

    let offer_text = std::fs::read_to_string(&offer_path)
        .with_context(|| format!("failed to read offer from {}", offer_path))?;
    let offer: Value = serde_json::from_str(&offer_text)
        .with_context(|| format!("{} is not valid JSON", offer_path))?;
    let prompt = match flag_value(args, "--prompt") {
        Some(raw) => Some(serde_json::from_str(raw).context("--prompt is not valid JSON")?),
        None => None,
    };

    let relay = NegotiationRelay::from_config(&config.relay)?;
    let (status, body) = relay
        .relay(&OfferRequest::new(endpoint, prompt, Some(offer)))
        .await
        .into_parts();

    println!("{}", status);
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn cmd_list_devices(args: &[String]) -> Result<()> {
    let registry = DeviceRegistry::new(media_host(args));
    let devices = registry.refresh().await?;

    if has_flag(args, "--json") {
        println!("{}", serde_json::to_string(&devices)?);
    } else if devices.is_empty() {
        println!("No webcams found.");
    } else {
        for (index, device) in devices.iter().enumerate() {
            println!("{}. {} - ID: {}", index + 1, device.display_label(), device.id);
        }
    }
    Ok(())
}

async fn cmd_select(args: &[String]) -> Result<()> {
    let device_id = positional(args)
        .first()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Usage: camrelay select <device_id> [--stream] [--fake]"))?;

    let host = media_host(args);
    let registry = DeviceRegistry::new(host.clone());
    registry.request_capability().await?;

    let controller = CaptureController::new(host);
    controller.on_stream_ready(|handle| {
        println!(
            "Stream ready: session {} on {} ({})",
            handle.session_id(),
            handle.device_id(),
            handle.settings().resolution
        );
    });

    if let Err(e) = controller.select(&device_id).await {
        bail!("{}", e.user_message());
    }

    if has_flag(args, "--stream") {
        let stream = controller.capture_as_stream().await?;
        println!(
            "Transmitting track {} at {} fps",
            stream.track_id(),
            stream.settings().frame_rate.unwrap_or_default()
        );
    }

    println!("Press ctrl-c to release the camera");
    tokio::signal::ctrl_c().await?;
    controller.stop().await;
    Ok(())
}

#[cfg(feature = "native")]
fn media_host(args: &[String]) -> Arc<dyn MediaHost> {
    if has_flag(args, "--fake") {
        return demo_host();
    }
    Arc::new(camrelay::NativeMediaHost::new())
}

#[cfg(not(feature = "native"))]
fn media_host(args: &[String]) -> Arc<dyn MediaHost> {
    if !has_flag(args, "--fake") {
        log::warn!("Built without the native feature; using the in-memory host");
    }
    demo_host()
}

fn demo_host() -> Arc<dyn MediaHost> {
    Arc::new(
        FakeMediaHost::new()
            .with_device(Device::video_input("fake-0", "Synthetic Front Camera"))
            .with_device(Device::video_input("fake-1", "Synthetic Rear Camera")),
    )
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Arguments after the command that are neither flags nor flag values
fn positional(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "--prompt" => i += 1,
            a if a.starts_with("--") => {}
            a => out.push(a),
        }
        i += 1;
    }
    out
}
