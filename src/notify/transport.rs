use std::process::Command;

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};

use crate::events::{AppEvent, EventBus};

/// Something that can put an alert in front of the user.
pub trait NotificationTransport: Send + Sync {
    fn name(&self) -> &'static str;
    fn send(&self, title: &str, body: &str) -> Result<()>;
}

/// Native OS notification through the platform's command-line notifier.
pub struct DesktopTransport;

impl NotificationTransport for DesktopTransport {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn send(&self, title: &str, body: &str) -> Result<()> {
        let status = platform_command(title, body)?
            .status()
            .context("failed to spawn desktop notifier")?;

        if !status.success() {
            bail!("desktop notifier exited with {status}");
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn platform_command(title: &str, body: &str) -> Result<Command> {
    let mut command = Command::new("notify-send");
    command.args(["--app-name=posturewatch", title, body]);
    Ok(command)
}

#[cfg(target_os = "macos")]
fn platform_command(title: &str, body: &str) -> Result<Command> {
    let script = format!(
        "display notification {} with title {}",
        apple_script_string(body),
        apple_script_string(title)
    );
    let mut command = Command::new("osascript");
    command.args(["-e", &script]);
    Ok(command)
}

#[cfg(target_os = "macos")]
fn apple_script_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn platform_command(_title: &str, _body: &str) -> Result<Command> {
    Err(anyhow!("desktop notifications are not supported on this platform"))
}

/// In-app banner: hands the alert to whatever is rendering the event bus.
pub struct InAppTransport {
    events: EventBus,
}

impl InAppTransport {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }
}

impl NotificationTransport for InAppTransport {
    fn name(&self) -> &'static str {
        "in-app"
    }

    fn send(&self, title: &str, body: &str) -> Result<()> {
        let delivered = self.events.emit(AppEvent::PostureAlert {
            title: title.to_string(),
            body: body.to_string(),
        });
        if delivered {
            Ok(())
        } else {
            Err(anyhow!("no in-app listeners for posture alert"))
        }
    }
}

/// Tries each transport in order until one delivers.
pub struct Notifier {
    transports: Vec<Box<dyn NotificationTransport>>,
}

impl Notifier {
    pub fn new(transports: Vec<Box<dyn NotificationTransport>>) -> Self {
        Self { transports }
    }

    /// Native first, in-app banner as fallback.
    pub fn with_defaults(events: EventBus) -> Self {
        Self::new(vec![
            Box::new(DesktopTransport),
            Box::new(InAppTransport::new(events)),
        ])
    }

    pub fn dispatch(&self, title: &str, body: &str) -> bool {
        for transport in &self.transports {
            match transport.send(title, body) {
                Ok(()) => {
                    info!("Posture alert delivered via {}", transport.name());
                    return true;
                }
                Err(err) => {
                    warn!("{} transport failed: {err:#}", transport.name());
                }
            }
        }
        warn!("Posture alert dropped: every transport failed");
        false
    }
}
