use clawlink::config::BridgeConfig;
use clawlink::control::{Channel, Command, ContactId, JoystickGeometry, Point};
use clawlink::link::ConnectionSupervisor;
use clawlink::session::{InputEvent, SessionNotice, TokioClock};
use clawlink::transport::SimulatedTransport;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::sleep;
use tracing::instrument::WithSubscriber;
use tracing::{info, warn, Level, Subscriber};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let config = setup().await?;
    let settings = config.session_settings();
    let geometry = settings.geometry;

    // Dry run against the in-process device
    let device = Arc::new(
        SimulatedTransport::new().with_axis_loss(config.device.simulated_axis_loss),
    );
    let supervisor = ConnectionSupervisor::spawn(device.clone(), settings, TokioClock);

    let notice_log = tokio::spawn(log_notices(supervisor.notices()));

    let address = config.device.address.clone();
    supervisor
        .connect(&address)
        .await
        .map_err(|e| eyre!("Failed to connect to {}: {}", address, e))?;

    // Let the first usability poll come back
    sleep(Duration::from_millis(200)).await;

    replay_session(&supervisor, geometry).await?;

    let status = supervisor.status();
    info!(
        "Before disconnect: link {}, usable {}, axes {}",
        status.link, status.usable, status.axes
    );

    supervisor.disconnect().await?;
    report(&device);

    supervisor.shutdown().await;
    notice_log.abort();
    Ok(())
}

/// Drag to full right and back, turn the rotation slider, move the lifting arm
/// and work the claw.
async fn replay_session(supervisor: &ConnectionSupervisor, geometry: JoystickGeometry) -> Result<()> {
    let contact = ContactId::Touch(1);
    let center = geometry.center;
    let reach = geometry.max_radius();

    info!("Replaying drag gesture");
    supervisor
        .submit(InputEvent::ContactStart {
            contact,
            point: center,
        })
        .await?;
    for step in 1..=10 {
        let point = Point::new(center.x + reach * step as f32 / 10.0, center.y);
        supervisor
            .submit(InputEvent::ContactMove { contact, point })
            .await?;
        sleep(Duration::from_millis(20)).await;
    }
    sleep(Duration::from_millis(300)).await;
    supervisor.submit(InputEvent::ContactEnd { contact }).await?;
    sleep(Duration::from_millis(300)).await;

    info!("Replaying rotation slider");
    for value in [150, 180, 210] {
        supervisor.submit(InputEvent::RotationInput { value }).await?;
        sleep(Duration::from_millis(10)).await;
    }
    sleep(Duration::from_millis(200)).await;
    supervisor.submit(InputEvent::RotationRelease).await?;
    sleep(Duration::from_millis(300)).await;

    info!("Replaying lifting arm slider");
    for value in (0..=255u16).step_by(32) {
        supervisor
            .submit(InputEvent::ChannelInput {
                channel: Channel::A,
                value: value as u8,
            })
            .await?;
        sleep(Duration::from_millis(15)).await;
    }
    sleep(Duration::from_millis(100)).await;

    info!("Working the claw");
    for command in [Command::Grab, Command::Grab, Command::Release] {
        supervisor
            .submit(InputEvent::CommandInvoke { command })
            .await?;
        sleep(Duration::from_millis(150)).await;
    }

    Ok(())
}

/// Logs notices until the supervisor goes away. Returns how many were logged.
async fn log_notices(mut notices: broadcast::Receiver<SessionNotice>) -> usize {
    let mut logged = 0;
    loop {
        match notices.recv().await {
            Ok(notice) => {
                info!("Session notice: {:?}", notice);
                logged += 1;
            }
            Err(RecvError::Lagged(missed)) => warn!("Missed {} session notices", missed),
            Err(RecvError::Closed) => return logged,
        }
    }
}

fn report(device: &SimulatedTransport) {
    let sent = device.sent_axes();
    let received = device.received_axes();
    info!(
        "Axis frames: {} sent, {} received ({} lost)",
        sent.len(),
        received.len(),
        sent.len() - received.len()
    );
    for triple in &received {
        info!("  axes {}", triple);
    }
    for (channel, value) in device.channel_writes() {
        info!("  channel {} = {}", channel, value);
    }
    for command in device.commands() {
        info!("  command {}", command);
    }
}

async fn setup() -> Result<BridgeConfig> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;

    // The configured level is unknown until the file is read
    let config = setup_config()
        .with_subscriber(logging_subscriber(Level::INFO))
        .await?;

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", config.log.level.as_str())
    }
    tracing::subscriber::set_global_default(logging_subscriber(config.log_level()))
        .map_err(|e| eyre!("Failed to install logging: {}", e))?;
    Ok(config)
}

async fn setup_config() -> Result<BridgeConfig> {
    BridgeConfig::ensure_default_config().await?;
    BridgeConfig::load().await
}

fn logging_subscriber(level: Level) -> impl Subscriber + Send + Sync + 'static {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .finish()
}
