//! pami-monitor: console telemetry monitor for the PAMI robot.
//!
//! Stands in for the dashboard: connects over BLE, subscribes to the event
//! contract, logs whatever the robot pushes, and tears the link down on
//! Ctrl-C.

use anyhow::Result;
use pami_link::domain::settings::SettingsService;
use pami_link::infrastructure::logging;
use pami_link::{event, BtleplugTransport, LinkConfig, RobotEvent, RobotLink};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = SettingsService::new()?;
    let _logging_guard = logging::init(&settings.get().log_settings)?;
    info!("starting pami-monitor");

    let config = LinkConfig::from_settings(settings.get())?;
    let transport = BtleplugTransport::new(config.scan_timeout).await?;
    let mut link = RobotLink::new(Box::new(transport), config);

    link.on(event::CONNECTED, |_| info!("robot connected"));
    link.on(event::DISCONNECTED, |_| info!("robot disconnected"));
    link.on(event::BATTERY, |event| {
        if let RobotEvent::Battery(percentage) = event {
            info!("battery: {percentage}%");
        }
    });
    link.on(event::POSITION, |event| {
        if let RobotEvent::Position(position) = event {
            info!(
                "position: x={:.1}mm y={:.1}mm theta={:.3}rad v={:.1}mm/s w={:.3}rad/s",
                position.x,
                position.y,
                position.theta,
                position.distance_speed,
                position.angle_speed
            );
        }
    });
    link.on(event::MOTOR_DEBUG, |event| {
        if let RobotEvent::MotorDebug(motor) = event {
            debug!(
                "motors: t={}ms ticks=({}, {}) pwm=({}, {})",
                motor.timestamp, motor.left_tick, motor.right_tick, motor.left_pwm, motor.right_pwm
            );
        }
    });

    link.connect().await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    link.disconnect().await;
    Ok(())
}
