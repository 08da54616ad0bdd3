use crate::bot::{Bot, Vec3};
use color_eyre::eyre;
use tokio::time::Duration;

pub const DEFAULT_FLIGHT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, thiserror::Error)]
pub enum FlightError {
    #[error("Creative flight is not available; the bot must be in creative mode to fly")]
    Unavailable,
    #[error("flight timed out after {} seconds", .0.as_secs_f64())]
    TimedOut(Duration),
    #[error("{0:#}")]
    Failed(eyre::Report),
}

/// Flies to `destination`, giving up after `timeout`. On expiry the bot is told
/// to stop so it does not keep flying after the caller has been answered.
pub async fn fly_to(
    bot: &dyn Bot,
    destination: Vec3,
    timeout: Duration,
) -> Result<(), FlightError> {
    if !bot.can_fly().await.map_err(FlightError::Failed)? {
        return Err(FlightError::Unavailable);
    }

    tracing::debug!(%destination, ?timeout, "Starting flight");
    match tokio::time::timeout(timeout, bot.fly_to(destination)).await {
        Ok(result) => result.map_err(FlightError::Failed),
        Err(_) => {
            tracing::warn!(%destination, ?timeout, "Flight timed out, stopping");
            if let Err(err) = bot.stop_flying().await {
                tracing::warn!("Failed to stop flight after timeout: {err:#}");
            }
            Err(FlightError::TimedOut(timeout))
        }
    }
}
