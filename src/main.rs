use anyhow::Result;
use gyrocube_config::AppConfig;
use gyrocube_imu::types::{FusionParams, Orientation};
use gyrocube_imu::ImuClient;
use std::time::Duration;
use tracing::{info, warn};

/// Application state.
struct App {
    config: AppConfig,
    imu_client: ImuClient,
    /// Snapshot the current frame is drawn with.
    orientation: Orientation,
    frame_count: u64,
}

impl App {
    fn new(config: AppConfig, imu_client: ImuClient) -> Self {
        Self {
            config,
            imu_client,
            orientation: Orientation::default(),
            frame_count: 0,
        }
    }

    /// One display frame: copy out the latest estimate.
    fn frame(&mut self) {
        self.orientation = self.imu_client.orientation();

        self.frame_count += 1;
        if self.frame_count % 300 == 0 {
            tracing::debug!(
                frames = self.frame_count,
                roll = self.orientation.roll,
                pitch = self.orientation.pitch,
                yaw = self.orientation.yaw,
                "Render heartbeat"
            );
        }
    }

    async fn run(&mut self) -> Result<()> {
        let period = Duration::from_secs_f64(1.0 / f64::from(self.config.render_hz));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.frame(),
                result = &mut shutdown => {
                    result?;
                    info!(frames = self.frame_count, "Shutting down");
                    break;
                }
            }
        }
        Ok(())
    }
}

fn fusion_params(config: &AppConfig) -> FusionParams {
    FusionParams {
        accel_bias: config.imu.accel_bias,
        lp_alpha: config.imu.lp_alpha,
        hp_alpha: config.imu.hp_alpha,
        complementary_alpha: config.imu.complementary_alpha,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gyrocube=info,gyrocube_imu=info,gyrocube_config=info".into()),
        )
        .init();

    info!("gyrocube starting");

    // Load config.
    let config = gyrocube_config::load_config().unwrap_or_else(|e| {
        warn!(?e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    info!(
        addr = %config.imu.stream_addr,
        render_hz = config.render_hz,
        complementary_alpha = config.imu.complementary_alpha,
        "Config loaded"
    );

    // Connect to the sensor feed (fall back to mock if nothing is streaming).
    let params = fusion_params(&config);
    let imu_client = match ImuClient::connect(config.imu.stream_addr.as_str(), params).await {
        Ok(client) => {
            info!("IMU connected");
            client
        }
        Err(e) => {
            warn!(?e, "Sensor feed not available, using mock (no orientation updates)");
            ImuClient::mock()
        }
    };

    let mut app = App::new(config, imu_client);
    app.run().await
}
