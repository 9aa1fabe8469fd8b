pub mod fusion;
pub mod protocol;
pub mod types;

use anyhow::Result;
use fusion::OrientationEstimator;
use protocol::FrameParser;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, watch};
use types::{FusionParams, Orientation};

/// Commands sent to the IMU processing task.
enum ImuCommand {
    Reset,
}

/// Client for a streamed accelerometer/gyroscope feed.
///
/// Connects to the sensor bridge over TCP, parses the frame stream,
/// runs complementary-filter fusion, and publishes the latest orientation.
pub struct ImuClient {
    orientation_rx: watch::Receiver<Orientation>,
    command_tx: mpsc::UnboundedSender<ImuCommand>,
    _task: tokio::task::JoinHandle<()>,
}

impl ImuClient {
    /// Connect to the sensor feed and start processing.
    pub async fn connect(addr: impl ToSocketAddrs, params: FusionParams) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        tracing::info!(peer = ?stream.peer_addr().ok(), "Connected to sensor feed");

        let (orientation_tx, orientation_rx) = watch::channel(Orientation::default());
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(imu_read_loop(stream, orientation_tx, command_rx, params));

        Ok(Self {
            orientation_rx,
            command_tx,
            _task: task,
        })
    }

    /// Client that never leaves the level orientation, for running the
    /// viewer without a sensor feed. `reset` is accepted and ignored.
    pub fn mock() -> Self {
        let (orientation_tx, orientation_rx) = watch::channel(Orientation::default());
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            // Holding the sender keeps `orientation()` readable; the task
            // ends when the client is dropped.
            let _tx = orientation_tx;
            while let Some(cmd) = command_rx.recv().await {
                match cmd {
                    ImuCommand::Reset => tracing::debug!("Mock IMU ignores reset"),
                }
            }
        });
        Self {
            orientation_rx,
            command_tx,
            _task: task,
        }
    }

    /// Get the latest fused orientation (non-blocking).
    pub fn orientation(&self) -> Orientation {
        *self.orientation_rx.borrow()
    }

    /// A receiver that wakes on every new estimate.
    pub fn subscribe(&self) -> watch::Receiver<Orientation> {
        self.orientation_rx.clone()
    }

    /// Zero the filter state. Orientation restarts after re-seeding.
    pub fn reset(&self) {
        let _ = self.command_tx.send(ImuCommand::Reset);
    }
}

/// Background task: read TCP stream, parse frames, run fusion, publish orientation.
async fn imu_read_loop(
    mut stream: TcpStream,
    orientation_tx: watch::Sender<Orientation>,
    mut command_rx: mpsc::UnboundedReceiver<ImuCommand>,
    params: FusionParams,
) {
    tracing::info!(
        bias = %params.accel_bias,
        lp_alpha = params.lp_alpha,
        hp_alpha = params.hp_alpha,
        complementary_alpha = params.complementary_alpha,
        "Starting orientation fusion"
    );
    let mut parser = FrameParser::new();
    let mut estimator = OrientationEstimator::new(params)
        .with_observer(move |orientation| {
            let _ = orientation_tx.send(orientation);
        });
    let mut buf = [0u8; 4096];
    let mut sample_count: u64 = 0;

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        tracing::warn!("Sensor feed closed");
                        break;
                    }
                    Ok(n) => {
                        parser.push_data(&buf[..n]);

                        // Drain all available events.
                        while let Some(result) = parser.next_event() {
                            match result {
                                Ok(event) => {
                                    estimator.on_event(event);
                                    sample_count += 1;
                                    if sample_count % 1000 == 0 {
                                        tracing::debug!(
                                            sample_count,
                                            accel = ?estimator.latest_accel(),
                                            gyro = ?estimator.latest_gyro(),
                                            "IMU samples processed"
                                        );
                                    }
                                }
                                Err(e) => {
                                    tracing::trace!(?e, "Skipping malformed frame");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(?e, "Sensor feed read error");
                        break;
                    }
                }
            }
            Some(cmd) = command_rx.recv() => {
                match cmd {
                    ImuCommand::Reset => estimator.reset(),
                }
            }
        }
    }
}
