mod config;

use std::error::Error;
use std::sync::Arc;

use bcmrng_hal::RngModule;
use runtime::device::SimulatedRng;
use runtime::{Board, CancelToken, HwrngRegistry, TimedPoll};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
  tracing_subscriber::registry().with(fmt::layer()).with(EnvFilter::from_default_env()).init();

  let config = Config::from_env()?;
  info!("starting...");

  let device = match config.seed {
    Some(seed) => SimulatedRng::new(seed),
    None => SimulatedRng::from_entropy(),
  };
  let mut board = Board::new(device.with_rate(config.rate))?;
  let registry = Arc::new(HwrngRegistry::new());

  let token = CancelToken::new();
  let poll = TimedPoll::new(config.poll.clone().cancel(token.clone()));
  let module = RngModule::initialize(&mut board.iomem, &mut &*registry, &config.rng, poll)?;

  let mut reader = {
    let registry = registry.clone();
    let len = config.bytes;
    tokio::task::spawn_blocking(move || {
      let mut buf = vec![0u8; len];
      registry.fill(&mut buf).map(|filled| {
        buf.truncate(filled);
        buf
      })
    })
  };

  let finished = tokio::select! {
    result = &mut reader => Some(result),
    _ = tokio::signal::ctrl_c() => None,
  };
  let result = match finished {
    Some(result) => result,
    None => {
      warn!("interrupted, cancelling read");
      token.cancel();
      reader.await
    }
  };

  module.shutdown(&mut board.iomem, &mut &*registry);

  let bytes = result??;
  info!("read {} bytes", bytes.len());
  println!("{}", bytes.iter().map(|byte| format!("{:02x}", byte)).collect::<String>());
  Ok(())
}
