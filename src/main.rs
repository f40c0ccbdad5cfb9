use std::sync::Arc;
use tracing::info;

use tunedeck::core::config::AppConfig;
use tunedeck::core::player::MpvPlayer;
use tunedeck::core::provider::MediaProvider;
use tunedeck::core::supervisor::ProcessSupervisor;
use tunedeck::core::ytdlp::YtDlpProvider;
use tunedeck::ui::ConsoleUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tunedeck::init()?;

    let config = AppConfig::load_or_default();
    info!(
        "🔧 Output directory: {}",
        config.download.output_directory.display()
    );

    let provider: Arc<dyn MediaProvider> = Arc::new(YtDlpProvider::new(config.ytdlp.clone()));
    let player = Arc::new(MpvPlayer::new(config.player.clone()));
    let (supervisor, events) =
        ProcessSupervisor::new(provider.clone(), player, config.download.clone());

    ConsoleUi::new(supervisor, provider, events, config.search.max_results)
        .run()
        .await?;

    Ok(())
}
