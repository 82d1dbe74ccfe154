use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::info;
use uuid::Uuid;

use vid2audio::common::{shutdown, telemetry};
use vid2audio::config::settings::{
    AppConfig, BrokerSettings, ConverterSettings, GatewaySettings, StorageSettings,
};
use vid2audio::infrastructure::queue::{MessageBroker, RabbitMqService};
use vid2audio::infrastructure::storage::{BlobStore, S3BlobStore, s3};
use vid2audio::modules::conversion::FfmpegExtractor;
use vid2audio::modules::media::service::Producer;
use vid2audio::modules::notification::LogNotifier;
use vid2audio::state::AppState;
use vid2audio::workers::ConsumerOptions;
use vid2audio::workers::converter::ConversionWorker;
use vid2audio::workers::notifier::NotificationWorker;

#[derive(Parser)]
#[command(name = "vid2audio", about = "Video to audio conversion services")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// HTTP upload and download surface
    Gateway,
    /// Consume conversion jobs
    Converter,
    /// Consume completion messages
    Notifier,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    telemetry::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Gateway => run_gateway(AppConfig::new().context("Invalid configuration")?).await,
        Command::Converter => {
            run_converter(AppConfig::new().context("Invalid configuration")?).await
        }
        Command::Notifier => {
            run_notifier(BrokerSettings::new().context("Invalid broker configuration")?).await
        }
    }
}

async fn connect_storage(
    settings: &StorageSettings,
) -> anyhow::Result<(Arc<dyn BlobStore>, Arc<dyn BlobStore>)> {
    let client = s3::client(settings);
    let videos = S3BlobStore::new(client.clone(), &settings.videos_bucket);
    let results = S3BlobStore::new(client, &settings.results_bucket);

    videos.ensure_bucket().await?;
    results.ensure_bucket().await?;

    info!(videos = videos.bucket(), results = results.bucket(), "Connected to S3 (MinIO)");
    Ok((Arc::new(videos), Arc::new(results)))
}

async fn connect_broker(settings: &BrokerSettings) -> anyhow::Result<Arc<dyn MessageBroker>> {
    let broker = RabbitMqService::new(&settings.amqp_url).await?;
    Ok(Arc::new(broker))
}

fn consumer_options(queue: &str, role: &str, settings: &BrokerSettings) -> ConsumerOptions {
    ConsumerOptions {
        queue: queue.to_string(),
        consumer_tag: format!("{}-{}", role, Uuid::new_v4().simple()),
        requeue_delay: settings.requeue_delay,
    }
}

async fn run_gateway(config: AppConfig) -> anyhow::Result<()> {
    let settings = GatewaySettings::new().context("Invalid gateway configuration")?;
    let (videos, results) = connect_storage(&config.storage).await?;
    let broker = connect_broker(&config.broker).await?;

    let producer = Producer::new(videos, broker, &config.broker.job_queue);
    let port = settings.server_port;
    let app = vid2audio::app::create_app(AppState::new(settings, producer, results));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Server running on http://0.0.0.0:{}", port);

    let token = shutdown::on_signal();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn run_converter(config: AppConfig) -> anyhow::Result<()> {
    let settings = ConverterSettings::new().context("Invalid converter configuration")?;
    info!(ffmpeg = %settings.ffmpeg_path.display(), "Using converter binary");

    let (videos, results) = connect_storage(&config.storage).await?;
    let broker = connect_broker(&config.broker).await?;

    let worker = ConversionWorker::new(
        videos,
        results,
        broker,
        Arc::new(FfmpegExtractor::new(settings.ffmpeg_path)),
        &config.broker.completion_queue,
    );
    let options = consumer_options(&config.broker.job_queue, "converter", &config.broker);

    let token = shutdown::on_signal();
    worker.run(&options, token.clone()).await?;

    if !token.is_cancelled() {
        bail!("Job queue consumer ended unexpectedly");
    }
    info!("Converter stopped");
    Ok(())
}

async fn run_notifier(settings: BrokerSettings) -> anyhow::Result<()> {
    let broker = connect_broker(&settings).await?;

    let worker = NotificationWorker::new(broker, Arc::new(LogNotifier));
    let options = consumer_options(&settings.completion_queue, "notifier", &settings);

    let token = shutdown::on_signal();
    worker.run(&options, token.clone()).await?;

    if !token.is_cancelled() {
        bail!("Completion queue consumer ended unexpectedly");
    }
    info!("Notifier stopped");
    Ok(())
}
