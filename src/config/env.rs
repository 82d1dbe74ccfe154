use std::env;

pub enum EnvKey {
    ServerPort,
    AmqpUrl,
    MinioUrl,
    MinioRegion,
    MinioBucketVideos,
    MinioBucketResults,
    MinioAccessKey,
    MinioSecretKey,
    JobQueue,
    CompletionQueue,
    FfmpegPath,
    RequeueDelayMs,
    JwtSecret,
    MaxUploadBytes,
    LogFormat,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::AmqpUrl => "AMQP_URL",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioRegion => "MINIO_REGION",
            EnvKey::MinioBucketVideos => "MINIO_BUCKET_VIDEOS",
            EnvKey::MinioBucketResults => "MINIO_BUCKET_RESULTS",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::JobQueue => "JOB_QUEUE",
            EnvKey::CompletionQueue => "COMPLETION_QUEUE",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::RequeueDelayMs => "REQUEUE_DELAY_MS",
            EnvKey::JwtSecret => "JWT_SECRET",
            EnvKey::MaxUploadBytes => "MAX_UPLOAD_BYTES",
            EnvKey::LogFormat => "LOG_FORMAT",
        }
    }
}

/// Where settings are read from. The process environment in production,
/// a plain map in tests.
pub trait Source {
    fn var(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl Source for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl Source for std::collections::HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

pub fn get(source: &impl Source, key: EnvKey) -> Option<String> {
    source.var(key.as_str())
}

pub fn get_or(source: &impl Source, key: EnvKey, default: &str) -> String {
    get(source, key).unwrap_or_else(|| default.to_string())
}
