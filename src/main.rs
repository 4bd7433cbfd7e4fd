use writeups_filter::config::Config;
use writeups_filter::StartupError;

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    writeups_filter::init_tracing();
    let config = Config::from_env()?;
    writeups_filter::run(config).await
}
