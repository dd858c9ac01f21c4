#[tokio::main]
async fn main() {
    if let Err(e) = snail_race_lib::run().await {
        log::error!("Bot stopped: {}", e);
        std::process::exit(1);
    }
}
