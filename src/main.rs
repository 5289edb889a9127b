use lncrawler_scheduler::shared::utils::logger::init_logger;

#[tokio::main]
async fn main() {
    init_logger();

    if let Err(e) = lncrawler_scheduler::run().await {
        log::error!("Scheduler failed: {}", e);
        std::process::exit(1);
    }
}
