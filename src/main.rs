#[tokio::main]
async fn main() {
    if let Err(e) = stockwatch_lib::run().await {
        eprintln!("stockwatch failed to start: {:#}", e);
        std::process::exit(1);
    }
}
