#[tokio::main]
async fn main() {
    dpchanger::start_server().await;
}
