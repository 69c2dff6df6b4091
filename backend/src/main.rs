#[tokio::main]
async fn main() -> anyhow::Result<()> {
    moodmap::start_server().await
}
