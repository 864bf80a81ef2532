#[tokio::main]
async fn main() -> anyhow::Result<()> {
    event_draft_lib::run().await
}
