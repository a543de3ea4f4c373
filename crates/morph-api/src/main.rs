use mimalloc::MiMalloc;
use morph_api::setup;
use morph_core::Config;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let (state, app) = setup::initialize_app(config.clone()).await?;

    setup::server::start_server(&config, state, app).await?;

    Ok(())
}
