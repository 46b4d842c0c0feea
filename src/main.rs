use anyhow::Context;

use boidcast::{BoidcastApp, Config};

fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    boidcast::init_logging(&config);
    config.log_summary();

    let app = BoidcastApp::new(config).context("failed to start")?;
    app.run().context("boidcast stopped with an error")?;
    Ok(())
}
