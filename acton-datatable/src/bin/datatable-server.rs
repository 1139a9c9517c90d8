//! Serves every table of a PostgreSQL database at `GET /datatables/{table}`

use std::sync::Arc;

use acton_datatable::prelude::*;
use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load_for_service("datatable-server")?;
    init_tracing(&config)?;

    let database = config
        .database
        .clone()
        .context("database.url must be configured (config.toml or DATATABLE_DATABASE__URL)")?;
    let pool = create_pool(&database).await?;

    let state = AppState::new(Arc::new(PgBackend::new(pool)), config.datatable.clone());
    let app = router(state);

    Server::new(config).serve(app).await?;

    Ok(())
}
