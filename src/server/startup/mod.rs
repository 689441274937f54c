//! Connecting to the shared job store and bringing its schema up to date.

use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use migration::{Migrator, MigratorTrait};

use crate::server::config::Config;
use crate::server::error::Error;

/// Opens a pooled connection to `config.database_url` and runs every pending migration.
///
/// Every worker process does this independently on startup rather than relying on a separate
/// deployment step, so a freshly provisioned store and an existing one both end up schema-
/// current before the worker registers itself.
pub async fn connect(config: &Config) -> Result<DatabaseConnection, Error> {
    let mut opt = ConnectOptions::new(&config.database_url);
    opt.sqlx_logging(config.debug);

    let db = Database::connect(opt).await?;
    Migrator::up(&db, None).await?;

    Ok(db)
}
