use clap::Parser;
use color_eyre::Result;
use daybook::{Config, Database, Profile, SystemClock, TaskStore, cli::Cli};

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // --dev switches to a separate config and database
    let profile = if cli.dev {
        Profile::Dev
    } else {
        Profile::Prod
    };

    let config = Config::load_with_profile(profile, cli.config.clone())?;
    daybook::cli::init_tracing(cli.verbose, cli.quiet, &config.log_level)?;

    let db_path = config.get_database_path();
    let db = Database::new(
        db_path.to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Database path contains invalid UTF-8"))?
    )?;
    tracing::debug!(path = %db_path.display(), basis = ?config.date_basis, "opened task store");

    let store = TaskStore::new(db, SystemClock::new(config.date_basis));
    daybook::cli::run_command(cli.command, &store, cli.json)?;

    Ok(())
}
