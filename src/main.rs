use moto_repo::config::ConfigLoader;
use moto_repo::logger::init_logger;
use moto_repo::{Repositories, Repository};

fn main() -> anyhow::Result<()> {
    let loader = ConfigLoader::new()?;
    let settings = loader.load()?;
    init_logger(settings.logger.clone().into_logger_config()?)?;

    tracing::info!(
        name = %settings.application.name,
        version = %settings.application.version,
        environment = %loader.environment(),
        loading = %settings.repository.loading,
        "Opening repositories"
    );

    let repos = Repositories::from_settings(&settings)?;

    tracing::info!(
        teams = repos.teams.find_all()?.len(),
        players = repos.players.find_all()?.len(),
        users = repos.users.find_all()?.len(),
        races = repos.races.find_all()?.len(),
        "Store ready"
    );

    Ok(())
}
