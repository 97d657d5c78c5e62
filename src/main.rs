use dept_timetable::server;
use dept_timetable::service::TimetableService;
use dept_timetable::settings::Settings;
use dept_timetable::store::InMemoryStore;
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log_filter)).init();

    let store = match settings.load_seed()? {
        Some(seed) => {
            info!(
                "Loaded {} departments and {} constraints from seed",
                seed.departments.len(),
                seed.constraints.len()
            );
            InMemoryStore::from_seed(seed)
        }
        None => InMemoryStore::new(),
    };
    let service = Arc::new(TimetableService::new(Arc::new(store), settings.generation_timeout));

    server::run_server(settings.listen_addr, service).await?;
    Ok(())
}
