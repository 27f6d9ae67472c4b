//! Implementation of the `apimon project create` command.
//!
//! Projects are created out-of-band from the HTTP API — there's no
//! unauthenticated "sign up" endpoint, so minting the first API key for a
//! project has to happen against the database directly.

use rand::RngCore;

use apimon_core::config::Config;
use apimon_core::store::{self, projects};

use super::ProjectCreateArgs;

/// Execute the `apimon project create` command.
pub async fn execute(config: &Config, args: ProjectCreateArgs) -> anyhow::Result<()> {
    let pool = store::init_db(&config.storage.db_path).await?;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let plaintext_key = format!("sk_live_{}", hex::encode(bytes));

    let project = projects::create_project_with_key(&pool, &args.name, None, &plaintext_key).await?;
    pool.close().await;

    println!("Created project '{}' (id={})", project.name, project.id);
    println!();
    println!("  API key: {plaintext_key}");
    println!("  (save this now — it won't be shown again)");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(db_path: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.db_path = db_path.to_string_lossy().to_string();
        config
    }

    #[tokio::test]
    async fn create_project_mints_a_working_api_key() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = test_config(&dir.path().join("apimon.db"));

        execute(&config, ProjectCreateArgs { name: "Acme".to_string() })
            .await
            .expect("create project");

        let pool = store::init_db(&config.storage.db_path).await.expect("reopen db");
        let all = projects::list_projects(&pool).await.expect("list projects");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Acme");
    }

    #[tokio::test]
    async fn create_project_twice_yields_two_distinct_projects() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = test_config(&dir.path().join("apimon.db"));

        execute(&config, ProjectCreateArgs { name: "One".to_string() }).await.expect("create first");
        execute(&config, ProjectCreateArgs { name: "Two".to_string() }).await.expect("create second");

        let pool = store::init_db(&config.storage.db_path).await.expect("reopen db");
        let all = projects::list_projects(&pool).await.expect("list projects");
        assert_eq!(all.len(), 2);
    }
}
