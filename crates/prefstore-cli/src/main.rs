mod cli;
mod config;
mod storage;

use crate::cli::{Command, ConfigCommand, Kind};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use num_bigint::BigInt;
use prefstore::{Storable, Store};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command {
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
        Command::Health => run_health_check(&config).await?,
        command => {
            let store = storage::store_from_config(&config)?;
            for line in run(&store, command).await? {
                println!("{line}");
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    // Logs go to stderr so command output stays pipeable.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("prefstore {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

async fn run_health_check(config: &config::Config) -> Result<()> {
    let store = storage::store_from_config(config)?;
    run_store_health(&store).await?;
    println!("Storage: ok ({})", store.engine_name());
    Ok(())
}

async fn run_store_health(store: &Store) -> Result<()> {
    let health_key = "health/check";
    store.push(health_key, "ok".to_string()).await?;
    let round_trip: String = store.pull(health_key).await?;
    store.remove(health_key).await?;

    if round_trip != "ok" {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    Ok(())
}

/// Execute a data command and return the lines to print.
async fn run(store: &Store, command: Command) -> Result<Vec<String>> {
    let lines = match command {
        Command::Push { key, value, kind } => {
            push(store, &key, &value, kind).await?;
            Vec::new()
        }
        Command::Pull { key, kind, default } => match pull(store, &key, kind).await {
            Ok(text) => vec![text],
            Err(err) if err.is_not_found() => match default {
                Some(fallback) => vec![fallback],
                None => return Err(err.into()),
            },
            Err(err) => return Err(err.into()),
        },
        Command::Exists { key } => vec![store.exists(&key).await?.to_string()],
        Command::Remove { key } => {
            store.remove(&key).await?;
            Vec::new()
        }
        Command::Raw => store
            .raw()
            .await?
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect(),
        Command::Clear => {
            store.clear().await?;
            Vec::new()
        }
        Command::Health | Command::Config(_) | Command::Version => {
            return Err(eyre!("not a data command"))
        }
    };
    Ok(lines)
}

async fn push(store: &Store, key: &str, value: &str, kind: Kind) -> Result<()> {
    match kind {
        Kind::Bool => store.push(key, parse::<bool>(value)?).await?,
        Kind::Int => store.push(key, parse::<i32>(value)?).await?,
        Kind::Long => store.push(key, parse::<i64>(value)?).await?,
        Kind::Float => store.push(key, parse::<f32>(value)?).await?,
        Kind::Double => store.push(key, parse::<f64>(value)?).await?,
        Kind::String => store.push(key, value.to_string()).await?,
        Kind::Bigint => store.push(key, parse::<BigInt>(value)?).await?,
        Kind::Bytes => store.push(key, STANDARD.decode(value)?).await?,
        Kind::Json => store.push(key, parse::<serde_json::Value>(value)?).await?,
    }
    Ok(())
}

async fn pull(store: &Store, key: &str, kind: Kind) -> Result<String, prefstore::StoreError> {
    Ok(match kind {
        Kind::Bool => store.pull::<bool>(key).await?.to_string(),
        Kind::Int => store.pull::<i32>(key).await?.to_string(),
        Kind::Long => store.pull::<i64>(key).await?.to_string(),
        Kind::Float => store.pull::<f32>(key).await?.to_string(),
        Kind::Double => store.pull::<f64>(key).await?.to_string(),
        Kind::String => store.pull::<String>(key).await?,
        Kind::Bigint => store.pull::<BigInt>(key).await?.to_string(),
        Kind::Bytes => STANDARD.encode(store.pull::<Vec<u8>>(key).await?),
        Kind::Json => store.pull::<serde_json::Value>(key).await?.to_string(),
    })
}

/// Parse command line text with the same rules the store uses for that type.
fn parse<T: Storable>(value: &str) -> Result<T> {
    T::decode(value.as_bytes(), prefstore::Charset::Utf8)
        .map_err(|e| eyre!("invalid {} value {value:?}: {e}", T::KIND))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage;

    fn push_cmd(key: &str, value: &str, kind: Kind) -> Command {
        Command::Push {
            key: key.into(),
            value: value.into(),
            kind,
        }
    }

    #[tokio::test]
    async fn health_check_with_test_store_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path());
        run_store_health(&store)
            .await
            .expect("health check should succeed");
        assert!(store.raw().await.expect("raw").is_empty());
    }

    #[tokio::test]
    async fn push_then_pull_each_kind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path());
        let cases = [
            (Kind::Bool, "true"),
            (Kind::Int, "-7"),
            (Kind::Long, "9000000000"),
            (Kind::Float, "1.5"),
            (Kind::Double, "2.25"),
            (Kind::String, "hello world"),
            (Kind::Bigint, "123456789012345678901234567890"),
            (Kind::Bytes, "AAEC/w=="),
            (Kind::Json, r#"{"a":1}"#),
        ];
        for (kind, value) in cases {
            run(&store, push_cmd("k", value, kind)).await.expect("push");
            let out = run(
                &store,
                Command::Pull {
                    key: "k".into(),
                    kind,
                    default: None,
                },
            )
            .await
            .expect("pull");
            assert_eq!(out, vec![value.to_string()], "{kind:?}");
        }
    }

    #[tokio::test]
    async fn values_persist_across_processes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path());
        run(&store, push_cmd("x_0", "42", Kind::Int)).await.expect("push");
        run(&store, push_cmd("x_1", "7", Kind::Int)).await.expect("push");
        drop(store);

        let reopened = storage::test_store(dir.path());
        let out = run(&reopened, Command::Raw).await.expect("raw");
        assert_eq!(out, vec!["x_0=42".to_string(), "x_1=7".to_string()]);
    }

    #[tokio::test]
    async fn pull_default_only_for_missing_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path());
        let pull_int = |default: Option<&str>| Command::Pull {
            key: "n".into(),
            kind: Kind::Int,
            default: default.map(str::to_string),
        };

        let out = run(&store, pull_int(Some("0"))).await.expect("default");
        assert_eq!(out, vec!["0".to_string()]);
        assert!(run(&store, pull_int(None)).await.is_err());

        run(&store, push_cmd("n", "not a number", Kind::String))
            .await
            .expect("push");
        assert!(run(&store, pull_int(Some("0"))).await.is_err());
    }

    #[tokio::test]
    async fn exists_remove_and_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path());
        let exists = || Command::Exists { key: "a".into() };

        run(&store, push_cmd("a", "1", Kind::String)).await.expect("push");
        run(&store, push_cmd("b", "2", Kind::String)).await.expect("push");
        assert_eq!(run(&store, exists()).await.expect("exists"), vec!["true"]);

        run(&store, Command::Remove { key: "a".into() }).await.expect("remove");
        assert_eq!(run(&store, exists()).await.expect("exists"), vec!["false"]);

        run(&store, Command::Clear).await.expect("clear");
        assert!(run(&store, Command::Raw).await.expect("raw").is_empty());
    }

    #[tokio::test]
    async fn rejects_unparseable_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path());
        assert!(run(&store, push_cmd("n", "abc", Kind::Int)).await.is_err());
        assert!(run(&store, push_cmd("b", "%%%", Kind::Bytes)).await.is_err());
        assert!(!store.exists("n").await.expect("exists"));
    }
}
